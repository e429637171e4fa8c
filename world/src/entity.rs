//! Entities living on the grid and the context their actions run in.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use warren_core::{Direction, EntityId, Location, Tick, TileId};

use crate::{
    cursor::{Cursor, LayerIndex},
    schedule::{Accumulator, Action, ScheduledAction},
    World,
};

/// Cursor binding of the occupancy layer in every entity cursor.
pub const ENTITY_LAYER: LayerIndex = LayerIndex::new(0);

/// Cursor binding of the wall layer in every entity cursor.
pub const WALL_LAYER: LayerIndex = LayerIndex::new(1);

/// Caller-chosen label distinguishing the actions an entity schedules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionTag(u32);

impl ActionTag {
    /// Creates a new tag.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric value of the tag.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Behaviour attached to a tile-sized actor.
///
/// Entities never run concurrently with anything touching their column or
/// the columns on either side, so they may read and write the grid freely
/// through the [`ActionContext`] cursor.
pub trait Entity: Send {
    /// Tile the entity occupies.
    fn location(&self) -> Location;

    /// Runs on the tick after the entity was registered.
    fn spawned(&mut self, cx: &mut ActionContext<'_>);

    /// Another entity blocked a step in `direction`.
    fn touched(&mut self, other: EntityId, direction: Direction) {
        let _ = (other, direction);
    }

    /// A wall blocked a step in `direction`.
    fn hit_wall(&mut self, direction: Direction) {
        let _ = direction;
    }

    /// Runs a previously scheduled action.
    fn act(&mut self, tag: ActionTag, cx: &mut ActionContext<'_>);
}

pub(crate) struct EntitySlot {
    pub(crate) entity: Box<dyn Entity>,
    pub(crate) cursor: Cursor,
}

/// Registry entry; locked only by the worker that owns the entity's column.
pub(crate) struct SlotCell(Mutex<EntitySlot>);

impl SlotCell {
    pub(crate) fn new(slot: EntitySlot) -> Self {
        Self(Mutex::new(slot))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EntitySlot> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` while the entity is executing an action.
    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, EntitySlot>> {
        match self.0.try_lock() {
            Ok(slot) => Some(slot),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub(crate) fn into_inner(self) -> EntitySlot {
        self.0.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything an entity may touch while one of its actions executes.
pub struct ActionContext<'a> {
    world: &'a World,
    id: EntityId,
    cursor: &'a mut Cursor,
    accumulator: &'a mut Accumulator,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(
        world: &'a World,
        id: EntityId,
        cursor: &'a mut Cursor,
        accumulator: &'a mut Accumulator,
    ) -> Self {
        Self {
            world,
            id,
            cursor,
            accumulator,
        }
    }

    /// Identifier of the acting entity.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Read access to the world.
    ///
    /// Entity queries skip entities that are executing, the acting one
    /// included; use [`ActionContext::location`] for its own tile.
    #[must_use]
    pub const fn world(&self) -> &'a World {
        self.world
    }

    /// Tile under the acting entity's cursor.
    #[must_use]
    pub fn location(&self) -> Location {
        self.cursor.at()
    }

    /// The entity's cursor, bound to [`ENTITY_LAYER`] and [`WALL_LAYER`].
    pub fn cursor(&mut self) -> &mut Cursor {
        &mut *self.cursor
    }

    /// Tick being executed.
    #[must_use]
    pub fn now(&self) -> Tick {
        self.world.now()
    }

    /// Schedules `tag` for this entity at `at`.
    ///
    /// # Panics
    ///
    /// Panics when `at` is not in the future.
    pub fn schedule(&mut self, at: Tick, tag: ActionTag) {
        self.accumulator.schedule(ScheduledAction {
            at,
            column: self.cursor.at().block().x(),
            entity: self.id,
            action: Action::Act(tag),
        });
    }

    /// Requests a new entity; it is registered once the tick completes.
    pub fn spawn(&mut self, entity: Box<dyn Entity>) {
        self.accumulator.spawn(entity);
    }

    /// Requests removal of `id` once the tick completes.
    pub fn kill(&mut self, id: EntityId) {
        self.accumulator.kill(id);
    }

    /// Moves the acting entity one tile, see [`World::step_entity`].
    pub fn step(&mut self, entity: &mut dyn Entity, direction: Direction) -> (Location, bool) {
        self.world
            .step_entity(self.id, entity, &mut *self.cursor, direction)
    }
}

impl World {
    /// Moves entity `id` one tile in `direction` through its cursor.
    ///
    /// A wall in the way calls [`Entity::hit_wall`], another entity calls
    /// [`Entity::touched`]; either leaves the entity in place. Returns the
    /// resulting location and whether the step succeeded.
    pub fn step_entity(
        &self,
        id: EntityId,
        entity: &mut dyn Entity,
        cursor: &mut Cursor,
        direction: Direction,
    ) -> (Location, bool) {
        if direction == Direction::None {
            return (cursor.at(), true);
        }
        if !cursor.directed_get(WALL_LAYER, direction).is_empty() {
            entity.hit_wall(direction);
            return (cursor.at(), false);
        }
        let other = cursor.directed_get(ENTITY_LAYER, direction);
        if !other.is_empty() {
            entity.touched(EntityId::from_tile(other), direction);
            return (cursor.at(), false);
        }
        cursor.set(ENTITY_LAYER, TileId::EMPTY);
        cursor.step(direction);
        cursor.set(ENTITY_LAYER, id.to_tile());
        (cursor.at(), true)
    }

    pub(crate) fn entity_cursor(&self, at: Location) -> Cursor {
        let mut cursor = Cursor::new(at);
        let entities = cursor.bind(self.occupancy_layer());
        let walls = cursor.bind(self.wall_layer());
        debug_assert_eq!(entities, ENTITY_LAYER);
        debug_assert_eq!(walls, WALL_LAYER);
        cursor
    }

    /// Registers an entity at its own location and schedules
    /// [`Entity::spawned`] for the next tick.
    ///
    /// Returns `None` when the location is a wall or already occupied.
    pub fn spawn(&mut self, entity: Box<dyn Entity>) -> Option<EntityId> {
        let at = entity.location();
        let mut cursor = self.entity_cursor(at);
        if !cursor.get(WALL_LAYER).is_empty() || !cursor.get(ENTITY_LAYER).is_empty() {
            log::debug!("spawn at {at} refused: tile is taken");
            return None;
        }
        let id = EntityId::new(self.next_entity);
        self.next_entity += 1;
        cursor.set(ENTITY_LAYER, id.to_tile());
        let _ = self
            .entities
            .insert(id, SlotCell::new(EntitySlot { entity, cursor }));
        let at_tick = self.now().next();
        self.scheduler.push(ScheduledAction {
            at: at_tick,
            column: at.block().x(),
            entity: id,
            action: Action::Spawned,
        });
        Some(id)
    }

    /// Removes entity `id` immediately and clears its occupancy tile.
    ///
    /// # Panics
    ///
    /// Panics when the occupancy layer does not carry `id` at the entity's
    /// position.
    pub(crate) fn despawn(&mut self, id: EntityId) -> Option<Box<dyn Entity>> {
        let slot = self.entities.remove(&id)?.into_inner();
        let mut cursor = slot.cursor;
        let found = cursor.get(ENTITY_LAYER);
        assert_eq!(
            found,
            id.to_tile(),
            "occupancy at {} disagrees with {id}",
            cursor.at()
        );
        cursor.set(ENTITY_LAYER, TileId::EMPTY);
        Some(slot.entity)
    }
}
