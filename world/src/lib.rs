#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the Warren tile-topology engine.
//!
//! The world owns every grid layer, the spanning forest over wall tiles, the
//! room and door registries and the entity registry. Wall edits update rooms
//! and doors incrementally and report the touched blocks; [`World::think`]
//! advances simulation time, executing scheduled entity actions on a worker
//! pool partitioned by block column.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use log::debug;
use warren_core::{Command, DoorId, EntityId, Event, Location, ModMap, Orientation, Tick};

mod cursor;
mod door;
mod entity;
mod error;
mod fsck;
mod layer;
mod pattern;
mod room;
mod schedule;
mod topology;
mod wall_tree;

pub use cursor::{Cursor, LayerIndex};
pub use entity::{ActionContext, ActionTag, Entity, ENTITY_LAYER, WALL_LAYER};
pub use error::{TopologyError, WorldError};
pub use layer::Layer;
pub use pattern::{fuzzy_search, Pattern, DOOR_FOOTPRINT, DOOR_WALLS, EMPTY_FOOTPRINT, FUZZY_RADIUS};
pub use topology::forced_flags;

use entity::SlotCell;
use schedule::Scheduler;
use topology::Topology;

/// Default upper bound on actions a single worker run may claim.
pub const DEFAULT_ACTION_BUDGET: usize = 10_000;

/// How much self-checking the world performs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Strictness {
    /// Run the consistency check after every topology operation.
    pub fsck_every_op: bool,
    /// Add flood-fill connectivity and orphan sweeps to every check.
    pub paranoid: bool,
}

/// Construction parameters of a [`World`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldConfig {
    /// Worker threads executing a tick; zero picks the hardware parallelism
    /// and one runs every tick inline on the calling thread.
    pub workers: usize,
    /// Upper bound on actions claimed by one worker run.
    pub action_budget: usize,
    /// Self-checking level.
    pub strictness: Strictness,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            action_budget: DEFAULT_ACTION_BUDGET,
            strictness: Strictness::default(),
        }
    }
}

/// Running totals of topology operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperationCounts {
    /// Wall tiles added.
    pub walls_added: u64,
    /// Wall tiles deleted.
    pub walls_deleted: u64,
    /// Wall requests refused because of a door or a solid square.
    pub walls_rejected: u64,
    /// Doors placed.
    pub doors_placed: u64,
    /// Doors removed, explicitly or by deleting their wall.
    pub doors_removed: u64,
    /// Rooms created by loop closures.
    pub rooms_created: u64,
}

/// Represents the authoritative Warren world state.
pub struct World {
    topology: Topology,
    occupancy: Arc<Layer>,
    custom: Mutex<HashMap<String, Arc<Layer>>>,
    entities: BTreeMap<EntityId, SlotCell>,
    next_entity: u32,
    scheduler: Scheduler,
    pool: Option<rayon::ThreadPool>,
    workers: usize,
    strictness: Strictness,
}

impl World {
    /// Creates an empty single-threaded world with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::build(WorldConfig::default(), None, 1)
    }

    /// Creates an empty world, starting a worker pool when more than one
    /// worker is requested.
    pub fn with_config(config: WorldConfig) -> Result<Self, WorldError> {
        let workers = match config.workers {
            0 => schedule::available_workers(),
            workers => workers,
        };
        let pool = if workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|index| format!("warren-worker-{index}"))
                    .build()?,
            )
        } else {
            None
        };
        debug!("world created with {workers} workers");
        Ok(Self::build(config, pool, workers))
    }

    fn build(config: WorldConfig, pool: Option<rayon::ThreadPool>, workers: usize) -> Self {
        Self {
            topology: Topology::new(),
            occupancy: Arc::new(Layer::new()),
            custom: Mutex::new(HashMap::new()),
            entities: BTreeMap::new(),
            next_entity: 1,
            scheduler: Scheduler::new(config.action_budget),
            pool,
            workers,
            strictness: config.strictness,
        }
    }

    /// Reports whether `at` may become a wall.
    #[must_use]
    pub fn can_set_wall(&self, at: Location) -> bool {
        self.topology.walls.get(at).is_empty() && self.topology.can_set_wall(at)
    }

    /// Turns `at` into wall, returning the touched blocks.
    ///
    /// The result is empty when the tile already is a wall or the wall was
    /// refused.
    pub fn set_wall(&mut self, at: Location) -> Result<ModMap, TopologyError> {
        let touched = self.topology.set_wall(at)?;
        self.after_edit()?;
        Ok(touched)
    }

    /// Turns the wall at `at` back into floor, returning the touched blocks.
    pub fn delete_wall(&mut self, at: Location) -> Result<ModMap, TopologyError> {
        let touched = self.topology.delete_wall(at)?;
        self.after_edit()?;
        Ok(touched)
    }

    /// Walls the rasterized segment between `from` and `to`.
    pub fn draw_line(&mut self, from: Location, to: Location) -> Result<ModMap, TopologyError> {
        let touched = self.topology.draw_line(from, to)?;
        self.after_edit()?;
        Ok(touched)
    }

    /// Walls the outline of the rectangle spanned by two corners.
    pub fn draw_box(&mut self, from: Location, to: Location) -> Result<ModMap, TopologyError> {
        let touched = self.topology.draw_box(from, to)?;
        self.after_edit()?;
        Ok(touched)
    }

    /// Reports whether a door footprint anchored at `at` fits.
    #[must_use]
    pub fn can_place_door(&self, at: Location, orientation: Orientation) -> bool {
        self.topology.can_place_door(at, orientation)
    }

    /// Places a door anchored exactly at `at`.
    pub fn place_door(
        &mut self,
        at: Location,
        orientation: Orientation,
    ) -> Result<Option<(DoorId, ModMap)>, TopologyError> {
        let placed = self.topology.place_door(at, orientation);
        self.after_edit()?;
        Ok(placed)
    }

    /// Places a door at the closest fitting footprint around `at`, returning
    /// where it landed.
    pub fn place_door_near(
        &mut self,
        at: Location,
    ) -> Result<Option<(DoorId, Location, Orientation, ModMap)>, TopologyError> {
        let placed = self.topology.place_door_near(at);
        self.after_edit()?;
        Ok(placed)
    }

    /// Removes the door covering `at`.
    pub fn remove_door(&mut self, at: Location) -> Result<Option<ModMap>, TopologyError> {
        let removed = self.topology.remove_door(at).map(|(_, touched)| touched);
        self.after_edit()?;
        Ok(removed)
    }

    /// Named auxiliary layer, created empty on first use.
    pub fn custom_layer(&self, name: &str) -> Arc<Layer> {
        let mut layers = self.custom.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            layers
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(Layer::new())),
        )
    }

    /// Current simulation tick.
    #[must_use]
    pub fn now(&self) -> Tick {
        self.scheduler.now()
    }

    /// Verifies every structural invariant of walls, rooms and doors.
    pub fn fsck(&self) -> Result<(), TopologyError> {
        self.topology.fsck(self.strictness.paranoid)
    }

    fn after_edit(&self) -> Result<(), TopologyError> {
        if self.strictness.fsck_every_op {
            self.fsck()
        } else {
            Ok(())
        }
    }

    pub(crate) fn wall_layer(&self) -> Arc<Layer> {
        Arc::clone(&self.topology.walls)
    }

    pub(crate) fn occupancy_layer(&self) -> Arc<Layer> {
        Arc::clone(&self.occupancy)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("now", &self.now())
            .field("walls", &self.topology.forest.len())
            .field("rooms", &self.topology.rooms.len())
            .field("doors", &self.topology.doors.len())
            .field("entities", &self.entities.len())
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

/// Applies the provided command to the world, reporting what changed.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), TopologyError> {
    match command {
        Command::SetWall { at } => {
            let touched = world.set_wall(at)?;
            if !touched.is_empty() {
                out_events.push(Event::TopologyChanged { touched });
            } else if world.topology.walls.get(at).is_empty() {
                out_events.push(Event::WallRejected { at });
            }
        }
        Command::DeleteWall { at } => {
            let touched = world.delete_wall(at)?;
            push_topology(out_events, touched);
        }
        Command::DrawLine { from, to } => {
            let touched = world.draw_line(from, to)?;
            push_topology(out_events, touched);
        }
        Command::DrawBox { from, to } => {
            let touched = world.draw_box(from, to)?;
            push_topology(out_events, touched);
        }
        Command::PlaceDoor { at, orientation } => match world.place_door(at, orientation)? {
            Some((door, touched)) => out_events.push(Event::DoorPlaced {
                door,
                at,
                orientation,
                touched,
            }),
            None => out_events.push(Event::DoorRejected { at }),
        },
        Command::PlaceDoorNear { at } => match world.place_door_near(at)? {
            Some((door, found, orientation, touched)) => out_events.push(Event::DoorPlaced {
                door,
                at: found,
                orientation,
                touched,
            }),
            None => out_events.push(Event::DoorRejected { at }),
        },
        Command::RemoveDoor { at } => {
            let removed = world.topology.remove_door(at);
            world.after_edit()?;
            if let Some((anchor, touched)) = removed {
                out_events.push(Event::DoorRemoved {
                    at: anchor,
                    touched,
                });
            }
        }
        Command::Think => {
            let stats = world.think();
            out_events.push(Event::TimeAdvanced { stats });
        }
    }
    Ok(())
}

fn push_topology(out_events: &mut Vec<Event>, touched: ModMap) {
    if !touched.is_empty() {
        out_events.push(Event::TopologyChanged { touched });
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use warren_core::{
        DoorId, EntityId, Location, Orientation, RoomId, RowMask, ThinkStats, Tick,
    };

    use super::{Layer, OperationCounts, TopologyError, World};

    /// Wall layer: non-zero on wall tiles.
    #[must_use]
    pub fn walls(world: &World) -> &Layer {
        &world.topology.walls
    }

    /// Room layer: each open tile inside a room carries its id.
    #[must_use]
    pub fn room_ids(world: &World) -> &Layer {
        &world.topology.room_ids
    }

    /// Door layer: every footprint tile carries its door id.
    #[must_use]
    pub fn door_ids(world: &World) -> &Layer {
        &world.topology.door_ids
    }

    /// Occupancy layer: each entity's tile carries its id.
    #[must_use]
    pub fn occupancy(world: &World) -> &Layer {
        &world.occupancy
    }

    /// Forced-neighbour flags per tile, for jump-point pathfinding.
    #[must_use]
    pub fn forced_flags(world: &World) -> &Layer {
        &world.topology.forced
    }

    /// Reports whether `at` is a wall tile.
    #[must_use]
    pub fn is_wall(world: &World, at: Location) -> bool {
        !world.topology.walls.get(at).is_empty()
    }

    /// Room covering `at`, if any.
    #[must_use]
    pub fn room_at(world: &World, at: Location) -> Option<RoomId> {
        let id = RoomId::from_tile(world.topology.room_ids.get(at));
        (!id.is_none()).then_some(id)
    }

    /// Snapshot of one room.
    #[must_use]
    pub fn room(world: &World, id: RoomId) -> Option<RoomView> {
        world.topology.rooms.get(&id).map(|room| RoomView {
            id: room.id,
            area: room.area,
            linking_tile: room.linking_tile,
            doors: room.doors.clone(),
        })
    }

    /// Snapshots of every room ordered by id.
    #[must_use]
    pub fn rooms(world: &World) -> Vec<RoomView> {
        world
            .topology
            .rooms
            .keys()
            .filter_map(|&id| room(world, id))
            .collect()
    }

    /// Interior rows of a room, rebuilt from its bounding loop.
    pub fn room_interior(world: &World, id: RoomId) -> Result<Vec<RowMask>, TopologyError> {
        world.topology.interior(id)
    }

    /// Snapshot of one door.
    #[must_use]
    pub fn door(world: &World, id: DoorId) -> Option<DoorView> {
        world.topology.doors.get(&id).map(|door| DoorView {
            id: door.id,
            anchor: door.anchor,
            orientation: door.orientation,
            rooms: door.rooms,
        })
    }

    /// Snapshots of every door ordered by id.
    #[must_use]
    pub fn doors(world: &World) -> Vec<DoorView> {
        world
            .topology
            .doors
            .keys()
            .filter_map(|&id| door(world, id))
            .collect()
    }

    /// Number of wall tiles.
    #[must_use]
    pub fn wall_count(world: &World) -> usize {
        world.topology.forest.len()
    }

    /// Location of a live entity.
    ///
    /// Inside a tick this is `None` for entities whose action is running,
    /// including the caller's own.
    #[must_use]
    pub fn entity_location(world: &World, id: EntityId) -> Option<Location> {
        let slot = world.entities.get(&id)?.try_lock()?;
        Some(slot.cursor.at())
    }

    /// Every live entity with its location, ordered by id.
    ///
    /// Inside a tick, entities whose action is running are left out.
    #[must_use]
    pub fn entities(world: &World) -> Vec<(EntityId, Location)> {
        world
            .entities
            .iter()
            .filter_map(|(&id, cell)| Some((id, cell.try_lock()?.cursor.at())))
            .collect()
    }

    /// Current simulation tick.
    #[must_use]
    pub fn now(world: &World) -> Tick {
        world.now()
    }

    /// Statistics of the most recent tick.
    #[must_use]
    pub fn last_think(world: &World) -> ThinkStats {
        world.scheduler.stats()
    }

    /// Actions waiting for future ticks.
    #[must_use]
    pub fn pending_actions(world: &World) -> usize {
        world.scheduler.pending()
    }

    /// Worker threads executing each tick.
    #[must_use]
    pub fn workers(world: &World) -> usize {
        world.workers
    }

    /// Running totals of topology operations.
    #[must_use]
    pub fn operation_counts(world: &World) -> OperationCounts {
        world.topology.counts
    }

    /// Read-only snapshot of a room.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct RoomView {
        /// Identifier of the room.
        pub id: RoomId,
        /// Number of tiles carrying the id.
        pub area: usize,
        /// Tile where the room's bounding loop closed.
        pub linking_tile: Location,
        /// Doors touching the room, ascending.
        pub doors: Vec<DoorId>,
    }

    /// Read-only snapshot of a door.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DoorView {
        /// Identifier of the door.
        pub id: DoorId,
        /// Top-left tile of the footprint.
        pub anchor: Location,
        /// Orientation of the footprint.
        pub orientation: Orientation,
        /// Rooms on either side; `RoomId::NONE` for open space.
        pub rooms: [RoomId; 2],
    }
}
