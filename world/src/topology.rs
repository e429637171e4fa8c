//! Incremental wall topology.
//!
//! Every wall tile owns a node in the [`WallForest`]. Adding a wall that
//! touches two or more components merges them into the largest one; the
//! tiles of the smaller components are re-inserted breadth-first and every
//! time the walk reaches a tile that already belongs to the surviving tree a
//! loop has closed and a room is created. Deleting a wall detaches the
//! node's subtree and re-adds everything except the deleted tile, which
//! rebuilds whatever loops still exist.
//!
//! Rooms are painted into the room layer one row run at a time from the
//! winding data of their loop; see [`Boundary`].

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    mem,
    sync::Arc,
};

use log::{debug, trace};
use warren_core::{
    Direction, DoorId, Line, Location, ModMap, Orientation, RoomId, RowMask, TileId,
};

use crate::{
    cursor::Cursor,
    door::Door,
    layer::Layer,
    pattern::{self, DOOR_FOOTPRINT, DOOR_WALLS, EMPTY_FOOTPRINT},
    room::{Boundary, BoundaryRow, Room},
    wall_tree::{NodeId, WallForest},
    OperationCounts, TopologyError,
};

/// Wall layer value of a wall tile.
pub(crate) const WALL: TileId = TileId::new(1);

/// Wall layer value of a tile whose tree was dismantled during a merge and
/// that still waits to be claimed by the surviving tree.
const PENDING_WALL: TileId = TileId::new(2);

/// Forced-flag value of wall tiles: every jump stops at them.
const WALL_FLAGS: TileId = TileId::new(0xff);

/// Triples of neighbours that would complete a solid 2×2 square with the centre.
const SQUARES: [[Direction; 3]; 4] = [
    [Direction::Right, Direction::RightUp, Direction::Up],
    [Direction::Up, Direction::LeftUp, Direction::Left],
    [Direction::Left, Direction::LeftDown, Direction::Down],
    [Direction::Down, Direction::RightDown, Direction::Right],
];

struct PaintRow {
    mask: RowMask,
    /// Room layer values under the row before painting.
    previous: Vec<TileId>,
}

struct PaintPlan {
    approx_area: i64,
    rows: Vec<PaintRow>,
}

/// Walls, rooms and doors plus the layers they are projected onto.
#[derive(Debug)]
pub(crate) struct Topology {
    pub(crate) walls: Arc<Layer>,
    pub(crate) room_ids: Arc<Layer>,
    pub(crate) door_ids: Arc<Layer>,
    pub(crate) forced: Arc<Layer>,
    pub(crate) forest: WallForest,
    pub(crate) rooms: BTreeMap<RoomId, Room>,
    pub(crate) doors: BTreeMap<DoorId, Door>,
    pub(crate) counts: OperationCounts,
    next_room: u32,
    next_door: u32,
    renames: Vec<(RoomId, RoomId)>,
}

impl Topology {
    pub(crate) fn new() -> Self {
        Self {
            walls: Arc::new(Layer::new()),
            room_ids: Arc::new(Layer::new()),
            door_ids: Arc::new(Layer::new()),
            forced: Arc::new(Layer::new()),
            forest: WallForest::default(),
            rooms: BTreeMap::new(),
            doors: BTreeMap::new(),
            counts: OperationCounts::default(),
            next_room: 1,
            next_door: 1,
            renames: Vec::new(),
        }
    }

    /// Reports whether `at` may become a wall: no door covers it and it
    /// would not complete a solid 2×2 square.
    pub(crate) fn can_set_wall(&self, at: Location) -> bool {
        if !self.door_ids.get(at).is_empty() {
            return false;
        }
        let mut cursor = Cursor::new(at);
        let walls = cursor.bind(Arc::clone(&self.walls));
        let around = cursor.look(walls);
        !SQUARES.iter().any(|square| {
            square
                .iter()
                .all(|direction| !around[direction.index()].is_empty())
        })
    }

    pub(crate) fn set_wall(&mut self, at: Location) -> Result<ModMap, TopologyError> {
        let mut touched = ModMap::new();
        if !self.walls.get(at).is_empty() {
            return Ok(touched);
        }
        if !self.can_set_wall(at) {
            debug!("rejected wall at {at}");
            self.counts.walls_rejected += 1;
            return Ok(touched);
        }
        self.walls.set(at, WALL);
        touched.add_location(at);
        self.insert_wall(at, &mut touched)?;
        self.run_renames(&mut touched)?;
        self.refresh_forced_flags(at);
        self.counts.walls_added += 1;
        Ok(touched)
    }

    pub(crate) fn delete_wall(&mut self, at: Location) -> Result<ModMap, TopologyError> {
        let mut touched = ModMap::new();
        if !self.forest.contains(at) {
            return Ok(touched);
        }
        if let Some((_, removed)) = self.remove_door(at) {
            touched.merge(&removed);
        }
        touched.add_location(at);
        self.remove_wall(at, &mut touched)?;
        self.run_renames(&mut touched)?;
        self.refresh_forced_flags(at);
        self.counts.walls_deleted += 1;
        Ok(touched)
    }

    pub(crate) fn draw_line(&mut self, from: Location, to: Location) -> Result<ModMap, TopologyError> {
        self.draw(Line::new(from, to))
    }

    pub(crate) fn draw_box(&mut self, from: Location, to: Location) -> Result<ModMap, TopologyError> {
        self.draw(warren_core::outline(from, to))
    }

    fn draw(&mut self, tiles: impl Iterator<Item = Location>) -> Result<ModMap, TopologyError> {
        let mut touched = ModMap::new();
        for tile in tiles {
            touched.merge(&self.set_wall(tile)?);
        }
        Ok(touched)
    }

    pub(crate) fn can_place_door(&self, at: Location, orientation: Orientation) -> bool {
        let transposed = orientation.is_transposed();
        self.walls.matches(at, &DOOR_WALLS, transposed)
            && self.door_ids.matches(at, &EMPTY_FOOTPRINT, transposed)
    }

    pub(crate) fn place_door(
        &mut self,
        at: Location,
        orientation: Orientation,
    ) -> Option<(DoorId, ModMap)> {
        if !self.can_place_door(at, orientation) {
            return None;
        }
        let id = DoorId::new(self.next_door);
        self.next_door += 1;

        let mut touched = ModMap::new();
        self.door_ids.set_mask(
            at,
            &DOOR_FOOTPRINT,
            orientation.is_transposed(),
            id.to_tile(),
            &mut touched,
        );
        let mut door = Door::new(id, orientation, at);
        door.refresh(&self.room_ids);
        for room in door.rooms {
            if let Some(room) = self.rooms.get_mut(&room) {
                room.add_door(id);
            }
        }
        let _ = self.doors.insert(id, door);
        self.counts.doors_placed += 1;
        trace!("placed {id} at {at}");
        Some((id, touched))
    }

    /// Places a door at the closest matching footprint around `at`,
    /// preferring vertical doors.
    pub(crate) fn place_door_near(
        &mut self,
        at: Location,
    ) -> Option<(DoorId, Location, Orientation, ModMap)> {
        let found = pattern::fuzzy_search(at, |candidate| {
            self.can_place_door(candidate, Orientation::Vertical)
                || self.can_place_door(candidate, Orientation::Horizontal)
        })?;
        let orientation = if self.can_place_door(found, Orientation::Vertical) {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        };
        let (id, touched) = self.place_door(found, orientation)?;
        Some((id, found, orientation, touched))
    }

    /// Removes the door covering `at`, returning its anchor.
    pub(crate) fn remove_door(&mut self, at: Location) -> Option<(Location, ModMap)> {
        let id = DoorId::from_tile(self.door_ids.get(at));
        let door = self.doors.remove(&id)?;
        let mut touched = ModMap::new();
        self.door_ids.set_mask(
            door.anchor,
            &DOOR_FOOTPRINT,
            door.orientation.is_transposed(),
            TileId::EMPTY,
            &mut touched,
        );
        for room in door.rooms {
            if let Some(room) = self.rooms.get_mut(&room) {
                room.remove_door(id);
            }
        }
        self.counts.doors_removed += 1;
        trace!("removed {id} at {}", door.anchor);
        Some((door.anchor, touched))
    }

    fn insert_wall(&mut self, at: Location, touched: &mut ModMap) -> Result<(), TopologyError> {
        let previous = RoomId::from_tile(self.room_ids.get(at));
        if !previous.is_none() {
            if let Some(room) = self.rooms.get_mut(&previous) {
                room.area = room.area.saturating_sub(1);
            }
            self.room_ids.set(at, TileId::EMPTY);
            touched.add_location(at);
        }
        if self.forest.contains(at) {
            return Ok(());
        }

        let mut neighbours = Vec::with_capacity(4);
        let mut largest: Option<(NodeId, Direction, usize)> = None;
        for direction in Direction::CARDINAL {
            let Some(node) = self.forest.at(at.step(direction)) else {
                continue;
            };
            let size = self.forest.tree_size(self.forest[node].root);
            if largest.map_or(true, |(_, _, best)| size > best) {
                largest = Some((node, direction, size));
            }
            neighbours.push(direction);
        }

        let Some((keeper, towards, _)) = largest else {
            let _ = self.forest.plant(at);
            return Ok(());
        };
        if neighbours.len() == 1 {
            let node = self.forest.allocate(at, Some((keeper, towards)));
            self.forest.register(node);
            return Ok(());
        }
        self.merge(at, keeper, towards, &neighbours, touched)
    }

    /// Joins every component around `at` into the tree of `keeper`.
    fn merge(
        &mut self,
        at: Location,
        keeper: NodeId,
        towards: Direction,
        neighbours: &[Direction],
        touched: &mut ModMap,
    ) -> Result<(), TopologyError> {
        let root = self.forest[keeper].root;
        for &direction in neighbours {
            let Some(node) = self.forest.at(at.step(direction)) else {
                continue;
            };
            let other = self.forest[node].root;
            if other != root {
                let _ = self.dismantle(other, PENDING_WALL);
            }
        }

        let first = self.forest.allocate(at, Some((keeper, towards)));
        let mut queue = VecDeque::from([first]);
        while let Some(node) = queue.pop_front() {
            let here = self.forest[node].at;
            if let Some(existing) = self.forest.at(here) {
                let parent = self.forest[node].parent;
                let closing = self.forest[node].to_parent;
                let Some(parent) = parent.filter(|_| self.forest[existing].root == root) else {
                    return Err(TopologyError::RootMismatch {
                        at: here,
                        neighbor: here.step(closing),
                    });
                };
                self.forest.discard(node);
                self.create_room(parent, closing, touched)?;
                continue;
            }
            self.forest.register(node);
            let (has_parent, to_parent) = (
                self.forest[node].parent.is_some(),
                self.forest[node].to_parent,
            );
            for direction in Direction::CARDINAL {
                if has_parent && direction == to_parent {
                    continue;
                }
                let next = here.step(direction);
                let pending = self.walls.get(next) == PENDING_WALL;
                let same_tree = self
                    .forest
                    .at(next)
                    .is_some_and(|other| self.forest[other].root == root);
                if pending || same_tree {
                    self.walls.set(next, WALL);
                    queue.push_back(
                        self.forest
                            .allocate(next, Some((node, direction.reverse()))),
                    );
                }
            }
        }
        Ok(())
    }

    /// Detaches the subtree under `top` and frees it breadth-first, writing
    /// `fill` into the wall layer. Rooms whose linking record lives in the
    /// subtree, or whose closing tile does, are dropped.
    fn dismantle(&mut self, top: NodeId, fill: TileId) -> Vec<Location> {
        self.forest.detach(top);
        let mut removed = Vec::new();
        let mut queue = VecDeque::from([top]);
        while let Some(node) = queue.pop_front() {
            let here = self.forest[node].at;
            for direction in Direction::CARDINAL {
                let next = here.step(direction);
                if self.walls.get(next) != WALL {
                    continue;
                }
                let Some(neighbour) = self.forest.at(next) else {
                    continue;
                };
                let rooms = &mut self.rooms;
                self.forest[neighbour].links.retain(|&(room, linked)| {
                    if linked != direction {
                        return true;
                    }
                    trace!("dropping {room}: closing tile {here} dismantled");
                    let _ = rooms.remove(&room);
                    false
                });
            }
            for (room, _) in mem::take(&mut self.forest[node].links) {
                trace!("dropping {room}: linking node {here} dismantled");
                let _ = self.rooms.remove(&room);
            }
            queue.extend(self.forest.children(node));
            removed.push(here);
            self.forest.release(node);
            self.walls.set(here, fill);
        }
        removed
    }

    fn remove_wall(&mut self, at: Location, touched: &mut ModMap) -> Result<(), TopologyError> {
        let Some(node) = self.forest.at(at) else {
            return Ok(());
        };

        let mut nearby = Vec::new();
        let mut largest: Option<(RoomId, usize)> = None;
        for neighbour in at.neighborhood() {
            if !self.walls.get(neighbour).is_empty() {
                continue;
            }
            let room = RoomId::from_tile(self.room_ids.get(neighbour));
            let Some(area) = self.rooms.get(&room).map(|room| room.area) else {
                continue;
            };
            if largest.map_or(true, |(_, best)| area > best) {
                largest = Some((room, area));
            }
            if !nearby.contains(&room) {
                nearby.push(room);
                self.clear_room(room, touched)?;
            }
        }

        let detached = self.dismantle(node, TileId::EMPTY);
        for &tile in detached.iter().skip(1).rev() {
            self.walls.set(tile, WALL);
            self.insert_wall(tile, touched)?;
        }

        for room in nearby {
            if self.rooms.contains_key(&room) {
                self.init_room(room, false, touched)?;
            }
        }

        let now = RoomId::from_tile(self.room_ids.get(at));
        if let Some((largest, _)) = largest {
            if !now.is_none() && now != largest {
                self.renames.push((now, largest));
            }
        }
        Ok(())
    }

    fn create_room(
        &mut self,
        parent: NodeId,
        closing: Direction,
        touched: &mut ModMap,
    ) -> Result<(), TopologyError> {
        let id = RoomId::new(self.next_room);
        self.next_room += 1;
        let parent_at = self.forest[parent].at;
        self.forest[parent].links.push((id, closing));
        let linking_tile = parent_at.step(closing.reverse());
        let _ = self
            .rooms
            .insert(id, Room::new(id, linking_tile, closing));
        self.counts.rooms_created += 1;
        trace!("{id} closed at {linking_tile}");
        self.init_room(id, true, touched)
    }

    /// Paints a room and recounts its area and doors.
    ///
    /// For a freshly created room, a single displaced room that vanished
    /// entirely hands its id over once the current operation completes.
    fn init_room(
        &mut self,
        id: RoomId,
        fresh: bool,
        touched: &mut ModMap,
    ) -> Result<(), TopologyError> {
        let plan = self.plan_paint(id)?;
        let mut area = 0;
        let mut displaced: BTreeMap<RoomId, usize> = BTreeMap::new();
        let mut doors = BTreeSet::new();

        for row in &plan.rows {
            for (offset, tile) in self.door_ids.collect_row_mask(&row.mask) {
                let door = DoorId::from_tile(tile);
                let _ = doors.insert(door);
                let previous = RoomId::from_tile(row.previous[offset]);
                if previous != id {
                    if let Some(room) = self.rooms.get_mut(&previous) {
                        room.remove_door(door);
                    }
                }
            }
            for segment in row.mask.inside_segments() {
                for &previous in &row.previous[segment.start..segment.start + segment.len] {
                    area += 1;
                    let previous = RoomId::from_tile(previous);
                    if !previous.is_none() && previous != id {
                        *displaced.entry(previous).or_insert(0) += 1;
                    }
                }
            }
            self.room_ids.set_row_mask(&row.mask, id.to_tile(), touched);
        }

        for (room, count) in &displaced {
            if let Some(room) = self.rooms.get_mut(room) {
                room.area = room.area.saturating_sub(*count);
            }
        }
        if let Some(room) = self.rooms.get_mut(&id) {
            room.area = area;
            room.approx_area = plan.approx_area;
        }

        for door in doors {
            let Some(entry) = self.doors.get_mut(&door) else {
                continue;
            };
            entry.refresh(&self.room_ids);
            for room in entry.rooms {
                if let Some(room) = self.rooms.get_mut(&room) {
                    room.add_door(door);
                }
            }
        }

        if fresh && displaced.len() == 1 {
            if let Some(&original) = displaced.keys().next() {
                let vanished = self
                    .rooms
                    .get(&original)
                    .map_or(true, |room| room.area == 0);
                if vanished {
                    self.drop_room(original);
                    self.renames.push((id, original));
                }
            }
        }
        Ok(())
    }

    fn clear_room(&mut self, id: RoomId, touched: &mut ModMap) -> Result<(), TopologyError> {
        let plan = self.plan_paint(id)?;
        for row in &plan.rows {
            self.room_ids.set_row_mask(&row.mask, TileId::EMPTY, touched);
        }
        if let Some(room) = self.rooms.get(&id) {
            for door in &room.doors {
                if let Some(entry) = self.doors.get_mut(door) {
                    entry.refresh(&self.room_ids);
                }
            }
        }
        Ok(())
    }

    fn drop_room(&mut self, id: RoomId) {
        let Some(room) = self.rooms.remove(&id) else {
            return;
        };
        if let Some(parent) = self.forest.at(room.linking_parent()) {
            self.forest[parent].links.retain(|&(linked, _)| linked != id);
        }
        for door in room.doors {
            if let Some(entry) = self.doors.get_mut(&door) {
                entry.refresh(&self.room_ids);
            }
        }
    }

    fn run_renames(&mut self, touched: &mut ModMap) -> Result<(), TopologyError> {
        for (from, to) in mem::take(&mut self.renames) {
            if !self.rooms.contains_key(&from) || self.rooms.contains_key(&to) {
                continue;
            }
            self.rename_room(from, to, touched)?;
        }
        Ok(())
    }

    fn rename_room(
        &mut self,
        from: RoomId,
        to: RoomId,
        touched: &mut ModMap,
    ) -> Result<(), TopologyError> {
        let plan = self.plan_paint(from)?;
        for row in &plan.rows {
            self.room_ids.set_row_mask(&row.mask, to.to_tile(), touched);
        }
        let Some(mut room) = self.rooms.remove(&from) else {
            return Ok(());
        };
        room.id = to;
        if let Some(parent) = self.forest.at(room.linking_parent()) {
            for link in &mut self.forest[parent].links {
                if link.0 == from {
                    link.0 = to;
                }
            }
        }
        for door in &room.doors {
            if let Some(entry) = self.doors.get_mut(door) {
                entry.refresh(&self.room_ids);
            }
        }
        let _ = self.rooms.insert(to, room);
        debug!("renamed {from} to {to}");
        Ok(())
    }

    /// Loop geometry of a room, rebuilt from its linking record.
    pub(crate) fn boundary(&self, room: &Room) -> Result<Boundary, TopologyError> {
        let parent_at = room.linking_parent();
        let missing = || TopologyError::LinkingRecord {
            room: room.id,
            at: parent_at,
        };
        let parent = self.forest.at(parent_at).ok_or_else(missing)?;
        let twin = self.forest.at(room.linking_tile).ok_or_else(missing)?;
        let ancestor = self
            .forest
            .common_ancestor(parent, twin)
            .ok_or_else(missing)?;
        let mut outbound = vec![room.linking_tile];
        outbound.extend(self.forest.path(parent, ancestor));
        let inbound = self.forest.path(twin, ancestor);
        Ok(Boundary::trace(&outbound, &inbound))
    }

    /// Interior masks of a room's loop, one per row.
    pub(crate) fn interior(&self, id: RoomId) -> Result<Vec<RowMask>, TopologyError> {
        Ok(self
            .plan_paint(id)?
            .rows
            .into_iter()
            .map(|row| row.mask)
            .collect())
    }

    fn plan_paint(&self, id: RoomId) -> Result<PaintPlan, TopologyError> {
        let room = self.rooms.get(&id).ok_or(TopologyError::LinkingRecord {
            room: id,
            at: Location::default(),
        })?;
        let boundary = self.boundary(room)?;
        let mut cursor = Cursor::new(room.linking_tile);
        let walls = cursor.bind(Arc::clone(&self.walls));
        let room_ids = cursor.bind(Arc::clone(&self.room_ids));

        let mut rows = Vec::with_capacity(boundary.rows.len());
        for row in &boundary.rows {
            let width = row.tangent.len();
            cursor.move_to(row.left);
            let mut wall_row = vec![TileId::EMPTY; width];
            cursor.get_row(walls, &mut wall_row);
            let mut previous = vec![TileId::EMPTY; width];
            cursor.get_row(room_ids, &mut previous);
            let mask = self.paint_row(id, boundary.approx_area, row, &wall_row, &previous)?;
            rows.push(PaintRow { mask, previous });
        }
        Ok(PaintPlan {
            approx_area: boundary.approx_area,
            rows,
        })
    }

    /// Scans one row left to right, summing the winding tangent. Interior
    /// runs start on an open tile where the sum is ±2 and no boundary passes,
    /// and are painted unless an inner room already claims them.
    fn paint_row(
        &self,
        id: RoomId,
        approx_area: i64,
        row: &BoundaryRow,
        walls: &[TileId],
        previous: &[TileId],
    ) -> Result<RowMask, TopologyError> {
        let width = row.tangent.len();
        let overflow = |value: i32| TopologyError::TangentOverflow {
            room: id,
            row: row.left,
            value,
        };
        let mut mask = RowMask::new(row.left);
        let mut winding = 0;
        let mut column = 0;
        while column < width {
            let mut delta = row.tangent[column];
            winding += delta;
            if winding.abs() > 2 {
                return Err(overflow(winding));
            }
            if delta == 0 && winding.abs() == 2 && walls[column].is_empty() {
                let owner = RoomId::from_tile(previous[column]);
                let paint = owner.is_none()
                    || owner == id
                    || self
                        .rooms
                        .get(&owner)
                        .map_or(true, |other| approx_area < other.approx_area);
                loop {
                    mask.push(paint);
                    column += 1;
                    if column >= width {
                        return Err(TopologyError::RunawayRow {
                            room: id,
                            row: row.left,
                        });
                    }
                    delta = row.tangent[column];
                    winding += delta;
                    if winding.abs() > 2 {
                        return Err(overflow(winding));
                    }
                    if delta != 0 || !walls[column].is_empty() {
                        mask.push(false);
                        break;
                    }
                }
            } else {
                mask.push(false);
            }
            column += 1;
        }
        Ok(mask)
    }

    /// Recomputes forced flags around `at` after its wall state changed.
    fn refresh_forced_flags(&self, at: Location) {
        let mut cursor = Cursor::new(at);
        let walls = cursor.bind(Arc::clone(&self.walls));
        let flags = cursor.bind(Arc::clone(&self.forced));
        let around = cursor.look(walls);
        if cursor.get(walls).is_empty() {
            cursor.set(flags, TileId::new(u32::from(forced_flags(&around))));
        } else {
            cursor.set(flags, WALL_FLAGS);
        }
        for direction in Direction::ALL {
            if !around[direction.index()].is_empty() {
                continue;
            }
            cursor.move_to(at.step(direction));
            let value = forced_flags(&cursor.look(walls));
            cursor.set(flags, TileId::new(u32::from(value)));
        }
    }
}

/// Jump-point pruning flags for an open tile given its wall neighbourhood.
///
/// Bit `d` is set when a search moving in direction `d` through this tile
/// must also consider turning, because a wall ends beside it.
#[must_use]
pub fn forced_flags(around: &[TileId; 8]) -> u8 {
    let open = |direction: Direction| around[direction.index()].is_empty();
    let wall = |direction: Direction| !open(direction);
    let rules = [
        (
            Direction::Right,
            (open(Direction::RightUp) && wall(Direction::Up))
                || (open(Direction::RightDown) && wall(Direction::Down)),
        ),
        (
            Direction::Left,
            (open(Direction::LeftUp) && wall(Direction::Up))
                || (open(Direction::LeftDown) && wall(Direction::Down)),
        ),
        (
            Direction::Up,
            (open(Direction::LeftUp) && wall(Direction::Left))
                || (open(Direction::RightUp) && wall(Direction::Right)),
        ),
        (
            Direction::Down,
            (open(Direction::LeftDown) && wall(Direction::Left))
                || (open(Direction::RightDown) && wall(Direction::Right)),
        ),
        (
            Direction::RightUp,
            (open(Direction::LeftUp) && wall(Direction::Left))
                || (open(Direction::RightDown) && wall(Direction::Down)),
        ),
        (
            Direction::LeftUp,
            (open(Direction::RightUp) && wall(Direction::Right))
                || (open(Direction::LeftDown) && wall(Direction::Down)),
        ),
        (
            Direction::RightDown,
            (open(Direction::LeftDown) && wall(Direction::Left))
                || (open(Direction::RightUp) && wall(Direction::Up)),
        ),
        (
            Direction::LeftDown,
            (open(Direction::RightDown) && wall(Direction::Right))
                || (open(Direction::LeftUp) && wall(Direction::Up)),
        ),
    ];
    rules
        .into_iter()
        .filter(|(_, forced)| *forced)
        .fold(0, |flags, (direction, _)| flags | (1 << direction.index()))
}

#[cfg(test)]
mod tests {
    use super::{forced_flags, Topology, WALL};
    use warren_core::{outline, Direction, Location, RoomId, TileId};

    fn boxed(topology: &mut Topology, from: Location, to: Location) {
        for tile in outline(from, to) {
            let _ = topology.set_wall(tile).expect("wall");
        }
    }

    #[test]
    fn closing_a_box_creates_one_room() {
        let mut topology = Topology::new();
        let origin = Location::new(0, 0);
        boxed(&mut topology, origin, origin.offset(9, 9));
        assert_eq!(topology.rooms.len(), 1);
        let room = topology.rooms.values().next().expect("room");
        assert_eq!(room.area, 64);
        assert_eq!(topology.forest.len(), 36);
        assert_eq!(
            topology.room_ids.get(origin.offset(5, 5)),
            room.id.to_tile()
        );
        assert_eq!(topology.room_ids.get(origin.offset(10, 5)), TileId::EMPTY);
    }

    #[test]
    fn solid_squares_are_rejected() {
        let mut topology = Topology::new();
        for (x, y) in [(0, 0), (1, 0), (0, 1)] {
            let touched = topology.set_wall(Location::new(x, y)).expect("wall");
            assert!(!touched.is_empty());
        }
        assert!(!topology.can_set_wall(Location::new(1, 1)));
        let touched = topology.set_wall(Location::new(1, 1)).expect("rejected");
        assert!(touched.is_empty());
        assert_eq!(topology.walls.get(Location::new(1, 1)), TileId::EMPTY);
        assert_eq!(topology.counts.walls_rejected, 1);
    }

    #[test]
    fn joining_two_walls_merges_their_trees() {
        let mut topology = Topology::new();
        let _ = topology.set_wall(Location::new(0, 0)).expect("wall");
        let _ = topology.set_wall(Location::new(2, 0)).expect("wall");
        let _ = topology.set_wall(Location::new(3, 0)).expect("wall");
        let _ = topology.set_wall(Location::new(1, 0)).expect("wall");
        let roots: Vec<_> = [0, 1, 2, 3]
            .map(|x| {
                let node = topology.forest.at(Location::new(x, 0)).expect("node");
                topology.forest[node].root
            })
            .into_iter()
            .collect();
        assert!(roots.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(topology.forest.tree_size(roots[0]), 4);
        assert_eq!(topology.walls.get(Location::new(1, 0)), WALL);
    }

    #[test]
    fn deleting_a_corner_drops_the_room() {
        let mut topology = Topology::new();
        let origin = Location::new(3, 3);
        boxed(&mut topology, origin, origin.offset(5, 5));
        assert_eq!(topology.rooms.len(), 1);
        let _ = topology.delete_wall(origin).expect("delete");
        assert!(topology.rooms.is_empty());
        assert_eq!(topology.forest.len(), 19);
        assert_eq!(topology.room_ids.deep_search_nonzero().len(), 0);
    }

    #[test]
    fn forced_flags_mark_wall_ends() {
        let mut around = [TileId::EMPTY; 8];
        assert_eq!(forced_flags(&around), 0);
        around[Direction::Up.index()] = WALL;
        let flags = forced_flags(&around);
        assert_ne!(flags & (1 << Direction::Right.index()), 0);
        assert_ne!(flags & (1 << Direction::Left.index()), 0);
        assert_eq!(flags & (1 << Direction::Down.index()), 0);
    }

    #[test]
    fn walls_carry_all_forced_flags() {
        let mut topology = Topology::new();
        let at = Location::new(7, 7);
        let _ = topology.set_wall(at).expect("wall");
        assert_eq!(topology.forced.get(at), TileId::new(0xff));
        assert_ne!(topology.forced.get(at.step(Direction::Down)), TileId::EMPTY);
        let _ = topology.delete_wall(at).expect("delete");
        assert_eq!(topology.forced.get(at), TileId::EMPTY);
        assert_eq!(topology.forced.get(at.step(Direction::Down)), TileId::EMPTY);
        assert!(topology.rooms.get(&RoomId::new(1)).is_none());
    }
}
