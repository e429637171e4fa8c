//! Grid coordinates, directions and rasterized lines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of tiles along each edge of a block.
pub const BLOCK_SIZE: i64 = 32;

/// Number of tiles stored in a single block.
pub const BLOCK_AREA: usize = (BLOCK_SIZE * BLOCK_SIZE) as usize;

/// Compass directions used to address neighbouring tiles.
///
/// The discriminant order is significant: look results and neighbour arrays
/// are indexed by it, and the four cardinal directions reverse by flipping
/// the two low bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Positive x.
    Right,
    /// Negative y.
    Up,
    /// Positive y.
    Down,
    /// Negative x.
    Left,
    /// Positive x, negative y.
    RightUp,
    /// Positive x, positive y.
    RightDown,
    /// Negative x, negative y.
    LeftUp,
    /// Negative x, positive y.
    LeftDown,
    /// No movement.
    None,
}

impl Direction {
    /// The four axis-aligned directions in index order.
    pub const CARDINAL: [Direction; 4] = [
        Direction::Right,
        Direction::Up,
        Direction::Down,
        Direction::Left,
    ];

    /// All eight moving directions in index order.
    pub const ALL: [Direction; 8] = [
        Direction::Right,
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::RightUp,
        Direction::RightDown,
        Direction::LeftUp,
        Direction::LeftDown,
    ];

    /// Position of the direction inside [`Direction::ALL`]; `None` maps to 8.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks up a direction by index, returning [`Direction::None`] when out of range.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        match index {
            0 => Direction::Right,
            1 => Direction::Up,
            2 => Direction::Down,
            3 => Direction::Left,
            4 => Direction::RightUp,
            5 => Direction::RightDown,
            6 => Direction::LeftUp,
            7 => Direction::LeftDown,
            _ => Direction::None,
        }
    }

    /// Direction pointing the opposite way.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Direction::None => Direction::None,
            other => Direction::from_index(other.index() ^ 3),
        }
    }

    /// Reports whether the direction is one of the four axis-aligned moves.
    #[must_use]
    pub const fn is_cardinal(self) -> bool {
        matches!(
            self,
            Direction::Right | Direction::Up | Direction::Down | Direction::Left
        )
    }

    /// Tile offset produced by one step in this direction.
    #[must_use]
    pub const fn delta(self) -> (i64, i64) {
        match self {
            Direction::Right => (1, 0),
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::RightUp => (1, -1),
            Direction::RightDown => (1, 1),
            Direction::LeftUp => (-1, -1),
            Direction::LeftDown => (-1, 1),
            Direction::None => (0, 0),
        }
    }

    /// Direction whose step has the provided signs.
    #[must_use]
    pub const fn from_signs(dx: i64, dy: i64) -> Self {
        match (dx.signum(), dy.signum()) {
            (1, 0) => Direction::Right,
            (0, -1) => Direction::Up,
            (0, 1) => Direction::Down,
            (-1, 0) => Direction::Left,
            (1, -1) => Direction::RightUp,
            (1, 1) => Direction::RightDown,
            (-1, -1) => Direction::LeftUp,
            (-1, 1) => Direction::LeftDown,
            _ => Direction::None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::RightUp => "right-up",
            Direction::RightDown => "right-down",
            Direction::LeftUp => "left-up",
            Direction::LeftDown => "left-down",
            Direction::None => "none",
        };
        f.write_str(name)
    }
}

/// Identifies one 32×32 block of tiles.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockId {
    x: i32,
    y: i32,
}

impl BlockId {
    /// Creates a block identifier from block coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal block coordinate; also the scheduling column.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical block coordinate.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Block reached by moving `dx`, `dy` blocks.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }

    /// Adjacent block in the provided direction.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx as i32, dy as i32)
    }

    /// The four edge-adjacent blocks, indexed like [`Direction::CARDINAL`].
    #[must_use]
    pub const fn neighbors(self) -> [BlockId; 4] {
        [
            self.step(Direction::Right),
            self.step(Direction::Up),
            self.step(Direction::Down),
            self.step(Direction::Left),
        ]
    }

    /// Top-left tile of the block.
    #[must_use]
    pub const fn origin(self) -> Location {
        Location {
            block: self,
            x: 0,
            y: 0,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// Canonical tile address: a block plus in-block coordinates below [`BLOCK_SIZE`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Location {
    block: BlockId,
    y: u8,
    x: u8,
}

impl Location {
    /// Location of the tile at absolute world coordinates.
    #[must_use]
    pub fn new(x: i64, y: i64) -> Self {
        let block = BlockId::new(
            x.div_euclid(BLOCK_SIZE) as i32,
            y.div_euclid(BLOCK_SIZE) as i32,
        );
        Self {
            block,
            x: x.rem_euclid(BLOCK_SIZE) as u8,
            y: y.rem_euclid(BLOCK_SIZE) as u8,
        }
    }

    /// Location inside `block`; coordinates outside the block roll into its neighbours.
    #[must_use]
    pub fn in_block(block: BlockId, x: i64, y: i64) -> Self {
        block.origin().offset(x, y)
    }

    /// Block holding the tile.
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    /// Column inside the block.
    #[must_use]
    pub const fn x(&self) -> usize {
        self.x as usize
    }

    /// Row inside the block.
    #[must_use]
    pub const fn y(&self) -> usize {
        self.y as usize
    }

    /// Index of the tile inside its block's storage.
    #[must_use]
    pub const fn tile_index(&self) -> usize {
        self.y as usize * BLOCK_SIZE as usize + self.x as usize
    }

    /// Absolute world x coordinate.
    #[must_use]
    pub const fn world_x(&self) -> i64 {
        self.block.x as i64 * BLOCK_SIZE + self.x as i64
    }

    /// Absolute world y coordinate.
    #[must_use]
    pub const fn world_y(&self) -> i64 {
        self.block.y as i64 * BLOCK_SIZE + self.y as i64
    }

    /// Location `dx`, `dy` tiles away, normalised into its block.
    #[must_use]
    pub fn offset(self, dx: i64, dy: i64) -> Self {
        let x = self.x as i64 + dx;
        let y = self.y as i64 + dy;
        if (0..BLOCK_SIZE).contains(&x) && (0..BLOCK_SIZE).contains(&y) {
            return Self {
                block: self.block,
                x: x as u8,
                y: y as u8,
            };
        }
        Self {
            block: self.block.offset(
                x.div_euclid(BLOCK_SIZE) as i32,
                y.div_euclid(BLOCK_SIZE) as i32,
            ),
            x: x.rem_euclid(BLOCK_SIZE) as u8,
            y: y.rem_euclid(BLOCK_SIZE) as u8,
        }
    }

    /// Neighbouring location in `direction`.
    #[must_use]
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }

    /// Location reached after `distance` steps in `direction`.
    #[must_use]
    pub fn far_step(self, direction: Direction, distance: i64) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx * distance, dy * distance)
    }

    /// The four edge-adjacent tiles, indexed like [`Direction::CARDINAL`].
    #[must_use]
    pub fn neighbors(self) -> [Location; 4] {
        Direction::CARDINAL.map(|direction| self.step(direction))
    }

    /// The eight surrounding tiles, indexed like [`Direction::ALL`].
    #[must_use]
    pub fn neighborhood(self) -> [Location; 8] {
        Direction::ALL.map(|direction| self.step(direction))
    }

    /// Offset from `self` to `other` in tiles.
    #[must_use]
    pub const fn delta(self, other: Location) -> (i64, i64) {
        (
            other.world_x() - self.world_x(),
            other.world_y() - self.world_y(),
        )
    }

    /// Chebyshev distance.
    #[must_use]
    pub const fn max_distance(self, other: Location) -> i64 {
        let (dx, dy) = self.delta(other);
        let (dx, dy) = (dx.abs(), dy.abs());
        if dx > dy {
            dx
        } else {
            dy
        }
    }

    /// Manhattan distance.
    #[must_use]
    pub const fn manhattan_distance(self, other: Location) -> i64 {
        let (dx, dy) = self.delta(other);
        dx.abs() + dy.abs()
    }

    /// Squared Euclidean distance.
    #[must_use]
    pub const fn squared_distance(self, other: Location) -> i64 {
        let (dx, dy) = self.delta(other);
        dx * dx + dy * dy
    }

    /// Steepest-descent direction toward `target`; [`Direction::None`] once there.
    #[must_use]
    pub const fn towards(self, target: Location) -> Direction {
        let (dx, dy) = self.delta(target);
        Direction::from_signs(dx, dy)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.world_x(), self.world_y())
    }
}

/// Iterator over the tiles of a rasterized segment.
///
/// Endpoints are swapped so the walk always runs left to right; for each
/// column the walk first yields the column's entry tile and then every tile
/// of the vertical run needed to reach the row of the ideal line.
#[derive(Clone, Debug)]
pub struct Line {
    at: Location,
    width: i64,
    height: i64,
    column: i64,
    row: i64,
    started: bool,
    finished: bool,
}

impl Line {
    /// Creates the rasterized segment from `from` to `to`, both included.
    #[must_use]
    pub fn new(from: Location, to: Location) -> Self {
        let (mut from, mut to) = (from, to);
        if from.delta(to).0 < 0 {
            std::mem::swap(&mut from, &mut to);
        }
        let (width, height) = from.delta(to);
        Self {
            at: from,
            width,
            height,
            column: 0,
            row: 0,
            started: false,
            finished: false,
        }
    }

    fn target_row(&self) -> i64 {
        if self.width == 0 {
            self.height
        } else {
            self.height * self.column / self.width
        }
    }
}

impl Iterator for Line {
    type Item = Location;

    fn next(&mut self) -> Option<Location> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.at);
        }
        let target = self.target_row();
        if self.row != target {
            let direction = if target > self.row {
                Direction::Down
            } else {
                Direction::Up
            };
            self.row += direction.delta().1;
            self.at = self.at.step(direction);
            return Some(self.at);
        }
        if self.column == self.width {
            self.finished = true;
            return None;
        }
        self.column += 1;
        self.at = self.at.step(Direction::Right);
        Some(self.at)
    }
}

/// Tiles of the axis-aligned rectangle outline with corners `from` and `to`.
///
/// Corners are yielded more than once; both corners are part of the outline.
pub fn outline(from: Location, to: Location) -> impl Iterator<Item = Location> {
    let (dx, dy) = from.delta(to);
    let top_right = from.offset(dx, 0);
    let bottom_left = from.offset(0, dy);
    Line::new(from, top_right)
        .chain(Line::new(top_right, to))
        .chain(Line::new(to, bottom_left))
        .chain(Line::new(bottom_left, from))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{outline, BlockId, Direction, Line, Location, BLOCK_SIZE};

    #[test]
    fn offsets_roll_into_neighbouring_blocks() {
        let origin = Location::in_block(BlockId::new(0, 0), 31, 0);
        let stepped = origin.step(Direction::Right);
        assert_eq!(stepped.block(), BlockId::new(1, 0));
        assert_eq!((stepped.x(), stepped.y()), (0, 0));

        let up = Location::new(0, 0).step(Direction::LeftUp);
        assert_eq!(up.block(), BlockId::new(-1, -1));
        assert_eq!((up.x(), up.y()), (31, 31));
        assert_eq!(up.world_x(), -1);
        assert_eq!(up.world_y(), -1);
    }

    #[test]
    fn large_offsets_stay_canonical() {
        let start = Location::new(5, 7);
        let moved = start.offset(-3 * BLOCK_SIZE - 6, 2 * BLOCK_SIZE + 30);
        assert_eq!(moved, Location::new(5 - 3 * BLOCK_SIZE - 6, 7 + 2 * BLOCK_SIZE + 30));
        assert!(moved.x() < BLOCK_SIZE as usize);
        assert!(moved.y() < BLOCK_SIZE as usize);
        assert_eq!(start.delta(moved), (-3 * BLOCK_SIZE - 6, 2 * BLOCK_SIZE + 30));
    }

    #[test]
    fn reverse_pairs_opposites() {
        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            assert_eq!(direction.reverse().delta(), (-dx, -dy));
            assert_eq!(direction.reverse().reverse(), direction);
        }
        assert_eq!(Direction::None.reverse(), Direction::None);
    }

    #[test]
    fn neighborhood_follows_direction_order() {
        let at = Location::new(40, -3);
        for (index, neighbour) in at.neighborhood().into_iter().enumerate() {
            assert_eq!(neighbour, at.step(Direction::from_index(index)));
        }
    }

    #[test]
    fn towards_descends_steepest() {
        let at = Location::new(0, 0);
        assert_eq!(at.towards(Location::new(5, -2)), Direction::RightUp);
        assert_eq!(at.towards(Location::new(0, 9)), Direction::Down);
        assert_eq!(at.towards(at), Direction::None);
    }

    #[test]
    fn distances_agree() {
        let a = Location::new(-4, 10);
        let b = Location::new(2, 2);
        assert_eq!(a.max_distance(b), 8);
        assert_eq!(a.manhattan_distance(b), 14);
        assert_eq!(a.squared_distance(b), 100);
    }

    #[test]
    fn line_is_four_connected_and_hits_both_endpoints() {
        let from = Location::new(10, 3);
        let to = Location::new(-2, 11);
        let tiles: Vec<_> = Line::new(from, to).collect();
        assert_eq!(tiles.first().copied(), Some(to));
        assert_eq!(tiles.last().copied(), Some(from));
        for pair in tiles.windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1);
        }
    }

    #[test]
    fn vertical_line_has_every_tile() {
        let tiles: Vec<_> = Line::new(Location::new(0, 0), Location::new(0, 4)).collect();
        assert_eq!(tiles.len(), 5);
    }

    #[test]
    fn outline_covers_perimeter_only() {
        let from = Location::new(0, 0);
        let tiles: BTreeSet<_> = outline(from, from.offset(9, 9)).collect();
        assert_eq!(tiles.len(), 36);
        assert!(tiles.contains(&Location::new(9, 9)));
        assert!(!tiles.contains(&Location::new(1, 1)));
    }
}
