//! Fixed tile masks matched against layers.

use warren_core::{Location, TileId};

/// Rectangular tile mask stored row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pattern {
    width: usize,
    height: usize,
    cells: &'static [u32],
}

impl Pattern {
    /// Creates a pattern from row-major cells.
    #[must_use]
    pub const fn new(width: usize, height: usize, cells: &'static [u32]) -> Self {
        assert!(width * height == cells.len(), "pattern size mismatch");
        Self {
            width,
            height,
            cells,
        }
    }

    /// Width and height as laid out on the grid.
    #[must_use]
    pub const fn extent(&self, transposed: bool) -> (usize, usize) {
        if transposed {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Cells as grid offsets from the anchor with their expected values.
    pub fn cells(&self, transposed: bool) -> impl Iterator<Item = (i64, i64, TileId)> + '_ {
        self.cells.iter().enumerate().map(move |(index, &value)| {
            let (column, row) = ((index % self.width) as i64, (index / self.width) as i64);
            let (dx, dy) = if transposed {
                (row, column)
            } else {
                (column, row)
            };
            (dx, dy, TileId::new(value))
        })
    }
}

/// Vertical wall column flanked by open columns.
pub const DOOR_WALLS: Pattern = Pattern::new(3, 4, &[0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0]);

/// Every tile covered by a door.
pub const DOOR_FOOTPRINT: Pattern = Pattern::new(3, 4, &[1; 12]);

/// A door-sized area free of other doors.
pub const EMPTY_FOOTPRINT: Pattern = Pattern::new(3, 4, &[0; 12]);

/// Radius of [`fuzzy_search`] around the requested location.
pub const FUZZY_RADIUS: i64 = 2;

/// Nearest location around `at` accepted by `test`.
///
/// `at` itself wins outright; otherwise the square of radius
/// [`FUZZY_RADIUS`] is scanned column by column and the first candidate with
/// the smallest Manhattan distance is returned.
pub fn fuzzy_search(at: Location, mut test: impl FnMut(Location) -> bool) -> Option<Location> {
    if test(at) {
        return Some(at);
    }
    let mut best: Option<(i64, Location)> = None;
    for dx in -FUZZY_RADIUS..=FUZZY_RADIUS {
        for dy in -FUZZY_RADIUS..=FUZZY_RADIUS {
            let candidate = at.offset(dx, dy);
            let distance = dx.abs() + dy.abs();
            if best.is_some_and(|(best, _)| distance >= best) || !test(candidate) {
                continue;
            }
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, location)| location)
}
