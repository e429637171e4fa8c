//! Run-length row masks and touched-block sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::geometry::{BlockId, Location};

/// Run-length encoded interior/exterior mask for one row of tiles.
///
/// Runs alternate between exterior and interior, starting with exterior; an
/// interior row prefix therefore begins with a zero-length exterior run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowMask {
    left: Location,
    runs: Vec<usize>,
    width: usize,
    last: bool,
}

/// Maximal run of equal mask values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowSegment {
    /// Offset of the first tile of the run from the row's left edge.
    pub start: usize,
    /// Number of tiles in the run.
    pub len: usize,
    /// Whether the run lies inside the mask.
    pub inside: bool,
}

impl RowMask {
    /// Creates an empty mask whose first tile is `left`.
    #[must_use]
    pub fn new(left: Location) -> Self {
        Self {
            left,
            runs: vec![0],
            width: 0,
            last: false,
        }
    }

    /// Leftmost tile of the row.
    #[must_use]
    pub const fn left(&self) -> Location {
        self.left
    }

    /// Number of tiles pushed so far.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Appends the next tile's value.
    pub fn push(&mut self, inside: bool) {
        if inside == self.last {
            if let Some(run) = self.runs.last_mut() {
                *run += 1;
            }
        } else {
            self.runs.push(1);
            self.last = inside;
        }
        self.width += 1;
    }

    /// Value at `offset` and the number of tiles left in its run, counting itself.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<(bool, usize)> {
        self.segments()
            .find(|segment| offset < segment.start + segment.len)
            .map(|segment| (segment.inside, segment.start + segment.len - offset))
    }

    /// Non-empty runs from left to right.
    pub fn segments(&self) -> impl Iterator<Item = RowSegment> + '_ {
        let mut start = 0;
        self.runs.iter().enumerate().filter_map(move |(index, &len)| {
            let segment = RowSegment {
                start,
                len,
                inside: index % 2 == 1,
            };
            start += len;
            (len > 0).then_some(segment)
        })
    }

    /// Interior runs from left to right.
    pub fn inside_segments(&self) -> impl Iterator<Item = RowSegment> + '_ {
        self.segments().filter(|segment| segment.inside)
    }

    /// Number of interior tiles.
    #[must_use]
    pub fn inside_count(&self) -> usize {
        self.inside_segments().map(|segment| segment.len).sum()
    }
}

/// Ordered set of blocks touched by a topology mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModMap {
    blocks: BTreeSet<BlockId>,
}

impl ModMap {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the block.
    pub fn add_block(&mut self, block: BlockId) {
        let _ = self.blocks.insert(block);
    }

    /// Records the block holding `location`.
    pub fn add_location(&mut self, location: Location) {
        self.add_block(location.block());
    }

    /// Records every block covered by the interior runs of `mask`.
    pub fn add_row_mask(&mut self, mask: &RowMask) {
        for segment in mask.inside_segments() {
            let first = mask.left().offset(segment.start as i64, 0);
            let last = first.offset(segment.len as i64 - 1, 0);
            for x in first.block().x()..=last.block().x() {
                self.add_block(BlockId::new(x, first.block().y()));
            }
        }
    }

    /// Adds every block of `other`.
    pub fn merge(&mut self, other: &ModMap) {
        self.blocks.extend(other.blocks.iter().copied());
    }

    /// Reports whether the block was touched.
    #[must_use]
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }

    /// Number of touched blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Reports whether nothing was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Touched blocks in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.iter().copied()
    }
}
