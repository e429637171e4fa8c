//! Sparse, block-structured tile storage.
//!
//! A [`Layer`] maps block ids to fixed 32×32 arrays of atomic tile values.
//! Blocks are owned by the layer's block table and link to their four
//! edge-adjacent neighbours through weak handles that are set exactly once,
//! when the second block of a pair is allocated. Tiles are read and written
//! with relaxed atomics so that workers in different scheduling columns can
//! share one layer. The table lock is taken exclusively only to allocate a
//! block; lookups share it, and cursors skip it entirely on linked steps.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc, OnceLock, PoisonError, RwLock, Weak,
    },
};

use warren_core::{BlockId, Direction, Location, ModMap, RowMask, TileId, BLOCK_AREA, BLOCK_SIZE};

use crate::{pattern::Pattern, TopologyError};

/// Fixed 32×32 tile chunk with links to its edge neighbours.
pub(crate) struct Block {
    id: BlockId,
    tiles: [AtomicU32; BLOCK_AREA],
    links: [OnceLock<Weak<Block>>; 4],
}

impl Block {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            tiles: std::array::from_fn(|_| AtomicU32::new(0)),
            links: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    pub(crate) fn id(&self) -> BlockId {
        self.id
    }

    pub(crate) fn get(&self, index: usize) -> TileId {
        TileId::new(self.tiles[index].load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, index: usize, value: TileId) {
        self.tiles[index].store(value.get(), Ordering::Relaxed);
    }

    /// Linked neighbour in a cardinal direction.
    pub(crate) fn neighbor(&self, direction: Direction) -> Option<Arc<Block>> {
        self.links
            .get(direction.index())?
            .get()
            .and_then(Weak::upgrade)
    }

    /// Follows links `dx` blocks horizontally and `dy` vertically.
    ///
    /// Tries the horizontal leg first and falls back to the vertical-first
    /// route when an intermediate block is missing.
    pub(crate) fn walk(self: &Arc<Self>, dx: i32, dy: i32) -> Option<Arc<Block>> {
        fn leg(from: Arc<Block>, delta: i32, positive: Direction) -> Option<Arc<Block>> {
            let direction = if delta < 0 {
                positive.reverse()
            } else {
                positive
            };
            (0..delta.unsigned_abs()).try_fold(from, |block, _| block.neighbor(direction))
        }

        leg(Arc::clone(self), dx, Direction::Right)
            .and_then(|block| leg(block, dy, Direction::Down))
            .or_else(|| {
                leg(Arc::clone(self), dy, Direction::Down)
                    .and_then(|block| leg(block, dx, Direction::Right))
            })
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block").field("id", &self.id).finish()
    }
}

#[derive(Debug, Default)]
struct BlockTable {
    index: HashMap<BlockId, usize>,
    blocks: Vec<Arc<Block>>,
}

/// Sparse infinite grid of [`TileId`] values.
#[derive(Debug, Default)]
pub struct Layer {
    table: RwLock<BlockTable>,
    generation: AtomicU64,
}

impl Layer {
    /// Creates an empty layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a layer holding `value` at every provided location.
    #[must_use]
    pub fn from_locations(locations: impl IntoIterator<Item = Location>, value: TileId) -> Self {
        let layer = Self::new();
        for location in locations {
            layer.set(location, value);
        }
        layer
    }

    /// Value stored at `at`; unallocated blocks read as empty.
    #[must_use]
    pub fn get(&self, at: Location) -> TileId {
        self.block(at.block())
            .map_or(TileId::EMPTY, |block| block.get(at.tile_index()))
    }

    /// Stores `value` at `at`.
    ///
    /// Writing [`TileId::EMPTY`] into a block that does not exist leaves the
    /// layer untouched.
    pub fn set(&self, at: Location, value: TileId) {
        if value.is_empty() {
            if let Some(block) = self.block(at.block()) {
                block.set(at.tile_index(), value);
            }
            return;
        }
        self.fetch(at.block()).set(at.tile_index(), value);
    }

    /// Number of allocated blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.read().blocks.len()
    }

    /// Reports whether the block has been allocated.
    #[must_use]
    pub fn contains_block(&self, id: BlockId) -> bool {
        self.read().index.contains_key(&id)
    }

    /// Drops every block. Cursors bound to the layer re-resolve on their next access.
    pub fn clear(&self) {
        let mut table = self.write();
        table.index.clear();
        table.blocks.clear();
        let _ = self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Every location holding exactly `value`, ordered by block then row.
    #[must_use]
    pub fn deep_search(&self, value: TileId) -> Vec<Location> {
        self.deep_search_nonzero()
            .into_iter()
            .filter(|(_, tile)| *tile == value)
            .map(|(location, _)| location)
            .collect()
    }

    /// Every non-empty tile with its value, ordered by block then row.
    #[must_use]
    pub fn deep_search_nonzero(&self) -> Vec<(Location, TileId)> {
        let mut found = Vec::new();
        for block in self.sorted_blocks() {
            for index in 0..BLOCK_AREA {
                let tile = block.get(index);
                if tile.is_empty() {
                    continue;
                }
                let (x, y) = (index as i64 % BLOCK_SIZE, index as i64 / BLOCK_SIZE);
                found.push((Location::in_block(block.id(), x, y), tile));
            }
        }
        found
    }

    /// The 8-connected region of tiles sharing the value at `start`.
    ///
    /// Returns nothing when `start` is empty; empty space is unbounded.
    #[must_use]
    pub fn flood(&self, start: Location) -> Vec<Location> {
        let value = self.get(start);
        if value.is_empty() {
            return Vec::new();
        }
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut region = Vec::new();
        while let Some(at) = queue.pop_front() {
            region.push(at);
            for neighbour in at.neighborhood() {
                if self.get(neighbour) == value && seen.insert(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }
        region
    }

    /// Reports whether the tiles under `pattern` anchored at `at` equal it exactly.
    #[must_use]
    pub fn matches(&self, at: Location, pattern: &Pattern, transposed: bool) -> bool {
        pattern
            .cells(transposed)
            .all(|(dx, dy, expected)| self.get(at.offset(dx, dy)) == expected)
    }

    /// Writes `value` under every non-empty cell of `pattern`.
    pub fn set_mask(
        &self,
        at: Location,
        pattern: &Pattern,
        transposed: bool,
        value: TileId,
        touched: &mut ModMap,
    ) {
        for (dx, dy, cell) in pattern.cells(transposed) {
            if cell.is_empty() {
                continue;
            }
            let location = at.offset(dx, dy);
            self.set(location, value);
            touched.add_location(location);
        }
    }

    /// Non-empty tiles under the interior runs of `mask`, keyed by row offset.
    #[must_use]
    pub fn collect_row_mask(&self, mask: &RowMask) -> Vec<(usize, TileId)> {
        let mut found = Vec::new();
        for segment in mask.inside_segments() {
            for offset in segment.start..segment.start + segment.len {
                let tile = self.get(mask.left().offset(offset as i64, 0));
                if !tile.is_empty() {
                    found.push((offset, tile));
                }
            }
        }
        found
    }

    /// Writes `value` under every interior run of `mask`.
    pub fn set_row_mask(&self, mask: &RowMask, value: TileId, touched: &mut ModMap) {
        let mut cached: Option<Arc<Block>> = None;
        for segment in mask.inside_segments() {
            for offset in segment.start..segment.start + segment.len {
                let at = mask.left().offset(offset as i64, 0);
                if cached.as_ref().map(|block| block.id()) != Some(at.block()) {
                    cached = if value.is_empty() {
                        self.block(at.block())
                    } else {
                        Some(self.fetch(at.block()))
                    };
                }
                if let Some(block) = &cached {
                    block.set(at.tile_index(), value);
                }
            }
        }
        touched.add_row_mask(mask);
    }

    /// Verifies that neighbour links mirror the block table.
    pub fn check_links(&self) -> Result<(), TopologyError> {
        let table = self.read();
        for block in &table.blocks {
            for direction in Direction::CARDINAL {
                let expected = table
                    .index
                    .get(&block.id().step(direction))
                    .map(|&index| &table.blocks[index]);
                let linked = block.neighbor(direction);
                let consistent = match (expected, &linked) {
                    (None, None) => true,
                    (Some(expected), Some(linked)) => {
                        Arc::ptr_eq(expected, linked)
                            && linked
                                .neighbor(direction.reverse())
                                .is_some_and(|back| Arc::ptr_eq(&back, block))
                    }
                    _ => false,
                };
                if !consistent {
                    return Err(TopologyError::BlockLinkAsymmetry {
                        block: block.id(),
                        direction,
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Allocated block, if any.
    pub(crate) fn block(&self, id: BlockId) -> Option<Arc<Block>> {
        let table = self.read();
        table
            .index
            .get(&id)
            .map(|&index| Arc::clone(&table.blocks[index]))
    }

    /// Block `id`, allocating and linking it when missing.
    pub(crate) fn fetch(&self, id: BlockId) -> Arc<Block> {
        if let Some(block) = self.block(id) {
            return block;
        }
        let mut table = self.write();
        if let Some(&index) = table.index.get(&id) {
            return Arc::clone(&table.blocks[index]);
        }
        let block = Arc::new(Block::new(id));
        for direction in Direction::CARDINAL {
            let Some(&index) = table.index.get(&id.step(direction)) else {
                continue;
            };
            let neighbour = &table.blocks[index];
            let _ = block.links[direction.index()].set(Arc::downgrade(neighbour));
            let _ = neighbour.links[direction.reverse().index()].set(Arc::downgrade(&block));
        }
        let index = table.blocks.len();
        let _ = table.index.insert(id, index);
        table.blocks.push(Arc::clone(&block));
        block
    }

    fn sorted_blocks(&self) -> Vec<Arc<Block>> {
        let mut blocks = self.read().blocks.clone();
        blocks.sort_by_key(|block| block.id());
        blocks
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BlockTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BlockTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}
