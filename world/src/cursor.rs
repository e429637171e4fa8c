//! Cached multi-layer traversal.
//!
//! A [`Cursor`] binds an ordered list of layers to one shared position and
//! remembers, per layer, the block holding that position. Moving the cursor
//! follows block links instead of hashing whenever it can; a stale or missing
//! cache entry silently re-resolves through the layer's block table.

use std::sync::Arc;

use warren_core::{BlockId, Direction, Location, TileId, BLOCK_SIZE};

use crate::layer::{Block, Layer};

/// Position of a layer inside a cursor's binding list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerIndex(usize);

impl LayerIndex {
    /// Creates a new identifier with the provided binding position.
    #[must_use]
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    /// Retrieves the binding position.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }
}

/// Look offsets from the up-left corner, in [`Direction::ALL`] order.
const LOOK_OFFSETS: [(usize, usize); 8] = [
    (2, 1),
    (1, 0),
    (1, 2),
    (0, 1),
    (2, 0),
    (2, 2),
    (0, 0),
    (0, 2),
];

/// Consecutive missing blocks an unlimited scan may cross before giving up.
const MAX_SKIPPED_BLOCKS: usize = 10;

#[derive(Clone, Debug)]
struct Binding {
    layer: Arc<Layer>,
    block: Option<Arc<Block>>,
    generation: u64,
}

impl Binding {
    /// Cached block when it is current and holds `id`.
    fn cached(&self, id: BlockId) -> Option<&Arc<Block>> {
        self.block
            .as_ref()
            .filter(|block| block.id() == id && self.generation == self.layer.generation())
    }

    /// Block `id` without allocating, walking links from the cache when possible.
    fn peek(&self, id: BlockId) -> Option<Arc<Block>> {
        let Some(block) = self.block.as_ref() else {
            return self.layer.block(id);
        };
        if self.generation != self.layer.generation() {
            return self.layer.block(id);
        }
        if block.id() == id {
            return Some(Arc::clone(block));
        }
        let (dx, dy) = (id.x() - block.id().x(), id.y() - block.id().y());
        if dx.abs() <= 1 && dy.abs() <= 1 {
            if let Some(found) = block.walk(dx, dy) {
                return Some(found);
            }
        }
        self.layer.block(id)
    }
}

/// A position bound to one or more layers.
#[derive(Clone, Debug)]
pub struct Cursor {
    at: Location,
    bindings: Vec<Binding>,
    saved: Vec<Location>,
}

impl Cursor {
    /// Creates an unbound cursor at `at`.
    #[must_use]
    pub fn new(at: Location) -> Self {
        Self {
            at,
            bindings: Vec::new(),
            saved: Vec::new(),
        }
    }

    /// Binds `layer` and returns its index for later accesses.
    pub fn bind(&mut self, layer: Arc<Layer>) -> LayerIndex {
        let generation = layer.generation();
        let block = layer.block(self.at.block());
        self.bindings.push(Binding {
            layer,
            block,
            generation,
        });
        LayerIndex(self.bindings.len() - 1)
    }

    /// Current position.
    #[must_use]
    pub const fn at(&self) -> Location {
        self.at
    }

    /// Layer bound at `index`.
    #[must_use]
    pub fn layer(&self, index: LayerIndex) -> &Arc<Layer> {
        &self.bindings[index.0].layer
    }

    /// Moves one tile.
    pub fn step(&mut self, direction: Direction) {
        self.move_to(self.at.step(direction));
    }

    /// Moves `distance` tiles.
    pub fn far_step(&mut self, direction: Direction, distance: i64) {
        self.move_to(self.at.far_step(direction, distance));
    }

    /// Moves to `target`, following cached links for nearby blocks.
    pub fn move_to(&mut self, target: Location) {
        let from = self.at.block();
        self.at = target;
        if target.block() == from {
            return;
        }
        for binding in &mut self.bindings {
            binding.block = binding.peek(target.block());
            binding.generation = binding.layer.generation();
        }
    }

    /// Saves the current position.
    pub fn push(&mut self) {
        self.saved.push(self.at);
    }

    /// Restores the most recently saved position, returning it.
    pub fn pop(&mut self) -> Option<Location> {
        let at = self.saved.pop()?;
        self.move_to(at);
        Some(at)
    }

    /// Value under the cursor.
    pub fn get(&mut self, index: LayerIndex) -> TileId {
        let at = self.at;
        self.resolve(index)
            .map_or(TileId::EMPTY, |block| block.get(at.tile_index()))
    }

    /// Writes the value under the cursor.
    pub fn set(&mut self, index: LayerIndex, value: TileId) {
        let at = self.at;
        if value.is_empty() {
            if let Some(block) = self.resolve(index) {
                block.set(at.tile_index(), value);
            }
            return;
        }
        self.resolve_for_write(index).set(at.tile_index(), value);
    }

    /// Bit `bit` of the value under the cursor.
    pub fn get_bit(&mut self, index: LayerIndex, bit: u32) -> bool {
        self.get(index).bit(bit)
    }

    /// Sets bit `bit` of the value under the cursor.
    pub fn set_bit(&mut self, index: LayerIndex, bit: u32, on: bool) {
        let value = self.get(index).with_bit(bit, on);
        self.set(index, value);
    }

    /// Value one step away.
    #[must_use]
    pub fn directed_get(&self, index: LayerIndex, direction: Direction) -> TileId {
        let (dx, dy) = direction.delta();
        self.offset_get(index, dx, dy)
    }

    /// Bit `bit` of the value one step away.
    #[must_use]
    pub fn directed_get_bit(&self, index: LayerIndex, direction: Direction, bit: u32) -> bool {
        self.directed_get(index, direction).bit(bit)
    }

    /// Writes the value one step away without moving.
    pub fn directed_set(&mut self, index: LayerIndex, direction: Direction, value: TileId) {
        let target = self.at.step(direction);
        let binding = &self.bindings[index.0];
        match binding.peek(target.block()) {
            Some(block) => block.set(target.tile_index(), value),
            None if value.is_empty() => {}
            None => binding.layer.set(target, value),
        }
    }

    /// Value at `distance` steps away.
    #[must_use]
    pub fn far_step_get(&self, index: LayerIndex, direction: Direction, distance: i64) -> TileId {
        let (dx, dy) = direction.delta();
        self.offset_get(index, dx * distance, dy * distance)
    }

    /// Value at an arbitrary offset from the cursor.
    #[must_use]
    pub fn offset_get(&self, index: LayerIndex, dx: i64, dy: i64) -> TileId {
        let target = self.at.offset(dx, dy);
        self.bindings[index.0]
            .peek(target.block())
            .map_or(TileId::EMPTY, |block| block.get(target.tile_index()))
    }

    /// Values of the eight surrounding tiles, indexed like [`Direction::ALL`].
    ///
    /// The neighbourhood spans at most four blocks, resolved once each.
    #[must_use]
    pub fn look(&self, index: LayerIndex) -> [TileId; 8] {
        let binding = &self.bindings[index.0];
        let corner = self.at.step(Direction::LeftUp);
        let mut blocks: [[Option<Option<Arc<Block>>>; 2]; 2] = Default::default();
        LOOK_OFFSETS.map(|(ox, oy)| {
            let x = corner.x() + ox;
            let y = corner.y() + oy;
            let size = BLOCK_SIZE as usize;
            let (bx, by) = (x / size, y / size);
            let block = blocks[by][bx].get_or_insert_with(|| {
                binding.peek(corner.block().offset(bx as i32, by as i32))
            });
            block
                .as_ref()
                .map_or(TileId::EMPTY, |block| block.get((y % size) * size + x % size))
        })
    }

    /// Fills `out` with the values from the cursor rightwards.
    pub fn get_row(&self, index: LayerIndex, out: &mut [TileId]) {
        let binding = &self.bindings[index.0];
        let mut cached: Option<(BlockId, Option<Arc<Block>>)> = None;
        for (offset, slot) in out.iter_mut().enumerate() {
            let at = self.at.offset(offset as i64, 0);
            if cached.as_ref().map(|(id, _)| *id) != Some(at.block()) {
                cached = Some((at.block(), binding.peek(at.block())));
            }
            *slot = cached
                .as_ref()
                .and_then(|(_, block)| block.as_ref())
                .map_or(TileId::EMPTY, |block| block.get(at.tile_index()));
        }
    }

    /// Distance to the first non-empty tile along a cardinal ray, capped at `limit`.
    ///
    /// Distance zero is the cursor's own tile. `None` means unlimited.
    ///
    /// # Panics
    ///
    /// Panics for diagonal directions, and when an unlimited scan crosses more
    /// missing blocks than the layer holds.
    #[must_use]
    pub fn scan(&self, index: LayerIndex, direction: Direction, limit: Option<usize>) -> usize {
        self.scan_until(index, direction, limit, |tile| !tile.is_empty())
    }

    /// Distance to the first tile with bit `bit` set along a cardinal ray, capped at `limit`.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Cursor::scan`].
    #[must_use]
    pub fn scan_bit(
        &self,
        index: LayerIndex,
        direction: Direction,
        limit: Option<usize>,
        bit: u32,
    ) -> usize {
        self.scan_until(index, direction, limit, |tile| tile.bit(bit))
    }

    fn scan_until(
        &self,
        index: LayerIndex,
        direction: Direction,
        limit: Option<usize>,
        hit: impl Fn(TileId) -> bool,
    ) -> usize {
        assert!(
            direction.is_cardinal(),
            "diagonal scans are unsupported ({direction})"
        );
        let binding = &self.bindings[index.0];
        let capped = |distance: usize| limit.map_or(distance, |limit| distance.min(limit));
        let mut at = self.at;
        let mut distance = 0;
        let mut skipped = 0;
        let mut block = binding.peek(at.block());
        loop {
            if limit.is_some_and(|limit| distance >= limit) {
                return capped(distance);
            }
            match block {
                Some(current) => {
                    skipped = 0;
                    loop {
                        if hit(current.get(at.tile_index())) {
                            return capped(distance);
                        }
                        distance += 1;
                        if limit.is_some_and(|limit| distance >= limit) {
                            return capped(distance);
                        }
                        let next = at.step(direction);
                        let crossed = next.block() != at.block();
                        at = next;
                        if crossed {
                            block = current
                                .neighbor(direction)
                                .or_else(|| binding.layer.block(at.block()));
                            break;
                        }
                    }
                }
                None => {
                    let remaining = tiles_to_edge(at, direction);
                    distance += remaining;
                    at = at.far_step(direction, remaining as i64);
                    skipped += 1;
                    if limit.is_none()
                        && skipped > MAX_SKIPPED_BLOCKS
                        && skipped > binding.layer.block_count()
                    {
                        panic!("scan ray left the world heading {direction} at {at}");
                    }
                    block = binding.layer.block(at.block());
                }
            }
        }
    }

    /// Walks the steepest-descent path to `target` and reports whether any
    /// visited tile before it is non-empty.
    pub fn obstructed(&mut self, index: LayerIndex, target: Location) -> bool {
        self.push();
        let mut blocked = false;
        while self.at.max_distance(target) > 0 {
            if !self.get(index).is_empty() {
                blocked = true;
                break;
            }
            self.step(self.at.towards(target));
        }
        let _ = self.pop();
        blocked
    }

    fn resolve(&mut self, index: LayerIndex) -> Option<&Arc<Block>> {
        let at = self.at.block();
        let binding = &mut self.bindings[index.0];
        if binding.cached(at).is_none() {
            binding.generation = binding.layer.generation();
            binding.block = binding.layer.block(at);
        }
        binding.block.as_ref()
    }

    fn resolve_for_write(&mut self, index: LayerIndex) -> Arc<Block> {
        if let Some(block) = self.resolve(index) {
            return Arc::clone(block);
        }
        let at = self.at.block();
        let binding = &mut self.bindings[index.0];
        let block = binding.layer.fetch(at);
        binding.block = Some(Arc::clone(&block));
        block
    }
}

fn tiles_to_edge(at: Location, direction: Direction) -> usize {
    let size = BLOCK_SIZE as usize;
    match direction {
        Direction::Right => size - at.x(),
        Direction::Left => at.x() + 1,
        Direction::Down => size - at.y(),
        _ => at.y() + 1,
    }
}
