#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Seeded random-walk entity used to exercise the tick scheduler.
//!
//! A [`Wanderer`] takes one step in a random direction every `period` ticks.
//! All wanderers spawned from the same [`Config`] report into a shared
//! [`Tally`], which is how drivers and tests observe entities that the world
//! owns once spawned.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use warren_core::{Direction, EntityId, Location};
use warren_world::{ActionContext, ActionTag, Entity, World};

const WANDER: ActionTag = ActionTag::new(1);

/// Attempts made per requested wanderer before [`scatter`] gives up on it.
const PLACEMENT_ATTEMPTS: usize = 16;

/// Configuration parameters shared by a population of wanderers.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    period: u64,
    rng_seed: u64,
}

impl Config {
    /// Creates a configuration stepping every `period` ticks, seeded by `rng_seed`.
    ///
    /// A period of zero is treated as one.
    #[must_use]
    pub const fn new(period: u64, rng_seed: u64) -> Self {
        let period = if period == 0 { 1 } else { period };
        Self { period, rng_seed }
    }

    /// Ticks between two steps.
    #[must_use]
    pub const fn period(&self) -> u64 {
        self.period
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

/// Event counters shared by every wanderer of a population.
#[derive(Debug, Default)]
pub struct Tally {
    spawned: AtomicU64,
    steps: AtomicU64,
    blocked: AtomicU64,
    touched: AtomicU64,
    hit_walls: AtomicU64,
}

impl Tally {
    /// Creates a new shared tally with all counters at zero.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            spawned: self.spawned.load(Ordering::Relaxed),
            steps: self.steps.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            touched: self.touched.load(Ordering::Relaxed),
            hit_walls: self.hit_walls.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        let _ = counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of a [`Tally`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TallySnapshot {
    /// Wanderers whose spawn callback ran.
    pub spawned: u64,
    /// Successful steps.
    pub steps: u64,
    /// Steps that left the wanderer in place.
    pub blocked: u64,
    /// Steps blocked by another entity.
    pub touched: u64,
    /// Steps blocked by a wall.
    pub hit_walls: u64,
}

/// Entity stepping in a uniformly random direction, diagonals included.
#[derive(Debug)]
pub struct Wanderer {
    at: Location,
    period: u64,
    rng: ChaCha8Rng,
    tally: Arc<Tally>,
}

impl Wanderer {
    /// Creates a wanderer at `at`; `stream` distinguishes wanderers sharing a config.
    #[must_use]
    pub fn new(at: Location, config: Config, stream: u64, tally: Arc<Tally>) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        rng.set_stream(stream);
        Self {
            at,
            period: config.period,
            rng,
            tally,
        }
    }

    fn reschedule(&self, cx: &mut ActionContext<'_>) {
        let next = cx.now().after(self.period);
        cx.schedule(next, WANDER);
    }
}

impl Entity for Wanderer {
    fn location(&self) -> Location {
        self.at
    }

    fn spawned(&mut self, cx: &mut ActionContext<'_>) {
        Tally::bump(&self.tally.spawned);
        self.reschedule(cx);
    }

    fn touched(&mut self, _other: EntityId, _direction: Direction) {
        Tally::bump(&self.tally.touched);
    }

    fn hit_wall(&mut self, _direction: Direction) {
        Tally::bump(&self.tally.hit_walls);
    }

    fn act(&mut self, _tag: ActionTag, cx: &mut ActionContext<'_>) {
        let direction = Direction::from_index(self.rng.gen_range(0..Direction::ALL.len()));
        let (at, moved) = cx.step(self, direction);
        self.at = at;
        if moved {
            Tally::bump(&self.tally.steps);
        } else {
            Tally::bump(&self.tally.blocked);
        }
        self.reschedule(cx);
    }
}

/// Spawns up to `count` wanderers on free tiles of the rectangle spanned by
/// `from` and `to`.
///
/// Placement is drawn from the configured seed, so the same world and
/// arguments always produce the same population. Returns the ids that were
/// registered; crowded rectangles may yield fewer than `count`.
pub fn scatter(
    world: &mut World,
    from: Location,
    to: Location,
    count: usize,
    config: Config,
    tally: &Arc<Tally>,
) -> Vec<EntityId> {
    let (x0, x1) = ordered(from.world_x(), to.world_x());
    let (y0, y1) = ordered(from.world_y(), to.world_y());
    let mut placement = ChaCha8Rng::seed_from_u64(config.rng_seed ^ 0x5ca7_7e4d);
    let mut spawned = Vec::with_capacity(count);
    for stream in 0..count as u64 {
        for _ in 0..PLACEMENT_ATTEMPTS {
            let at = Location::new(placement.gen_range(x0..=x1), placement.gen_range(y0..=y1));
            let wanderer = Wanderer::new(at, config, stream, Arc::clone(tally));
            if let Some(id) = world.spawn(Box::new(wanderer)) {
                spawned.push(id);
                break;
            }
        }
    }
    if spawned.len() < count {
        debug!(
            "scattered {} of {count} wanderers between {from} and {to}",
            spawned.len()
        );
    }
    spawned
}

fn ordered(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
