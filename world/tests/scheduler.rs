use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use warren_core::{Direction, Location, Tick, BLOCK_SIZE};
use warren_world::{query, ActionContext, ActionTag, Entity, World, WorldConfig};

const STEP: ActionTag = ActionTag::new(1);

/// Random walker that never leaves its starting block column.
struct Shuttle {
    at: Location,
    rng: ChaCha8Rng,
}

impl Shuttle {
    fn new(at: Location, seed: u64) -> Self {
        Self {
            at,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Entity for Shuttle {
    fn location(&self) -> Location {
        self.at
    }

    fn spawned(&mut self, cx: &mut ActionContext<'_>) {
        let next = cx.now().next();
        cx.schedule(next, STEP);
    }

    fn act(&mut self, _tag: ActionTag, cx: &mut ActionContext<'_>) {
        let mut direction = Direction::from_index(self.rng.gen_range(0..4));
        let x = self.at.x();
        if (direction == Direction::Left && x == 0)
            || (direction == Direction::Right && x + 1 == BLOCK_SIZE as usize)
        {
            direction = direction.reverse();
        }
        let (at, _) = cx.step(self, direction);
        self.at = at;
        let next = cx.now().next();
        cx.schedule(next, STEP);
    }
}

fn populated(workers: usize) -> (World, usize) {
    let mut world = World::with_config(WorldConfig {
        workers,
        // One column per run so every pool size actually spreads the work.
        action_budget: 4,
        ..WorldConfig::default()
    })
    .expect("worker pool");
    let mut count = 0;
    for column in 0..8 {
        for row in 0..4 {
            let at = Location::new(column * 2 * BLOCK_SIZE + 10, row);
            let seed = (column * 4 + row) as u64;
            assert!(world.spawn(Box::new(Shuttle::new(at, seed))).is_some());
            count += 1;
        }
    }
    (world, count)
}

fn assert_occupancy_consistent(world: &World) {
    let entities = query::entities(world);
    for (id, at) in &entities {
        assert_eq!(query::occupancy(world).get(*at), id.to_tile(), "{id} at {at}");
    }
    assert_eq!(
        query::occupancy(world).deep_search_nonzero().len(),
        entities.len()
    );
}

#[test]
fn occupancy_stays_consistent_for_any_pool_size() {
    for workers in [1, 2, 4, 8] {
        let (mut world, count) = populated(workers);
        for tick in 1..=40 {
            let stats = world.think();
            assert_eq!(stats.tick, Tick::new(tick));
            assert_eq!(stats.actions, count, "every shuttle acts each tick");
            assert_eq!(stats.workers, workers);
            assert_eq!(stats.runs, 8);
            assert_occupancy_consistent(&world);
        }
        assert_eq!(query::pending_actions(&world), count);
    }
}

#[test]
fn worker_pools_match_the_inline_schedule() {
    let (mut inline, _) = populated(1);
    let (mut pooled, _) = populated(4);
    for _ in 0..30 {
        let _ = inline.think();
        let _ = pooled.think();
        assert_eq!(query::entities(&inline), query::entities(&pooled));
    }
}

#[test]
fn spawning_onto_a_wall_or_entity_fails() {
    let mut world = World::new();
    let _ = world.set_wall(Location::new(2, 2)).expect("wall");
    assert!(world
        .spawn(Box::new(Shuttle::new(Location::new(2, 2), 0)))
        .is_none());
    let first = world
        .spawn(Box::new(Shuttle::new(Location::new(3, 3), 0)))
        .expect("free tile");
    assert!(world
        .spawn(Box::new(Shuttle::new(Location::new(3, 3), 1)))
        .is_none());
    assert_eq!(query::entity_location(&world, first), Some(Location::new(3, 3)));
}

/// Spawns a copy of itself to the right, then dies.
struct Splitter {
    at: Location,
    generations: u32,
}

impl Entity for Splitter {
    fn location(&self) -> Location {
        self.at
    }

    fn spawned(&mut self, cx: &mut ActionContext<'_>) {
        if self.generations > 0 {
            cx.spawn(Box::new(Splitter {
                at: self.at.step(Direction::Right),
                generations: self.generations - 1,
            }));
        }
        let next = cx.now().next();
        cx.schedule(next, STEP);
    }

    fn act(&mut self, _tag: ActionTag, cx: &mut ActionContext<'_>) {
        let id = cx.id();
        cx.kill(id);
    }
}

#[test]
fn spawns_and_kills_apply_at_tick_boundaries() {
    let mut world = World::new();
    let _ = world
        .spawn(Box::new(Splitter {
            at: Location::new(0, 0),
            generations: 3,
        }))
        .expect("spawn");

    let _ = world.think();
    assert_eq!(query::entities(&world).len(), 2, "child registered after the tick");
    let _ = world.think();
    let alive: Vec<_> = query::entities(&world)
        .into_iter()
        .map(|(_, at)| at)
        .collect();
    assert_eq!(alive, vec![Location::new(1, 0), Location::new(2, 0)]);
    for _ in 0..4 {
        let _ = world.think();
    }
    assert!(query::entities(&world).is_empty());
    assert!(query::occupancy(&world).deep_search_nonzero().is_empty());
}

struct Faulty;

impl Entity for Faulty {
    fn location(&self) -> Location {
        Location::new(5, 5)
    }

    fn spawned(&mut self, _cx: &mut ActionContext<'_>) {
        panic!("faulty entity exploded");
    }

    fn act(&mut self, _tag: ActionTag, _cx: &mut ActionContext<'_>) {}
}

#[test]
#[should_panic(expected = "faulty entity exploded")]
fn worker_panics_reach_the_driver() {
    let mut world = World::with_config(WorldConfig {
        workers: 4,
        ..WorldConfig::default()
    })
    .expect("worker pool");
    let _ = world.spawn(Box::new(Faulty)).expect("spawn");
    let _ = world.think();
}

struct Impatient;

impl Entity for Impatient {
    fn location(&self) -> Location {
        Location::new(0, 0)
    }

    fn spawned(&mut self, cx: &mut ActionContext<'_>) {
        let now = cx.now();
        cx.schedule(now, STEP);
    }

    fn act(&mut self, _tag: ActionTag, _cx: &mut ActionContext<'_>) {}
}

#[test]
#[should_panic(expected = "scheduled for")]
fn scheduling_into_the_running_tick_panics() {
    let mut world = World::new();
    let _ = world.spawn(Box::new(Impatient)).expect("spawn");
    let _ = world.think();
}

#[derive(Debug, PartialEq, Eq)]
struct Sighting {
    own: Option<Location>,
    here: Location,
    others: Vec<Location>,
}

/// Looks itself and its neighbours up through the world while spawning.
struct Observer {
    at: Location,
    log: Arc<Mutex<Vec<Sighting>>>,
}

impl Entity for Observer {
    fn location(&self) -> Location {
        self.at
    }

    fn spawned(&mut self, cx: &mut ActionContext<'_>) {
        let sighting = Sighting {
            own: query::entity_location(cx.world(), cx.id()),
            here: cx.location(),
            others: query::entities(cx.world())
                .into_iter()
                .map(|(_, at)| at)
                .collect(),
        };
        self.log.lock().expect("sighting log").push(sighting);
    }

    fn act(&mut self, _tag: ActionTag, _cx: &mut ActionContext<'_>) {}
}

#[test]
fn entities_can_query_the_world_while_acting() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut world = World::new();
    for x in [0, 2] {
        let _ = world
            .spawn(Box::new(Observer {
                at: Location::new(x, 0),
                log: Arc::clone(&log),
            }))
            .expect("spawn");
    }
    let _ = world.think();

    let sightings = log.lock().expect("sighting log");
    assert_eq!(
        *sightings,
        vec![
            Sighting {
                own: None,
                here: Location::new(0, 0),
                others: vec![Location::new(2, 0)],
            },
            Sighting {
                own: None,
                here: Location::new(2, 0),
                others: vec![Location::new(0, 0)],
            },
        ]
    );
}

#[test]
fn pooled_entities_querying_each_other_do_not_stall() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut world = World::with_config(WorldConfig {
        workers: 4,
        action_budget: 1,
        ..WorldConfig::default()
    })
    .expect("worker pool");
    for column in 0..8 {
        let _ = world
            .spawn(Box::new(Observer {
                at: Location::new(column * 2 * BLOCK_SIZE, 0),
                log: Arc::clone(&log),
            }))
            .expect("spawn");
    }
    let stats = world.think();
    assert_eq!(stats.actions, 8);

    let sightings = log.lock().expect("sighting log");
    assert_eq!(sightings.len(), 8);
    for sighting in sightings.iter() {
        assert_eq!(sighting.own, None);
        assert!(!sighting.others.contains(&sighting.here));
        assert!(sighting.others.len() < 8);
    }
    assert_eq!(query::entities(&world).len(), 8);
}
