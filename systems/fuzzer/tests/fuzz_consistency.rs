use std::collections::HashMap;

use warren_core::{Command, RoomId};
use warren_system_fuzzer::{Config, Fuzzer};
use warren_world::{self as world, query, Strictness, World, WorldConfig};

fn strict_world(paranoid: bool) -> World {
    World::with_config(WorldConfig {
        strictness: Strictness {
            fsck_every_op: true,
            paranoid,
        },
        ..WorldConfig::default()
    })
    .expect("single worker needs no pool")
}

/// Small area so boxes overlap constantly.
fn crowded(seed: u64) -> Config {
    Config {
        seed,
        width: 360,
        height: 360,
        ..Config::default()
    }
}

fn fuzz(world: &mut World, config: Config, operations: usize) -> Vec<Command> {
    let mut fuzzer = Fuzzer::new(config);
    let mut history = Vec::new();
    let mut events = Vec::new();
    for operation in 0..operations {
        let mut commands = Vec::new();
        let _ = fuzzer.handle(&events, &mut commands);
        events.clear();
        for command in commands {
            history.push(command);
            if let Err(error) = world::apply(world, command, &mut events) {
                panic!("operation {operation} ({command:?}) broke the world: {error}");
            }
        }
    }
    history
}

fn assert_areas_match_tiles(world: &World) {
    let mut painted: HashMap<RoomId, usize> = HashMap::new();
    for (_, tile) in query::room_ids(world).deep_search_nonzero() {
        *painted.entry(RoomId::from_tile(tile)).or_default() += 1;
    }
    let rooms = query::rooms(world);
    assert_eq!(painted.len(), rooms.len());
    for room in rooms {
        assert_eq!(painted.get(&room.id), Some(&room.area), "{}", room.id);
    }
}

#[test]
fn fuzzed_edits_keep_fsck_clean() {
    for seed in 0..4 {
        let mut world = strict_world(true);
        let _ = fuzz(&mut world, crowded(seed), 300);
        world.fsck().expect("consistent after fuzzing");
        assert_areas_match_tiles(&world);
    }
}

#[test]
fn fuzzing_builds_and_breaks_rooms() {
    let mut world = strict_world(false);
    let _ = fuzz(&mut world, crowded(42), 400);
    let counts = query::operation_counts(&world);
    assert!(counts.walls_added > 0 && counts.walls_deleted > 0, "{counts:?}");
    assert!(counts.rooms_created > 0, "{counts:?}");
    assert!(query::wall_count(&world) > 0);
}

#[test]
fn recorded_history_replays_to_the_same_world() {
    let mut fuzzed = strict_world(false);
    let history = fuzz(&mut fuzzed, crowded(7), 250);

    let mut replayed = strict_world(false);
    let mut events = Vec::new();
    for command in history {
        world::apply(&mut replayed, command, &mut events).expect("consistent");
    }

    assert_eq!(query::rooms(&fuzzed), query::rooms(&replayed));
    assert_eq!(query::doors(&fuzzed), query::doors(&replayed));
    assert_eq!(
        query::walls(&fuzzed).deep_search_nonzero(),
        query::walls(&replayed).deep_search_nonzero()
    );
}

#[test]
fn seeds_select_distinct_streams() {
    let mut first = Fuzzer::new(crowded(1));
    let mut second = Fuzzer::new(crowded(2));
    let (mut a, mut b) = (Vec::new(), Vec::new());
    for _ in 0..50 {
        let _ = first.handle(&[], &mut a);
        let _ = second.handle(&[], &mut b);
    }
    assert_ne!(a, b);
}
