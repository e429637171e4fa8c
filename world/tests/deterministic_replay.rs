use warren_core::{Command, DoorId, Event, Location, ModMap, Orientation, Tick};
use warren_world::{self as world, query, Strictness, World, WorldConfig};

#[test]
fn deterministic_replay_produces_identical_topology() {
    let first = replay(scripted_commands());
    let second = replay(scripted_commands());

    assert_eq!(first, second, "replay diverged between runs");
    assert!(first.rooms.len() >= 2, "script should leave several rooms");
    assert!(!first.doors.is_empty(), "script should leave a door");
}

#[derive(Debug, PartialEq, Eq)]
struct ReplayOutcome {
    events: Vec<EventRecord>,
    rooms: Vec<query::RoomView>,
    doors: Vec<query::DoorView>,
    room_tiles: Vec<(Location, u32)>,
}

fn replay(commands: Vec<Command>) -> ReplayOutcome {
    let mut world = World::with_config(WorldConfig {
        strictness: Strictness {
            fsck_every_op: true,
            paranoid: false,
        },
        ..WorldConfig::default()
    })
    .expect("single worker needs no pool");
    let mut events = Vec::new();
    for command in commands {
        let mut emitted = Vec::new();
        world::apply(&mut world, command, &mut emitted).expect("topology stays consistent");
        record_events(&mut events, emitted);
    }
    world.fsck().expect("replayed world passes fsck");

    let mut room_tiles: Vec<_> = query::room_ids(&world)
        .deep_search_nonzero()
        .into_iter()
        .map(|(at, tile)| (at, tile.get()))
        .collect();
    room_tiles.sort();

    ReplayOutcome {
        events,
        rooms: query::rooms(&world),
        doors: query::doors(&world),
        room_tiles,
    }
}

fn scripted_commands() -> Vec<Command> {
    let at = Location::new;
    vec![
        Command::DrawBox {
            from: at(0, 0),
            to: at(30, 20),
        },
        Command::DrawLine {
            from: at(15, 0),
            to: at(15, 20),
        },
        Command::DrawBox {
            from: at(3, 3),
            to: at(9, 9),
        },
        Command::PlaceDoorNear { at: at(15, 10) },
        Command::DeleteWall { at: at(9, 6) },
        Command::SetWall { at: at(9, 6) },
        Command::DrawLine {
            from: at(15, 10),
            to: at(30, 10),
        },
        Command::PlaceDoor {
            at: at(20, 9),
            orientation: Orientation::Horizontal,
        },
        Command::DeleteWall { at: at(30, 5) },
        Command::Think,
    ]
}

/// Events with wall-clock timing stripped so runs compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
enum EventRecord {
    TopologyChanged {
        touched: ModMap,
    },
    WallRejected {
        at: Location,
    },
    DoorPlaced {
        door: DoorId,
        at: Location,
        orientation: Orientation,
    },
    DoorRejected {
        at: Location,
    },
    DoorRemoved {
        at: Location,
    },
    TimeAdvanced {
        tick: Tick,
        actions: usize,
    },
}

fn record_events(log: &mut Vec<EventRecord>, events: Vec<Event>) {
    for event in events {
        let record = match event {
            Event::TopologyChanged { touched } => EventRecord::TopologyChanged { touched },
            Event::WallRejected { at } => EventRecord::WallRejected { at },
            Event::DoorPlaced {
                door,
                at,
                orientation,
                ..
            } => EventRecord::DoorPlaced {
                door,
                at,
                orientation,
            },
            Event::DoorRejected { at } => EventRecord::DoorRejected { at },
            Event::DoorRemoved { at, .. } => EventRecord::DoorRemoved { at },
            Event::TimeAdvanced { stats } => EventRecord::TimeAdvanced {
                tick: stats.tick,
                actions: stats.actions,
            },
        };
        log.push(record);
    }
}
