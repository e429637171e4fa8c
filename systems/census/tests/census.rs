use warren_core::{Command, Event, Location};
use warren_system_census::{Census, Survey};
use warren_world::{self as world, query, World};

fn survey(world: &World) -> Survey {
    let rooms = query::rooms(world);
    Survey {
        rooms: rooms.len(),
        doors: query::doors(world).len(),
        walls: query::wall_count(world),
        entities: query::entities(world).len(),
        largest_room: rooms.iter().map(|room| room.area).max().unwrap_or(0),
    }
}

fn run(world: &mut World, census: &mut Census, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events).expect("consistent");
    census.handle(&events, || survey(world));
    events
}

#[test]
fn census_tracks_rooms_and_doors_through_commands() {
    let mut world = World::new();
    let mut census = Census::new();

    let _ = run(
        &mut world,
        &mut census,
        Command::DrawBox {
            from: Location::new(0, 0),
            to: Location::new(9, 9),
        },
    );
    let _ = run(
        &mut world,
        &mut census,
        Command::DrawBox {
            from: Location::new(9, 0),
            to: Location::new(18, 9),
        },
    );
    let placed = run(
        &mut world,
        &mut census,
        Command::PlaceDoorNear {
            at: Location::new(9, 4),
        },
    );
    assert!(matches!(placed[0], Event::DoorPlaced { .. }), "{placed:?}");

    let report = census.report();
    assert_eq!(report.counters.topology_changes, 2);
    assert_eq!(report.counters.doors_placed, 1);
    let gauges = report.survey.expect("surveyed after edits");
    assert_eq!(gauges.rooms, 2);
    assert_eq!(gauges.doors, 1);
    assert_eq!(gauges.largest_room, 64);
    assert_eq!(gauges.walls, query::wall_count(&world));
}

#[test]
fn rejected_edits_are_counted_without_resurveying() {
    let mut world = World::new();
    let mut census = Census::new();
    for (x, y) in [(0, 0), (1, 0), (0, 1)] {
        let _ = run(
            &mut world,
            &mut census,
            Command::SetWall {
                at: Location::new(x, y),
            },
        );
    }
    let before = census.report().survey;

    let rejected = run(
        &mut world,
        &mut census,
        Command::SetWall {
            at: Location::new(1, 1),
        },
    );
    assert!(matches!(rejected[..], [Event::WallRejected { .. }]));
    let _ = run(
        &mut world,
        &mut census,
        Command::PlaceDoorNear {
            at: Location::new(40, 40),
        },
    );

    let report = census.report();
    assert_eq!(report.counters.walls_rejected, 1);
    assert_eq!(report.counters.doors_rejected, 1);
    assert_eq!(report.survey, before);
}

#[test]
fn ticks_accumulate_action_counts() {
    let mut world = World::new();
    let mut census = Census::new();
    for _ in 0..5 {
        let _ = run(&mut world, &mut census, Command::Think);
    }
    let report = census.report();
    assert_eq!(report.counters.ticks, 5);
    assert_eq!(report.counters.actions, 0);
    assert_eq!(report.busiest_tick.map(|(tick, _)| tick.get()), Some(1));
}
