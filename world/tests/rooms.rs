use warren_core::{Location, RoomId};
use warren_world::{query, Strictness, World, WorldConfig};

fn strict_world() -> World {
    World::with_config(WorldConfig {
        strictness: Strictness {
            fsck_every_op: true,
            paranoid: true,
        },
        ..WorldConfig::default()
    })
    .expect("single worker needs no pool")
}

fn draw_box(world: &mut World, from: (i64, i64), to: (i64, i64)) {
    let _ = world
        .draw_box(Location::new(from.0, from.1), Location::new(to.0, to.1))
        .expect("box keeps the world consistent");
}

fn area_of(world: &World, at: Location) -> usize {
    let id = query::room_at(world, at).expect("tile is inside a room");
    query::room(world, id).expect("room is registered").area
}

#[test]
fn ten_by_ten_outline_encloses_sixty_four_tiles() {
    let mut world = strict_world();
    draw_box(&mut world, (0, 0), (9, 9));

    let rooms = query::rooms(&world);
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].area, 64);
    assert_eq!(query::wall_count(&world), 36);
}

#[test]
fn outer_room_area_matches_flood_fill() {
    let mut world = strict_world();
    draw_box(&mut world, (0, 0), (29, 29));
    draw_box(&mut world, (10, 10), (19, 19));

    assert_eq!(area_of(&world, Location::new(15, 15)), 64);
    let outer = query::room_at(&world, Location::new(1, 1)).expect("outer room");
    let flooded = query::room_ids(&world).flood(Location::new(1, 1)).len();
    assert_eq!(area_of(&world, Location::new(1, 1)), flooded);
    assert_eq!(flooded, 28 * 28 - 100);
    assert_ne!(query::room_at(&world, Location::new(15, 15)), Some(outer));
}

#[test]
fn breaching_an_inner_box_merges_and_rebuilds_rooms() {
    let mut world = strict_world();
    draw_box(&mut world, (0, 0), (29, 29));
    draw_box(&mut world, (10, 10), (19, 19));
    let outer = query::room_at(&world, Location::new(1, 1)).expect("outer room");
    let before = area_of(&world, Location::new(1, 1)) + area_of(&world, Location::new(15, 15));

    let breach = Location::new(10, 14);
    let touched = world.delete_wall(breach).expect("delete");
    assert!(touched.contains(breach.block()));
    assert_eq!(query::rooms(&world).len(), 1);
    assert_eq!(query::room_at(&world, breach), Some(outer));
    assert_eq!(area_of(&world, breach), before + 1);

    let _ = world.set_wall(breach).expect("re-add");
    let rooms = query::rooms(&world);
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms.iter().map(|room| room.area).sum::<usize>(), before);
    assert_eq!(query::room_at(&world, Location::new(1, 1)), Some(outer));
    assert_eq!(area_of(&world, Location::new(15, 15)), 64);
}

#[test]
fn repeated_edits_are_idempotent() {
    let mut world = strict_world();
    let at = Location::new(3, 3);
    assert!(!world.set_wall(at).expect("first").is_empty());
    assert!(world.set_wall(at).expect("second").is_empty());
    assert!(!world.delete_wall(at).expect("delete").is_empty());
    assert!(world.delete_wall(at).expect("again").is_empty());
    assert_eq!(query::wall_count(&world), 0);
}

#[test]
fn lattice_produces_one_room_per_cell() {
    let mut world = strict_world();
    for line in 0..5 {
        let offset = line * 5;
        let _ = world
            .draw_line(Location::new(offset, 0), Location::new(offset, 20))
            .expect("vertical");
        let _ = world
            .draw_line(Location::new(0, offset), Location::new(20, offset))
            .expect("horizontal");
    }

    let rooms = query::rooms(&world);
    assert_eq!(rooms.len(), 16);
    assert!(rooms.iter().all(|room| room.area == 16));
    let mut ids: Vec<RoomId> = (0..4)
        .flat_map(|row| (0..4).map(move |column| (column, row)))
        .filter_map(|(column, row)| {
            query::room_at(&world, Location::new(column * 5 + 2, row * 5 + 2))
        })
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
}

#[test]
fn nested_boxes_paint_innermost_first() {
    let mut world = strict_world();
    draw_box(&mut world, (0, 0), (40, 40));
    draw_box(&mut world, (5, 5), (35, 35));
    draw_box(&mut world, (15, 15), (25, 25));

    assert_eq!(query::rooms(&world).len(), 3);
    assert_eq!(area_of(&world, Location::new(20, 20)), 81);
    assert_eq!(area_of(&world, Location::new(10, 10)), 29 * 29 - 121);
    assert_eq!(area_of(&world, Location::new(2, 2)), 39 * 39 - 31 * 31);
}

#[test]
fn boxes_across_negative_blocks_close() {
    let mut world = strict_world();
    draw_box(&mut world, (-40, -3), (-20, 12));
    assert_eq!(area_of(&world, Location::new(-30, 0)), 19 * 14);
}

#[test]
fn opening_a_lone_box_drops_its_room() {
    let mut world = strict_world();
    draw_box(&mut world, (0, 0), (9, 9));
    let _ = world.delete_wall(Location::new(9, 4)).expect("delete");
    assert!(query::rooms(&world).is_empty());
    assert!(query::room_ids(&world).deep_search_nonzero().is_empty());

    let _ = world.set_wall(Location::new(9, 4)).expect("re-add");
    assert_eq!(query::rooms(&world).len(), 1);
    assert_eq!(area_of(&world, Location::new(4, 4)), 64);
}
