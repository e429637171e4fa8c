//! Rooms and the boundary geometry used to paint them.

use std::collections::{BTreeMap, HashMap};

use warren_core::{Direction, DoorId, Location, RoomId};

/// An enclosed open region.
///
/// The loop bounding the room is never stored. It is rebuilt on demand from
/// the linking record: the tile where the loop closed and the direction from
/// that tile to the wall node carrying the record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Room {
    pub(crate) id: RoomId,
    pub(crate) area: usize,
    pub(crate) approx_area: i64,
    pub(crate) linking_tile: Location,
    pub(crate) linking_dir: Direction,
    pub(crate) doors: Vec<DoorId>,
}

impl Room {
    pub(crate) fn new(id: RoomId, linking_tile: Location, linking_dir: Direction) -> Self {
        Self {
            id,
            area: 0,
            approx_area: 0,
            linking_tile,
            linking_dir,
            doors: Vec::new(),
        }
    }

    /// Tile of the wall node holding this room's linking record.
    pub(crate) fn linking_parent(&self) -> Location {
        self.linking_tile.step(self.linking_dir)
    }

    pub(crate) fn add_door(&mut self, door: DoorId) {
        if let Err(position) = self.doors.binary_search(&door) {
            self.doors.insert(position, door);
        }
    }

    pub(crate) fn remove_door(&mut self, door: DoorId) {
        if let Ok(position) = self.doors.binary_search(&door) {
            let _ = self.doors.remove(position);
        }
    }
}

/// One row of a traced loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BoundaryRow {
    pub(crate) left: Location,
    /// Winding contribution per column from `left`.
    pub(crate) tangent: Vec<i32>,
}

/// Row envelope and winding data of a closed wall loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Boundary {
    pub(crate) rows: Vec<BoundaryRow>,
    /// Magnitude of the shoelace-style area; only meaningful for comparisons.
    pub(crate) approx_area: i64,
}

impl Boundary {
    /// Traces the loop made of `outbound` and `inbound`.
    ///
    /// Both paths start on the closing tile and end on the common ancestor;
    /// consecutive tiles are edge-adjacent. Vertical moves along `outbound`
    /// count positively and along `inbound` negatively, so that summing the
    /// per-tile tangent across a row yields ±2 inside the loop and 0 outside.
    pub(crate) fn trace(outbound: &[Location], inbound: &[Location]) -> Self {
        let origin = outbound.first().copied().unwrap_or_default();
        let mut extent: BTreeMap<i64, (i64, i64)> = BTreeMap::new();
        let mut tangent: HashMap<(i64, i64), i32> = HashMap::new();
        let mut approx_area = 0;

        for (path, sign) in [(outbound, 1), (inbound, -1)] {
            for tile in path {
                let (x, y) = origin.delta(*tile);
                let span = extent.entry(y).or_insert((x, x));
                span.0 = span.0.min(x);
                span.1 = span.1.max(x);
            }
            for pair in path.windows(2) {
                let (x, y) = origin.delta(pair[0]);
                let next = origin.delta(pair[1]);
                let weight = match pair[0].towards(pair[1]) {
                    Direction::Up => sign,
                    Direction::Down => -sign,
                    _ => continue,
                };
                *tangent.entry((x, y)).or_insert(0) += weight;
                *tangent.entry(next).or_insert(0) += weight;
                approx_area += x * i64::from(weight);
            }
        }

        let rows = extent
            .into_iter()
            .map(|(y, (min, max))| BoundaryRow {
                left: origin.offset(min, y),
                tangent: (min..=max)
                    .map(|x| tangent.get(&(x, y)).copied().unwrap_or(0))
                    .collect(),
            })
            .collect();

        Self {
            rows,
            approx_area: approx_area.abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Boundary, Room};
    use warren_core::{Direction, DoorId, Location, RoomId};

    #[test]
    fn doors_stay_sorted_and_unique() {
        let mut room = Room::new(RoomId::new(1), Location::new(0, 0), Direction::Up);
        for door in [5, 2, 9, 2] {
            room.add_door(DoorId::new(door));
        }
        assert_eq!(room.doors, vec![DoorId::new(2), DoorId::new(5), DoorId::new(9)]);
        room.remove_door(DoorId::new(5));
        assert_eq!(room.doors, vec![DoorId::new(2), DoorId::new(9)]);
        assert_eq!(room.linking_parent(), Location::new(0, -1));
    }

    #[test]
    fn winding_sums_to_two_inside_a_square() {
        // Loop closes between (0,0) and (0,1); both paths meet at (4,4).
        let mut outbound = vec![Location::new(0, 0)];
        outbound.extend((1..=4).map(|y| Location::new(0, y)));
        outbound.extend((1..=4).map(|x| Location::new(x, 4)));
        let mut inbound: Vec<_> = (0..=4).map(|x| Location::new(x, 0)).collect();
        inbound.extend((1..=4).map(|y| Location::new(4, y)));

        let boundary = Boundary::trace(&outbound, &inbound);
        assert_eq!(boundary.rows.len(), 5);
        let middle = &boundary.rows[2];
        assert_eq!(middle.left, Location::new(0, 2));
        let mut sum = 0;
        let mut interior = 0;
        for delta in &middle.tangent {
            sum += delta;
            if *delta == 0 && sum.abs() == 2 {
                interior += 1;
            }
        }
        assert_eq!(sum, 0);
        assert_eq!(interior, 3);
        assert_eq!(boundary.approx_area, 16);
    }
}
