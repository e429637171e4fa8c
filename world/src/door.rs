//! Doors joining two rooms through a wall.

use warren_core::{DoorId, Location, Orientation, RoomId};

use crate::layer::Layer;

/// Distance between the two interior tiles a door reads its rooms from.
const DOOR_SPAN: i64 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Door {
    pub(crate) id: DoorId,
    pub(crate) orientation: Orientation,
    pub(crate) anchor: Location,
    pub(crate) rooms: [RoomId; 2],
}

impl Door {
    pub(crate) fn new(id: DoorId, orientation: Orientation, anchor: Location) -> Self {
        Self {
            id,
            orientation,
            anchor,
            rooms: [RoomId::NONE; 2],
        }
    }

    /// Tiles on either side of the wall whose room ids the door caches.
    pub(crate) fn steps(&self) -> [Location; 2] {
        [
            self.anchor,
            self.anchor.far_step(self.orientation.across(), DOOR_SPAN),
        ]
    }

    /// Re-reads the adjacent room ids from the room layer.
    pub(crate) fn refresh(&mut self, room_ids: &Layer) {
        self.rooms = self.steps().map(|at| RoomId::from_tile(room_ids.get(at)));
    }

    /// Reports whether the door touches `room`.
    pub(crate) fn connects(&self, room: RoomId) -> bool {
        !room.is_none() && self.rooms.contains(&room)
    }
}
