//! Exhaustive consistency check of walls, rooms and doors.

use std::collections::{BTreeSet, HashMap};

use warren_core::{Direction, RoomId};

use crate::{
    pattern::{DOOR_FOOTPRINT, DOOR_WALLS},
    topology::{Topology, WALL},
    wall_tree::NodeId,
    TopologyError,
};

impl Topology {
    /// Verifies every structural invariant, returning the first violation.
    ///
    /// `paranoid` adds flood-fill connectivity of each room and a sweep for
    /// room tiles whose id is not registered.
    pub(crate) fn fsck(&self, paranoid: bool) -> Result<(), TopologyError> {
        self.check_wall_nodes()?;
        self.check_wall_tiles()?;
        self.check_rooms(paranoid)?;
        self.check_doors(paranoid)?;
        for layer in [&self.walls, &self.room_ids, &self.door_ids, &self.forced] {
            layer.check_links()?;
        }
        Ok(())
    }

    fn check_wall_nodes(&self) -> Result<(), TopologyError> {
        let mut counted: HashMap<NodeId, usize> = HashMap::new();
        let mut linked: HashMap<RoomId, usize> = HashMap::new();

        for (at, id) in self.forest.registered() {
            let node = &self.forest[id];
            if node.at != at {
                return Err(TopologyError::NodeMisplaced {
                    indexed: at,
                    stored: node.at,
                });
            }
            if self.walls.get(at).is_empty() {
                return Err(TopologyError::NodeMisplaced {
                    indexed: at,
                    stored: node.at,
                });
            }
            let room = RoomId::from_tile(self.room_ids.get(at));
            if !room.is_none() {
                return Err(TopologyError::RoomUnderWall { at, room });
            }

            for direction in Direction::CARDINAL {
                let neighbor = at.step(direction);
                if let Some(other) = self.forest.at(neighbor) {
                    if self.forest[other].root != node.root {
                        return Err(TopologyError::RootMismatch { at, neighbor });
                    }
                }
            }

            match node.parent {
                Some(parent) => {
                    let parent_node = &self.forest[parent];
                    let symmetric = parent_node.at == at.step(node.to_parent)
                        && parent_node.children[node.to_parent.reverse().index()] == Some(id);
                    if !symmetric {
                        return Err(TopologyError::LinkAsymmetry {
                            parent: parent_node.at,
                            child: at,
                        });
                    }
                    if node.depth != parent_node.depth + 1 {
                        return Err(TopologyError::DepthMismatch {
                            at,
                            recorded: node.depth,
                            actual: parent_node.depth + 1,
                        });
                    }
                }
                None => {
                    if node.depth != 0 || node.root != id {
                        return Err(TopologyError::DepthMismatch {
                            at,
                            recorded: node.depth,
                            actual: 0,
                        });
                    }
                }
            }
            for (slot, child) in node.children.iter().enumerate() {
                let Some(child) = *child else {
                    continue;
                };
                let child_node = &self.forest[child];
                if child_node.parent != Some(id)
                    || child_node.at != at.step(Direction::from_index(slot))
                {
                    return Err(TopologyError::LinkAsymmetry {
                        parent: at,
                        child: child_node.at,
                    });
                }
            }

            for &(room, direction) in &node.links {
                let consistent = self.rooms.get(&room).is_some_and(|entry| {
                    entry.linking_parent() == at && entry.linking_dir == direction
                });
                if !consistent {
                    return Err(TopologyError::LinkingRecord { room, at });
                }
                *linked.entry(room).or_insert(0) += 1;
            }
            *counted.entry(node.root).or_insert(0) += 1;
        }

        for (root, recorded) in self.forest.tree_sizes() {
            let actual = counted.remove(&root).unwrap_or(0);
            if recorded != actual {
                return Err(TopologyError::TreeSizeMismatch {
                    root: self.forest[root].at,
                    recorded,
                    actual,
                });
            }
        }
        if let Some((&root, &actual)) = counted.iter().next() {
            return Err(TopologyError::TreeSizeMismatch {
                root: self.forest[root].at,
                recorded: 0,
                actual,
            });
        }

        for room in self.rooms.values() {
            if linked.get(&room.id).copied() != Some(1) {
                return Err(TopologyError::LinkingRecord {
                    room: room.id,
                    at: room.linking_parent(),
                });
            }
        }
        Ok(())
    }

    fn check_wall_tiles(&self) -> Result<(), TopologyError> {
        for at in self.walls.deep_search(WALL) {
            if !self.forest.contains(at) {
                return Err(TopologyError::UnregisteredWall { at });
            }
        }
        Ok(())
    }

    fn check_rooms(&self, paranoid: bool) -> Result<(), TopologyError> {
        for room in self.rooms.values() {
            let mut tiles = Vec::new();
            for mask in self.interior(room.id)? {
                for segment in mask.inside_segments() {
                    for offset in segment.start..segment.start + segment.len {
                        let at = mask.left().offset(offset as i64, 0);
                        let found = RoomId::from_tile(self.room_ids.get(at));
                        if found != room.id {
                            return Err(TopologyError::ForeignTile {
                                room: room.id,
                                at,
                                found,
                            });
                        }
                        tiles.push(at);
                    }
                }
            }
            if tiles.len() != room.area {
                return Err(TopologyError::AreaMismatch {
                    room: room.id,
                    recorded: room.area,
                    painted: tiles.len(),
                    tiles,
                });
            }
            if paranoid {
                if let Some(&start) = tiles.first() {
                    let reached = self.room_ids.flood(start).len();
                    if reached != room.area {
                        return Err(TopologyError::Disconnected {
                            room: room.id,
                            at: start,
                            reached,
                            area: room.area,
                        });
                    }
                }
            }
        }

        if paranoid {
            for (at, tile) in self.room_ids.deep_search_nonzero() {
                let room = RoomId::from_tile(tile);
                if !self.rooms.contains_key(&room) {
                    return Err(TopologyError::OrphanRoomTile { at, room });
                }
            }
        }
        Ok(())
    }

    fn check_doors(&self, paranoid: bool) -> Result<(), TopologyError> {
        for door in self.doors.values() {
            let mismatch = |reason| TopologyError::DoorMismatch {
                door: door.id,
                at: door.anchor,
                reason,
            };
            let transposed = door.orientation.is_transposed();
            if !self.walls.matches(door.anchor, &DOOR_WALLS, transposed) {
                return Err(mismatch("wall pattern broken"));
            }
            let footprint_intact = DOOR_FOOTPRINT
                .cells(transposed)
                .all(|(dx, dy, _)| self.door_ids.get(door.anchor.offset(dx, dy)) == door.id.to_tile());
            if !footprint_intact {
                return Err(mismatch("footprint overwritten"));
            }
            let current = door.steps().map(|at| RoomId::from_tile(self.room_ids.get(at)));
            if current != door.rooms {
                return Err(mismatch("cached rooms are stale"));
            }
            for room in door.rooms {
                if room.is_none() {
                    continue;
                }
                match self.rooms.get(&room) {
                    Some(entry) if !entry.doors.contains(&door.id) => {
                        return Err(mismatch("room does not list the door"));
                    }
                    None if paranoid => return Err(mismatch("room does not exist")),
                    _ => {}
                }
            }
        }

        for room in self.rooms.values() {
            let unique: BTreeSet<_> = room.doors.iter().collect();
            for &door in &room.doors {
                let connected = self
                    .doors
                    .get(&door)
                    .is_some_and(|entry| entry.connects(room.id));
                if !connected || unique.len() != room.doors.len() {
                    return Err(TopologyError::DanglingDoor {
                        room: room.id,
                        at: room.linking_tile,
                        door,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::topology::Topology;
    use warren_core::{outline, Location, Orientation, RoomId, TileId};

    fn walled(boxes: &[((i64, i64), (i64, i64))]) -> Topology {
        let mut topology = Topology::new();
        for &((x0, y0), (x1, y1)) in boxes {
            for tile in outline(Location::new(x0, y0), Location::new(x1, y1)) {
                let _ = topology.set_wall(tile).expect("wall");
            }
        }
        topology
    }

    #[test]
    fn fresh_topology_passes() {
        Topology::new().fsck(true).expect("empty world is consistent");
    }

    #[test]
    fn nested_boxes_pass() {
        let topology = walled(&[((0, 0), (19, 19)), ((5, 5), (12, 12))]);
        topology.fsck(true).expect("consistent");
        assert_eq!(topology.rooms.len(), 2);
        let mut areas: Vec<_> = topology.rooms.values().map(|room| room.area).collect();
        areas.sort_unstable();
        assert_eq!(areas, vec![36, 324 - 64]);
    }

    #[test]
    fn corrupted_room_tile_is_reported() {
        let topology = walled(&[((0, 0), (9, 9))]);
        topology.room_ids.set(Location::new(4, 4), RoomId::new(77).to_tile());
        let error = topology.fsck(false).expect_err("corruption");
        assert!(error.locations().contains(&Location::new(4, 4)));
        assert_eq!(error.diagnostic_layer().get(Location::new(4, 4)), TileId::new(1));
    }

    #[test]
    fn orphan_tiles_need_paranoia() {
        let topology = walled(&[((0, 0), (9, 9))]);
        topology.room_ids.set(Location::new(40, 40), RoomId::new(9).to_tile());
        topology.fsck(false).expect("ordinary check skips orphans");
        assert!(topology.fsck(true).is_err());
    }

    #[test]
    fn doors_survive_the_check() {
        let mut topology = walled(&[((0, 0), (9, 9)), ((9, 0), (18, 9))]);
        let (_, touched) = topology
            .place_door(Location::new(8, 3), Orientation::Vertical)
            .expect("door fits the shared wall");
        assert!(!touched.is_empty());
        topology.fsck(true).expect("consistent");
        let painted: BTreeSet<_> = topology
            .room_ids
            .deep_search_nonzero()
            .into_iter()
            .map(|(at, _)| at)
            .collect();
        assert_eq!(painted.len(), 128);
    }
}
