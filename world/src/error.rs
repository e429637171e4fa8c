//! Failure types surfaced by the world.

use thiserror::Error;
use warren_core::{BlockId, Direction, DoorId, Location, RoomId, TileId};

use crate::layer::Layer;

/// Structural inconsistency detected while maintaining or checking topology.
///
/// These never describe a recoverable situation: they mean the incremental
/// bookkeeping disagrees with the grid. Each variant carries the offending
/// locations so they can be drawn on a diagnostic layer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The location index and the node it points at disagree.
    #[error("wall node indexed at {indexed} is stored at {stored}")]
    NodeMisplaced {
        /// Key in the location index.
        indexed: Location,
        /// Location recorded on the node.
        stored: Location,
    },
    /// A wall tile has no node.
    #[error("wall tile {at} is missing from the wall forest")]
    UnregisteredWall {
        /// The wall tile.
        at: Location,
    },
    /// A wall tile still carries a room id.
    #[error("wall tile {at} carries {room}")]
    RoomUnderWall {
        /// The wall tile.
        at: Location,
        /// Room id found on it.
        room: RoomId,
    },
    /// Edge-adjacent wall tiles report different roots.
    #[error("adjacent wall tiles {at} and {neighbor} belong to different trees")]
    RootMismatch {
        /// First tile.
        at: Location,
        /// Second tile.
        neighbor: Location,
    },
    /// A parent does not list its child or the child points elsewhere.
    #[error("parent and child links disagree between {parent} and {child}")]
    LinkAsymmetry {
        /// Parent tile.
        parent: Location,
        /// Child tile.
        child: Location,
    },
    /// A node's recorded depth is not its distance to the root.
    #[error("wall node at {at} records depth {recorded} but sits at depth {actual}")]
    DepthMismatch {
        /// The node's tile.
        at: Location,
        /// Depth stored on the node.
        recorded: u32,
        /// Depth derived from its parent.
        actual: u32,
    },
    /// The tracked tile count of a tree is wrong.
    #[error("tree rooted at {root} tracks {recorded} tiles but holds {actual}")]
    TreeSizeMismatch {
        /// Root tile.
        root: Location,
        /// Tracked count.
        recorded: usize,
        /// Counted nodes.
        actual: usize,
    },
    /// A room's linking record is missing, duplicated or detached.
    #[error("{room} has no consistent linking record at {at}")]
    LinkingRecord {
        /// The room.
        room: RoomId,
        /// Location where the record was expected.
        at: Location,
    },
    /// The winding accumulator exceeded its range while painting.
    #[error("tangent accumulator of {room} reached {value} on the row starting at {row}")]
    TangentOverflow {
        /// The room being painted.
        room: RoomId,
        /// Left edge of the row.
        row: Location,
        /// Offending accumulator value.
        value: i32,
    },
    /// An interior run reached the end of its row without closing.
    #[error("interior run of {room} never closes on the row starting at {row}")]
    RunawayRow {
        /// The room being painted.
        room: RoomId,
        /// Left edge of the row.
        row: Location,
    },
    /// Tracked area and painted interior disagree.
    #[error("{room} records area {recorded} but paints {painted} tiles")]
    AreaMismatch {
        /// The room.
        room: RoomId,
        /// Tracked area.
        recorded: usize,
        /// Painted interior count.
        painted: usize,
        /// Interior tiles of the room.
        tiles: Vec<Location>,
    },
    /// An interior tile of a room carries another id.
    #[error("interior tile {at} of {room} carries {found}")]
    ForeignTile {
        /// The room.
        room: RoomId,
        /// The tile.
        at: Location,
        /// Id found on the tile.
        found: RoomId,
    },
    /// A room's tiles do not form one connected region.
    #[error("{room} is split: flood fill from {at} reaches {reached} of {area} tiles")]
    Disconnected {
        /// The room.
        room: RoomId,
        /// Start of the flood fill.
        at: Location,
        /// Tiles reached.
        reached: usize,
        /// Tracked area.
        area: usize,
    },
    /// A tile carries an id with no room behind it.
    #[error("tile {at} carries {room} which does not exist")]
    OrphanRoomTile {
        /// The tile.
        at: Location,
        /// The unknown id.
        room: RoomId,
    },
    /// A door disagrees with the layers or the rooms it connects.
    #[error("{door} anchored at {at} is inconsistent: {reason}")]
    DoorMismatch {
        /// The door.
        door: DoorId,
        /// Its anchor.
        at: Location,
        /// What disagreed.
        reason: &'static str,
    },
    /// A room lists a door that does not reference it.
    #[error("{room} at {at} lists {door} which does not connect to it")]
    DanglingDoor {
        /// The room.
        room: RoomId,
        /// The room's linking tile.
        at: Location,
        /// The door.
        door: DoorId,
    },
    /// A layer block link is missing or one-sided.
    #[error("block {block} has an inconsistent {direction} link")]
    BlockLinkAsymmetry {
        /// The block.
        block: BlockId,
        /// Direction of the bad link.
        direction: Direction,
    },
}

impl TopologyError {
    /// Locations implicated by the failure.
    #[must_use]
    pub fn locations(&self) -> Vec<Location> {
        match self {
            TopologyError::NodeMisplaced { indexed, stored } => vec![*indexed, *stored],
            TopologyError::UnregisteredWall { at }
            | TopologyError::RoomUnderWall { at, .. }
            | TopologyError::LinkingRecord { at, .. }
            | TopologyError::DepthMismatch { at, .. }
            | TopologyError::ForeignTile { at, .. }
            | TopologyError::Disconnected { at, .. }
            | TopologyError::OrphanRoomTile { at, .. }
            | TopologyError::DoorMismatch { at, .. }
            | TopologyError::DanglingDoor { at, .. } => vec![*at],
            TopologyError::RootMismatch { at, neighbor } => vec![*at, *neighbor],
            TopologyError::LinkAsymmetry { parent, child } => vec![*parent, *child],
            TopologyError::TreeSizeMismatch { root, .. } => vec![*root],
            TopologyError::TangentOverflow { row, .. } | TopologyError::RunawayRow { row, .. } => {
                vec![*row]
            }
            TopologyError::AreaMismatch { tiles, .. } => tiles.clone(),
            TopologyError::BlockLinkAsymmetry { block, .. } => vec![block.origin()],
        }
    }

    /// A fresh layer marking every implicated location with 1.
    #[must_use]
    pub fn diagnostic_layer(&self) -> Layer {
        Layer::from_locations(self.locations(), TileId::new(1))
    }
}

/// Failure while constructing a world.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The worker pool could not be started.
    #[error("failed to start the worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
