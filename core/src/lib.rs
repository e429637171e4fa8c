#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Warren tile-topology engine.
//!
//! This crate defines the vocabulary that connects adapters, the
//! authoritative world, and pure systems: grid geometry ([`Location`],
//! [`BlockId`], [`Direction`]), the opaque per-tile value [`TileId`] and the
//! identifier newtypes stored in it, run-length [`RowMask`] values, and the
//! touched-block set [`ModMap`]. Adapters submit [`Command`] values describing
//! desired mutations, the world executes them via its `apply` entry point and
//! broadcasts [`Event`] values that systems fold into their own state.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

mod geometry;
mod mask;

pub use geometry::{outline, BlockId, Direction, Line, Location, BLOCK_AREA, BLOCK_SIZE};
pub use mask::{ModMap, RowMask, RowSegment};

/// Opaque 32-bit value stored per tile per layer; zero means absent.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TileId(u32);

impl TileId {
    /// The absent value.
    pub const EMPTY: TileId = TileId(0);

    /// Wraps a raw tile value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw tile value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Reports whether the tile holds nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Reports whether bit `bit` is set.
    #[must_use]
    pub const fn bit(&self, bit: u32) -> bool {
        self.0 & (1 << bit) != 0
    }

    /// Copy of the value with bit `bit` set to `on`.
    #[must_use]
    pub const fn with_bit(self, bit: u32, on: bool) -> Self {
        if on {
            Self(self.0 | (1 << bit))
        } else {
            Self(self.0 & !(1 << bit))
        }
    }
}

macro_rules! tile_identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(u32);

        impl $name {
            /// The reserved "no identifier" value.
            pub const NONE: $name = $name(0);

            /// Creates a new identifier with the provided numeric value.
            #[must_use]
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            /// Retrieves the numeric representation of the identifier.
            #[must_use]
            pub const fn get(&self) -> u32 {
                self.0
            }

            /// Reports whether this is the reserved empty identifier.
            #[must_use]
            pub const fn is_none(&self) -> bool {
                self.0 == 0
            }

            /// Tile value storing the identifier in a layer.
            #[must_use]
            pub const fn to_tile(self) -> TileId {
                TileId::new(self.0)
            }

            /// Identifier stored in a tile value.
            #[must_use]
            pub const fn from_tile(tile: TileId) -> Self {
                Self(tile.get())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

tile_identifier!(
    /// Identifier of an enclosed open region.
    RoomId,
    "room#"
);
tile_identifier!(
    /// Identifier of a door connecting two rooms.
    DoorId,
    "door#"
);
tile_identifier!(
    /// Identifier of a simulated entity; also its value in the occupancy layer.
    EntityId,
    "entity#"
);

/// Discrete simulation time.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Tick(u64);

impl Tick {
    /// Wraps a raw tick count.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw tick count.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// The tick `delta` ticks later.
    #[must_use]
    pub const fn after(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }

    /// The following tick.
    #[must_use]
    pub const fn next(self) -> Self {
        self.after(1)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Orientation of a door footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Wall runs vertically; the door joins the rooms to its left and right.
    Vertical,
    /// Wall runs horizontally; the door joins the rooms above and below.
    Horizontal,
}

impl Orientation {
    /// Reports whether patterns are matched with x and y swapped.
    #[must_use]
    pub const fn is_transposed(self) -> bool {
        matches!(self, Orientation::Horizontal)
    }

    /// Direction from the anchor toward the door's far side.
    #[must_use]
    pub const fn across(self) -> Direction {
        match self {
            Orientation::Vertical => Direction::Right,
            Orientation::Horizontal => Direction::Down,
        }
    }
}

/// Statistics describing the most recent tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThinkStats {
    /// Tick that was executed.
    pub tick: Tick,
    /// Number of actions executed.
    pub actions: usize,
    /// Number of column runs dispatched.
    pub runs: usize,
    /// Size of the worker pool.
    pub workers: usize,
    /// Wall-clock time spent inside the tick.
    pub elapsed: Duration,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Turns one tile into wall.
    SetWall {
        /// Tile to fill.
        at: Location,
    },
    /// Turns one wall tile back into open floor.
    DeleteWall {
        /// Tile to clear.
        at: Location,
    },
    /// Walls every tile of the rasterized segment.
    DrawLine {
        /// First endpoint.
        from: Location,
        /// Second endpoint.
        to: Location,
    },
    /// Walls the outline of the rectangle spanned by two corners.
    DrawBox {
        /// First corner.
        from: Location,
        /// Opposite corner.
        to: Location,
    },
    /// Places a door anchored exactly at `at`.
    PlaceDoor {
        /// Top-left tile of the door footprint.
        at: Location,
        /// Orientation of the footprint.
        orientation: Orientation,
    },
    /// Places a door at the best matching footprint near `at`.
    PlaceDoorNear {
        /// Approximate position requested by the caller.
        at: Location,
    },
    /// Removes the door covering `at`.
    RemoveDoor {
        /// Any tile of the door footprint.
        at: Location,
    },
    /// Advances the simulation by one tick.
    Think,
}

/// Events emitted by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Wall topology changed; the touched blocks need to be refreshed.
    TopologyChanged {
        /// Blocks whose tiles changed.
        touched: ModMap,
    },
    /// A wall could not be placed because it would form a solid 2×2 square or cover a door.
    WallRejected {
        /// Tile that was requested.
        at: Location,
    },
    /// A door was placed.
    DoorPlaced {
        /// Identifier of the new door.
        door: DoorId,
        /// Anchor of the door footprint.
        at: Location,
        /// Orientation of the door footprint.
        orientation: Orientation,
        /// Blocks whose tiles changed.
        touched: ModMap,
    },
    /// No door footprint matched near the requested location.
    DoorRejected {
        /// Tile that was requested.
        at: Location,
    },
    /// A door was removed.
    DoorRemoved {
        /// Anchor of the removed footprint.
        at: Location,
        /// Blocks whose tiles changed.
        touched: ModMap,
    },
    /// A tick finished executing.
    TimeAdvanced {
        /// Statistics gathered while executing the tick.
        stats: ThinkStats,
    },
}
