#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic fuzzing system emitting random topology edits.
//!
//! Every operation picks an anchor on a coarse lattice over a screen-sized
//! area plus a second point a few lattice spans away, then either draws a box
//! between them, deletes the wall tiles under both, or asks for a door near
//! each. Coarse coordinates make boxes share edges and corners often, which is
//! where room merging and splitting get exercised.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use warren_core::{Command, Event, Location};

/// Configuration parameters of the fuzzer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Seed of the command stream.
    pub seed: u64,
    /// Width of the area anchors are drawn from.
    pub width: i64,
    /// Height of the area anchors are drawn from.
    pub height: i64,
    /// Spacing of anchor points.
    pub lattice: i64,
    /// Spacing of second points relative to the anchor.
    pub span: i64,
    /// Number of distinct span multiples, starting at zero.
    pub span_steps: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 1920,
            height: 1080,
            lattice: 90,
            span: 30,
            span_steps: 5,
        }
    }
}

/// Kind of edit produced by one fuzzing step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Outline between the anchor and the second point.
    DrawBox,
    /// Wall deletion at both points.
    Delete,
    /// Fuzzy door placement near both points.
    PlaceDoors,
}

/// Running totals over everything the fuzzer generated and observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FuzzStats {
    /// Operations generated.
    pub operations: u64,
    /// Box operations.
    pub boxes: u64,
    /// Delete operations.
    pub deletes: u64,
    /// Door operations.
    pub doors: u64,
    /// Observed events that changed the world.
    pub effective: u64,
    /// Observed events reporting a refused edit.
    pub refused: u64,
}

/// Pure system producing a reproducible stream of topology commands.
#[derive(Debug)]
pub struct Fuzzer {
    config: Config,
    rng: ChaCha8Rng,
    stats: FuzzStats,
}

impl Fuzzer {
    /// Creates a fuzzer seeded from `config.seed`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            stats: FuzzStats::default(),
        }
    }

    /// Totals gathered so far.
    #[must_use]
    pub fn stats(&self) -> FuzzStats {
        self.stats
    }

    /// Folds the events of the previous operation and emits the next one.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) -> Operation {
        for event in events {
            match event {
                Event::TopologyChanged { .. }
                | Event::DoorPlaced { .. }
                | Event::DoorRemoved { .. } => self.stats.effective += 1,
                Event::WallRejected { .. } | Event::DoorRejected { .. } => {
                    self.stats.refused += 1
                }
                Event::TimeAdvanced { .. } => {}
            }
        }

        let anchor = self.anchor();
        let steps = self.config.span_steps.max(1);
        let other = anchor.offset(
            self.rng.gen_range(0..steps) * self.config.span,
            self.rng.gen_range(0..steps) * self.config.span,
        );
        let operation = match self.rng.gen_range(0..5) {
            2 => Operation::DrawBox,
            0 | 4 => Operation::PlaceDoors,
            _ => Operation::Delete,
        };

        self.stats.operations += 1;
        match operation {
            Operation::DrawBox => {
                self.stats.boxes += 1;
                out.push(Command::DrawBox {
                    from: anchor,
                    to: other,
                });
            }
            Operation::Delete => {
                self.stats.deletes += 1;
                out.push(Command::DeleteWall { at: anchor });
                out.push(Command::DeleteWall { at: other });
            }
            Operation::PlaceDoors => {
                self.stats.doors += 1;
                out.push(Command::PlaceDoorNear { at: anchor });
                out.push(Command::PlaceDoorNear { at: other });
            }
        }
        operation
    }

    fn anchor(&mut self) -> Location {
        let lattice = self.config.lattice.max(1);
        let columns = (self.config.width / lattice).max(1);
        let rows = (self.config.height / lattice).max(1);
        Location::new(
            self.rng.gen_range(0..columns) * lattice,
            self.rng.gen_range(0..rows) * lattice,
        )
    }
}
