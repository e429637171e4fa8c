#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic census system folding world events into running statistics.

use std::{fmt, time::Duration};

use warren_core::{Event, Tick};

/// Gauges read from the world on demand; only the caller can compute them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Survey {
    /// Registered rooms.
    pub rooms: usize,
    /// Registered doors.
    pub doors: usize,
    /// Wall tiles.
    pub walls: usize,
    /// Live entities.
    pub entities: usize,
    /// Area of the largest room.
    pub largest_room: usize,
}

/// Counters accumulated from every event seen so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Topology edits that changed at least one tile.
    pub topology_changes: u64,
    /// Sum of touched block counts over all topology edits.
    pub touched_blocks: u64,
    /// Wall placements refused by the world.
    pub walls_rejected: u64,
    /// Doors placed.
    pub doors_placed: u64,
    /// Door placements with no matching footprint.
    pub doors_rejected: u64,
    /// Doors removed explicitly.
    pub doors_removed: u64,
    /// Ticks executed.
    pub ticks: u64,
    /// Actions executed over all ticks.
    pub actions: u64,
    /// Column runs dispatched over all ticks.
    pub runs: u64,
}

/// Everything the census knows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CensusReport {
    /// Event counters.
    pub counters: Counters,
    /// Tick with the most actions and its action count.
    pub busiest_tick: Option<(Tick, usize)>,
    /// Wall-clock time spent inside ticks.
    pub think_time: Duration,
    /// Most recent survey, if the world was ever surveyed.
    pub survey: Option<Survey>,
}

impl CensusReport {
    /// Average number of actions per tick.
    #[must_use]
    pub fn actions_per_tick(&self) -> f64 {
        if self.counters.ticks == 0 {
            return 0.0;
        }
        self.counters.actions as f64 / self.counters.ticks as f64
    }

    /// Actions executed per second of tick time.
    #[must_use]
    pub fn actions_per_second(&self) -> f64 {
        let seconds = self.think_time.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.counters.actions as f64 / seconds
    }
}

impl fmt::Display for CensusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counters = &self.counters;
        write!(
            f,
            "{} edits over {} blocks, {} walls rejected, doors +{} -{} ({} rejected)",
            counters.topology_changes,
            counters.touched_blocks,
            counters.walls_rejected,
            counters.doors_placed,
            counters.doors_removed,
            counters.doors_rejected,
        )?;
        if counters.ticks > 0 {
            write!(
                f,
                "; {} ticks, {} actions ({:.1}/tick, {:.0}/s)",
                counters.ticks,
                counters.actions,
                self.actions_per_tick(),
                self.actions_per_second(),
            )?;
        }
        if let Some(survey) = &self.survey {
            write!(
                f,
                "; {} rooms (largest {}), {} doors, {} walls, {} entities",
                survey.rooms, survey.largest_room, survey.doors, survey.walls, survey.entities,
            )?;
        }
        Ok(())
    }
}

/// Pure system counting events and resurveying the world after layout changes.
#[derive(Debug, Default)]
pub struct Census {
    report: CensusReport,
    layout_dirty: bool,
}

impl Census {
    /// Creates a census with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the report accumulated so far.
    #[must_use]
    pub fn report(&self) -> &CensusReport {
        &self.report
    }

    /// Folds `events` into the counters.
    ///
    /// The `survey` closure is invoked at most once per non-empty batch, and
    /// only when the layout changed since the previous survey or the world was
    /// never surveyed.
    pub fn handle<F>(&mut self, events: &[Event], mut survey: F)
    where
        F: FnMut() -> Survey,
    {
        let mut observed = false;
        for event in events {
            observed = true;
            self.record(event);
        }

        if !observed {
            return;
        }
        if self.layout_dirty || self.report.survey.is_none() {
            self.report.survey = Some(survey());
            self.layout_dirty = false;
        }
    }

    /// Recomputes the gauges immediately.
    ///
    /// Entity counts change without any layout event, so drivers call this
    /// when they want fresh gauges after a run of ticks.
    pub fn resurvey<F>(&mut self, survey: F)
    where
        F: FnOnce() -> Survey,
    {
        self.report.survey = Some(survey());
        self.layout_dirty = false;
    }

    fn record(&mut self, event: &Event) {
        let counters = &mut self.report.counters;
        match event {
            Event::TopologyChanged { touched } => {
                counters.topology_changes += 1;
                counters.touched_blocks += touched.len() as u64;
                self.layout_dirty = true;
            }
            Event::WallRejected { .. } => counters.walls_rejected += 1,
            Event::DoorPlaced { touched, .. } => {
                counters.doors_placed += 1;
                counters.touched_blocks += touched.len() as u64;
                self.layout_dirty = true;
            }
            Event::DoorRejected { .. } => counters.doors_rejected += 1,
            Event::DoorRemoved { touched, .. } => {
                counters.doors_removed += 1;
                counters.touched_blocks += touched.len() as u64;
                self.layout_dirty = true;
            }
            Event::TimeAdvanced { stats } => {
                counters.ticks += 1;
                counters.actions += stats.actions as u64;
                counters.runs += stats.runs as u64;
                self.report.think_time += stats.elapsed;
                let busier = match self.report.busiest_tick {
                    Some((_, actions)) => stats.actions > actions,
                    None => true,
                };
                if busier {
                    self.report.busiest_tick = Some((stats.tick, stats.actions));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_core::{Location, ModMap, ThinkStats};

    fn tick(tick: u64, actions: usize) -> Event {
        Event::TimeAdvanced {
            stats: ThinkStats {
                tick: Tick::new(tick),
                actions,
                runs: 1,
                workers: 1,
                elapsed: Duration::from_millis(2),
            },
        }
    }

    #[test]
    fn busiest_tick_keeps_the_first_maximum() {
        let mut census = Census::new();
        census.handle(&[tick(1, 3), tick(2, 9), tick(3, 9), tick(4, 1)], Survey::default);
        let report = census.report();
        assert_eq!(report.busiest_tick, Some((Tick::new(2), 9)));
        assert_eq!(report.counters.ticks, 4);
        assert_eq!(report.counters.actions, 22);
        assert_eq!(report.think_time, Duration::from_millis(8));
        assert!((report.actions_per_tick() - 5.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rejections_do_not_dirty_the_layout() {
        let mut census = Census::new();
        let mut surveys = 0;
        let mut touched = ModMap::new();
        touched.add_location(Location::new(0, 0));
        census.handle(&[Event::TopologyChanged { touched }], || {
            surveys += 1;
            Survey::default()
        });
        census.handle(
            &[
                Event::WallRejected {
                    at: Location::new(1, 1),
                },
                Event::DoorRejected {
                    at: Location::new(2, 2),
                },
            ],
            || {
                surveys += 1;
                Survey::default()
            },
        );
        assert_eq!(surveys, 1);
        assert_eq!(census.report().counters.walls_rejected, 1);
        assert_eq!(census.report().counters.doors_rejected, 1);
    }

    #[test]
    fn resurvey_replaces_stale_gauges() {
        let mut census = Census::new();
        census.handle(&[tick(1, 0)], Survey::default);
        census.resurvey(|| Survey {
            entities: 7,
            ..Survey::default()
        });
        assert_eq!(census.report().survey.map(|survey| survey.entities), Some(7));
    }

    #[test]
    fn empty_batches_are_ignored() {
        let mut census = Census::new();
        census.handle(&[], || panic!("nothing to survey"));
        assert_eq!(census.report(), &CensusReport::default());
    }

    #[test]
    fn report_renders_survey() {
        let report = CensusReport {
            survey: Some(Survey {
                rooms: 2,
                doors: 1,
                walls: 40,
                entities: 0,
                largest_room: 64,
            }),
            ..CensusReport::default()
        };
        let rendered = report.to_string();
        assert!(rendered.contains("2 rooms (largest 64)"), "{rendered}");
        assert!(!rendered.contains("ticks"), "{rendered}");
    }
}
