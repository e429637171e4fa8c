//! Tick scheduler.
//!
//! Actions due in a tick are bucketed by the x coordinate of the block they
//! were scheduled from. A bucket is a [`WorkUnit`]; contiguous units form a
//! run that one worker executes while the run and one unit on each side stay
//! locked, so no two workers ever touch neighbouring columns. Workers write
//! follow-up actions, spawns and kills into private accumulators that are
//! committed in column order once every unit is done.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{Mutex, PoisonError},
    thread,
    time::Instant,
};

use crossbeam_channel::unbounded;
use log::{debug, trace};
use warren_core::{EntityId, ThinkStats, Tick};

use crate::{
    entity::{ActionContext, ActionTag, Entity},
    World,
};

/// What a scheduled action does once it runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Spawned,
    Act(ActionTag),
}

/// One pending call into an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ScheduledAction {
    pub(crate) at: Tick,
    pub(crate) column: i32,
    pub(crate) entity: EntityId,
    pub(crate) action: Action,
}

#[derive(Debug)]
struct Pending {
    sequence: u64,
    action: ScheduledAction,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.action.at, self.sequence).cmp(&(other.action.at, other.sequence))
    }
}

/// Private output of one worker run.
pub(crate) struct Accumulator {
    tick: Tick,
    column: i32,
    open: bool,
    scheduled: Vec<ScheduledAction>,
    spawns: Vec<Box<dyn Entity>>,
    kills: Vec<EntityId>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            tick: Tick::default(),
            column: 0,
            open: false,
            scheduled: Vec::new(),
            spawns: Vec::new(),
            kills: Vec::new(),
        }
    }

    fn open(&mut self, tick: Tick, column: i32) {
        self.tick = tick;
        self.column = column;
        self.open = true;
    }

    fn close(&mut self) {
        assert!(self.open, "accumulator for column {} closed twice", self.column);
        self.open = false;
    }

    fn assert_writable(&self) {
        assert!(
            self.open,
            "write to the closed accumulator of column {}",
            self.column
        );
    }

    pub(crate) fn schedule(&mut self, action: ScheduledAction) {
        self.assert_writable();
        assert!(
            action.at > self.tick,
            "{} scheduled for {} while executing {}",
            action.entity,
            action.at,
            self.tick
        );
        self.scheduled.push(action);
    }

    pub(crate) fn spawn(&mut self, entity: Box<dyn Entity>) {
        self.assert_writable();
        self.spawns.push(entity);
    }

    pub(crate) fn kill(&mut self, id: EntityId) {
        self.assert_writable();
        self.kills.push(id);
    }
}

/// Actions of one column for the tick being executed.
#[derive(Debug)]
struct WorkUnit {
    column: i32,
    actions: Vec<ScheduledAction>,
    locked: bool,
    done: bool,
}

/// Appends `action` to the unit of its column, keeping units sorted.
fn bucket(units: &mut Vec<WorkUnit>, action: ScheduledAction) {
    match units.binary_search_by_key(&action.column, |unit| unit.column) {
        Ok(index) => units[index].actions.push(action),
        Err(index) => units.insert(
            index,
            WorkUnit {
                column: action.column,
                actions: vec![action],
                locked: false,
                done: false,
            },
        ),
    }
}

/// First startable run: unlocked, unfinished units whose outer neighbours are
/// unlocked, extended while the budget allows and the unit beyond stays free.
fn find_run(units: &[WorkUnit], budget: usize) -> Option<(usize, usize)> {
    let free = |index: usize| !units[index].locked && !units[index].done;
    let locked = |index: usize| units.get(index).is_some_and(|unit| unit.locked);
    for start in 0..units.len() {
        if !free(start) || (start > 0 && locked(start - 1)) || locked(start + 1) {
            continue;
        }
        let mut end = start;
        let mut cost = units[start].actions.len();
        while end + 1 < units.len()
            && free(end + 1)
            && !locked(end + 2)
            && cost + units[end + 1].actions.len() <= budget
        {
            end += 1;
            cost += units[end].actions.len();
        }
        return Some((start, end));
    }
    None
}

/// Locks a run and one unit on each side.
///
/// # Panics
///
/// Panics when a unit is already locked or a run unit already executed.
fn lock(units: &mut [WorkUnit], start: usize, end: usize) {
    for index in start.saturating_sub(1)..=(end + 1).min(units.len() - 1) {
        let unit = &mut units[index];
        assert!(!unit.locked, "work unit {} locked twice", unit.column);
        if (start..=end).contains(&index) {
            assert!(!unit.done, "work unit {} executed twice", unit.column);
        }
        unit.locked = true;
    }
}

fn finish(units: &mut [WorkUnit], start: usize, end: usize) {
    for index in start.saturating_sub(1)..=(end + 1).min(units.len() - 1) {
        units[index].locked = false;
    }
    for unit in &mut units[start..=end] {
        unit.done = true;
    }
}

/// Runs `actions` in order against `accumulator`.
fn execute(world: &World, actions: Vec<ScheduledAction>, accumulator: &mut Accumulator) {
    for scheduled in actions {
        let Some(cell) = world.entities.get(&scheduled.entity) else {
            continue;
        };
        let mut slot = cell.lock();
        let slot = &mut *slot;
        let mut cx = ActionContext::new(world, scheduled.entity, &mut slot.cursor, accumulator);
        match scheduled.action {
            Action::Spawned => slot.entity.spawned(&mut cx),
            Action::Act(tag) => slot.entity.act(tag, &mut cx),
        }
    }
    accumulator.close();
}

/// Time keeping and pending actions of a world.
pub(crate) struct Scheduler {
    now: Tick,
    sequence: u64,
    heap: BinaryHeap<Reverse<Pending>>,
    current: Vec<WorkUnit>,
    next: Vec<WorkUnit>,
    spare: Mutex<Vec<Accumulator>>,
    budget: usize,
    stats: ThinkStats,
}

impl Scheduler {
    pub(crate) fn new(budget: usize) -> Self {
        Self {
            now: Tick::default(),
            sequence: 0,
            heap: BinaryHeap::new(),
            current: Vec::new(),
            next: Vec::new(),
            spare: Mutex::new(Vec::new()),
            budget: budget.max(1),
            stats: ThinkStats::default(),
        }
    }

    pub(crate) const fn now(&self) -> Tick {
        self.now
    }

    pub(crate) const fn stats(&self) -> ThinkStats {
        self.stats
    }

    /// Queues an action for a future tick.
    ///
    /// # Panics
    ///
    /// Panics when `action.at` is not after the current tick.
    pub(crate) fn push(&mut self, action: ScheduledAction) {
        assert!(
            action.at > self.now,
            "{} scheduled for {} at {}",
            action.entity,
            action.at,
            self.now
        );
        if action.at == self.now.next() {
            bucket(&mut self.next, action);
            return;
        }
        self.sequence += 1;
        self.heap.push(Reverse(Pending {
            sequence: self.sequence,
            action,
        }));
    }

    /// Number of actions waiting for future ticks.
    pub(crate) fn pending(&self) -> usize {
        self.heap.len() + self.next.iter().map(|unit| unit.actions.len()).sum::<usize>()
    }

    fn take_accumulator(&self, tick: Tick, column: i32) -> Accumulator {
        let mut accumulator = self
            .spare
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(Accumulator::new);
        accumulator.open(tick, column);
        accumulator
    }

    /// Moves the next tick's actions into the current buffer.
    fn buffer(&mut self) -> Tick {
        self.now = self.now.next();
        mem::swap(&mut self.current, &mut self.next);
        while let Some(Reverse(pending)) = self.heap.peek() {
            if pending.action.at > self.now {
                break;
            }
            if let Some(Reverse(pending)) = self.heap.pop() {
                bucket(&mut self.current, pending.action);
            }
        }
        self.now
    }
}

impl World {
    /// Executes one tick and returns its statistics.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from any entity action, and panics on scheduling
    /// violations.
    pub fn think(&mut self) -> ThinkStats {
        let started = Instant::now();
        let tick = self.scheduler.buffer();
        let mut units = mem::take(&mut self.scheduler.current);
        let actions = units.iter().map(|unit| unit.actions.len()).sum();

        let (accumulators, runs) = self.dispatch(tick, &mut units);

        units.clear();
        self.scheduler.current = units;
        self.commit(accumulators);

        let stats = ThinkStats {
            tick,
            actions,
            runs,
            workers: self.workers,
            elapsed: started.elapsed(),
        };
        trace!("{tick}: {actions} actions in {runs} runs");
        self.scheduler.stats = stats;
        stats
    }

    fn dispatch(&self, tick: Tick, units: &mut [WorkUnit]) -> (Vec<Accumulator>, usize) {
        let mut accumulators = Vec::new();
        let mut runs = 0;
        let budget = self.scheduler.budget;

        let Some(pool) = self.pool.as_ref() else {
            while let Some((start, end)) = find_run(units, budget) {
                lock(units, start, end);
                let mut accumulator = self.scheduler.take_accumulator(tick, units[start].column);
                let actions = units[start..=end]
                    .iter_mut()
                    .flat_map(|unit| mem::take(&mut unit.actions))
                    .collect();
                execute(self, actions, &mut accumulator);
                finish(units, start, end);
                accumulators.push(accumulator);
                runs += 1;
            }
            return (accumulators, runs);
        };

        let (sender, receiver) = unbounded();
        let mut failure = None;
        pool.in_place_scope(|scope| {
            let mut in_flight = 0;
            loop {
                while let Some((start, end)) = find_run(units, budget) {
                    lock(units, start, end);
                    let mut accumulator =
                        self.scheduler.take_accumulator(tick, units[start].column);
                    let actions: Vec<_> = units[start..=end]
                        .iter_mut()
                        .flat_map(|unit| mem::take(&mut unit.actions))
                        .collect();
                    let sender = sender.clone();
                    scope.spawn(move |_| {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            execute(self, actions, &mut accumulator);
                        }));
                        let _ = sender.send((start, end, accumulator, outcome));
                    });
                    in_flight += 1;
                    runs += 1;
                }
                if in_flight == 0 {
                    break;
                }
                let Ok((start, end, accumulator, outcome)) = receiver.recv() else {
                    break;
                };
                in_flight -= 1;
                finish(units, start, end);
                accumulators.push(accumulator);
                if let (Err(payload), None) = (outcome, &failure) {
                    failure = Some(payload);
                }
            }
        });
        if let Some(payload) = failure {
            panic::resume_unwind(payload);
        }
        debug_assert!(units.iter().all(|unit| unit.done || unit.actions.is_empty()));
        (accumulators, runs)
    }

    /// Merges worker output in column order.
    ///
    /// # Panics
    ///
    /// Panics when an accumulator is still open.
    fn commit(&mut self, mut accumulators: Vec<Accumulator>) {
        accumulators.sort_by_key(|accumulator| accumulator.column);
        for accumulator in &mut accumulators {
            assert!(
                !accumulator.open,
                "committing the open accumulator of column {}",
                accumulator.column
            );
            for action in mem::take(&mut accumulator.scheduled) {
                self.scheduler.push(action);
            }
        }
        for accumulator in &mut accumulators {
            for entity in mem::take(&mut accumulator.spawns) {
                if self.spawn(entity).is_none() {
                    debug!("{}: deferred spawn dropped", self.now());
                }
            }
        }
        for accumulator in &mut accumulators {
            for id in mem::take(&mut accumulator.kills) {
                let _ = self.despawn(id);
            }
        }
        let mut spare = self
            .scheduler
            .spare
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        spare.extend(accumulators);
    }
}

/// Number of hardware threads, used when a configuration asks for "all".
pub(crate) fn available_workers() -> usize {
    thread::available_parallelism().map_or(1, usize::from)
}
