//! Fuzzing driver: applies generated edits until the budget runs out or the
//! topology breaks, then prints a replay token for the failing run.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use warren_core::Event;
use warren_system_fuzzer::Fuzzer;
use warren_world::{query, TopologyError};

use crate::{config::FuzzSection, session::Session};

pub(crate) fn run(session: &mut Session, settings: FuzzSection, emit_token: bool) -> Result<()> {
    let generator = settings.generator();
    info!(
        "fuzzer running with seed {} over {}x{} (lattice {}, span {})",
        generator.seed, generator.width, generator.height, generator.lattice, generator.span
    );
    let mut fuzzer = Fuzzer::new(generator);
    let status_interval = Duration::from_secs(settings.status_interval.max(1));
    let mut last_status = Instant::now();
    let mut last_operations = 0;
    let mut commands = Vec::new();
    let mut events: Vec<Event> = Vec::new();
    let mut operations = 0;

    while settings.operations == 0 || operations < settings.operations {
        commands.clear();
        let operation = fuzzer.handle(&events, &mut commands);
        events.clear();
        operations += 1;
        debug!("operation {operations}: {operation:?} {commands:?}");

        for &command in &commands {
            if let Err(failure) = session.apply(command) {
                return Err(report_failure(session, operations, failure));
            }
            events.extend_from_slice(session.events());
        }

        if settings.fsck_every > 0 && operations % settings.fsck_every == 0 {
            if let Err(failure) = session.fsck() {
                return Err(report_failure(session, operations, failure));
            }
        }

        let elapsed = last_status.elapsed();
        if elapsed >= status_interval {
            let counts = query::operation_counts(session.world());
            info!(
                "{:.2} fuzz op/sec {} adds {} deletes",
                (operations - last_operations) as f64 / elapsed.as_secs_f64(),
                counts.walls_added,
                counts.walls_deleted
            );
            last_status = Instant::now();
            last_operations = operations;
        }
    }

    session
        .fsck()
        .map_err(|failure| report_failure(session, operations, failure))?;
    let stats = fuzzer.stats();
    info!(
        "fuzzer exiting after {operations} operations ({} boxes, {} deletes, {} doors; {} effective, {} refused)",
        stats.boxes, stats.deletes, stats.doors, stats.effective, stats.refused
    );
    info!("{}", session.census().report());
    if emit_token {
        let token = session.token().context("failed to encode the replay token")?;
        println!("{token}");
    }
    Ok(())
}

fn report_failure(session: &Session, operations: u64, failure: TopologyError) -> anyhow::Error {
    error!("fuzzer exiting with error after {operations} operations: {failure}");
    for at in failure.locations() {
        error!("  offending tile {at}");
    }
    match session.token() {
        Ok(token) => {
            error!("reproduce with: warren replay {token}");
            println!("{token}");
        }
        Err(encoding) => warn!("could not encode a replay token: {encoding}"),
    }
    anyhow::Error::new(failure).context(format!(
        "topology became inconsistent after {operations} fuzz operations"
    ))
}
