//! Simulation driver: fills a walled pen with wanderers and runs ticks.

use anyhow::{Context, Result};
use log::info;
use warren_core::{Command, Location};
use warren_system_wanderer::{scatter, Config, Tally};
use warren_world::query;

use crate::{config::SimulateSection, session::Session};

pub(crate) fn run(session: &mut Session, settings: SimulateSection) -> Result<()> {
    let (width, height) = (settings.width.max(1), settings.height.max(1));
    session
        .apply(Command::DrawBox {
            from: Location::new(-1, -1),
            to: Location::new(width, height),
        })
        .context("failed to wall in the pen")?;

    let tally = Tally::shared();
    let spawned = scatter(
        session.world_mut(),
        Location::new(0, 0),
        Location::new(width - 1, height - 1),
        settings.wanderers,
        Config::new(settings.period, settings.seed),
        &tally,
    );
    info!(
        "spawned {} of {} wanderers in a {width}x{height} pen on {} workers",
        spawned.len(),
        settings.wanderers,
        query::workers(session.world())
    );

    for tick in 1..=settings.ticks {
        session
            .apply(Command::Think)
            .with_context(|| format!("tick {tick} left the world inconsistent"))?;
        if settings.report_every > 0 && tick % settings.report_every == 0 {
            let stats = query::last_think(session.world());
            info!(
                "{}: {} actions in {} runs ({:?})",
                stats.tick, stats.actions, stats.runs, stats.elapsed
            );
        }
    }

    session.resurvey();
    let snapshot = tally.snapshot();
    info!(
        "wanderers: {} spawned, {} steps, {} blocked ({} by entities, {} by walls)",
        snapshot.spawned, snapshot.steps, snapshot.blocked, snapshot.touched, snapshot.hit_walls
    );
    println!("{}", session.census().report());
    Ok(())
}
