#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line driver for the Warren topology engine.

mod config;
mod fuzz;
mod replay_token;
mod session;
mod simulate;

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use warren_world::query;

use crate::{replay_token::ReplayToken, session::Session};

#[derive(Debug, Parser)]
#[command(
    name = "warren",
    about = "Fuzz, simulate and replay the incremental tile topology engine"
)]
struct Cli {
    /// TOML file with [world], [fuzz] and [simulate] tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Worker threads per tick; 0 picks the hardware parallelism.
    #[arg(long, global = true)]
    workers: Option<usize>,
    /// Check topology consistency after every operation.
    #[arg(long, global = true)]
    strict: bool,
    /// Add flood-fill sweeps to every consistency check.
    #[arg(long, global = true)]
    paranoid: bool,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Apply random topology edits until the budget runs out or a check fails
    Fuzz {
        /// Seed of the edit stream.
        #[arg(long)]
        seed: Option<u64>,
        /// Operations to run; 0 runs until a failure.
        #[arg(long)]
        operations: Option<u64>,
        /// Full consistency check every this many operations; 0 disables it.
        #[arg(long)]
        fsck_every: Option<u64>,
        /// Width of the area edits land in.
        #[arg(long)]
        width: Option<i64>,
        /// Height of the area edits land in.
        #[arg(long)]
        height: Option<i64>,
        /// Print a replay token for the whole run on success too.
        #[arg(long)]
        emit_token: bool,
    },
    /// Run ticks over a pen full of random walkers
    Simulate {
        /// Seed of placement and movement.
        #[arg(long)]
        seed: Option<u64>,
        /// Walkers to spawn.
        #[arg(long)]
        wanderers: Option<usize>,
        /// Ticks to run.
        #[arg(long)]
        ticks: Option<u64>,
        /// Ticks between two steps of one walker.
        #[arg(long)]
        period: Option<u64>,
        /// Ticks between progress lines; 0 only reports at the end.
        #[arg(long)]
        report_every: Option<u64>,
    },
    /// Re-apply the commands captured in a replay token
    Replay {
        /// Token printed by a previous run.
        token: Option<String>,
        /// Read the token from a file instead.
        #[arg(long = "file", conflicts_with = "token")]
        token_file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let file = config::load(cli.config.as_deref())?;
    let mut world = file.world;
    if let Some(workers) = cli.workers {
        world.workers = workers;
    }
    world.fsck_every_op |= cli.strict;
    world.paranoid |= cli.paranoid;
    let mut session = Session::new(world.to_world_config())?;

    match cli.mode {
        Mode::Fuzz {
            seed,
            operations,
            fsck_every,
            width,
            height,
            emit_token,
        } => {
            let mut settings = file.fuzz;
            settings.seed = seed.unwrap_or(settings.seed);
            settings.operations = operations.unwrap_or(settings.operations);
            settings.fsck_every = fsck_every.unwrap_or(settings.fsck_every);
            settings.width = width.unwrap_or(settings.width);
            settings.height = height.unwrap_or(settings.height);
            fuzz::run(&mut session, settings, emit_token)
        }
        Mode::Simulate {
            seed,
            wanderers,
            ticks,
            period,
            report_every,
        } => {
            let mut settings = file.simulate;
            settings.seed = seed.unwrap_or(settings.seed);
            settings.wanderers = wanderers.unwrap_or(settings.wanderers);
            settings.ticks = ticks.unwrap_or(settings.ticks);
            settings.period = period.unwrap_or(settings.period);
            settings.report_every = report_every.unwrap_or(settings.report_every);
            simulate::run(&mut session, settings)
        }
        Mode::Replay { token, token_file } => {
            let raw = match (token, token_file) {
                (Some(token), _) => token,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("failed to read token file {}", path.display()))?,
                (None, None) => bail!("replay needs a token or --file"),
            };
            replay(&mut session, &raw)
        }
    }
}

fn replay(session: &mut Session, raw: &str) -> Result<()> {
    let token = ReplayToken::decode(raw).context("failed to decode the replay token")?;
    info!("replaying {} commands", token.commands.len());
    for (index, command) in token.commands.into_iter().enumerate() {
        session
            .apply(command)
            .with_context(|| format!("command {index} ({command:?}) failed"))?;
    }
    session.fsck().context("replayed world failed the consistency check")?;
    session.resurvey();
    info!(
        "replay finished at {} with {} rooms and {} doors",
        query::now(session.world()),
        query::rooms(session.world()).len(),
        query::doors(session.world()).len()
    );
    println!("{}", session.census().report());
    Ok(())
}
