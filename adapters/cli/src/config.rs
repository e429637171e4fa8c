//! Optional TOML configuration file; command-line flags override its values.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use warren_system_fuzzer::Config as FuzzerConfig;
use warren_world::{Strictness, WorldConfig, DEFAULT_ACTION_BUDGET};

/// Contents of a configuration file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) world: WorldSection,
    pub(crate) fuzz: FuzzSection,
    pub(crate) simulate: SimulateSection,
}

/// `[world]` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct WorldSection {
    pub(crate) workers: usize,
    pub(crate) action_budget: usize,
    pub(crate) fsck_every_op: bool,
    pub(crate) paranoid: bool,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            workers: 1,
            action_budget: DEFAULT_ACTION_BUDGET,
            fsck_every_op: false,
            paranoid: false,
        }
    }
}

impl WorldSection {
    pub(crate) fn to_world_config(self) -> WorldConfig {
        WorldConfig {
            workers: self.workers,
            action_budget: self.action_budget,
            strictness: Strictness {
                fsck_every_op: self.fsck_every_op,
                paranoid: self.paranoid,
            },
        }
    }
}

/// `[fuzz]` table; the generator parameters sit beside the run length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FuzzSection {
    /// Operations to run; zero runs until a failure.
    pub(crate) operations: u64,
    /// Full consistency check every this many operations; zero disables it.
    pub(crate) fsck_every: u64,
    /// Seconds between progress lines.
    pub(crate) status_interval: u64,
    pub(crate) seed: u64,
    pub(crate) width: i64,
    pub(crate) height: i64,
    pub(crate) lattice: i64,
    pub(crate) span: i64,
    pub(crate) span_steps: i64,
}

impl Default for FuzzSection {
    fn default() -> Self {
        let generator = FuzzerConfig::default();
        Self {
            operations: 10_000,
            fsck_every: 1_000,
            status_interval: 10,
            seed: generator.seed,
            width: generator.width,
            height: generator.height,
            lattice: generator.lattice,
            span: generator.span,
            span_steps: generator.span_steps,
        }
    }
}

impl FuzzSection {
    pub(crate) fn generator(&self) -> FuzzerConfig {
        FuzzerConfig {
            seed: self.seed,
            width: self.width,
            height: self.height,
            lattice: self.lattice,
            span: self.span,
            span_steps: self.span_steps,
        }
    }
}

/// `[simulate]` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SimulateSection {
    pub(crate) seed: u64,
    pub(crate) wanderers: usize,
    pub(crate) ticks: u64,
    pub(crate) width: i64,
    pub(crate) height: i64,
    /// Ticks between two steps of one wanderer.
    pub(crate) period: u64,
    /// Ticks between progress lines; zero only reports at the end.
    pub(crate) report_every: u64,
}

impl Default for SimulateSection {
    fn default() -> Self {
        Self {
            seed: 0,
            wanderers: 10_000,
            ticks: 1_000,
            width: 384,
            height: 216,
            period: 1,
            report_every: 100,
        }
    }
}

/// Reads `path`, or returns the defaults when no file was given.
pub(crate) fn load(path: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid config file {}", path.display()))
}

fn parse(contents: &str) -> Result<FileConfig> {
    toml::from_str(contents).context("failed to parse config toml contents")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let config = parse("[world]\nworkers = 4\n").expect("valid");
        assert_eq!(config.world.workers, 4);
        assert_eq!(config.world.action_budget, DEFAULT_ACTION_BUDGET);
        assert_eq!(config.fuzz, FuzzSection::default());
        assert_eq!(config.simulate, SimulateSection::default());
    }

    #[test]
    fn fuzz_table_mixes_run_and_generator_keys() {
        let config = parse(
            "[fuzz]\noperations = 50\nseed = 9\nwidth = 360\nlattice = 45\n",
        )
        .expect("valid");
        assert_eq!(config.fuzz.operations, 50);
        assert_eq!(config.fuzz.fsck_every, 1_000);
        let generator = config.fuzz.generator();
        assert_eq!(generator.seed, 9);
        assert_eq!(generator.width, 360);
        assert_eq!(generator.lattice, 45);
        assert_eq!(generator.span, 30);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse("[world]\nthreads = 4\n").is_err());
        assert!(parse("[render]\nscale = 2\n").is_err());
    }

    #[test]
    fn strictness_maps_onto_world_config() {
        let config = parse("[world]\nfsck_every_op = true\nparanoid = true\n").expect("valid");
        let world = config.world.to_world_config();
        assert!(world.strictness.fsck_every_op);
        assert!(world.strictness.paranoid);
        assert_eq!(world.workers, 1);
    }

    #[test]
    fn load_reads_files_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("warren.toml");
        fs::write(&path, "[simulate]\nwanderers = 12\n").expect("write config");
        let config = load(Some(&path)).expect("loads");
        assert_eq!(config.simulate.wanderers, 12);
        assert!(load(Some(&dir.path().join("missing.toml"))).is_err());
        assert_eq!(load(None).expect("defaults"), FileConfig::default());
    }
}
