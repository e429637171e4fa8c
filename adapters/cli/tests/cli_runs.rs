use std::{
    fs,
    process::{Command, Output},
};

fn warren(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_warren"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to launch warren")
}

fn stdout_token(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find(|line| line.starts_with("warren:v1:"))
        .expect("run printed a replay token")
        .to_owned()
}

#[test]
fn strict_fuzz_run_replays_cleanly() {
    let fuzzed = warren(&[
        "fuzz",
        "--strict",
        "--seed",
        "5",
        "--operations",
        "150",
        "--width",
        "360",
        "--height",
        "360",
        "--emit-token",
    ]);
    assert!(fuzzed.status.success(), "{fuzzed:?}");
    let token = stdout_token(&fuzzed);

    let replayed = warren(&["replay", "--strict", &token]);
    assert!(replayed.status.success(), "{replayed:?}");
    let report = String::from_utf8_lossy(&replayed.stdout);
    assert!(report.contains("rooms"), "{report}");
}

#[test]
fn replay_reads_tokens_from_files() {
    let fuzzed = warren(&[
        "fuzz",
        "--seed",
        "8",
        "--operations",
        "40",
        "--emit-token",
    ]);
    assert!(fuzzed.status.success(), "{fuzzed:?}");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("run.token");
    fs::write(&path, format!("{}\n", stdout_token(&fuzzed))).expect("write token");
    let replayed = warren(&["replay", "--file", path.to_str().expect("utf-8 path")]);
    assert!(replayed.status.success(), "{replayed:?}");
}

#[test]
fn malformed_tokens_fail() {
    let output = warren(&["replay", "warren:v9:AAAA"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("version 'v9'"), "{stderr}");
}

#[test]
fn simulation_reads_the_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("warren.toml");
    fs::write(
        &path,
        "[world]\nworkers = 2\n\n[simulate]\nwanderers = 50\nticks = 20\nwidth = 64\nheight = 32\nreport_every = 0\n",
    )
    .expect("write config");

    let output = warren(&["simulate", "--config", path.to_str().expect("utf-8 path")]);
    assert!(output.status.success(), "{output:?}");
    let report = String::from_utf8_lossy(&output.stdout);
    assert!(report.contains("20 ticks"), "{report}");
    assert!(report.contains("50 entities"), "{report}");
}

#[test]
fn unknown_config_keys_fail() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("warren.toml");
    fs::write(&path, "[world]\nthreads = 2\n").expect("write config");
    let output = warren(&["simulate", "--config", path.to_str().expect("utf-8 path")]);
    assert!(!output.status.success());
}

#[test]
fn help_lists_every_mode() {
    let output = warren(&["--help"]);
    assert!(output.status.success(), "{output:?}");
    let help = String::from_utf8_lossy(&output.stdout);
    for mode in ["fuzz", "simulate", "replay"] {
        assert!(help.contains(mode), "{help}");
    }
}
