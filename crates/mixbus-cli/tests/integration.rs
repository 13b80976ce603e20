//! Integration tests for mixbus-cli.
//!
//! Tests invoke the built binary and check its output and exit status.

use std::path::Path;
use std::process::Command;

use mixbus_config::{ChannelConfig, EffectConfig, Project};

/// Helper to get the path to the `mixbus` binary built by cargo.
fn mixbus_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mixbus"))
}

fn new_project(path: &Path) {
    let output = mixbus_bin()
        .arg("new")
        .arg(path)
        .output()
        .expect("failed to run mixbus new");
    assert!(
        output.status.success(),
        "mixbus new failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

// ---------------------------------------------------------------------------
// `mixbus effects`
// ---------------------------------------------------------------------------

#[test]
fn cli_effects_lists_effects_and_instruments() {
    let output = mixbus_bin()
        .arg("effects")
        .output()
        .expect("failed to run mixbus effects");
    assert!(output.status.success(), "mixbus effects failed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Available Effects"));
    for id in ["amp", "delay", "filter", "distortion", "tone"] {
        assert!(stdout.contains(id), "effects list should mention '{id}'");
    }
}

#[test]
fn cli_effects_shows_parameter_table() {
    let output = mixbus_bin()
        .args(["effects", "delay"])
        .output()
        .expect("failed to run mixbus effects delay");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Parameters:"));
    assert!(stdout.contains("feedback"));
    assert!(stdout.contains("type = \"delay\""));
}

#[test]
fn cli_effects_unknown_id_fails() {
    let output = mixbus_bin()
        .args(["effects", "theremin"])
        .output()
        .expect("failed to run mixbus effects");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown effect"));
}

// ---------------------------------------------------------------------------
// `mixbus new` / `check` / `render`
// ---------------------------------------------------------------------------

#[test]
fn cli_new_check_render_workflow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().join("song.toml");
    let wav = dir.path().join("song.wav");
    new_project(&project);

    let check = mixbus_bin()
        .arg("check")
        .arg(&project)
        .output()
        .expect("failed to run mixbus check");
    assert!(check.status.success(), "starter project should validate");
    let stdout = String::from_utf8_lossy(&check.stdout);
    assert!(stdout.contains("OK"));
    assert!(stdout.contains("Keys (ch1)"));

    let render = mixbus_bin()
        .arg("render")
        .arg(&project)
        .arg(&wav)
        .args(["--seconds", "0.5", "--bit-depth", "16"])
        .output()
        .expect("failed to run mixbus render");
    assert!(
        render.status.success(),
        "render failed: {}",
        String::from_utf8_lossy(&render.stderr)
    );

    let info = mixbus_io::read_wav_info(&wav).expect("rendered file is a WAV");
    assert_eq!(info.spec.channels, 2);
    assert_eq!(info.spec.bits_per_sample, 16);
    assert_eq!(info.frames, u64::from(info.spec.sample_rate) / 2);
}

#[test]
fn cli_render_defaults_to_one_loop_pass() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().join("loop.toml");
    let wav = dir.path().join("loop.wav");
    new_project(&project);

    let output = mixbus_bin()
        .arg("render")
        .arg(&project)
        .arg(&wav)
        .args(["--sample-rate", "48000"])
        .output()
        .expect("failed to run mixbus render");
    assert!(output.status.success());

    // Starter loop is 192 ticks: two seconds at 120 bpm.
    let info = mixbus_io::read_wav_info(&wav).expect("wav");
    assert_eq!(info.frames, 96_000);
}

#[test]
fn cli_render_rejects_odd_bit_depth() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().join("song.toml");
    new_project(&project);

    let output = mixbus_bin()
        .arg("render")
        .arg(&project)
        .arg(dir.path().join("out.wav"))
        .args(["--bit-depth", "12"])
        .output()
        .expect("failed to run mixbus render");
    assert!(!output.status.success());
    assert!(!dir.path().join("out.wav").exists());
}

#[test]
fn cli_check_reports_unknown_effect() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    let mut project = Project::new("broken");
    project
        .channels
        .push(ChannelConfig::new(1, "Fx").with_send(0, 1.0).with_effect(EffectConfig::new("theremin")));
    project.save(&path).expect("save");

    let output = mixbus_bin()
        .arg("check")
        .arg(&path)
        .output()
        .expect("failed to run mixbus check");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("theremin"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 problem(s) found"));
}

#[test]
fn cli_check_json_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().join("song.toml");
    new_project(&project);

    let output = mixbus_bin()
        .arg("check")
        .arg(&project)
        .arg("--json")
        .output()
        .expect("failed to run mixbus check --json");
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("check --json prints JSON");
    assert_eq!(report["name"], "song");
    assert_eq!(report["valid"], true);
    let order = report["render_order"].as_array().expect("render_order array");
    assert_eq!(order.last().and_then(|v| v.as_str()), Some("Master (ch0)"));
}

#[test]
fn cli_new_refuses_to_overwrite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().join("song.toml");
    new_project(&project);

    let again = mixbus_bin()
        .arg("new")
        .arg(&project)
        .output()
        .expect("failed to run mixbus new");
    assert!(!again.status.success());

    let forced = mixbus_bin()
        .arg("new")
        .arg(&project)
        .args(["--force", "--name", "renamed"])
        .output()
        .expect("failed to run mixbus new --force");
    assert!(forced.status.success());
    let loaded = Project::load(&project).expect("load");
    assert_eq!(loaded.name, "renamed");
}

#[test]
fn cli_missing_project_fails() {
    let output = mixbus_bin()
        .args(["check", "no-such-project-anywhere"])
        .output()
        .expect("failed to run mixbus check");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

// ---------------------------------------------------------------------------
// `mixbus play`
// ---------------------------------------------------------------------------

#[test]
fn cli_play_on_null_backend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().join("song.toml");
    new_project(&project);

    let output = mixbus_bin()
        .arg("play")
        .arg(&project)
        .args(["--null", "--seconds", "0.2"])
        .output()
        .expect("failed to run mixbus play");
    assert!(
        output.status.success(),
        "play failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Backend: null"));
    assert!(stdout.contains("Stopped."));
}
