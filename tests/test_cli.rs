// CLI integration tests for parse-overlay

use std::io::Write;
use std::process::Command;

use parse_overlay::config::{OverlaySettings, parse_settings};

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_parse-overlay"))
}

/// Test that --help lists the subcommands
#[test]
fn test_help_flag_shows_subcommands() {
    let output = bin().arg("--help").output().expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Help should exit with success");
    assert!(
        stdout.contains("replay") && stdout.contains("config"),
        "Help should list subcommands. Got: {}",
        stdout
    );
}

/// Test that `config init` prints settings that load back to the defaults
#[test]
fn test_config_init_round_trips_through_loader() {
    let output = bin()
        .args(["config", "init"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("retryDelayMs"), "Got: {}", stdout);

    let settings = parse_settings(&stdout).expect("generated config should load");
    assert_eq!(settings.readiness, OverlaySettings::default().readiness);
}

/// Test that `config path` honours an explicit --config
#[test]
fn test_config_path_prefers_explicit_flag() {
    let output = bin()
        .args(["--config", "/tmp/custom-overlay.toml", "config", "path"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "/tmp/custom-overlay.toml"
    );
}

/// Test that replay prints the final region states
#[test]
fn test_replay_reports_finished_regions() {
    let mut trace = tempfile::NamedTempFile::new().unwrap();
    write!(
        trace,
        r#"{{
            "profile": "static",
            "latencyMs": 5,
            "regions": [{{ "id": 1, "blocks": [["．．．test"]] }}],
            "steps": [{{ "visible": [1] }}, {{ "waitMs": 50 }}]
        }}"#
    )
    .unwrap();

    let output = bin()
        .arg("replay")
        .arg(trace.path())
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["started"], true);
    assert_eq!(report["regions"][0]["text"][0][0], "…test");
    assert_eq!(report["regions"][0]["tints"][1], "neutral");
    assert_eq!(report["regions"][0]["retired"], true);
}

/// Test that a malformed trace is rejected with an error
#[test]
fn test_replay_rejects_malformed_trace() {
    let mut trace = tempfile::NamedTempFile::new().unwrap();
    write!(trace, "not json").unwrap();

    let output = bin()
        .arg("replay")
        .arg(trace.path())
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}

/// Test that an invalid settings file stops the replay before it starts
#[test]
fn test_replay_rejects_invalid_settings() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[readiness]\nretryDelayMs = 0").unwrap();

    let output = bin()
        .arg("--config")
        .arg(config.path())
        .args(["replay", "/nonexistent/trace.json"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("retryDelayMs"));
}
