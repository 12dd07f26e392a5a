use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pins]
# pins are unused in sim backend but must be present
sensors = [17, 27, 22, 23, 24]
left_forward = 12
left_backward = 13
right_forward = 18
right_backward = 19
# required when odometry is enabled
encoder_left = 5
encoder_right = 6

[runner]
tick_hz = 100

[odometry]
# exercised in sim through synthetic encoder pulses
enabled = true
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn last_json_line(bytes: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(bytes);
    let line = text
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .unwrap_or("")
        .to_string();
    assert!(!line.is_empty(), "no JSON line found in: {text}");
    serde_json::from_str(&line).expect("valid JSON")
}

/// Validate the JSON summary of a completed run.
#[rstest]
fn json_run_summary_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("tracer").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--max-ticks")
        .arg("120");

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = last_json_line(&out);

    assert!(v.get("state").and_then(|x| x.as_str()).is_some());
    assert_eq!(v.get("reason").and_then(|x| x.as_str()), Some("MaxTicks"));
    assert_eq!(v.get("ticks").and_then(|x| x.as_u64()), Some(120));
    assert!(v.get("elapsed_ms").and_then(|x| x.as_u64()).is_some());
    assert_eq!(v.get("base_speed").and_then(|x| x.as_i64()), Some(150));
}

/// A run that ends in LOST still prints a summary, then exits 3.
#[rstest]
fn json_lost_summary_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let script = dir.path().join("blank.txt");
    fs::write(&script, "00000\n").unwrap();

    let mut cmd = Command::cargo_bin("tracer").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--script")
        .arg(&script)
        .arg("--stop-on-lost");

    let out = cmd.assert().code(3).get_output().stdout.clone();
    let v = last_json_line(&out);
    assert_eq!(v.get("state").and_then(|x| x.as_str()), Some("LOST"));
    assert_eq!(v.get("reason").and_then(|x| x.as_str()), Some("Lost"));
}

/// Errors under --json are a single object with a reason and a humanized message.
#[rstest]
fn json_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("broken.toml");
    fs::write(&cfg, "[runner\n").unwrap();

    let mut cmd = Command::cargo_bin("tracer").unwrap();
    cmd.arg("--json").arg("--config").arg(&cfg).arg("health");

    let err = cmd.assert().code(1).get_output().stderr.clone();
    let v = last_json_line(&err);
    assert_eq!(v.get("reason").and_then(|x| x.as_str()), Some("Config"));
    let msg = v.get("message").and_then(|x| x.as_str()).unwrap_or("");
    assert!(msg.starts_with("What happened:"), "{msg}");
}
