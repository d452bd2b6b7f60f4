//! End-to-end tests for torsionctl over the simulated bench.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn torsionctl(config: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("torsionctl")?;
    cmd.env_remove("TORSIONCTL_CONFIG")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config);
    Ok(cmd)
}

fn json_stdout(output: &std::process::Output) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

/// A default config file in a fresh directory.
fn workspace() -> Result<(TempDir, PathBuf), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("torsion.json");
    torsionctl(&config)?.args(["config", "init"]).assert().success();
    Ok((dir, config))
}

mod config {
    use super::*;

    #[test]
    fn init_writes_a_valid_file() -> TestResult {
        let (_dir, config) = workspace()?;
        assert!(config.is_file());
        torsionctl(&config)?
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("is valid"));
        Ok(())
    }

    #[test]
    fn init_refuses_to_overwrite() -> TestResult {
        let (_dir, config) = workspace()?;
        torsionctl(&config)?
            .args(["config", "init"])
            .assert()
            .code(4)
            .stderr(predicate::str::contains("--force"));
        torsionctl(&config)?
            .args(["config", "init", "--force"])
            .assert()
            .success();
        Ok(())
    }

    #[test]
    fn show_without_file_prints_defaults_and_writes_nothing() -> TestResult {
        let dir = tempfile::tempdir()?;
        let config = dir.path().join("absent.json");
        let output = torsionctl(&config)?
            .args(["--json", "config", "show"])
            .output()?;
        assert!(output.status.success());
        let value = json_stdout(&output)?;
        assert_eq!(value["config"]["schema_version"], "torsion.config/1");
        assert_eq!(value["config"]["sampling"]["period_ms"], 100);
        assert!(!config.exists());
        Ok(())
    }

    #[test]
    fn validate_missing_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        torsionctl(&dir.path().join("absent.json"))?
            .args(["config", "validate"])
            .assert()
            .code(3);
        Ok(())
    }

    #[test]
    fn validate_rejects_out_of_range_values() -> TestResult {
        let (_dir, config) = workspace()?;
        let mut value: Value = serde_json::from_str(&fs::read_to_string(&config)?)?;
        value["safety"]["stop_attempts"] = Value::from(0);
        fs::write(&config, serde_json::to_string_pretty(&value)?)?;

        torsionctl(&config)?
            .args(["config", "validate"])
            .assert()
            .code(4)
            .stderr(predicate::str::contains("stop_attempts"));
        Ok(())
    }

    #[test]
    fn validate_rejects_broken_json() -> TestResult {
        let (_dir, config) = workspace()?;
        fs::write(&config, "{ not json")?;
        torsionctl(&config)?
            .args(["--json", "config", "validate"])
            .assert()
            .code(4)
            .stdout(predicate::str::contains("\"success\": false"));
        Ok(())
    }
}

mod bench {
    use super::*;

    #[test]
    fn run_stops_at_angle_limit_and_records() -> TestResult {
        let (dir, config) = workspace()?;
        let runs = dir.path().join("runs");
        let output = torsionctl(&config)?
            .args(["--json", "run", "--sample", "rod #1"])
            .args(["--max-angle", "20", "--velocity", "100", "--timeout", "30"])
            .arg("--output-dir")
            .arg(&runs)
            .output()?;
        assert!(
            output.status.success(),
            "run failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let value = json_stdout(&output)?;
        let run = &value["run"];
        assert!(run["stop"]["reason"].get("AngleLimit").is_some());
        assert!(run["samples"].as_u64().unwrap_or(0) >= 2);

        let record = PathBuf::from(run["record"].as_str().ok_or("record path missing")?);
        assert!(record.starts_with(&runs));
        assert!(record.is_file());
        let name = record
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or("record name")?;
        assert!(name.ends_with("_rod__1_DATA.txt"));

        let inspected = torsionctl(&config)?
            .args(["--json", "inspect"])
            .arg(record.parent().ok_or("run folder")?)
            .output()?;
        assert!(inspected.status.success());
        let inspected = json_stdout(&inspected)?;
        assert_eq!(inspected["run"]["sample_name"], "rod #1");
        assert_eq!(inspected["run"]["truncated"], false);
        assert_eq!(inspected["row_count"], run["samples"]);
        let final_angle = inspected["final_angle"].as_f64().ok_or("final angle")?;
        assert!(final_angle >= 20.0);
        Ok(())
    }

    #[test]
    fn read_reports_each_reading() -> TestResult {
        let (_dir, config) = workspace()?;
        let output = torsionctl(&config)?
            .args(["--json", "read", "-n", "3", "--interval-ms", "10", "--zero"])
            .output()?;
        assert!(output.status.success());
        let value = json_stdout(&output)?;
        let readings = value["readings"].as_array().ok_or("readings")?;
        assert_eq!(readings.len(), 3);
        for reading in readings {
            let torque = reading["torque"].as_f64().ok_or("torque")?;
            assert!(torque.abs() < 1.0, "zeroed bench at rest reads {torque} Nm");
        }
        Ok(())
    }

    #[test]
    fn home_returns_to_zero() -> TestResult {
        let (_dir, config) = workspace()?;
        let output = torsionctl(&config)?.args(["--json", "home"]).output()?;
        assert!(output.status.success());
        let position = json_stdout(&output)?["position"]
            .as_f64()
            .ok_or("position")?;
        assert!(position.abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn real_hardware_is_unavailable() -> TestResult {
        let (_dir, config) = workspace()?;
        let mut value: Value = serde_json::from_str(&fs::read_to_string(&config)?)?;
        value["demo_mode"] = Value::Bool(false);
        fs::write(&config, serde_json::to_string_pretty(&value)?)?;

        torsionctl(&config)?
            .arg("home")
            .assert()
            .code(5)
            .stderr(predicate::str::contains("demo_mode"));
        Ok(())
    }
}

mod inspect {
    use super::*;

    const RECORD: &str = "# Measurement started: 2026-10-16 14:03:07 - Sample: rod\n\
        # Max Angle [deg]: 360 | Max Torque [Nm]: 15 | Velocity [deg/s]: 10 | Torque Scale [Nm/V]: 2 | Interval: 100ms\n\
        Time\tVoltage_Torque\tVoltage_Angle\tTorque\tAngle\n\
        [HH:mm:ss.f]\t[V]\t[V]\t[Nm]\t[deg]\n\
        00:00:00.0\t0.000000\t0.000000\t0.000000\t0.000000\n\
        00:00:00.1\t0.250000\t0.027778\t0.500000\t1.000000\n\
        00:00:00.2\t0.2";

    #[test]
    fn human_summary_mentions_cut_off_row() -> TestResult {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("run_DATA.txt");
        fs::write(&file, RECORD)?;
        torsionctl(&dir.path().join("torsion.json"))?
            .arg("inspect")
            .arg(&file)
            .assert()
            .success()
            .stdout(predicate::str::contains("Rows: 2"))
            .stdout(predicate::str::contains("Peak torque: 0.500 Nm"))
            .stdout(predicate::str::contains("cut off"));
        Ok(())
    }

    #[test]
    fn missing_record_is_an_error() -> TestResult {
        let dir = tempfile::tempdir()?;
        torsionctl(&dir.path().join("torsion.json"))?
            .args(["inspect", "nowhere_DATA.txt"])
            .assert()
            .code(3);
        Ok(())
    }
}

#[test]
fn help_describes_the_bench() -> TestResult {
    let dir = tempfile::tempdir()?;
    torsionctl(&dir.path().join("torsion.json"))?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("torsion test bench"));
    Ok(())
}
