use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config for the simulated head
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[connection]
port = "SIM"

[timing]
settle_ms = 1
qswitch_settle_ms = 1
idle_ms = 5

[setting]
loop_cycle_seconds = 0.05
"#;
    let path = dir.path().join("yag.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn yag(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("yag").unwrap();
    cmd.arg("--config").arg(cfg).env_remove("RUST_LOG");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["status"], 0, "flashlamp_voltage_v", "stdout")]
#[case(&["toggle", "shutter"], 0, "shutter: OPEN", "stdout")]
#[case(&["toggle", "flashlamp"], 0, "flashlamp_mode: START", "stdout")]
#[case(&["set", "frequency", "12.5"], 0, "12.50 Hz", "stdout")]
#[case(&["set", "voltage", "2000"], 3, "between 500 and 1800", "stderr")]
#[case(&["set", "wavelength", "1064"], 1, "unknown parameter", "stderr")]
#[case(&["reset-counter", "qswitch"], 0, "qswitch_user_counter: 0", "stdout")]
#[case(&["activate"], 0, "laser active", "stdout")]
#[case(&["deactivate"], 0, "laser deactivated", "stdout")]
#[case(&["send", "SN"], 0, "SN 184", "stdout")]
#[case(&["toggle"], 2, "required", "stderr")]
#[case(&["monitor", "--duration-s", "1e30"], 1, "--duration-s", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let assert = yag(&cfg).args(args).assert().code(exit_code);
    if stream == "stdout" {
        assert.stdout(predicate::str::contains(needle));
    } else {
        assert.stderr(predicate::str::contains(needle));
    }
}

#[test]
fn flashlamp_timeout_faults_the_activation() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    yag(&cfg)
        .env("YAG_SIM_TIMEOUT_ON", "A")
        .arg("activate")
        .assert()
        .code(6)
        .stderr(predicate::str::contains("flashlamp"));
}

#[test]
fn read_timeout_shows_as_stale_in_status() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    yag(&cfg)
        .env("YAG_SIM_TIMEOUT_ON", "V")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("(stale)"));
}

#[test]
fn invalid_config_is_reported_before_connecting() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[timing]\nidle_ms = 0\n").unwrap();

    yag(&path)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("timing.idle_ms"));
}

#[test]
fn json_status_is_one_object() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = yag(&cfg).args(["--json", "status"]).output().unwrap();
    assert!(out.status.success());
    let line = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(v["phase"], "deactivated");
    assert_eq!(v["fields"]["serial_number"]["value"], "184");
    assert_eq!(v["fields"]["shutter"]["stale"], false);
}

#[test]
fn json_error_has_reason() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = yag(&cfg)
        .args(["--json", "set", "delay", "5"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .expect("json error line");
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Validation");
}

#[test]
fn monitor_records_poll_readings_to_csv() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv_path = dir.path().join("rec.csv");

    yag(&cfg)
        .args(["monitor", "--duration-s", "0.5", "--record"])
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("serial_number"));

    let mut rdr = csv::Reader::from_path(&csv_path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        ["elapsed_s", "field", "value", "error"]
    );
    let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
    assert!(rows.iter().any(|r| &r[1] == "flashlamp_voltage_v" && &r[2] == "1200 V"));
}
