#![allow(missing_docs)]

mod common;

use anyhow::Result;
use common::{kittydex_cmd, write_record};
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn plan_gives_remainder_to_last_worker() -> Result<()> {
    let work = tempdir()?;
    kittydex_cmd(work.path())
        .args(["plan", "--start", "1", "--stop", "100000", "--workers", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("worker 0: [1, 25000) 24999 ids"))
        .stdout(predicate::str::contains("worker 1: [25000, 49999) 24999 ids"))
        .stdout(predicate::str::contains("worker 3: [74998, 100000) 25002 ids"));
    Ok(())
}

#[test]
fn plan_reads_environment_fallbacks() -> Result<()> {
    let work = tempdir()?;
    kittydex_cmd(work.path())
        .env("START", "10")
        .env("STOP", "20")
        .env("WORKERS", "2")
        .args(["plan", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"start\": 10"))
        .stdout(predicate::str::contains("\"start\": 15"))
        .stdout(predicate::str::contains("\"end\": 20"));
    Ok(())
}

#[test]
fn plan_reads_config_file() -> Result<()> {
    let work = tempdir()?;
    let config = work.path().join("kittydex.toml");
    std::fs::write(&config, "start_id = 100\nstop_id = 103\nworkers = 3\n")?;

    kittydex_cmd(work.path())
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("worker 2: [102, 103) 1 ids"));

    // Flags win over the file.
    kittydex_cmd(work.path())
        .arg("--config")
        .arg(&config)
        .args(["plan", "--workers", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("worker 0: [100, 103) 3 ids"));
    Ok(())
}

#[test]
fn zero_workers_is_rejected() -> Result<()> {
    let work = tempdir()?;
    kittydex_cmd(work.path())
        .args(["plan", "--workers", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("worker count must be at least 1"));

    kittydex_cmd(work.path())
        .args(["run", "--workers", "0", "--output-dir"])
        .arg(work.path().join("data"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("worker count must be at least 1"));
    Ok(())
}

#[test]
fn production_requires_credentials() -> Result<()> {
    let work = tempdir()?;
    kittydex_cmd(work.path())
        .env("NODE_ENV", "production")
        .args(["run", "--start", "1", "--stop", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("access key"));
    Ok(())
}

#[test]
fn unknown_environment_is_rejected() -> Result<()> {
    let work = tempdir()?;
    kittydex_cmd(work.path())
        .args(["plan", "--env", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown environment"));
    Ok(())
}

#[test]
fn missing_lists_ids_without_records() -> Result<()> {
    let work = tempdir()?;
    let data = work.path().join("data");
    write_record(&data, 2, "bob", "0xaabb", "1");

    kittydex_cmd(work.path())
        .args(["missing", "--start", "1", "--stop", "5", "--output-dir"])
        .arg(&data)
        .assert()
        .success()
        .stdout("1\n3\n4\n");
    Ok(())
}

#[test]
fn missing_reads_data_dir_from_environment() -> Result<()> {
    let work = tempdir()?;
    let data = work.path().join("out");
    write_record(&data, 1, "alice", "0x00", "0");

    let output = kittydex_cmd(work.path())
        .env("DATA_DIR", &data)
        .args(["missing", "--start", "1", "--stop", "3", "-f", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let body: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(body["missing"], serde_json::json!([2]));
    assert_eq!(body["checked"], 2);
    Ok(())
}

#[test]
fn show_prints_stored_record() -> Result<()> {
    let work = tempdir()?;
    let data = work.path().join("data");
    write_record(&data, 7, "0xABC", "0x1a2b3c", "5");
    std::fs::write(data.join("7.svg"), "<svg/>")?;

    kittydex_cmd(work.path())
        .args(["show", "7", "--output-dir"])
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("owner: 0xABC"))
        .stdout(predicate::str::contains("genes: 0x1a2b3c"))
        .stdout(predicate::str::contains("assets: 7.svg"));

    let output = kittydex_cmd(work.path())
        .args(["show", "7", "--format", "json", "--output-dir"])
        .arg(&data)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let body: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(body["record"]["gen"], "5");
    assert_eq!(body["record"]["genes"], "0x1a2b3c");
    Ok(())
}

#[test]
fn show_unknown_record_fails() -> Result<()> {
    let work = tempdir()?;
    kittydex_cmd(work.path())
        .args(["show", "404", "--output-dir"])
        .arg(work.path().join("data"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no record stored for 404"));
    Ok(())
}
