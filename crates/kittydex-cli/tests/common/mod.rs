#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::time::Duration;

use assert_cmd::Command;

pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// Variables the CLI reads as flag fallbacks.
const HARVEST_ENV: &[&str] = &[
    "START",
    "STOP",
    "WORKERS",
    "NODE_ENV",
    "BUCKET",
    "AWS_KEY",
    "AWS_SECRET",
    "AWS_REGION",
    "S3_ENDPOINT",
    "DATA_DIR",
    "SOURCE_URL",
    "KITTYDEX_CONFIG",
    "RUST_LOG",
];

/// A `kittydex` command isolated from the caller's environment and `.env`.
pub fn kittydex_cmd(work_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kittydex").unwrap();
    cmd.timeout(CMD_TIMEOUT);
    for var in HARVEST_ENV {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd.current_dir(work_dir);
    cmd
}

/// Write a record the way the harvester stores it.
pub fn write_record(dir: &Path, id: u64, owner: &str, genes: &str, generation: &str) {
    std::fs::create_dir_all(dir).unwrap();
    let body = format!(
        "{{\n\t\"owner\": \"{owner}\",\n\t\"genes\": \"{genes}\",\n\t\"gen\": \"{generation}\"\n}}"
    );
    std::fs::write(dir.join(format!("{id}.json")), body).unwrap();
}
