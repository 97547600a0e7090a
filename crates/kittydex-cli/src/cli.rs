//! # CLI Structure and Argument Parsing
//!
//! ```bash
//! # Harvest ids 1..50000 into ./data with 8 workers
//! kittydex run --start 1 --stop 50000 --workers 8
//!
//! # Same thing, configured through the environment
//! START=1 STOP=50000 WORKERS=8 NODE_ENV=production BUCKET=deepkitty \
//!   AWS_KEY=... AWS_SECRET=... kittydex run
//!
//! # Inspect without fetching
//! kittydex plan --workers 4
//! kittydex missing --start 1 --stop 100
//! kittydex show 42
//! ```
//!
//! Settings resolve in order: built-in defaults, then the `--config` TOML file,
//! then flags (each flag falls back to its environment variable). A `.env`
//! file in the working directory is loaded before parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kittydex_core::{Credentials, Environment, HarvestConfig};

/// Main CLI structure for the `kittydex` command.
#[derive(Parser, Clone, Debug)]
#[command(name = "kittydex")]
#[command(version)]
#[command(about = "kittydex - Partitioned, idempotent harvesting of rendered records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Disable all ANSI colors in output (also respects `NO_COLOR` env)
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "KITTYDEX_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Harvest the configured id range
    Run {
        #[command(flatten)]
        harvest: HarvestArgs,

        /// Output format for the run summary
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print how the id range would be split across workers
    Plan {
        #[command(flatten)]
        harvest: HarvestArgs,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List ids in the range that have no stored record
    Missing {
        #[command(flatten)]
        harvest: HarvestArgs,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print a stored record
    Show {
        /// Record id
        id: u64,

        #[command(flatten)]
        harvest: HarvestArgs,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Log line format.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Harvest settings shared by every command.
///
/// Every field is optional so that unset flags leave the config file (or
/// the defaults) in place.
#[derive(Args, Clone, Debug, Default)]
pub struct HarvestArgs {
    /// First record id
    #[arg(long, env = "START")]
    pub start: Option<u64>,

    /// Stop id (exclusive)
    #[arg(long, env = "STOP")]
    pub stop: Option<u64>,

    /// Number of parallel workers [default: number of cores]
    #[arg(short = 'w', long, env = "WORKERS")]
    pub workers: Option<usize>,

    /// Deployment environment: dev/development or prod/production
    #[arg(long = "env", env = "NODE_ENV", value_parser = parse_environment)]
    pub environment: Option<Environment>,

    /// Bucket name (prod)
    #[arg(long, env = "BUCKET")]
    pub bucket: Option<String>,

    /// Access key id (prod)
    #[arg(long, env = "AWS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Secret access key (prod)
    #[arg(long, env = "AWS_SECRET", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Bucket region (prod)
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (prod)
    #[arg(long, env = "S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Output directory (dev)
    #[arg(long, env = "DATA_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Address prefix of record pages
    #[arg(long, env = "SOURCE_URL")]
    pub base_url: Option<String>,

    /// Navigation timeout in seconds
    #[arg(long)]
    pub nav_timeout_secs: Option<u64>,

    /// Quiet period that counts as network idle, in milliseconds
    #[arg(long)]
    pub idle_ms: Option<u64>,

    /// Relaunch a crashed worker from where it stopped, up to this many times
    #[arg(long)]
    pub max_restarts: Option<u32>,

    /// Persist captured assets even when extraction fails
    #[arg(long)]
    pub keep_failed_assets: bool,
}

fn parse_environment(value: &str) -> Result<Environment, String> {
    value.parse().map_err(|e: kittydex_core::Error| e.to_string())
}

impl HarvestArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(self, mut config: HarvestConfig) -> HarvestConfig {
        if let Some(start) = self.start {
            config.start_id = start;
        }
        if let Some(stop) = self.stop {
            config.stop_id = stop;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(bucket) = self.bucket {
            config.bucket = bucket;
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if self.endpoint.is_some() {
            config.endpoint = self.endpoint;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if let Some(secs) = self.nav_timeout_secs {
            config.render.navigation_timeout_secs = secs;
        }
        if let Some(ms) = self.idle_ms {
            config.render.idle_window_ms = ms;
        }
        if let Some(n) = self.max_restarts {
            config.max_restarts = n;
        }
        config.keep_failed_assets |= self.keep_failed_assets;

        if self.access_key.is_some() || self.secret_key.is_some() {
            let current = config.credentials.take();
            let (file_key, file_secret) = current
                .map(|c| (c.access_key, c.secret_key))
                .unwrap_or_default();
            config.credentials = Some(Credentials {
                access_key: self.access_key.unwrap_or(file_key),
                secret_key: self.secret_key.unwrap_or(file_secret),
            });
        }
        config
    }
}
