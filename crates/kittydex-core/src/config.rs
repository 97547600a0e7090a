//! Harvest configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. **Defaults**: [`HarvestConfig::default`]
//! 2. **Config file**: optional TOML file passed with `--config`
//! 3. **Flags and environment variables**: applied by the CLI
//!
//! ## Example Configuration File
//!
//! ```toml
//! start_id = 1
//! stop_id = 50000
//! workers = 8
//! environment = "prod"
//! bucket = "deepkitty"
//! region = "us-east-1"
//!
//! [credentials]
//! access_key = "AKIA..."
//! secret_key = "..."
//!
//! [render]
//! navigation_timeout_secs = 30
//! idle_window_ms = 500
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default first record id.
pub const DEFAULT_START_ID: u64 = 1;
/// Default stop id (exclusive).
pub const DEFAULT_STOP_ID: u64 = 100_000;
/// Default bucket for production runs.
pub const DEFAULT_BUCKET: &str = "deepkitty";
/// Default source address; the record id is appended as the last path segment.
pub const DEFAULT_BASE_URL: &str = "https://cryptokittydex.com/kitties";

/// Deployment environment, which selects the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local directory output.
    #[default]
    Dev,
    /// Remote bucket output.
    Prod,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" | "local" => Ok(Self::Dev),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(Error::Config(format!(
                "unknown environment '{other}' (expected dev or prod)"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        })
    }
}

/// Access key pair for the remote bucket.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Rendering session tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Upper bound on one navigation including the idle wait.
    pub navigation_timeout_secs: u64,
    /// Quiet period with no new responses that counts as network idle.
    pub idle_window_ms: u64,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
}

impl RenderOptions {
    /// Navigation timeout as a [`Duration`].
    #[must_use]
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Idle window as a [`Duration`].
    #[must_use]
    pub const fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 30,
            idle_window_ms: 500,
            viewport_width: 1800,
            viewport_height: 1200,
        }
    }
}

/// Everything needed to run one harvest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// First record id to harvest.
    pub start_id: u64,
    /// One past the last record id to harvest.
    pub stop_id: u64,
    /// Number of parallel workers.
    pub workers: usize,
    /// Deployment environment.
    pub environment: Environment,
    /// Output directory for the `dev` environment.
    pub output_dir: PathBuf,
    /// Bucket for the `prod` environment.
    pub bucket: String,
    /// Bucket region.
    pub region: String,
    /// Custom S3-compatible endpoint.
    pub endpoint: Option<String>,
    /// Bucket credentials; required in `prod`.
    pub credentials: Option<Credentials>,
    /// Client-level retries per storage call.
    pub storage_retries: usize,
    /// Address prefix of record pages.
    pub base_url: String,
    /// Rendering tuning.
    pub render: RenderOptions,
    /// Persist assets captured for items whose extraction failed.
    pub keep_failed_assets: bool,
    /// Relaunches allowed per worker after a crash (0 disables restarts).
    pub max_restarts: u32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            start_id: DEFAULT_START_ID,
            stop_id: DEFAULT_STOP_ID,
            workers: default_workers(),
            environment: Environment::Dev,
            output_dir: PathBuf::from("data"),
            bucket: DEFAULT_BUCKET.to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            credentials: None,
            storage_retries: 3,
            base_url: DEFAULT_BASE_URL.to_string(),
            render: RenderOptions::default(),
            keep_failed_assets: false,
            max_restarts: 0,
        }
    }
}

/// Number of workers used when none is configured: one per available core.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

impl HarvestConfig {
    /// Load a configuration file, filling unspecified fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config {}: {e}", path.display())))
    }

    /// Check cross-field requirements before a run starts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero worker count and
    /// [`Error::Config`] for missing production settings or an unusable base
    /// URL.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.environment == Environment::Prod {
            if self.bucket.trim().is_empty() {
                return Err(Error::Config("production runs require a bucket".into()));
            }
            match &self.credentials {
                Some(c) if !c.access_key.is_empty() && !c.secret_key.is_empty() => {},
                _ => {
                    return Err(Error::Config(
                        "production runs require an access key and secret key".into(),
                    ));
                },
            }
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base url '{}': {e}", self.base_url)))?;
        Ok(())
    }

    /// Canonical page address for a record.
    #[must_use]
    pub fn record_url(&self, id: crate::RecordId) -> String {
        format!("{}/{id}", self.base_url.trim_end_matches('/'))
    }
}
