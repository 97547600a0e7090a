//! Storage adapter: uniform idempotent object access over two backends.
//!
//! Keys are flat object names such as `42.json` or `42.svg`. The pipeline only
//! needs [`Storage::exists`] (for dedup) and [`Storage::put`]; [`Storage::get`]
//! serves verification and the CLI.
//!
//! | environment | backend | location |
//! |---|---|---|
//! | `dev` | [`LocalStorage`] | output directory, created on demand |
//! | `prod` | [`ObjectStorage`] | S3 bucket, objects written public-read |
//!
//! Implementations must tolerate concurrent calls. The pipeline never writes
//! the same key from two workers, so neither backend takes locks.

mod local;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Environment, HarvestConfig};
use crate::{Error, Result};

pub use local::LocalStorage;
pub use remote::{ObjectStorage, RemoteStorageConfig};

/// Idempotent key/value object store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Whether an object exists under `key`.
    ///
    /// A definite "not found" is `Ok(false)`. Any other failure is returned as
    /// an error and never folded into `false`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Store `bytes` under `key`.
    ///
    /// Callers treat keys as write-once; a backend may still overwrite.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the object under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Build the backend selected by the configuration's environment.
///
/// # Errors
///
/// Returns [`Error::Config`] when production settings are incomplete, or the
/// backend's construction error.
pub fn from_config(config: &HarvestConfig) -> Result<Arc<dyn Storage>> {
    match config.environment {
        Environment::Dev => Ok(Arc::new(LocalStorage::new(&config.output_dir))),
        Environment::Prod => {
            let credentials = config.credentials.clone().ok_or_else(|| {
                Error::Config("production storage requires an access key and secret".into())
            })?;
            let remote = RemoteStorageConfig {
                bucket: config.bucket.clone(),
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
                credentials,
                public_read: true,
                max_retries: config.storage_retries,
            };
            Ok(Arc::new(ObjectStorage::new(&remote)?))
        },
    }
}

/// Reject keys that could escape a flat namespace.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let ok = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(Error::Storage(crate::StorageError::permanent(
            key,
            "invalid object key",
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("1.json").is_ok());
        assert!(validate_key("99999.svg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b.json").is_err());
        assert!(validate_key(".hidden").is_err());
    }

    #[test]
    fn test_from_config_dev_uses_local_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarvestConfig {
            output_dir: tmp.path().join("data"),
            ..HarvestConfig::default()
        };
        let storage = from_config(&config).unwrap();
        assert!(storage.describe().contains("data"));
    }

    #[test]
    fn test_from_config_prod_requires_credentials() {
        let config = HarvestConfig {
            environment: Environment::Prod,
            credentials: None,
            ..HarvestConfig::default()
        };
        assert!(matches!(from_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_config_prod_builds_bucket_backend() {
        let config = HarvestConfig {
            environment: Environment::Prod,
            bucket: "deepkitty".to_string(),
            credentials: Some(Credentials {
                access_key: "AKIDEXAMPLE".to_string(),
                secret_key: "secret".to_string(),
            }),
            ..HarvestConfig::default()
        };
        let storage = from_config(&config).unwrap();
        assert!(storage.describe().contains("deepkitty"));
    }
}
