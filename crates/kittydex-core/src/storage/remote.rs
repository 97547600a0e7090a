//! S3-compatible object storage backend.
//!
//! Wraps an [`object_store`] Amazon S3 client. Every object is written with a
//! `public-read` canned ACL when configured, matching how harvested assets are
//! served straight from the bucket.

use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, PutPayload, RetryConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, instrument};

use super::{Storage, validate_key};
use crate::config::Credentials;
use crate::{Error, Result, StorageError};

/// HTTP statuses, with their reason phrase, that no retry will fix.
///
/// The reason phrase is part of the marker: error text also carries the
/// request URL and elapsed time, where bare digits show up freely.
const PERMANENT_STATUSES: &[&str] = &["400 Bad Request", "401 Unauthorized", "403 Forbidden"];

/// S3 error codes that indicate a permanent failure. Matched as whole words.
const PERMANENT_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "NoSuchBucket",
    "InvalidBucketName",
];

/// Settings for [`ObjectStorage`].
#[derive(Debug, Clone)]
pub struct RemoteStorageConfig {
    /// Bucket name.
    pub bucket: String,
    /// AWS region.
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    /// Access key pair.
    pub credentials: Credentials,
    /// Write objects with the `public-read` canned ACL.
    pub public_read: bool,
    /// Transport-level retries performed by the client for each call.
    pub max_retries: usize,
}

/// Object storage backed by an S3 bucket.
pub struct ObjectStorage {
    store: AmazonS3,
    bucket: String,
}

impl ObjectStorage {
    /// Build a client for the configured bucket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the client cannot be constructed from
    /// the given settings (invalid endpoint URL, bad header values).
    pub fn new(config: &RemoteStorageConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if config.public_read {
            headers.insert(
                HeaderName::from_static("x-amz-acl"),
                HeaderValue::from_static("public-read"),
            );
        }

        let retry = RetryConfig {
            max_retries: config.max_retries,
            ..RetryConfig::default()
        };

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.credentials.access_key)
            .with_secret_access_key(&config.credentials.secret_key)
            .with_client_options(ClientOptions::new().with_default_headers(headers))
            .with_retry(retry);

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create S3 client: {e}")))?;

        Ok(Self {
            store,
            bucket: config.bucket.clone(),
        })
    }

    fn location(key: &str) -> Result<ObjectPath> {
        validate_key(key)?;
        Ok(ObjectPath::from(key))
    }
}

/// Map a client error onto the pipeline's retryable/permanent split.
fn classify(key: &str, err: &object_store::Error) -> StorageError {
    let message = err.to_string();
    match err {
        object_store::Error::Generic { .. } | object_store::Error::JoinError { .. } => {
            if is_permanent_text(&message) {
                StorageError::permanent(key, message)
            } else {
                StorageError::transient(key, message)
            }
        },
        // PermissionDenied, Unauthenticated, NotImplemented and the rest.
        _ => StorageError::permanent(key, message),
    }
}

fn is_permanent_text(message: &str) -> bool {
    PERMANENT_STATUSES.iter().any(|s| message.contains(s))
        || message
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| PERMANENT_CODES.contains(&word))
}

#[async_trait]
impl Storage for ObjectStorage {
    #[instrument(level = "debug", skip(self))]
    async fn exists(&self, key: &str) -> Result<bool> {
        let location = Self::location(key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(classify(key, &e).into()),
        }
    }

    #[instrument(level = "debug", skip(self, bytes), fields(bytes = bytes.len()))]
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let location = Self::location(key)?;
        self.store
            .put(&location, PutPayload::from(bytes.to_vec()))
            .await
            .map_err(|e| classify(key, &e))?;
        debug!(key, bucket = %self.bucket, "uploaded object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let location = Self::location(key)?;
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| classify(key, &e))?;
        let bytes = result.bytes().await.map_err(|e| classify(key, &e))?;
        Ok(bytes.to_vec())
    }

    fn describe(&self) -> String {
        format!("bucket s3://{}", self.bucket)
    }
}
