//! Rendering engine capability.
//!
//! Record pages only expose their data after scripts run, so fetching goes
//! through a full rendering engine. The pipeline sees it as two traits:
//!
//! - [`Renderer`] opens sessions; one per worker
//! - [`Session`] loads one page at a time and exposes what was observed
//!
//! A session is used in two explicit phases per record: [`Session::navigate`]
//! (returns after the network has gone idle), then
//! [`Session::observed_responses`] and [`Session::evaluate`] against the
//! settled page.
//!
//! The headless Chromium backend lives in [`chromium`] behind the `chromium`
//! feature.

#[cfg(feature = "chromium")]
pub mod chromium;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Factory for rendering sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Start a new, independent session.
    ///
    /// A failure here is fatal for the worker that asked for the session.
    async fn open(&self) -> Result<Box<dyn Session>>;
}

/// A live rendering session.
///
/// Sessions are owned by exactly one worker and are not shared.
#[async_trait]
pub trait Session: Send {
    /// Load `url` and wait until network activity has settled.
    ///
    /// Returns [`Error::Fetch`](crate::Error::Fetch) for timeouts, unreachable
    /// hosts and non-2xx document statuses, and
    /// [`Error::SessionLost`](crate::Error::SessionLost) when the engine itself
    /// is gone.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Responses observed during the most recent navigation.
    fn observed_responses(&self) -> &[ObservedResponse];

    /// Evaluate a script against the loaded page and return its JSON result.
    async fn evaluate(&mut self, script: &str) -> Result<Value>;

    /// Release the session. Called exactly once by the owning worker.
    async fn close(&mut self) -> Result<()>;
}

/// One network response seen while a page loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    /// Final URL of the response.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Reported MIME type.
    pub mime_type: String,
    /// Response body, when the engine retained it.
    pub body: Option<Vec<u8>>,
}

impl ObservedResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}
