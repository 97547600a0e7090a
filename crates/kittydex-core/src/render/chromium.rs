//! Headless Chromium backend over the DevTools protocol.
//!
//! Each [`ChromiumRenderer::open`] launches its own browser process, so
//! workers never share engine state. A session keeps one page alive at a time;
//! navigating closes the previous page first.
//!
//! Network idle is approximated by listening to `Network.responseReceived`
//! events after the load event fires: once no new response arrives for the
//! configured idle window, the page is considered settled.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams, RequestId, ResourceType,
};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, instrument, warn};

use super::{ObservedResponse, Renderer, Session};
use crate::config::RenderOptions;
use crate::{AssetKind, Error, Result};

/// Launches a headless Chromium per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumRenderer {
    options: RenderOptions,
}

impl ChromiumRenderer {
    /// Create a renderer with the given tuning.
    #[must_use]
    pub const fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn open(&self) -> Result<Box<dyn Session>> {
        let config = BrowserConfig::builder()
            .window_size(self.options.viewport_width, self.options.viewport_height)
            .build()
            .map_err(|e| Error::Render(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Render(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler stopped: {e}");
                    break;
                }
            }
        });

        debug!("launched headless browser");
        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            handler: handler_task,
            page: None,
            responses: Vec::new(),
            options: self.options.clone(),
        }))
    }
}

struct ChromiumSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    page: Option<Page>,
    responses: Vec<ObservedResponse>,
    options: RenderOptions,
}

/// A response event worth keeping until bodies are fetched.
struct Pending {
    request_id: RequestId,
    response: ObservedResponse,
    wants_body: bool,
    is_document: bool,
}

impl ChromiumSession {
    /// Map a protocol error, promoting it to [`Error::SessionLost`] once the
    /// browser connection is gone.
    fn lost_or(&self, err: impl std::fmt::Display, url: &str) -> Error {
        if self.handler.is_finished() || self.browser.is_none() {
            Error::SessionLost(err.to_string())
        } else {
            Error::Fetch {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }

    async fn close_page(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("failed to close page: {e}");
            }
        }
    }

    async fn load(&mut self, url: &str) -> Result<Vec<Pending>> {
        let Some(browser) = self.browser.as_ref() else {
            return Err(Error::SessionLost("session already closed".into()));
        };
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => return Err(self.lost_or(e, url)),
        };

        if let Err(e) = page.execute(EnableParams::default()).await {
            warn!("failed to enable network events for {url}: {e}");
        }
        let mut events = match page.event_listener::<EventResponseReceived>().await {
            Ok(events) => events,
            Err(e) => return Err(self.lost_or(e, url)),
        };

        let nav_timeout = self.options.navigation_timeout();
        let deadline = Instant::now() + nav_timeout;
        let outcome = timeout(nav_timeout, page.goto(url))
            .await
            .map(|loaded| loaded.map(|_| ()));
        match outcome {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                self.page = Some(page);
                return Err(self.lost_or(e, url));
            },
            Err(_) => {
                self.page = Some(page);
                return Err(Error::Fetch {
                    url: url.to_string(),
                    reason: format!("navigation timed out after {nav_timeout:?}"),
                });
            },
        }

        let idle = self.options.idle_window();
        let mut pending = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(url, "network never went idle; using responses seen so far");
                break;
            }
            match timeout(idle.min(remaining), events.next()).await {
                Ok(Some(event)) => pending.push(pending_from_event(&event)),
                Ok(None) | Err(_) => break,
            }
        }

        self.page = Some(page);
        Ok(pending)
    }

    async fn fetch_body(page: &Page, request_id: RequestId) -> Option<Vec<u8>> {
        let reply = match page.execute(GetResponseBodyParams::new(request_id)).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!("response body unavailable: {e}");
                return None;
            },
        };
        if reply.result.base64_encoded {
            BASE64.decode(reply.result.body.as_bytes()).ok()
        } else {
            Some(reply.result.body.clone().into_bytes())
        }
    }
}

fn pending_from_event(event: &EventResponseReceived) -> Pending {
    let status = u16::try_from(event.response.status).unwrap_or(0);
    let wants_body = matches!(event.r#type, ResourceType::Image)
        || AssetKind::from_url(&event.response.url).is_some()
        || AssetKind::from_mime(&event.response.mime_type).is_some();
    let is_document = matches!(event.r#type, ResourceType::Document);
    Pending {
        request_id: event.request_id.clone(),
        response: ObservedResponse {
            url: event.response.url.clone(),
            status,
            mime_type: event.response.mime_type.clone(),
            body: None,
        },
        wants_body: wants_body && !is_document,
        is_document,
    }
}

fn document_status(pending: &[Pending]) -> Option<u16> {
    pending
        .iter()
        .find(|p| p.is_document)
        .map(|p| p.response.status)
}

#[async_trait]
impl Session for ChromiumSession {
    #[instrument(level = "debug", skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.close_page().await;
        self.responses.clear();

        let pending = self.load(url).await?;

        if let Some(status) = document_status(&pending) {
            if !(200..300).contains(&status) {
                return Err(Error::Fetch {
                    url: url.to_string(),
                    reason: format!("document returned HTTP {status}"),
                });
            }
        }

        let Some(page) = self.page.as_ref() else {
            return Err(Error::SessionLost("page vanished after navigation".into()));
        };
        let mut responses = Vec::with_capacity(pending.len());
        for Pending {
            request_id,
            mut response,
            wants_body,
            ..
        } in pending
        {
            if wants_body && response.status < 300 {
                response.body = Self::fetch_body(page, request_id).await;
            }
            responses.push(response);
        }
        debug!(url, responses = responses.len(), "page settled");
        self.responses = responses;
        Ok(())
    }

    fn observed_responses(&self) -> &[ObservedResponse] {
        &self.responses
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value> {
        let Some(page) = self.page.as_ref() else {
            return Err(Error::Render("no page loaded".into()));
        };
        let result = match page.evaluate(script).await {
            Ok(result) => result,
            Err(e) if self.handler.is_finished() => return Err(Error::SessionLost(e.to_string())),
            Err(e) => return Err(Error::Render(format!("script evaluation failed: {e}"))),
        };
        let text: String = result
            .into_value()
            .map_err(|e| Error::Render(format!("script did not return a string: {e}")))?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn close(&mut self) -> Result<()> {
        self.close_page().await;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("browser close failed: {e}");
            }
            if let Err(e) = browser.wait().await {
                debug!("browser wait failed: {e}");
            }
        }
        self.handler.abort();
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
