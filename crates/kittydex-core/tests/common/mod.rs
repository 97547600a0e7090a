#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic, dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kittydex_core::{
    Error, HarvestConfig, ObservedResponse, Renderer, Result, Session, Storage, StorageError,
};
use serde_json::{Value, json};

pub const BASE_URL: &str = "https://kitties.test/k";

/// Config pointing at the fake source.
pub fn test_config() -> HarvestConfig {
    HarvestConfig {
        base_url: BASE_URL.to_string(),
        ..HarvestConfig::default()
    }
}

/// In-memory storage that records every write.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    writes: Mutex<Vec<String>>,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every `put` on `key` fail permanently.
    pub fn fail_writes_to(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn insert(&self, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Keys in the order they were written, including overwrites.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_to(&self, key: &str) -> usize {
        self.writes.lock().unwrap().iter().filter(|k| *k == key).count()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.contains(key))
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(StorageError::permanent(key, "access denied").into());
        }
        self.writes.lock().unwrap().push(key.to_string());
        self.insert(key, bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.bytes(key)
            .ok_or_else(|| StorageError::permanent(key, "not found").into())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// What the fake source does for a given id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Navigation fails as if the page returned 404.
    NotFound,
    /// The page loads but has no owner anchor.
    MissingOwner,
    /// The page loads but the gene list is empty.
    NoGenes,
    /// The engine dies while loading this id, the first time only.
    LoseSessionOnce,
    /// The engine dies every time this id is loaded.
    LoseSession,
    /// The worker task panics while loading this id, the first time only.
    PanicOnce,
    /// The page loads without any image responses.
    NoAssets,
    /// Two vector responses are observed for the same record.
    DuplicateVector,
}

#[derive(Default)]
struct FakeState {
    behaviors: Mutex<HashMap<u64, Behavior>>,
    tripped: Mutex<HashSet<u64>>,
    navigations: Mutex<Vec<String>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    fail_open: Mutex<bool>,
}

/// Scriptable renderer serving synthetic record pages.
#[derive(Clone, Default)]
pub struct FakeRenderer {
    state: Arc<FakeState>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, id: u64, behavior: Behavior) -> Self {
        self.state.behaviors.lock().unwrap().insert(id, behavior);
        self
    }

    pub fn failing_open(self) -> Self {
        *self.state.fail_open.lock().unwrap() = true;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.navigations.lock().unwrap().clone()
    }

    pub fn navigated_ids(&self) -> Vec<u64> {
        self.navigations()
            .iter()
            .map(|url| id_from_url(url))
            .collect()
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn into_dyn(self) -> Arc<dyn Renderer> {
        Arc::new(self)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn open(&self) -> Result<Box<dyn Session>> {
        if *self.state.fail_open.lock().unwrap() {
            return Err(Error::Render("no browser binary found".into()));
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            current: None,
            responses: Vec::new(),
            closed: false,
        }))
    }
}

struct FakeSession {
    state: Arc<FakeState>,
    current: Option<u64>,
    responses: Vec<ObservedResponse>,
    closed: bool,
}

fn id_from_url(url: &str) -> u64 {
    url.rsplit('/').next().unwrap().parse().unwrap()
}

/// Record the fake source serves for `id`.
pub fn expected_genes(id: u64) -> String {
    format!("0xaabb{:02x}", id % 256)
}

fn vector(id: u64, variant: &str) -> ObservedResponse {
    ObservedResponse {
        url: format!("https://img.kitties.test/{id}{variant}.svg"),
        status: 200,
        mime_type: "image/svg+xml".to_string(),
        body: Some(format!("<svg id=\"{id}{variant}\"/>").into_bytes()),
    }
}

impl FakeSession {
    fn behavior(&self, id: u64) -> Option<Behavior> {
        self.state.behaviors.lock().unwrap().get(&id).copied()
    }

    /// True the first time `id` trips a one-shot behavior.
    fn trip(&self, id: u64) -> bool {
        self.state.tripped.lock().unwrap().insert(id)
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        assert!(!self.closed, "navigate after close");
        self.state
            .navigations
            .lock()
            .unwrap()
            .push(url.to_string());
        let id = id_from_url(url);
        self.current = Some(id);
        self.responses.clear();

        match self.behavior(id) {
            Some(Behavior::NotFound) => {
                return Err(Error::Fetch {
                    url: url.to_string(),
                    reason: "document returned HTTP 404".into(),
                });
            },
            Some(Behavior::LoseSession) => {
                return Err(Error::SessionLost("browser process exited".into()));
            },
            Some(Behavior::LoseSessionOnce) if self.trip(id) => {
                return Err(Error::SessionLost("browser process exited".into()));
            },
            Some(Behavior::PanicOnce) if self.trip(id) => {
                panic!("renderer crashed on {id}");
            },
            _ => {},
        }

        self.responses.push(ObservedResponse {
            url: url.to_string(),
            status: 200,
            mime_type: "text/html".to_string(),
            body: None,
        });
        match self.behavior(id) {
            Some(Behavior::NoAssets) => {},
            Some(Behavior::DuplicateVector) => {
                self.responses.push(vector(id, ""));
                self.responses.push(vector(id, "-thumb"));
            },
            _ => self.responses.push(vector(id, "")),
        }
        Ok(())
    }

    fn observed_responses(&self) -> &[ObservedResponse] {
        &self.responses
    }

    async fn evaluate(&mut self, _script: &str) -> Result<Value> {
        let id = self.current.expect("evaluate before navigate");
        let mut page = json!({
            "owner": format!("owner-{id}"),
            "gen": (id % 10).to_string(),
            "genes": ["aa", "bb", format!("{:02x}", id % 256)],
        });
        match self.behavior(id) {
            Some(Behavior::MissingOwner) => page["owner"] = Value::Null,
            Some(Behavior::NoGenes) => page["genes"] = json!([]),
            _ => {},
        }
        Ok(Value::String(page.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        assert!(!self.closed, "session closed twice");
        self.closed = true;
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
