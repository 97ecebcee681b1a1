//! External collaborator traits (`spec.md` §6): `ObjectStore`, `Broker`,
//! `HelpDesk`. The core depends on these only as traits; no concrete
//! network client lives in this repository.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use enrich_core::storage_key;
use futures::future::BoxFuture;

/// Blob storage for attachment bytes: `put`, `get`, `head`, `presign`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under a key derived from its content and `filename`,
    /// returning the key (`hex(sha256(data))[:8]/filename`).
    async fn put(&self, data: Vec<u8>, filename: &str) -> String;

    /// Fetch the bytes stored under `key`, if any.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// `true` if `key` exists, without fetching its bytes.
    async fn head(&self, key: &str) -> bool;

    /// A URL (real deployments) or opaque locator (this in-memory
    /// implementation) a client could use to fetch `key` directly.
    async fn presign(&self, key: &str) -> Option<String>;
}

/// An in-memory [`ObjectStore`] for tests and the CLI's quick-start mode.
#[derive(Default)]
pub struct InMemoryObjectStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, data: Vec<u8>, filename: &str) -> String {
        let key = storage_key(&data, filename);
        self.blobs
            .lock()
            .expect("object store mutex poisoned")
            .insert(key.clone(), data);
        key
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .expect("object store mutex poisoned")
            .get(key)
            .cloned()
    }

    async fn head(&self, key: &str) -> bool {
        self.blobs
            .lock()
            .expect("object store mutex poisoned")
            .contains_key(key)
    }

    async fn presign(&self, key: &str) -> Option<String> {
        if self.head(key).await {
            Some(format!("memory://{key}"))
        } else {
            None
        }
    }
}

/// A persistent task queue: dispatch a deterministically-named, delayed
/// job, deduplicating repeat submissions of the same task id
/// (`spec.md` §4.4: "task IDs are deterministic to make retries
/// idempotent at the broker level").
#[async_trait]
pub trait Broker: Send + Sync {
    /// Schedule `job` to run after `delay`, identified by `task_id`.
    /// Returns `true` if this is a new dispatch; `false` if `task_id`
    /// had already been dispatched, in which case `job` is dropped
    /// without running.
    async fn dispatch(&self, task_id: String, delay: Duration, job: BoxFuture<'static, ()>) -> bool;
}

/// An in-memory [`Broker`] backed by a `tokio::time::sleep` per
/// dispatched task, for tests and the CLI.
#[derive(Default)]
pub struct InMemoryBroker {
    dispatched: Mutex<HashSet<String>>,
}

impl InMemoryBroker {
    /// Create a broker with no prior dispatch history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn dispatch(&self, task_id: String, delay: Duration, job: BoxFuture<'static, ()>) -> bool {
        let is_new = self
            .dispatched
            .lock()
            .expect("broker mutex poisoned")
            .insert(task_id.clone());
        if !is_new {
            tracing::debug!(target: "enrich.orchestrator", task_id, "duplicate dispatch suppressed");
            return false;
        }
        tracing::info!(target: "enrich.orchestrator", task_id, delay_ms = delay.as_millis() as u64, "task dispatched");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        });
        true
    }
}

/// The help-desk collaborator: accepts the finished ticket and later
/// customer-facing comments. Failure here never fails ticket creation
/// in the core's own bookkeeping (`spec.md` §4.6 design note).
#[async_trait]
pub trait HelpDesk: Send + Sync {
    /// Create an external ticket mirroring the core's ticket, returning
    /// its external id on success.
    async fn create_ticket(&self, ticket_id: uuid::Uuid, summary: Option<&str>) -> Result<String, String>;

    /// Post a comment visible to the customer.
    async fn add_public_comment(&self, external_id: &str, body: &str) -> Result<(), String>;
}

/// A help-desk stub that always succeeds, grounded in the original
/// implementation's `ZENDESK_SANDBOX` default-on behavior
/// (`common/clients/zendesk.py`).
#[derive(Default)]
pub struct SandboxHelpDesk;

#[async_trait]
impl HelpDesk for SandboxHelpDesk {
    async fn create_ticket(&self, ticket_id: uuid::Uuid, _summary: Option<&str>) -> Result<String, String> {
        Ok(format!("sandbox-{ticket_id}"))
    }

    async fn add_public_comment(&self, _external_id: &str, _body: &str) -> Result<(), String> {
        Ok(())
    }
}
