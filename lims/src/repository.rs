//! Request persistence seam.
//!
//! [`RequestRepository`] is injected into the service so the core stays
//! storage-agnostic. `save` is a compare-and-swap on `Request::version`:
//! two writers that both read version N cannot both commit.

use std::sync::Mutex;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::Request;
use crate::error::LimsError;

pub trait RequestRepository {
    fn get(&self, id: &str) -> Result<Option<Request>>;

    /// All requests in insertion order.
    fn list(&self) -> Result<Vec<Request>>;

    /// Store a new request, assigning its id and version 1.
    fn insert(&self, request: Request) -> Result<Request>;

    /// Replace a stored request if its version is unchanged since it was read.
    ///
    /// Fails with [`LimsError::Conflict`] on a stale version and
    /// [`LimsError::NotFound`] for unknown ids. Returns the stored copy with
    /// its version bumped.
    fn save(&self, request: Request) -> Result<Request>;
}

pub const LEDGER_FORMAT_VERSION: u32 = 1;

/// Serializable collection of requests shared by every repository backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLedger {
    pub version: u32,
    /// Next sequence number used to build request ids.
    pub next_seq: u64,
    pub requests: Vec<Request>,
}

impl Default for RequestLedger {
    fn default() -> Self {
        Self {
            version: LEDGER_FORMAT_VERSION,
            next_seq: 1,
            requests: Vec::new(),
        }
    }
}

impl RequestLedger {
    pub fn get(&self, id: &str) -> Option<&Request> {
        self.requests.iter().find(|request| request.id == id)
    }

    pub fn insert(&mut self, id_prefix: &str, mut request: Request) -> Request {
        request.id = format!("{}-{:06}", id_prefix, self.next_seq);
        request.version = 1;
        self.next_seq += 1;
        self.requests.push(request.clone());
        request
    }

    pub fn save(&mut self, mut request: Request) -> Result<Request, LimsError> {
        let stored = self
            .requests
            .iter_mut()
            .find(|stored| stored.id == request.id)
            .ok_or_else(|| LimsError::NotFound(request.id.clone()))?;
        if stored.version != request.version {
            return Err(LimsError::Conflict {
                id: request.id,
                expected: request.version,
                found: stored.version,
            });
        }
        request.version += 1;
        *stored = request.clone();
        Ok(request)
    }
}

/// Mutex-guarded in-process repository.
#[derive(Debug)]
pub struct InMemoryRepository {
    id_prefix: String,
    ledger: Mutex<RequestLedger>,
}

impl InMemoryRepository {
    pub fn new(id_prefix: impl Into<String>) -> Self {
        Self {
            id_prefix: id_prefix.into(),
            ledger: Mutex::new(RequestLedger::default()),
        }
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut RequestLedger) -> Result<T>) -> Result<T> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| anyhow!("request ledger lock poisoned"))?;
        f(&mut ledger)
    }
}

impl RequestRepository for InMemoryRepository {
    fn get(&self, id: &str) -> Result<Option<Request>> {
        self.with_ledger(|ledger| Ok(ledger.get(id).cloned()))
    }

    fn list(&self) -> Result<Vec<Request>> {
        self.with_ledger(|ledger| Ok(ledger.requests.clone()))
    }

    fn insert(&self, request: Request) -> Result<Request> {
        self.with_ledger(|ledger| Ok(ledger.insert(&self.id_prefix, request)))
    }

    fn save(&self, request: Request) -> Result<Request> {
        self.with_ledger(|ledger| Ok(ledger.save(request)?))
    }
}
