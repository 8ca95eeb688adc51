//! File-backed request repository (`.lims/state/requests.json`).
//!
//! Every load validates the document against the JSON Schema and then the
//! semantic request invariants; every write is atomic.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::core::types::Request;
use crate::core::validation::check_request_invariants;
use crate::repository::{RequestLedger, RequestRepository};

pub const REQUEST_STORE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/request_store/v1.schema.json"
));

/// Request repository persisted as a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonRequestStore {
    store_path: PathBuf,
    schema_path: PathBuf,
    id_prefix: String,
}

impl JsonRequestStore {
    pub fn new(
        store_path: impl Into<PathBuf>,
        schema_path: impl Into<PathBuf>,
        id_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store_path: store_path.into(),
            schema_path: schema_path.into(),
            id_prefix: id_prefix.into(),
        }
    }

    pub fn load(&self) -> Result<RequestLedger> {
        load_ledger(&self.schema_path, &self.store_path)
    }

    fn update<T>(&self, f: impl FnOnce(&mut RequestLedger) -> Result<T>) -> Result<T> {
        let mut ledger = self.load()?;
        let out = f(&mut ledger)?;
        validate_ledger_invariants(&ledger)?;
        write_ledger(&self.store_path, &ledger)?;
        Ok(out)
    }
}

impl RequestRepository for JsonRequestStore {
    fn get(&self, id: &str) -> Result<Option<Request>> {
        Ok(self.load()?.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Request>> {
        Ok(self.load()?.requests)
    }

    fn insert(&self, request: Request) -> Result<Request> {
        self.update(|ledger| Ok(ledger.insert(&self.id_prefix, request)))
    }

    fn save(&self, request: Request) -> Result<Request> {
        self.update(|ledger| Ok(ledger.save(request)?))
    }
}

/// Load and validate the ledger from disk (schema + invariants).
pub fn load_ledger(schema_path: &Path, store_path: &Path) -> Result<RequestLedger> {
    debug!(path = %store_path.display(), "loading request store");
    let contents = fs::read_to_string(store_path)
        .with_context(|| format!("read request store {}", store_path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse request store {}", store_path.display()))?;
    validate_schema(schema_path, &value)?;
    let ledger: RequestLedger = serde_json::from_value(value)
        .with_context(|| format!("deserialize request store {}", store_path.display()))?;
    validate_ledger_invariants(&ledger)?;
    debug!(requests = ledger.requests.len(), next_seq = ledger.next_seq, "request store loaded");
    Ok(ledger)
}

/// Atomically write the ledger to disk (temp file + rename).
pub fn write_ledger(store_path: &Path, ledger: &RequestLedger) -> Result<()> {
    debug!(path = %store_path.display(), requests = ledger.requests.len(), "writing request store");
    let mut buf = serde_json::to_string_pretty(ledger)?;
    buf.push('\n');
    super::write_atomic(store_path, &buf)
}

fn validate_schema(schema_path: &Path, value: &Value) -> Result<()> {
    let schema_contents = fs::read_to_string(schema_path)
        .with_context(|| format!("read schema {}", schema_path.display()))?;
    let schema_value: Value = serde_json::from_str(&schema_contents)
        .with_context(|| format!("parse schema {}", schema_path.display()))?;
    let compiled =
        validator_for(&schema_value).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "request store schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn validate_ledger_invariants(ledger: &RequestLedger) -> Result<()> {
    let mut errors: Vec<String> = ledger
        .requests
        .iter()
        .flat_map(check_request_invariants)
        .collect();

    let mut ids = std::collections::HashSet::new();
    for request in &ledger.requests {
        if !ids.insert(request.id.as_str()) {
            errors.push(format!("duplicate request id '{}'", request.id));
        }
    }

    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("request store invariants failed: {}", errors.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CompletionState, LifecycleStatus};
    use crate::error::LimsError;
    use crate::test_support::{line, request_with};

    fn store_in(dir: &Path) -> JsonRequestStore {
        let schema_path = dir.join("schema.json");
        let store_path = dir.join("requests.json");
        fs::write(&schema_path, REQUEST_STORE_SCHEMA).expect("write schema");
        write_ledger(&store_path, &RequestLedger::default()).expect("write store");
        JsonRequestStore::new(store_path, schema_path, "REQ")
    }

    fn fresh() -> Request {
        request_with(
            LifecycleStatus::Received,
            vec![line("GLU", CompletionState::Pending)],
        )
    }

    /// Verifies insert → reload preserves the request and bumps the sequence.
    #[test]
    fn insert_persists_across_store_instances() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        let inserted = store.insert(fresh()).expect("insert");

        let reopened = JsonRequestStore::new(
            temp.path().join("requests.json"),
            temp.path().join("schema.json"),
            "REQ",
        );
        let loaded = reopened.get(&inserted.id).expect("get").expect("present");
        assert_eq!(loaded, inserted);
        assert_eq!(reopened.load().expect("load").next_seq, 2);
    }

    #[test]
    fn stale_save_is_rejected_and_store_unchanged() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        let snapshot = store.insert(fresh()).expect("insert");

        let mut first = snapshot.clone();
        first.status = LifecycleStatus::Collected;
        store.save(first).expect("save");

        let mut second = snapshot;
        second.status = LifecycleStatus::Rejected;
        let err = store.save(second).expect_err("conflict");
        assert!(matches!(
            err.downcast_ref::<LimsError>(),
            Some(LimsError::Conflict { .. })
        ));

        let stored = store.get("REQ-000001").expect("get").expect("present");
        assert_eq!(stored.status, LifecycleStatus::Collected);
    }

    #[test]
    fn schema_violation_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        fs::write(
            temp.path().join("requests.json"),
            r#"{"version":1,"next_seq":0,"requests":[]}"#,
        )
        .expect("write");

        let err = store.load().expect_err("invalid");
        assert!(err.to_string().contains("schema validation failed"));
    }

    /// A hand-edited due amount that breaks the billing formula is caught on load.
    #[test]
    fn invariant_violation_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        let mut request = fresh();
        request.id = "REQ-000001".to_string();
        request.version = 1;
        request.billing.billed = crate::core::money::Money::from_cents(1000);
        let ledger = RequestLedger {
            next_seq: 2,
            requests: vec![request],
            ..RequestLedger::default()
        };
        write_ledger(&temp.path().join("requests.json"), &ledger).expect("write");

        let err = store.load().expect_err("invalid");
        assert!(err.to_string().contains("due 0.00 does not match expected 10.00"));
    }

    /// A write that would break an invariant fails before touching the file.
    #[test]
    fn invalid_insert_leaves_store_untouched() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        store.insert(fresh()).expect("insert");
        let before = fs::read(temp.path().join("requests.json")).expect("read");

        let duplicated = request_with(
            LifecycleStatus::Received,
            vec![
                line("GLU", CompletionState::Pending),
                line("GLU", CompletionState::Pending),
            ],
        );
        let err = store.insert(duplicated).expect_err("invalid");
        assert!(err.to_string().contains("duplicate analysis code 'GLU'"));

        let blank = request_with(
            LifecycleStatus::Received,
            vec![line("", CompletionState::Pending)],
        );
        let err = store.insert(blank).expect_err("invalid");
        assert!(err.to_string().contains("analysis code is empty"));

        let after = fs::read(temp.path().join("requests.json")).expect("read");
        assert_eq!(before, after);
        assert_eq!(store.list().expect("list").len(), 1);
    }
}
