//! Test-only builders for requests, analysis lines, and services.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use crate::audit::InMemoryAudit;
use crate::clock::FixedClock;
use crate::core::money::Money;
use crate::core::types::{AnalysisLine, CompletionState, LifecycleStatus, Request, RequestBilling};
use crate::io::init::{InitOptions, LimsPaths, init_lab};
use crate::repository::InMemoryRepository;
use crate::service::{LabService, NewRequest, ValidationMode};

pub type MemoryService = LabService<InMemoryRepository, InMemoryAudit>;

pub const FIXED_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

/// Analysis line named after its code. Complete and flagged lines carry a result.
pub fn line(code: &str, completion: CompletionState) -> AnalysisLine {
    let result = match completion {
        CompletionState::Pending => None,
        CompletionState::Complete | CompletionState::Flagged => Some("1.0".to_string()),
    };
    AnalysisLine {
        code: code.to_string(),
        name: code.to_string(),
        completion,
        result,
    }
}

/// Request `REQ-000001` at version 1 with zeroed billing.
pub fn request_with(status: LifecycleStatus, analyses: Vec<AnalysisLine>) -> Request {
    Request {
        id: "REQ-000001".to_string(),
        patient_id: "P-001".to_string(),
        patient_name: "Test Patient".to_string(),
        status,
        analyses,
        billing: RequestBilling::default(),
        version: 1,
        created_at: FIXED_TIMESTAMP.to_string(),
        updated_at: FIXED_TIMESTAMP.to_string(),
    }
}

pub fn new_request(codes: &[&str], subtotal: Money, discount: Money) -> NewRequest {
    NewRequest {
        patient_id: "P-001".to_string(),
        patient_name: "Test Patient".to_string(),
        analyses: codes
            .iter()
            .map(|code| (code.to_string(), format!("{} test", code)))
            .collect(),
        subtotal,
        discount,
    }
}

/// In-memory service with a clock pinned to [`FIXED_TIMESTAMP`].
pub fn service(mode: ValidationMode) -> MemoryService {
    let at = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp");
    let clock = FixedClock::new(at);
    LabService::new(InMemoryRepository::new("REQ"), InMemoryAudit::new(), mode)
        .with_clock(Arc::new(clock))
}

/// Temporary directory with `.lims/` initialized.
pub struct TestLab {
    pub dir: TempDir,
    pub paths: LimsPaths,
}

impl TestLab {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = init_lab(dir.path(), &InitOptions::default()).expect("init lab");
        Self { dir, paths }
    }
}

impl Default for TestLab {
    fn default() -> Self {
        Self::new()
    }
}
