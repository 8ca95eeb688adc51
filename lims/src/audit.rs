//! Audit records for committed request changes.
//!
//! The service appends one record per derived change after the request
//! has been saved. Sinks only store and replay records; they never
//! interpret them.

use std::sync::Mutex;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::money::Money;
use crate::core::types::{CompletionState, LifecycleStatus};

/// What changed on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    Created {
        patient_id: String,
        analyses: Vec<String>,
        billed: Money,
        discount: Money,
    },
    ResultEntered {
        code: String,
        value: String,
        completion: CompletionState,
    },
    AnalysisFlagged {
        code: String,
        flagged: bool,
    },
    StatusChanged {
        from: LifecycleStatus,
        to: LifecycleStatus,
        reason: String,
    },
    BillingUpdated {
        billed: Money,
        discount: Money,
        paid: Money,
        due: Money,
    },
    PaymentRecorded {
        requested: Money,
        applied: Money,
        paid: Money,
        due: Money,
    },
}

impl AuditEvent {
    /// One-line human description, used by `lims history`.
    pub fn describe(&self) -> String {
        match self {
            AuditEvent::Created {
                patient_id,
                analyses,
                billed,
                discount,
            } => format!(
                "created for patient {} with {} (billed {}, discount {})",
                patient_id,
                analyses.join(", "),
                billed,
                discount
            ),
            AuditEvent::ResultEntered {
                code,
                value,
                completion,
            } => format!("result {} = {:?} ({})", code, value, completion.as_str()),
            AuditEvent::AnalysisFlagged { code, flagged } => {
                if *flagged {
                    format!("analysis {} flagged", code)
                } else {
                    format!("analysis {} unflagged", code)
                }
            }
            AuditEvent::StatusChanged { from, to, reason } => {
                format!("status changed {} -> {} ({})", from, to, reason)
            }
            AuditEvent::BillingUpdated {
                billed,
                discount,
                paid,
                due,
            } => format!(
                "billing updated: billed {}, discount {}, paid {}, due {}",
                billed, discount, paid, due
            ),
            AuditEvent::PaymentRecorded {
                requested,
                applied,
                paid,
                due,
            } => format!(
                "payment of {} recorded (requested {}); paid {}, due {}",
                applied, requested, paid, due
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: String,
    pub request_id: String,
    /// Request version the change produced.
    pub version: u64,
    pub event: AuditEvent,
}

/// Append-only destination for audit records.
pub trait AuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()>;

    /// Records for one request, in the order they were appended.
    fn history(&self, request_id: &str) -> Result<Vec<AuditRecord>>;
}

/// Process-local audit sink.
#[derive(Debug, Default)]
pub struct InMemoryAudit {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Result<Vec<AuditRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("audit lock poisoned"))?;
        Ok(records.clone())
    }
}

impl AuditSink for InMemoryAudit {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("audit lock poisoned"))?
            .push(record.clone());
        Ok(())
    }

    fn history(&self, request_id: &str) -> Result<Vec<AuditRecord>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|record| record.request_id == request_id)
            .collect())
    }
}
