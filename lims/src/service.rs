//! Request orchestration: read snapshot, run core logic, commit, audit.
//!
//! Every mutation follows the same sequence:
//! 1. load the current request from the repository
//! 2. (strict mode) validate raw input and reject with messages
//! 3. compute the new snapshot with pure `core` functions
//! 4. save with the version read in step 1 (conflicts surface as errors)
//! 5. append one audit record per derived change

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audit::{AuditEvent, AuditRecord, AuditSink};
use crate::clock::{Clock, SystemClock};
use crate::core::billing::{normalize_billing, pay, reprice};
use crate::core::lifecycle::{plan_restore, plan_transition};
use crate::core::money::Money;
use crate::core::result_entry::{EntryOutcome, enter_result, flag_analysis};
use crate::core::types::{
    AnalysisLine, BillingBreakdown, LifecycleStatus, PaymentUpdate, Request, RequestBilling,
};
use crate::core::validation::{
    validate_billing_input, validate_new_request, validate_payment_input,
};
use crate::error::LimsError;
use crate::repository::RequestRepository;

/// How raw input is treated before it reaches the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Reject invalid input with user-facing messages.
    #[default]
    Strict,
    /// Pass input straight to the core and let it clamp.
    Lenient,
}

/// Input for registering a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub patient_id: String,
    pub patient_name: String,
    /// `(code, name)` pairs in order.
    pub analyses: Vec<(String, String)>,
    pub subtotal: Money,
    pub discount: Money,
}

/// Clamped breakdown plus the messages strict validation would raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingPreview {
    pub breakdown: BillingBreakdown,
    pub warnings: Vec<String>,
}

pub struct LabService<R, A> {
    repo: R,
    audit: A,
    clock: Arc<dyn Clock>,
    mode: ValidationMode,
}

impl<R: RequestRepository, A: AuditSink> LabService<R, A> {
    pub fn new(repo: R, audit: A, mode: ValidationMode) -> Self {
        Self {
            repo,
            audit,
            clock: Arc::new(SystemClock),
            mode,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn get(&self, id: &str) -> Result<Request> {
        debug!(request_id = id, "loading request");
        self.repo
            .get(id)?
            .ok_or_else(|| LimsError::NotFound(id.to_string()).into())
    }

    pub fn list(&self) -> Result<Vec<Request>> {
        self.repo.list()
    }

    pub fn history(&self, id: &str) -> Result<Vec<AuditRecord>> {
        self.get(id)?;
        self.audit.history(id)
    }

    /// Register a new request in `received` status with nothing paid.
    ///
    /// Patient and analysis-code rules apply in both modes; lenient mode only
    /// skips the billing checks and lets the core clamp amounts.
    pub fn create_request(&self, new: NewRequest) -> Result<Request> {
        let codes: Vec<&str> = new.analyses.iter().map(|(code, _)| code.trim()).collect();
        let mut errors = validate_new_request(&new.patient_id, &new.patient_name, &codes);
        if self.mode == ValidationMode::Strict {
            errors.extend(validate_billing_input(new.subtotal, new.discount, Money::ZERO));
        }
        reject_if_any(errors)?;

        let now = self.clock.timestamp();
        let breakdown = normalize_billing(new.subtotal, new.discount, Money::ZERO);
        let request = Request {
            id: String::new(),
            patient_id: new.patient_id.trim().to_string(),
            patient_name: new.patient_name.trim().to_string(),
            status: LifecycleStatus::Received,
            analyses: new
                .analyses
                .iter()
                .map(|(code, name)| AnalysisLine::pending(code.trim(), name.trim()))
                .collect(),
            billing: RequestBilling::from_breakdown(&breakdown),
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        };

        let stored = self.repo.insert(request).context("insert request")?;
        info!(request_id = %stored.id, analyses = stored.analyses.len(), "request created");
        self.append(
            &stored,
            vec![AuditEvent::Created {
                patient_id: stored.patient_id.clone(),
                analyses: stored.analyses.iter().map(|l| l.code.clone()).collect(),
                billed: stored.billing.billed,
                discount: stored.billing.discount,
            }],
        )?;
        Ok(stored)
    }

    /// Enter (or clear, with a blank value) one analysis result.
    pub fn enter_result(
        &self,
        id: &str,
        code: &str,
        value: &str,
    ) -> Result<(Request, EntryOutcome)> {
        let current = self.get(id)?;
        let entry = enter_result(&current, code, value).map_err(LimsError::from)?;

        let mut events = vec![AuditEvent::ResultEntered {
            code: code.to_string(),
            value: value.to_string(),
            completion: entry.outcome.completion,
        }];
        events.extend(status_event(&entry.outcome, "result entry"));

        let saved = self.commit(entry.request, events)?;
        info!(
            request_id = id,
            code,
            status = %saved.status,
            reopened = entry.outcome.reopened,
            "result entered"
        );
        Ok((saved, entry.outcome))
    }

    /// Set or clear the `flagged` override on one analysis.
    pub fn flag_analysis(&self, id: &str, code: &str, flagged: bool) -> Result<Request> {
        let current = self.get(id)?;
        let entry = flag_analysis(&current, code, flagged).map_err(LimsError::from)?;

        let mut events = vec![AuditEvent::AnalysisFlagged {
            code: code.to_string(),
            flagged,
        }];
        events.extend(status_event(&entry.outcome, "analysis flag"));

        let saved = self.commit(entry.request, events)?;
        info!(request_id = id, code, flagged, status = %saved.status, "analysis flag updated");
        Ok(saved)
    }

    /// Explicit status change requested by a user.
    ///
    /// Disallowed transitions are rejected in both validation modes.
    pub fn transition(&self, id: &str, target: LifecycleStatus) -> Result<Request> {
        let current = self.get(id)?;
        let next_status = plan_transition(current.status, target, &current.analyses)
            .map_err(LimsError::Rejected)?;
        let reason = if current.status.is_terminal() {
            "restore"
        } else {
            "manual"
        };
        self.change_status(current, next_status, reason)
    }

    /// Bring a published or rejected request back to `received`.
    pub fn restore(&self, id: &str) -> Result<Request> {
        let current = self.get(id)?;
        let next_status = plan_restore(current.status).map_err(LimsError::Rejected)?;
        self.change_status(current, next_status, "restore")
    }

    /// Re-price a request. Paid-so-far is kept, clamped to the new net total.
    pub fn update_billing(&self, id: &str, subtotal: Money, discount: Money) -> Result<Request> {
        let current = self.get(id)?;
        if self.mode == ValidationMode::Strict {
            reject_if_any(validate_billing_input(
                subtotal,
                discount,
                current.billing.paid,
            ))?;
        }

        let billing = reprice(&current.billing, subtotal, discount);
        let event = AuditEvent::BillingUpdated {
            billed: billing.billed,
            discount: billing.discount,
            paid: billing.paid,
            due: billing.due,
        };
        let saved = self.commit(Request { billing, ..current }, vec![event])?;
        info!(
            request_id = id,
            billed = %saved.billing.billed,
            discount = %saved.billing.discount,
            due = %saved.billing.due,
            "billing updated"
        );
        Ok(saved)
    }

    /// Record an incremental payment. Status is never touched.
    pub fn record_payment(&self, id: &str, amount: Money) -> Result<(Request, PaymentUpdate)> {
        let current = self.get(id)?;
        if self.mode == ValidationMode::Strict {
            reject_if_any(validate_payment_input(amount, current.billing.due))?;
        }

        let (billing, update) = pay(&current.billing, amount);
        let event = AuditEvent::PaymentRecorded {
            requested: amount,
            applied: update.applied,
            paid: update.new_paid,
            due: update.new_due,
        };
        let saved = self.commit(Request { billing, ..current }, vec![event])?;
        info!(
            request_id = id,
            applied = %update.applied,
            due = %update.new_due,
            "payment recorded"
        );
        Ok((saved, update))
    }

    /// Compute a bill without touching any request.
    pub fn preview_billing(&self, subtotal: Money, discount: Money, paid: Money) -> BillingPreview {
        preview_billing(subtotal, discount, paid)
    }

    fn change_status(
        &self,
        current: Request,
        to: LifecycleStatus,
        reason: &str,
    ) -> Result<Request> {
        let from = current.status;
        let event = AuditEvent::StatusChanged {
            from,
            to,
            reason: reason.to_string(),
        };
        let saved = self.commit(
            Request {
                status: to,
                ..current
            },
            vec![event],
        )?;
        info!(request_id = %saved.id, %from, %to, reason, "status changed");
        Ok(saved)
    }

    fn commit(&self, mut request: Request, events: Vec<AuditEvent>) -> Result<Request> {
        request.updated_at = self.clock.timestamp();
        let saved = self.repo.save(request)?;
        self.append(&saved, events)?;
        Ok(saved)
    }

    fn append(&self, request: &Request, events: Vec<AuditEvent>) -> Result<()> {
        for event in events {
            self.audit
                .record(&AuditRecord {
                    at: request.updated_at.clone(),
                    request_id: request.id.clone(),
                    version: request.version,
                    event,
                })
                .with_context(|| format!("append audit record for {}", request.id))?;
        }
        Ok(())
    }
}

/// Clamped breakdown plus the strict-mode messages for the same input.
pub fn preview_billing(subtotal: Money, discount: Money, paid: Money) -> BillingPreview {
    BillingPreview {
        breakdown: normalize_billing(subtotal, discount, paid),
        warnings: validate_billing_input(subtotal, discount, paid),
    }
}

fn status_event(outcome: &EntryOutcome, reason: &str) -> Option<AuditEvent> {
    if !outcome.status_changed() {
        return None;
    }
    let reason = if outcome.reopened {
        format!("{} re-opened verification", reason)
    } else {
        reason.to_string()
    };
    Some(AuditEvent::StatusChanged {
        from: outcome.previous_status,
        to: outcome.status,
        reason,
    })
}

fn reject_if_any(errors: Vec<String>) -> Result<(), LimsError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(LimsError::Rejected(errors))
    }
}
