//! Shared deterministic types for the lab core.
//!
//! These types define stable contracts between core components and the
//! persisted store. They must not depend on external state or I/O; serde
//! labels are part of the on-disk format and must not change casually.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::money::Money;

/// Processing stage of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Received,
    Collected,
    InLab,
    Testing,
    Verified,
    Published,
    Rejected,
}

impl LifecycleStatus {
    pub const ALL: [LifecycleStatus; 7] = [
        LifecycleStatus::Received,
        LifecycleStatus::Collected,
        LifecycleStatus::InLab,
        LifecycleStatus::Testing,
        LifecycleStatus::Verified,
        LifecycleStatus::Published,
        LifecycleStatus::Rejected,
    ];

    /// Published and rejected requests are locked against automatic transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleStatus::Published | LifecycleStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleStatus::Received => "received",
            LifecycleStatus::Collected => "collected",
            LifecycleStatus::InLab => "in_lab",
            LifecycleStatus::Testing => "testing",
            LifecycleStatus::Verified => "verified",
            LifecycleStatus::Published => "published",
            LifecycleStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        LifecycleStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

/// Completion state of a single analysis line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Pending,
    Complete,
    /// Out-of-band override; never produced by result entry.
    Flagged,
}

impl CompletionState {
    /// Completion implied by a result value: non-blank means complete.
    pub fn from_result(result: Option<&str>) -> Self {
        if result.is_some_and(|value| !value.trim().is_empty()) {
            CompletionState::Complete
        } else {
            CompletionState::Pending
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompletionState::Pending => "pending",
            CompletionState::Complete => "complete",
            CompletionState::Flagged => "flagged",
        }
    }
}

/// One ordered test within a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisLine {
    /// Unique within the owning request.
    pub code: String,
    pub name: String,
    pub completion: CompletionState,
    pub result: Option<String>,
}

impl AnalysisLine {
    pub fn pending(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            completion: CompletionState::Pending,
            result: None,
        }
    }

    /// True when the result is present and not blank.
    pub fn is_entered(&self) -> bool {
        CompletionState::from_result(self.result.as_deref()) == CompletionState::Complete
    }
}

/// Billing fields carried on the request itself.
///
/// `due` is derived and always equals `max(0, (billed - discount) - paid)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBilling {
    pub billed: Money,
    pub discount: Money,
    pub paid: Money,
    pub due: Money,
}

impl RequestBilling {
    pub fn from_breakdown(breakdown: &BillingBreakdown) -> Self {
        Self {
            billed: breakdown.subtotal,
            discount: breakdown.discount,
            paid: breakdown.paid,
            due: breakdown.balance,
        }
    }

    /// Billed amount minus discount.
    pub fn net_total(&self) -> Money {
        self.billed - self.discount
    }
}

/// A lab test order: the unit of billing and lifecycle tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub status: LifecycleStatus,
    pub analyses: Vec<AnalysisLine>,
    pub billing: RequestBilling,
    /// Optimistic-concurrency token, bumped by every successful save.
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl Request {
    pub fn analysis(&self, code: &str) -> Option<&AnalysisLine> {
        self.analyses.iter().find(|line| line.code == code)
    }
}

/// Output of `normalize_billing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingBreakdown {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub paid: Money,
    pub balance: Money,
}

/// Output of `apply_payment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub applied: Money,
    pub new_paid: Money,
    pub new_due: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_round_trip_through_from_str() {
        for status in LifecycleStatus::ALL {
            assert_eq!(status.as_str().parse::<LifecycleStatus>(), Ok(status));
        }
        assert_eq!("In-Lab".parse::<LifecycleStatus>(), Ok(LifecycleStatus::InLab));
        assert!("archived".parse::<LifecycleStatus>().is_err());
    }

    #[test]
    fn only_published_and_rejected_are_terminal() {
        let terminal: Vec<_> = LifecycleStatus::ALL
            .into_iter()
            .filter(|status| status.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![LifecycleStatus::Published, LifecycleStatus::Rejected]
        );
    }

    /// Whitespace-only results do not count as entered.
    #[test]
    fn completion_from_result_ignores_blank_values() {
        assert_eq!(CompletionState::from_result(None), CompletionState::Pending);
        assert_eq!(CompletionState::from_result(Some("  \t")), CompletionState::Pending);
        assert_eq!(CompletionState::from_result(Some("4.2")), CompletionState::Complete);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&LifecycleStatus::InLab).expect("serialize");
        assert_eq!(json, "\"in_lab\"");
    }
}
