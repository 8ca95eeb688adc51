//! Request status resolution from analysis completion.
//!
//! Rules, first match wins:
//! - `published`/`rejected` are locked and returned unchanged.
//! - every line `complete` resolves to `verified`.
//! - `received`/`collected`/`in_lab` move to `testing` once entry has begun.
//! - anything else keeps its current status.

use crate::core::types::{AnalysisLine, CompletionState, LifecycleStatus};

/// Compute the next lifecycle status for a request.
///
/// An empty line set never resolves to `verified`; the current status is
/// returned unchanged. `Flagged` lines count as incomplete.
pub fn resolve_status(current: LifecycleStatus, lines: &[AnalysisLine]) -> LifecycleStatus {
    if current.is_terminal() {
        return current;
    }

    if lines.is_empty() {
        return current;
    }

    if all_complete(lines) {
        return LifecycleStatus::Verified;
    }

    match current {
        LifecycleStatus::Received | LifecycleStatus::Collected | LifecycleStatus::InLab => {
            LifecycleStatus::Testing
        }
        other => other,
    }
}

/// True when every line is `complete`. Vacuously true for no lines.
pub fn all_complete(lines: &[AnalysisLine]) -> bool {
    lines
        .iter()
        .all(|line| line.completion == CompletionState::Complete)
}
