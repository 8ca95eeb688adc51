//! Result entry and flagging on a request snapshot.
//!
//! Editing any result on a `verified` request re-opens it: the status is
//! downgraded to `testing` before the resolver runs, so verification has
//! to happen again.

use crate::core::status::resolve_status;
use crate::core::types::{AnalysisLine, CompletionState, LifecycleStatus, Request};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("request is {0} and its results can no longer change")]
    Terminal(LifecycleStatus),
    #[error("analysis '{0}' is not part of this request")]
    UnknownAnalysis(String),
}

/// What a single line edit did to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub code: String,
    pub completion: CompletionState,
    pub previous_status: LifecycleStatus,
    pub status: LifecycleStatus,
    /// True when a verified request was re-opened by this edit.
    pub reopened: bool,
}

impl EntryOutcome {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.status
    }
}

/// Updated request snapshot plus a description of the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub request: Request,
    pub outcome: EntryOutcome,
}

/// Set the result for `code` and recompute the request status.
///
/// A blank value clears the line back to `pending`.
pub fn enter_result(
    request: &Request,
    code: &str,
    value: &str,
) -> Result<ResultEntry, EntryError> {
    edit_line(request, code, |line| {
        line.result = Some(value.to_string());
        line.completion = CompletionState::from_result(line.result.as_deref());
    })
}

/// Apply or clear the out-of-band `flagged` override on one line.
///
/// Clearing restores the completion implied by the stored result.
pub fn flag_analysis(
    request: &Request,
    code: &str,
    flagged: bool,
) -> Result<ResultEntry, EntryError> {
    edit_line(request, code, |line| {
        line.completion = if flagged {
            CompletionState::Flagged
        } else {
            CompletionState::from_result(line.result.as_deref())
        };
    })
}

fn edit_line(
    request: &Request,
    code: &str,
    edit: impl FnOnce(&mut AnalysisLine),
) -> Result<ResultEntry, EntryError> {
    let previous_status = request.status;
    if previous_status.is_terminal() {
        return Err(EntryError::Terminal(previous_status));
    }

    let mut next = request.clone();
    let line = next
        .analyses
        .iter_mut()
        .find(|line| line.code == code)
        .ok_or_else(|| EntryError::UnknownAnalysis(code.to_string()))?;
    edit(line);
    let completion = line.completion;

    let reopened = previous_status == LifecycleStatus::Verified;
    let base = if reopened {
        LifecycleStatus::Testing
    } else {
        previous_status
    };
    next.status = resolve_status(base, &next.analyses);

    Ok(ResultEntry {
        outcome: EntryOutcome {
            code: code.to_string(),
            completion,
            previous_status,
            status: next.status,
            reopened: reopened && next.status != LifecycleStatus::Verified,
        },
        request: next,
    })
}
