//! Explicit, caller-requested status transitions.
//!
//! These bypass the resolver. Sample handling (`collected`, `in_lab`),
//! sign-off (`verified`, `published`), rejection and restore are all
//! requested by a person, never derived from results.

use crate::core::status::all_complete;
use crate::core::types::{AnalysisLine, CompletionState, LifecycleStatus};

/// Check whether `current -> target` is an allowed explicit transition.
///
/// Returns the target on success, or stable violation messages.
pub fn plan_transition(
    current: LifecycleStatus,
    target: LifecycleStatus,
    lines: &[AnalysisLine],
) -> Result<LifecycleStatus, Vec<String>> {
    use LifecycleStatus::{Collected, InLab, Published, Received, Testing, Verified};

    let mut errors = Vec::new();

    if current == target {
        errors.push(format!("request is already {}", current));
        return Err(errors);
    }

    if current.is_terminal() {
        if target == Received {
            return Ok(target);
        }
        errors.push(format!(
            "request is {}; only restore (to received) is allowed",
            current
        ));
        return Err(errors);
    }

    match target {
        Received => errors.push(format!(
            "received is only reachable by restoring a terminal request (status={})",
            current
        )),
        Collected if current != Received => errors.push(format!(
            "collected requires a received request (status={})",
            current
        )),
        InLab if !matches!(current, Received | Collected) => errors.push(format!(
            "in_lab requires a received or collected request (status={})",
            current
        )),
        Testing if !matches!(current, Received | Collected | InLab) => errors.push(format!(
            "testing requires a request that has not started testing (status={})",
            current
        )),
        Verified => {
            if lines.is_empty() {
                errors.push("verified requires at least one analysis".to_string());
            } else if !all_complete(lines) {
                let open: Vec<&str> = lines
                    .iter()
                    .filter(|line| line.completion != CompletionState::Complete)
                    .map(|line| line.code.as_str())
                    .collect();
                errors.push(format!(
                    "verified requires every analysis complete (open: {})",
                    open.join(", ")
                ));
            }
        }
        Published if current != Verified => errors.push(format!(
            "published requires a verified request (status={})",
            current
        )),
        _ => {}
    }

    if errors.is_empty() {
        Ok(target)
    } else {
        Err(errors)
    }
}

/// Restore a terminal request back to `received`.
pub fn plan_restore(current: LifecycleStatus) -> Result<LifecycleStatus, Vec<String>> {
    if !current.is_terminal() {
        return Err(vec![format!(
            "only published or rejected requests can be restored (status={})",
            current
        )]);
    }
    Ok(LifecycleStatus::Received)
}
