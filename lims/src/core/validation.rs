//! User-facing input validation and stored-state invariants.
//!
//! Validators inspect raw, un-clamped input and return stable messages
//! (empty on success). They never modify values; clamping stays in
//! `core::billing`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::billing::due_amount;
use crate::core::money::Money;
use crate::core::types::{CompletionState, Request};

static ANALYSIS_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid code regex"));

/// Check a bill before it is normalized.
pub fn validate_billing_input(subtotal: Money, discount: Money, paid: Money) -> Vec<String> {
    let mut errors = Vec::new();
    let billed = subtotal.clamp_min_zero();

    if subtotal.is_negative() {
        errors.push(format!("subtotal cannot be negative (got {})", subtotal));
    }
    if discount.is_negative() {
        errors.push(format!("discount cannot be negative (got {})", discount));
    } else if discount > billed {
        errors.push(format!("discount {} exceeds subtotal {}", discount, billed));
    }
    if paid.is_negative() {
        errors.push(format!("paid amount cannot be negative (got {})", paid));
    } else {
        let total = billed - discount.clamp(Money::ZERO, billed);
        if paid > total {
            errors.push(format!("paid amount {} exceeds net total {}", paid, total));
        }
    }

    errors
}

/// Check an incoming payment against the amount currently due.
pub fn validate_payment_input(amount: Money, due: Money) -> Vec<String> {
    let mut errors = Vec::new();

    if due <= Money::ZERO {
        errors.push("nothing is due on this request".to_string());
        return errors;
    }
    if amount <= Money::ZERO {
        errors.push(format!("payment amount must be positive (got {})", amount));
    } else if amount > due {
        errors.push(format!("payment amount {} exceeds due amount {}", amount, due));
    }

    errors
}

/// Check the fields required to register a new request.
pub fn validate_new_request(patient_id: &str, patient_name: &str, codes: &[&str]) -> Vec<String> {
    let mut errors = Vec::new();

    if patient_id.trim().is_empty() {
        errors.push("patient id is required".to_string());
    }
    if patient_name.trim().is_empty() {
        errors.push("patient name is required".to_string());
    }
    if codes.is_empty() {
        errors.push("at least one analysis is required".to_string());
    }

    let mut seen = HashSet::new();
    for code in codes {
        if !ANALYSIS_CODE_RE.is_match(code) {
            errors.push(format!("invalid analysis code '{}'", code));
        }
        if !seen.insert(*code) {
            errors.push(format!("duplicate analysis code '{}'", code));
        }
    }

    errors
}

/// Check invariants a stored request must satisfy.
///
/// - analysis codes non-empty and unique
/// - completion consistent with the result (except `flagged`)
/// - `0 <= discount <= billed`, `0 <= paid <= billed - discount`
/// - `due == max(0, (billed - discount) - paid)`
pub fn check_request_invariants(request: &Request) -> Vec<String> {
    let mut errors = Vec::new();
    let id = request.id.as_str();

    let mut seen = HashSet::new();
    for line in &request.analyses {
        if line.code.trim().is_empty() {
            errors.push(format!("{}: analysis code is empty", id));
        }
        if !seen.insert(line.code.as_str()) {
            errors.push(format!("{}: duplicate analysis code '{}'", id, line.code));
        }
        if line.completion != CompletionState::Flagged {
            let implied = CompletionState::from_result(line.result.as_deref());
            if line.completion != implied {
                errors.push(format!(
                    "{}: analysis '{}' is {} but its result implies {}",
                    id,
                    line.code,
                    line.completion.as_str(),
                    implied.as_str()
                ));
            }
        }
    }

    let billing = &request.billing;
    if billing.billed.is_negative() {
        errors.push(format!("{}: billed amount is negative", id));
    }
    if billing.discount.is_negative() || billing.discount > billing.billed {
        errors.push(format!(
            "{}: discount {} outside [0, {}]",
            id, billing.discount, billing.billed
        ));
    }
    if billing.paid.is_negative() || billing.paid > billing.net_total() {
        errors.push(format!(
            "{}: paid {} outside [0, {}]",
            id,
            billing.paid,
            billing.net_total()
        ));
    }
    let expected_due = due_amount(billing.billed, billing.discount, billing.paid);
    if billing.due != expected_due {
        errors.push(format!(
            "{}: due {} does not match expected {}",
            id, billing.due, expected_due
        ));
    }

    errors
}
