//! Billing normalization and incremental payment application.
//!
//! Both operations clamp out-of-range input instead of failing. They are
//! called for live previews and for commits with identical semantics;
//! rejecting bad input with a message is `core::validation`'s job.

use crate::core::money::Money;
use crate::core::types::{BillingBreakdown, PaymentUpdate, RequestBilling};

/// Clamp a bill into a consistent breakdown.
///
/// - `subtotal >= 0`
/// - `0 <= discount <= subtotal`
/// - `0 <= paid <= total`
/// - `balance = max(0, total - paid)`
pub fn normalize_billing(subtotal: Money, discount: Money, paid: Money) -> BillingBreakdown {
    let subtotal = subtotal.clamp_min_zero();
    let discount = discount.clamp(Money::ZERO, subtotal);
    let total = subtotal - discount;
    let paid = paid.clamp(Money::ZERO, total);
    let balance = (total - paid).clamp_min_zero();

    BillingBreakdown {
        subtotal,
        discount,
        total,
        paid,
        balance,
    }
}

/// Apply an incoming payment against `net_total`.
///
/// Non-positive amounts apply nothing; overpayments are capped at the
/// remaining balance.
pub fn apply_payment(current_paid: Money, net_total: Money, incoming: Money) -> PaymentUpdate {
    let net_total = net_total.clamp_min_zero();
    let current_paid = current_paid.clamp_min_zero();
    let remaining = (net_total - current_paid).clamp_min_zero();
    let applied = incoming.clamp(Money::ZERO, remaining);
    let new_paid = current_paid + applied;
    let new_due = (net_total - new_paid).clamp_min_zero();

    PaymentUpdate {
        applied,
        new_paid,
        new_due,
    }
}

/// `max(0, (billed - discount) - paid)`.
pub fn due_amount(billed: Money, discount: Money, paid: Money) -> Money {
    ((billed - discount) - paid).clamp_min_zero()
}

/// Re-price a request, keeping what has already been paid.
///
/// If the new net total is below the paid amount, paid is clamped down to it.
pub fn reprice(current: &RequestBilling, subtotal: Money, discount: Money) -> RequestBilling {
    RequestBilling::from_breakdown(&normalize_billing(subtotal, discount, current.paid))
}

/// Apply a payment to request billing, returning the new billing and the update.
pub fn pay(current: &RequestBilling, incoming: Money) -> (RequestBilling, PaymentUpdate) {
    let update = apply_payment(current.paid, current.net_total(), incoming);
    let billing = RequestBilling {
        paid: update.new_paid,
        due: update.new_due,
        ..*current
    };
    (billing, update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    fn breakdown(
        subtotal: i64,
        discount: i64,
        total: i64,
        paid: i64,
        balance: i64,
    ) -> BillingBreakdown {
        BillingBreakdown {
            subtotal: m(subtotal),
            discount: m(discount),
            total: m(total),
            paid: m(paid),
            balance: m(balance),
        }
    }

    /// Discount is clamped to the subtotal; paid is forced to zero because total is zero.
    #[test]
    fn normalize_clamps_discount_over_subtotal() {
        assert_eq!(
            normalize_billing(m(1000), m(1200), m(900)),
            breakdown(1000, 1000, 0, 0, 0)
        );
    }

    #[test]
    fn normalize_floors_negative_discount_and_paid() {
        assert_eq!(
            normalize_billing(m(800), m(-50), m(-25)),
            breakdown(800, 0, 800, 0, 800)
        );
    }

    #[test]
    fn normalize_floors_negative_subtotal() {
        assert_eq!(
            normalize_billing(m(-300), m(100), m(100)),
            breakdown(0, 0, 0, 0, 0)
        );
    }

    #[test]
    fn normalize_keeps_valid_input_untouched() {
        assert_eq!(
            normalize_billing(m(1000), m(100), m(400)),
            breakdown(1000, 100, 900, 400, 500)
        );
    }

    #[test]
    fn normalize_invariants_hold_across_inputs() {
        let samples = [-1000, -1, 0, 1, 250, 999, 1000, 5000];
        for subtotal in samples {
            for discount in samples {
                for paid in samples {
                    let out = normalize_billing(m(subtotal), m(discount), m(paid));
                    assert!(out.discount >= Money::ZERO && out.discount <= out.subtotal);
                    assert!(out.paid >= Money::ZERO && out.paid <= out.total);
                    assert!(out.balance >= Money::ZERO);
                    assert_eq!(out.total, out.subtotal - out.discount);
                }
            }
        }
    }

    #[test]
    fn overpayment_is_capped_at_remaining_balance() {
        let update = apply_payment(m(100), m(500), m(1000));
        assert_eq!(update.applied, m(400));
        assert_eq!(update.new_paid, m(500));
        assert_eq!(update.new_due, m(0));
    }

    #[test]
    fn exact_payoff_clears_due() {
        let update = apply_payment(m(150), m(500), m(350));
        assert_eq!(update.applied, m(350));
        assert_eq!(update.new_paid, m(500));
        assert_eq!(update.new_due, m(0));
    }

    #[test]
    fn negative_payment_is_a_no_op() {
        let update = apply_payment(m(100), m(500), m(-50));
        assert_eq!(update.applied, m(0));
        assert_eq!(update.new_paid, m(100));
        assert_eq!(update.new_due, m(400));
    }

    #[test]
    fn zero_payment_never_changes_totals() {
        for (paid, net) in [(0, 0), (0, 500), (250, 500), (500, 500)] {
            let update = apply_payment(m(paid), m(net), m(0));
            assert_eq!(update.applied, m(0));
            assert_eq!(update.new_paid, m(paid));
            assert_eq!(update.new_due, m(net - paid));
        }
    }

    /// A previously overpaid snapshot never yields a negative due or applied amount.
    #[test]
    fn payment_against_already_overpaid_total() {
        let update = apply_payment(m(700), m(500), m(100));
        assert_eq!(update.applied, m(0));
        assert_eq!(update.new_paid, m(700));
        assert_eq!(update.new_due, m(0));
    }

    #[test]
    fn payment_invariants_hold_for_extreme_amounts() {
        for incoming in [i64::MIN, -1, 0, 1, 499, 500, i64::MAX] {
            let update = apply_payment(m(0), m(500), m(incoming));
            assert!(update.applied >= Money::ZERO);
            assert!(update.new_paid <= m(500));
        }
    }

    #[test]
    fn due_amount_floors_at_zero() {
        assert_eq!(due_amount(m(1000), m(200), m(300)), m(500));
        assert_eq!(due_amount(m(1000), m(200), m(900)), m(0));
    }

    #[test]
    fn reprice_clamps_paid_to_lower_total() {
        let current = RequestBilling::from_breakdown(&normalize_billing(m(1000), m(0), m(800)));
        let repriced = reprice(&current, m(600), m(100));
        assert_eq!(repriced.billed, m(600));
        assert_eq!(repriced.discount, m(100));
        assert_eq!(repriced.paid, m(500));
        assert_eq!(repriced.due, m(0));
    }

    #[test]
    fn pay_updates_paid_and_due_only() {
        let current = RequestBilling::from_breakdown(&normalize_billing(m(1000), m(100), m(0)));
        let (billing, update) = pay(&current, m(400));
        assert_eq!(update.applied, m(400));
        assert_eq!(billing.billed, m(1000));
        assert_eq!(billing.discount, m(100));
        assert_eq!(billing.paid, m(400));
        assert_eq!(billing.due, m(500));
    }
}
