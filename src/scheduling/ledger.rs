use serde::{Deserialize, Serialize};

use crate::models::{Payment, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEventType {
    Payment,
    Refund,
    Adjustment,
}

/// Transaction pushed by the ledger against an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub amount_cents: i64,
    #[serde(rename = "type")]
    pub kind: LedgerEventType,
    pub method: Option<String>,
}

/// Applies one ledger transaction to the cached payment summary.
///
/// Payments add, refunds subtract with a floor of zero, adjustments leave the
/// amount alone. Status is recomputed as `paid` for any positive amount, else `pending`.
pub fn apply_to_payment(payment: &mut Payment, event: &LedgerEvent) {
    match event.kind {
        LedgerEventType::Payment => {
            payment.amount_cents = payment.amount_cents.saturating_add(event.amount_cents);
        }
        LedgerEventType::Refund => {
            payment.amount_cents = payment.amount_cents.saturating_sub(event.amount_cents).max(0);
        }
        LedgerEventType::Adjustment => {}
    }

    if event.kind != LedgerEventType::Adjustment {
        if let Some(method) = event.method.as_ref().filter(|m| !m.trim().is_empty()) {
            payment.method = Some(method.clone());
        }
    }

    payment.status = if payment.amount_cents > 0 {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Pending
    };
}
