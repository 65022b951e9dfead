//! Status predicates and the transition table.
//!
//! ```text
//!   AWAITING_PAYMENT_APPROVAL ──► PAID ──► (any paid status) ──► COMPLETED (term.)
//!            │                                   │
//!            └──────────────► CANCELLED (term.) ◄┘
//! ```
//!
//! Paid statuses may move freely among themselves (admin override). Nothing
//! re-enters `AWAITING_PAYMENT_APPROVAL`. Re-applying the current status is
//! allowed so an admin can append a note without changing state.

use azfc_schemas::{Order, OrderStatus, TimelineEntry};
use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// StatusRules
// ---------------------------------------------------------------------------

/// Lifecycle predicates on [`OrderStatus`].
pub trait StatusRules {
    /// Payment has been captured (and the order was not cancelled).
    /// A paid order must never be captured again.
    fn is_paid(&self) -> bool;
    /// No transitions leave this status.
    fn is_terminal(&self) -> bool;
    /// Moving into this status emails the customer.
    fn notifies_customer(&self) -> bool;
    /// Human-readable label used in customer emails.
    fn label(&self) -> &'static str;
}

impl StatusRules for OrderStatus {
    fn is_paid(&self) -> bool {
        !matches!(
            self,
            OrderStatus::AwaitingPaymentApproval | OrderStatus::Cancelled
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    fn notifies_customer(&self) -> bool {
        matches!(
            self,
            OrderStatus::PacketGenerated
                | OrderStatus::SentToCustomer
                | OrderStatus::SentToCpa
                | OrderStatus::CpaApproved
                | OrderStatus::Completed
        )
    }

    fn label(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPaymentApproval => "Awaiting payment approval",
            OrderStatus::Paid => "Payment received",
            OrderStatus::PaidPendingBuild => "Paid, packet building",
            OrderStatus::Processing => "Processing",
            OrderStatus::ReadyForAdminReview => "Ready for admin review",
            OrderStatus::AdminApproved => "Approved by admin",
            OrderStatus::PacketGenerated => "Packet generated, admin review",
            OrderStatus::SentToCustomer => "Delivered to customer",
            OrderStatus::SentToCpa => "Sent to CPA for review",
            OrderStatus::CpaApproved => "CPA approved",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// Returned when a status change is not in the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("order is {from} and can no longer change status")]
    Terminal { from: OrderStatus },
    #[error("order cannot return to AWAITING_PAYMENT_APPROVAL from {from}")]
    ReenterAwaitingPayment { from: OrderStatus },
    #[error("unpaid order cannot move to {to}; capture payment first")]
    Unpaid { to: OrderStatus },
    #[error("order is {from}; payment is only captured from AWAITING_PAYMENT_APPROVAL")]
    NotAwaitingPayment { from: OrderStatus },
}

/// Check a single status change against the transition table.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), TransitionError> {
    if from == to {
        return Ok(());
    }
    if from.is_terminal() {
        return Err(TransitionError::Terminal { from });
    }
    if to == OrderStatus::AwaitingPaymentApproval {
        return Err(TransitionError::ReenterAwaitingPayment { from });
    }
    if from == OrderStatus::AwaitingPaymentApproval
        && !matches!(to, OrderStatus::Paid | OrderStatus::Cancelled)
    {
        return Err(TransitionError::Unpaid { to });
    }
    Ok(())
}

/// Append a timeline entry and move the order to `status`. No table check.
pub fn push_timeline(order: &mut Order, status: OrderStatus, note: impl Into<String>, now: DateTime<Utc>) {
    order.timeline.push(TimelineEntry {
        at: now,
        status,
        note: note.into(),
    });
    order.status = status;
    order.updated_at = now;
}

/// Checked status change. On error the order is left untouched.
pub fn apply_transition(
    order: &mut Order,
    to: OrderStatus,
    note: impl Into<String>,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    check_transition(order.status, to)?;
    push_timeline(order, to, note, now);
    Ok(())
}
