use azfc_schemas::{Order, OrderStatus};
use chrono::{DateTime, Utc};

use crate::lifecycle::{apply_transition, TransitionError};

/// Partial update from the admin dashboard. `None` leaves a field as is;
/// an empty string clears notes or assignee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminPatch {
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
    pub assigned_to: Option<String>,
}

fn blank_to_none(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Apply a patch. The status change is checked first so a refused patch
/// leaves the whole order untouched. Returns the previous status when the
/// status actually changed.
pub fn apply_admin_patch(
    order: &mut Order,
    patch: AdminPatch,
    now: DateTime<Utc>,
) -> Result<Option<OrderStatus>, TransitionError> {
    let previous = order.status;
    if let Some(to) = patch.status {
        apply_transition(order, to, "Updated by admin", now)?;
    }
    if let Some(notes) = patch.notes {
        order.admin_notes = blank_to_none(notes);
        order.updated_at = now;
    }
    if let Some(who) = patch.assigned_to {
        order.assigned_to = blank_to_none(who);
        order.updated_at = now;
    }
    Ok((order.status != previous).then_some(previous))
}
