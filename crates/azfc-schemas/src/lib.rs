//! Serializable records shared by every azfc crate.
//!
//! These types carry no behaviour beyond parsing/formatting helpers. The order
//! lifecycle rules live in `azfc-orders`; persistence lives in `azfc-store`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Every status label an order can carry.
///
/// Serialized as SCREAMING_SNAKE_CASE. [`OrderStatus::parse`] is
/// case-insensitive so older lowercase labels (`packet_generated`, `paid`)
/// still resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    AwaitingPaymentApproval,
    Paid,
    PaidPendingBuild,
    Processing,
    ReadyForAdminReview,
    AdminApproved,
    PacketGenerated,
    SentToCustomer,
    SentToCpa,
    CpaApproved,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 12] = [
        OrderStatus::AwaitingPaymentApproval,
        OrderStatus::Paid,
        OrderStatus::PaidPendingBuild,
        OrderStatus::Processing,
        OrderStatus::ReadyForAdminReview,
        OrderStatus::AdminApproved,
        OrderStatus::PacketGenerated,
        OrderStatus::SentToCustomer,
        OrderStatus::SentToCpa,
        OrderStatus::CpaApproved,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPaymentApproval => "AWAITING_PAYMENT_APPROVAL",
            OrderStatus::Paid => "PAID",
            OrderStatus::PaidPendingBuild => "PAID_PENDING_BUILD",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::ReadyForAdminReview => "READY_FOR_ADMIN_REVIEW",
            OrderStatus::AdminApproved => "ADMIN_APPROVED",
            OrderStatus::PacketGenerated => "PACKET_GENERATED",
            OrderStatus::SentToCustomer => "SENT_TO_CUSTOMER",
            OrderStatus::SentToCpa => "SENT_TO_CPA",
            OrderStatus::CpaApproved => "CPA_APPROVED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Case-insensitive parse. Returns `None` for unknown labels.
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|st| st.as_str() == wanted)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Service plan chosen on the order form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Document prep only.
    Prep,
    /// Document prep plus certified AZ CPA sign-off.
    PrepCpa,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Prep => "prep",
            Plan::PrepCpa => "prep_cpa",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prep" => Some(Plan::Prep),
            "prep_cpa" => Some(Plan::PrepCpa),
            _ => None,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub company_name: String,
    pub contact_name: String,
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
}

/// Production details captured on the order form. Free-text fields default
/// to empty strings so partially filled forms round-trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_title: String,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub aca_id: String,
    #[serde(default)]
    pub aca_post_cert_id: String,
    #[serde(default)]
    pub est_qualified_costs: String,
    #[serde(default)]
    pub tax_year: Option<i32>,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub entity_tax_type: String,
    #[serde(default)]
    pub ein_last4: String,
    #[serde(default)]
    pub prod_start: String,
    #[serde(default)]
    pub prod_end: String,
    #[serde(default)]
    pub notes: String,
}

/// One entry of the append-only order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub at: DateTime<Utc>,
    pub status: OrderStatus,
    pub note: String,
}

/// Outcome of a PayPal capture as stored on the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCapture {
    pub id: Option<String>,
    pub status: Option<String>,
}

/// Draft documents attached after payment capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exports {
    pub audit_pdf: String,
    pub state_forms_pdf: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub tracking_number: String,
    pub paypal_order_id: Option<String>,
    pub status: OrderStatus,
    pub plan: Plan,
    pub amount_cents: i64,
    pub currency: String,
    pub customer: Customer,
    pub project: Project,
    #[serde(default)]
    pub exports: Option<Exports>,
    #[serde(default)]
    pub paypal_capture: Option<PaymentCapture>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub packet_path: Option<String>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer-facing projection of an [`Order`]: admin notes and assignee are
/// never returned by the public tracking endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicOrderView {
    pub tracking_number: String,
    pub status: OrderStatus,
    pub plan: Plan,
    pub amount: String,
    pub currency: String,
    pub customer: Customer,
    pub project: Project,
    pub exports: Option<Exports>,
    pub timeline: Vec<TimelineEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for PublicOrderView {
    fn from(o: &Order) -> Self {
        Self {
            tracking_number: o.tracking_number.clone(),
            status: o.status,
            plan: o.plan,
            amount: format_cents(o.amount_cents),
            currency: o.currency.clone(),
            customer: o.customer.clone(),
            project: o.project.clone(),
            exports: o.exports.clone(),
            timeline: o.timeline.clone(),
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Uploads + ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Received,
    Parsed,
    Failed,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStatus::Received => "received",
            ParseStatus::Parsed => "parsed",
            ParseStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "received" => Some(ParseStatus::Received),
            "parsed" => Some(ParseStatus::Parsed),
            "failed" => Some(ParseStatus::Failed),
            _ => None,
        }
    }
}

/// A customer file registered for upload into object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Caller-chosen category, e.g. `ledger`, `receipts`.
    pub kind: String,
    pub bucket: String,
    pub path: String,
    pub original_name: String,
    pub mime: Option<String>,
    pub size: Option<i64>,
    pub parse_status: ParseStatus,
    pub created_at: DateTime<Utc>,
}

/// One imported ledger line. Amounts are integer cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub order_id: Uuid,
    pub source_upload_id: Uuid,

    pub txn_date: Option<String>,
    pub vendor_name: String,
    pub vendor_address: Option<String>,
    pub vendor_city: Option<String>,
    pub vendor_state: Option<String>,
    pub vendor_zip: Option<String>,

    pub invoice_number: Option<String>,
    pub description: String,

    pub category: Option<String>,
    pub department: Option<String>,
    pub cost_type: Option<String>,
    pub episode: Option<String>,

    pub payment_method: Option<String>,
    pub amount_cents: i64,
    pub currency: String,

    pub az_work_performed: bool,
    pub az_vendor: bool,
    pub qualified_flag: bool,
    pub nonqualified_reason: Option<String>,

    pub receipt_filename: Option<String>,
    pub contract_filename: Option<String>,
    pub location_agreement_filename: Option<String>,
    pub notes: Option<String>,
}

/// Per-order credit computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalcTotals {
    pub order_id: Uuid,
    pub qualified_costs_cents: i64,
    pub nonqualified_costs_cents: i64,
    /// Credit rate in basis points (1500 = 15%).
    pub credit_rate_bps: i64,
    pub credit_computed_cents: i64,
    pub claim_this_year_cents: i64,
    pub carryforward_cents: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPacket {
    pub tracking_number: String,
    pub packet_path: String,
    pub packet_type: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Render integer cents as a fixed two-decimal string (`7900` -> `"79.00"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Render a basis-point rate as a decimal fraction (`1500` -> `"0.15"`).
pub fn format_rate_bps(bps: i64) -> String {
    let abs = bps.unsigned_abs();
    let sign = if bps < 0 { "-" } else { "" };
    let whole = abs / 10_000;
    let frac = format!("{:04}", abs % 10_000);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(
            OrderStatus::parse("packet_generated"),
            Some(OrderStatus::PacketGenerated)
        );
        assert_eq!(OrderStatus::parse(" PAID "), Some(OrderStatus::Paid));
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let s = serde_json::to_string(&OrderStatus::ReadyForAdminReview).unwrap();
        assert_eq!(s, "\"READY_FOR_ADMIN_REVIEW\"");
        for st in OrderStatus::ALL {
            let json = serde_json::to_string(&st).unwrap();
            assert_eq!(json, format!("\"{}\"", st.as_str()));
        }
    }

    #[test]
    fn plan_parse() {
        assert_eq!(Plan::parse("prep_cpa"), Some(Plan::PrepCpa));
        assert_eq!(Plan::parse("PREP"), Some(Plan::Prep));
        assert_eq!(Plan::parse("premium"), None);
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_cents(7900), "79.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-1234), "-12.34");
        assert_eq!(format_rate_bps(1500), "0.15");
        assert_eq!(format_rate_bps(10_000), "1");
        assert_eq!(format_rate_bps(2025), "0.2025");
    }
}
