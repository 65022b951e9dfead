//! Request and response types for all azfc-daemon HTTP endpoints.
//!
//! Key casing follows what the site's pages already post and read: most
//! bodies are camelCase, the packet endpoint is snake_case. No business
//! logic lives here.

use azfc_ledger::IngestReport;
use azfc_schemas::{CalcTotals, Order, OrderStatus, PublicOrderView};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// /api/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ---------------------------------------------------------------------------
// /api/checkout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub tracking_number: String,
    pub paypal_order_id: String,
    pub approve_url: Option<String>,
}

// ---------------------------------------------------------------------------
// /api/capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    #[serde(alias = "trackingNumber")]
    pub tracking: Option<String>,
    /// PayPal appends `token=<order id>` to the return URL; pages post it as
    /// `paypalOrderId` (older ones as `orderID`).
    #[serde(alias = "orderID")]
    pub paypal_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub already_captured: Option<bool>,
    pub order: PublicOrderView,
}

// ---------------------------------------------------------------------------
// /api/track
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackQuery {
    pub tracking: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
    pub order: PublicOrderView,
}

// ---------------------------------------------------------------------------
// /api/uploads/signed-url  /api/ingest-ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUploadRequest {
    pub tracking_number: Option<String>,
    /// Upload category, e.g. `ledger` or `receipts`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub filename: Option<String>,
    pub mime: Option<String>,
    /// Bytes; pages send a number, some send a string.
    pub size: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUploadResponse {
    pub success: bool,
    pub upload_id: String,
    pub bucket: String,
    pub path: String,
    pub token: String,
    pub signed_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestLedgerRequest {
    pub tracking_number: Option<String>,
    pub upload_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestLedgerResponse {
    pub success: bool,
    pub imported: usize,
    pub skipped: usize,
    pub report: IngestReport,
    pub totals: CalcTotals,
}

// ---------------------------------------------------------------------------
// /api/admin/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrdersQuery {
    /// Raw so an unparseable value falls back to the default instead of 400.
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(alias = "trackingNumber")]
    pub tracking: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdateRequest {
    pub tracking_number: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyCustomerRequest {
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyCustomerResponse {
    pub success: bool,
    pub sent_to: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratePacketRequest {
    #[serde(alias = "trackingNumber")]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratePacketResponse {
    pub success: bool,
    pub tracking_number: String,
    pub packet_path: String,
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
    #[serde(rename = "newStatus")]
    pub new_status: OrderStatus,
}
