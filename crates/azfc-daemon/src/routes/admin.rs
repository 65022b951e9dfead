//! Admin session and dashboard actions. Everything except login, logout and
//! `me` requires an [`AdminSession`].

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use azfc_notify::{packet_ready, status_update};
use azfc_orders::{apply_admin_patch, apply_transition, check_transition, AdminPatch, StatusRules};
use azfc_packet::{packet_path, render_packet_pdf, PACKET_TYPE};
use azfc_schemas::{GeneratedPacket, Order, OrderStatus};
use azfc_store::{LedgerStore, OrderStore};
use chrono::Utc;
use tracing::{info, warn};

use super::{parse_body, present, send_best_effort, site_base_url};
use crate::{
    api_types::{
        GeneratePacketRequest, GeneratePacketResponse, LoginRequest, MeResponse,
        NotifyCustomerRequest, NotifyCustomerResponse, OrderResponse, OrderUpdateRequest,
        OrdersQuery, OrdersResponse, SuccessResponse, UpdateStatusRequest,
    },
    auth::{cleared_cookie, secrets_equal, session_cookie, sign_session, AdminSession},
    error::ApiError,
    state::AppState,
};

pub const DEFAULT_ORDER_LIMIT: usize = 200;
pub const MAX_ORDER_LIMIT: usize = 200;

fn order_limit(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_ORDER_LIMIT)
        .clamp(1, MAX_ORDER_LIMIT)
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    OrderStatus::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("Unknown status: {raw}")))
}

async fn load_order(st: &AppState, tracking: &str) -> Result<Order, ApiError> {
    st.store
        .get_order(tracking)
        .await?
        .ok_or_else(|| ApiError::NotFound("Not found".to_string()))
}

/// Status email after an admin change, only when the new status is one the
/// customer hears about.
async fn notify_if_changed(st: &AppState, headers: &HeaderMap, order: &Order, changed: bool) {
    if changed && order.status.notifies_customer() {
        let base = site_base_url(&st.settings, headers).unwrap_or_default();
        send_best_effort(st, status_update(order, &base), "status_update").await;
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub(crate) async fn login(
    State(st): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: LoginRequest = parse_body(&body)?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing password".to_string()))?;
    let (Some(expected), Some(secret)) = (&st.admin.password, &st.admin.session_secret) else {
        return Err(ApiError::Misconfigured("Server missing ADMIN env vars".to_string()));
    };
    if !secrets_equal(expected, &password) {
        warn!("admin login refused");
        return Err(ApiError::Unauthorized("Invalid password".to_string()));
    }

    let ttl = st.settings.admin_session_ttl_secs;
    let token = sign_session(secret, Utc::now().timestamp_millis(), ttl)
        .map_err(|e| ApiError::internal("Could not issue admin session", e.into()))?;
    info!("admin login");
    Ok((
        [(header::SET_COOKIE, session_cookie(&token, ttl))],
        Json(SuccessResponse { success: true }),
    ))
}

pub(crate) async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, cleared_cookie())],
        Json(SuccessResponse { success: true }),
    )
}

pub(crate) async fn me(State(st): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if st.admin.is_admin(&headers, Utc::now().timestamp_millis()) {
        (StatusCode::OK, Json(MeResponse { ok: true }))
    } else {
        (StatusCode::UNAUTHORIZED, Json(MeResponse { ok: false }))
    }
}

// ---------------------------------------------------------------------------
// GET /api/admin/orders?limit=
// ---------------------------------------------------------------------------

/// Newest first.
pub(crate) async fn orders(
    _admin: AdminSession,
    State(st): State<Arc<AppState>>,
    Query(q): Query<OrdersQuery>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let limit = order_limit(q.limit.as_deref());
    let orders = st.store.list_orders(limit).await?;
    Ok(Json(OrdersResponse {
        success: true,
        orders,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/admin/update-status
// ---------------------------------------------------------------------------

pub(crate) async fn update_status(
    _admin: AdminSession,
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<OrderResponse>, ApiError> {
    let req: UpdateStatusRequest = parse_body(&body)?;
    let (Some(tracking), Some(raw_status)) = (present(req.tracking), present(req.status)) else {
        return Err(ApiError::BadRequest("Missing tracking/status".to_string()));
    };
    let to = parse_status(&raw_status)?;
    let mut order = load_order(&st, &tracking).await?;

    let from = order.status;
    apply_transition(&mut order, to, "Updated by admin", Utc::now())
        .map_err(|e| ApiError::Conflict(e.to_string()))?;
    st.store.put_order(&order).await?;
    info!(tracking = %tracking, from = %from, to = %to, "status updated");

    notify_if_changed(&st, &headers, &order, from != to).await;
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/admin/order-update
// ---------------------------------------------------------------------------

/// Status, notes and assignee in one call; absent fields are left alone.
pub(crate) async fn order_update(
    _admin: AdminSession,
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<OrderResponse>, ApiError> {
    let req: OrderUpdateRequest = parse_body(&body)?;
    let tracking = present(req.tracking_number)
        .ok_or_else(|| ApiError::BadRequest("Missing trackingNumber".to_string()))?;
    let status = present(req.status).map(|s| parse_status(&s)).transpose()?;
    let mut order = load_order(&st, &tracking).await?;

    let previous = apply_admin_patch(
        &mut order,
        AdminPatch {
            status,
            notes: req.notes,
            assigned_to: req.assigned_to,
        },
        Utc::now(),
    )
    .map_err(|e| ApiError::Conflict(e.to_string()))?;
    st.store.put_order(&order).await?;
    info!(tracking = %tracking, status = %order.status, status_changed = previous.is_some(), "order updated");

    notify_if_changed(&st, &headers, &order, previous.is_some()).await;
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/admin/notify-customer
// ---------------------------------------------------------------------------

/// Re-send the status email for the order's current status.
pub(crate) async fn notify_customer(
    _admin: AdminSession,
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<NotifyCustomerResponse>, ApiError> {
    let req: NotifyCustomerRequest = parse_body(&body)?;
    let tracking = present(req.tracking_number)
        .ok_or_else(|| ApiError::BadRequest("Missing trackingNumber".to_string()))?;
    let order = load_order(&st, &tracking).await?;

    let base = site_base_url(&st.settings, &headers).unwrap_or_default();
    let email = status_update(&order, &base);
    st.mailer.send(&email).await.map_err(ApiError::upstream)?;
    info!(tracking = %tracking, status = %order.status, "customer notified");

    Ok(Json(NotifyCustomerResponse {
        success: true,
        sent_to: email.to,
        status: order.status,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/admin/generate-packet
// ---------------------------------------------------------------------------

/// Render the CPA packet PDF from the order and its computed totals, store it,
/// move the order to `PACKET_GENERATED` and email the customer a signed link.
pub(crate) async fn generate_packet(
    _admin: AdminSession,
    State(st): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GeneratePacketResponse>, ApiError> {
    let req: GeneratePacketRequest = parse_body(&body)?;
    let tracking = present(req.tracking_number)
        .ok_or_else(|| ApiError::BadRequest("tracking_number is required".to_string()))?;
    let storage = st.storage()?;
    let mut order = load_order(&st, &tracking).await?;
    check_transition(order.status, OrderStatus::PacketGenerated)
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    let now = Utc::now();
    let totals = st.store.get_totals(order.id).await?;
    let pdf = render_packet_pdf(&order, totals.as_ref(), now)
        .map_err(|e| ApiError::internal("Could not render packet", e))?;

    let path = packet_path(&tracking);
    let bucket = &st.settings.packets_bucket;
    storage
        .upload(bucket, &path, pdf, "application/pdf", true)
        .await
        .map_err(|e| ApiError::internal("Could not store packet", e))?;

    let record = GeneratedPacket {
        tracking_number: tracking.clone(),
        packet_path: path.clone(),
        packet_type: PACKET_TYPE.to_string(),
        created_at: now,
    };
    if let Err(e) = st.store.record_packet(&record).await {
        warn!(tracking = %tracking, error = %format!("{e:#}"), "packet record not saved");
    }

    let ttl = st.settings.packet_link_ttl_secs;
    let signed_url = storage
        .signed_url(bucket, &path, ttl)
        .await
        .map_err(|e| ApiError::internal("Could not sign packet link", e))?;

    apply_transition(&mut order, OrderStatus::PacketGenerated, "Packet generated", now)
        .map_err(|e| ApiError::Conflict(e.to_string()))?;
    order.packet_path = Some(path.clone());
    st.store.put_order(&order).await?;
    info!(tracking = %tracking, path = %path, "packet generated");

    let days = (ttl / 86_400).max(1);
    send_best_effort(&st, packet_ready(&order, &signed_url, days), "packet_ready").await;

    Ok(Json(GeneratePacketResponse {
        success: true,
        tracking_number: tracking,
        packet_path: path,
        signed_url,
        new_status: order.status,
    }))
}
