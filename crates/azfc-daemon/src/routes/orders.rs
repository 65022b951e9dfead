//! Checkout, capture and public tracking.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use azfc_clients::CreatePaymentOrder;
use azfc_notify::{admin_new_order, customer_order_received};
use azfc_orders::{
    decide_capture, generate_tracking_number, paypal_description, record_capture,
    CaptureDecision, CheckoutForm, TRACKING_GENERATION_ATTEMPTS,
};
use azfc_schemas::{PaymentCapture, PublicOrderView};
use azfc_store::{OrderStore, Store};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{parse_body, present, send_best_effort, site_base_url, url_component};
use crate::{
    api_types::{CaptureRequest, CaptureResponse, CheckoutResponse, TrackQuery, TrackResponse},
    error::ApiError,
    state::AppState,
};

/// A fresh tracking number not yet used by any stored order.
async fn allocate_tracking(store: &dyn Store, now: DateTime<Utc>) -> Result<String, ApiError> {
    for attempt in 1..=TRACKING_GENERATION_ATTEMPTS {
        let candidate = generate_tracking_number(now);
        if !store.tracking_exists(&candidate).await? {
            return Ok(candidate);
        }
        warn!(attempt, tracking = %candidate, "tracking number collision");
    }
    Err(ApiError::internal(
        "Could not allocate a tracking number",
        anyhow::anyhow!("{TRACKING_GENERATION_ATTEMPTS} consecutive collisions"),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/checkout
// ---------------------------------------------------------------------------

/// Validate the order form, open a PayPal order for the server-side price and
/// persist the order in `AWAITING_PAYMENT_APPROVAL`.
pub(crate) async fn checkout(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let form: CheckoutForm = parse_body(&body)?;
    let plan = form
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let payments = st.payments()?;
    let base = site_base_url(&st.settings, &headers)
        .ok_or_else(|| ApiError::BadRequest("Missing Host header".to_string()))?;

    let now = Utc::now();
    let tracking = allocate_tracking(st.store.as_ref(), now).await?;
    let mut order = form
        .into_order(tracking.clone(), now)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let t = url_component(&tracking);
    let created = payments
        .create_order(&CreatePaymentOrder {
            tracking_number: tracking.clone(),
            amount_cents: order.amount_cents,
            currency: order.currency.clone(),
            description: paypal_description(plan).to_string(),
            brand_name: st.settings.brand_name.clone(),
            return_url: format!("{base}/thank-you.html?tracking={t}"),
            cancel_url: format!("{base}/cpa-processing.html?cancel=1&tracking={t}"),
        })
        .await
        .map_err(ApiError::upstream)?;

    order.paypal_order_id = Some(created.paypal_order_id.clone());
    st.store
        .put_order(&order)
        .await
        .map_err(|e| ApiError::internal("Could not save order", e))?;
    info!(tracking = %tracking, plan = %plan, paypal_order_id = %created.paypal_order_id, "checkout created");

    if let Some(to) = &st.admin_notify_email {
        send_best_effort(&st, admin_new_order(to, &order), "admin_new_order").await;
    }

    Ok(Json(CheckoutResponse {
        success: true,
        tracking_number: tracking,
        paypal_order_id: created.paypal_order_id,
        approve_url: created.approve_url,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/capture
// ---------------------------------------------------------------------------

/// Idempotent: a paid order is returned as-is with `alreadyCaptured: true`
/// and the gateway is not called again.
pub(crate) async fn capture(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CaptureResponse>, ApiError> {
    let req: CaptureRequest = parse_body(&body)?;
    let (Some(tracking), Some(paypal_order_id)) = (present(req.tracking), present(req.paypal_order_id))
    else {
        return Err(ApiError::BadRequest(
            "Missing tracking or paypalOrderId".to_string(),
        ));
    };

    let mut order = st
        .store
        .get_order(&tracking)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    match decide_capture(&order, &paypal_order_id) {
        CaptureDecision::Proceed => {}
        CaptureDecision::AlreadyCaptured => {
            info!(tracking = %tracking, status = %order.status, "capture skipped: already paid");
            return Ok(Json(CaptureResponse {
                success: true,
                already_captured: Some(true),
                order: PublicOrderView::from(&order),
            }));
        }
        CaptureDecision::Mismatch => {
            warn!(tracking = %tracking, "capture refused: paypal order id mismatch");
            return Err(ApiError::Conflict(
                "PayPal order does not match this tracking number".to_string(),
            ));
        }
        CaptureDecision::Cancelled => {
            return Err(ApiError::Conflict("Order was cancelled".to_string()));
        }
    }

    let payments = st.payments()?;
    let result = payments
        .capture_order(&paypal_order_id)
        .await
        .map_err(ApiError::upstream)?;

    record_capture(
        &mut order,
        PaymentCapture {
            id: result.capture_id,
            status: result.status,
        },
        Utc::now(),
    )
    .map_err(|e| ApiError::Conflict(e.to_string()))?;
    st.store
        .put_order(&order)
        .await
        .map_err(|e| ApiError::internal("Payment captured but the order could not be saved", e))?;
    info!(tracking = %tracking, status = %order.status, "payment captured");

    let base = site_base_url(&st.settings, &headers).unwrap_or_default();
    send_best_effort(&st, customer_order_received(&order, &base), "customer_order_received").await;

    Ok(Json(CaptureResponse {
        success: true,
        already_captured: None,
        order: PublicOrderView::from(&order),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/track?tracking=
// ---------------------------------------------------------------------------

pub(crate) async fn track(
    State(st): State<Arc<AppState>>,
    Query(q): Query<TrackQuery>,
) -> Result<Json<TrackResponse>, ApiError> {
    let tracking = present(q.tracking)
        .ok_or_else(|| ApiError::BadRequest("Missing tracking parameter".to_string()))?;
    let order = st
        .store
        .get_order(&tracking)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tracking number not found".to_string()))?;
    Ok(Json(TrackResponse {
        success: true,
        order: PublicOrderView::from(&order),
    }))
}
