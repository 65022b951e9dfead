//! Axum router and HTTP handlers for azfc-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are grouped by surface:
//!
//! - `orders`: checkout, capture, public tracking.
//! - `uploads`: signed upload URLs and ledger ingest.
//! - `contact`: support form.
//! - `admin`: login/logout/me and every admin-only action.

mod admin;
mod contact;
mod orders;
mod uploads;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use azfc_clients::Email;
use azfc_config::ServiceSettings;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::{api_types::HealthResponse, error::ApiError, state::AppState};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health).fallback(method_not_allowed))
        .route("/api/checkout", post(orders::checkout).fallback(method_not_allowed))
        .route("/api/capture", post(orders::capture).fallback(method_not_allowed))
        .route("/api/track", get(orders::track).fallback(method_not_allowed))
        .route("/api/contact", post(contact::contact).fallback(method_not_allowed))
        .route(
            "/api/uploads/signed-url",
            post(uploads::signed_upload_url).fallback(method_not_allowed),
        )
        .route(
            "/api/ingest-ledger",
            post(uploads::ingest_ledger).fallback(method_not_allowed),
        )
        .route("/api/admin/login", post(admin::login).fallback(method_not_allowed))
        .route("/api/admin/logout", post(admin::logout).fallback(method_not_allowed))
        .route("/api/admin/me", get(admin::me).fallback(method_not_allowed))
        .route("/api/admin/orders", get(admin::orders).fallback(method_not_allowed))
        .route(
            "/api/admin/update-status",
            post(admin::update_status).fallback(method_not_allowed),
        )
        .route(
            "/api/admin/order-update",
            post(admin::order_update).fallback(method_not_allowed),
        )
        .route(
            "/api/admin/notify-customer",
            post(admin::notify_customer).fallback(method_not_allowed),
        )
        .route(
            "/api/admin/generate-packet",
            post(admin::generate_packet).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

// ---------------------------------------------------------------------------
// Shared handler helpers
// ---------------------------------------------------------------------------

/// Decode a JSON body. An empty body reads as `{}` so the handler reports the
/// missing field rather than a parse error.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| ApiError::BadRequest("Invalid JSON body".to_string()))
}

/// Trimmed, non-empty.
pub(crate) fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Public site origin for links in redirects and emails: the configured
/// `service.public_base_url`, else `x-forwarded-proto` (default `https`)
/// plus `x-forwarded-host` or `host`.
pub(crate) fn site_base_url(settings: &ServiceSettings, headers: &HeaderMap) -> Option<String> {
    if let Some(base) = &settings.public_base_url {
        return Some(base.trim_end_matches('/').to_string());
    }
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let proto = header("x-forwarded-proto").unwrap_or_else(|| "https".to_string());
    let host = header("x-forwarded-host").or_else(|| header("host"))?;
    Some(format!("{proto}://{host}"))
}

pub(crate) fn url_component(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Send and log; never fails the request. Returns whether the mail went out.
pub(crate) async fn send_best_effort(st: &AppState, email: Email, kind: &'static str) -> bool {
    if email.to.trim().is_empty() {
        warn!(kind, "email skipped: no recipient");
        return false;
    }
    match st.mailer.send(&email).await {
        Ok(receipt) => {
            info!(kind, id = ?receipt.id, "email sent");
            true
        }
        Err(e) => {
            warn!(kind, error = %format!("{e:#}"), "email failed");
            false
        }
    }
}
