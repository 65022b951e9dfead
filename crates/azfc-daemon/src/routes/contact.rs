use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use azfc_notify::{support_confirmation, support_request, ContactForm, SupportRequest};
use tracing::info;

use super::{parse_body, send_best_effort};
use crate::{api_types::SuccessResponse, error::ApiError, state::AppState};

// ---------------------------------------------------------------------------
// POST /api/contact
// ---------------------------------------------------------------------------

/// Forward a support request to the support inbox. The optional confirmation
/// back to the requester is best effort.
pub(crate) async fn contact(
    State(st): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let form: ContactForm = parse_body(&body)?;
    let req = SupportRequest::from_form(&form).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    st.mailer
        .send(&support_request(&st.settings.support_inbox, &req))
        .await
        .map_err(|e| ApiError::internal("Failed to send support email.", e))?;
    info!(topic = %req.topic, "support request forwarded");

    if st.settings.send_support_confirmation {
        send_best_effort(&st, support_confirmation(&req), "support_confirmation").await;
    }
    Ok(Json(SuccessResponse { success: true }))
}
