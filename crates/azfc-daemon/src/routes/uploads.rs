//! Customer file uploads and ledger ingest.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use azfc_ledger::{compute_totals, parse_ledger};
use azfc_schemas::{ParseStatus, Upload};
use azfc_store::{LedgerStore, OrderStore};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::{parse_body, present};
use crate::{
    api_types::{IngestLedgerRequest, IngestLedgerResponse, SignedUploadRequest, SignedUploadResponse},
    error::ApiError,
    state::AppState,
};

const SAFE_NAME_MAX: usize = 120;

/// Replace everything outside `[A-Za-z0-9._-]` with `_`, keep 120 chars.
pub fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(SAFE_NAME_MAX)
        .collect()
}

/// `<tracking>/<kind>/<unix_ms>_<safe_name>`
pub fn upload_path(tracking: &str, kind: &str, unix_ms: i64, filename: &str) -> String {
    format!("{tracking}/{}/{unix_ms}_{}", safe_name(kind), safe_name(filename))
}

fn size_bytes(v: Option<Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// POST /api/uploads/signed-url
// ---------------------------------------------------------------------------

/// Register an upload row in `received` and hand back a signed upload URL;
/// the browser then PUTs the file straight to storage.
pub(crate) async fn signed_upload_url(
    State(st): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SignedUploadResponse>, ApiError> {
    let req: SignedUploadRequest = parse_body(&body)?;
    let (Some(tracking), Some(kind), Some(filename)) = (
        present(req.tracking_number),
        present(req.kind),
        present(req.filename),
    ) else {
        return Err(ApiError::BadRequest(
            "Missing trackingNumber/type/filename".to_string(),
        ));
    };
    let storage = st.storage()?;

    let order = st
        .store
        .get_order(&tracking)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    let now = Utc::now();
    let upload = Upload {
        id: Uuid::new_v4(),
        order_id: order.id,
        path: upload_path(&tracking, &kind, now.timestamp_millis(), &filename),
        kind: safe_name(&kind),
        bucket: st.settings.uploads_bucket.clone(),
        original_name: filename,
        mime: present(req.mime),
        size: size_bytes(req.size),
        parse_status: ParseStatus::Received,
        created_at: now,
    };
    st.store.insert_upload(&upload).await?;

    let signed = storage
        .signed_upload_url(&upload.bucket, &upload.path)
        .await?;
    info!(tracking = %tracking, upload_id = %upload.id, kind = %upload.kind, "upload url issued");

    Ok(Json(SignedUploadResponse {
        success: true,
        upload_id: upload.id.to_string(),
        bucket: upload.bucket,
        path: upload.path,
        token: signed.token,
        signed_url: signed.signed_url,
    }))
}

async fn mark_failed(st: &AppState, upload_id: Uuid) {
    if let Err(e) = st.store.set_upload_status(upload_id, ParseStatus::Failed).await {
        warn!(upload_id = %upload_id, error = %format!("{e:#}"), "could not mark upload failed");
    }
}

// ---------------------------------------------------------------------------
// POST /api/ingest-ledger
// ---------------------------------------------------------------------------

/// Download an uploaded ledger CSV, import its rows and recompute the order's
/// credit totals over every transaction imported so far.
pub(crate) async fn ingest_ledger(
    State(st): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IngestLedgerResponse>, ApiError> {
    let req: IngestLedgerRequest = parse_body(&body)?;
    let (Some(tracking), Some(upload_id)) = (present(req.tracking_number), present(req.upload_id))
    else {
        return Err(ApiError::BadRequest(
            "Missing trackingNumber/uploadId".to_string(),
        ));
    };
    let upload_id = Uuid::parse_str(&upload_id)
        .map_err(|_| ApiError::BadRequest("Invalid uploadId".to_string()))?;
    let storage = st.storage()?;

    let order = st
        .store
        .get_order(&tracking)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    let upload = st
        .store
        .get_upload(upload_id)
        .await?
        .filter(|u| u.order_id == order.id)
        .ok_or_else(|| ApiError::NotFound("Upload not found".to_string()))?;
    if upload.parse_status == ParseStatus::Parsed {
        return Err(ApiError::Conflict("Upload was already ingested".to_string()));
    }

    let bytes = storage
        .download(&upload.bucket, &upload.path)
        .await
        .map_err(|e| ApiError::internal("Could not download the uploaded file", e))?;

    let parsed = match parse_ledger(&bytes, order.id, upload.id) {
        Ok(p) => p,
        Err(e) => {
            mark_failed(&st, upload.id).await;
            info!(tracking = %tracking, upload_id = %upload.id, reason = %e, "ledger rejected");
            return Err(ApiError::BadRequest(e.to_string()));
        }
    };

    // Rows left by an earlier attempt that failed partway through.
    let cleared = st
        .store
        .delete_transactions_for_upload(order.id, upload.id)
        .await?;
    if cleared > 0 {
        warn!(upload_id = %upload.id, cleared, "cleared rows from an interrupted ingest");
    }
    for chunk in parsed.transactions.chunks(st.settings.insert_chunk_size.max(1)) {
        if let Err(e) = st.store.insert_transactions(chunk).await {
            mark_failed(&st, upload.id).await;
            return Err(ApiError::internal("Could not save ledger rows", e));
        }
    }
    st.store
        .set_upload_status(upload.id, ParseStatus::Parsed)
        .await?;

    let all = st.store.transactions_for_order(order.id).await?;
    let totals = compute_totals(order.id, &all, st.settings.credit_rate_bps, Utc::now());
    st.store.upsert_totals(&totals).await?;

    let report = parsed.report;
    info!(
        tracking = %tracking,
        imported = report.imported,
        skipped = report.skipped_zero_or_invalid,
        qualified_cents = totals.qualified_costs_cents,
        "ledger ingested"
    );
    Ok(Json(IngestLedgerResponse {
        success: true,
        imported: report.imported,
        skipped: report.skipped_zero_or_invalid,
        report,
        totals,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_name_replaces_and_caps() {
        assert_eq!(safe_name("my ledger (final).csv"), "my_ledger__final_.csv");
        assert_eq!(safe_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(safe_name(&"a".repeat(300)).len(), 120);
    }

    #[test]
    fn path_layout() {
        assert_eq!(
            upload_path("AZFC-260101-A1B2C3", "ledger", 1_700_000_000_000, "Q1 costs.csv"),
            "AZFC-260101-A1B2C3/ledger/1700000000000_Q1_costs.csv"
        );
    }

    #[test]
    fn size_accepts_number_or_string() {
        assert_eq!(size_bytes(Some(serde_json::json!(1024))), Some(1024));
        assert_eq!(size_bytes(Some(serde_json::json!(" 77 "))), Some(77));
        assert_eq!(size_bytes(Some(serde_json::json!(true))), None);
        assert_eq!(size_bytes(None), None);
    }
}
