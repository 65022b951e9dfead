//! Support form forwarding.

mod common;

use axum::http::StatusCode;
use common::Harness;
use serde_json::json;

const INBOX: &str = "support@azfilmcredit.org";

fn form() -> serde_json::Value {
    json!({
        "name": "  Dana Ruiz ",
        "email": "dana@saguarofilms.com",
        "project": "Desert Light",
        "topic": "Billing",
        "message": "Can I switch plans <after> checkout?",
        "userAgent": "Mozilla/5.0"
    })
}

#[tokio::test]
async fn forwards_to_support_inbox_with_reply_to() {
    let h = Harness::new();
    let (status, json) = h.post("/api/contact", form()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1, "no confirmation unless enabled");
    assert_eq!(sent[0].to, INBOX);
    assert_eq!(sent[0].subject, "AZFC Support - Billing (Desert Light)");
    assert_eq!(sent[0].reply_to.as_deref(), Some("dana@saguarofilms.com"));
    assert!(sent[0].html.contains("&lt;after&gt;"));
}

#[tokio::test]
async fn sends_confirmation_when_enabled() {
    let mut settings = common::settings();
    settings.send_support_confirmation = true;
    let h = Harness::with_settings(settings);

    let (status, _) = h.post("/api/contact", form()).await;
    assert_eq!(status, StatusCode::OK);
    let confirm = h.mailer.sent_to("dana@saguarofilms.com");
    assert_eq!(confirm.len(), 1);
    assert_eq!(confirm[0].subject, "AZ Film Credit - Support request received");
}

#[tokio::test]
async fn rejects_missing_fields_and_bad_email() {
    let h = Harness::new();
    let (status, json) = h
        .post("/api/contact", json!({"name": "Dana", "email": "d@x.io"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Missing required fields.");

    let mut bad = form();
    bad["email"] = json!("dana at example");
    let (status, json) = h.post("/api/contact", bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Invalid email address.");
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn mail_failure_is_500() {
    let h = Harness::new();
    h.mailer.fail_with("Resend API error (HTTP 502)");
    let (status, json) = h.post("/api/contact", form()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Failed to send support email.");
}

#[tokio::test]
async fn unconfigured_mailer_is_500() {
    let h = Harness::bare();
    let (status, json) = h.post("/api/contact", form()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Failed to send support email.");
}
