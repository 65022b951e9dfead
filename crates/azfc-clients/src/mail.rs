//! Transactional email via Resend.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub const RESEND_BASE_URL: &str = "https://api.resend.com";

/// One outgoing message. The sender comes from the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailReceipt {
    pub id: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<MailReceipt>;
}

// ---------------------------------------------------------------------------
// ResendMailer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ResendMailer {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl std::fmt::Debug for ResendMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendMailer")
            .field("base_url", &self.base_url)
            .field("from", &self.from)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

#[derive(Serialize)]
struct SendBody<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

impl ResendMailer {
    pub fn new(base_url: &str, api_key: &str, from: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }
}

/// `message`, then `error.message`, then a generic status line.
fn resend_error_message(body: &Value, status: u16) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/error/message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Resend API error (HTTP {status})"))
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &Email) -> Result<MailReceipt> {
        let body = SendBody {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            reply_to: email.reply_to.as_deref(),
        };
        let resp = self
            .http
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Resend request failed")?;

        let status = resp.status();
        let data: Value = resp.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            bail!("{}", resend_error_message(&data, status.as_u16()));
        }
        Ok(MailReceipt {
            id: data.get("id").and_then(Value::as_str).map(str::to_string),
        })
    }
}

// ---------------------------------------------------------------------------
// DisabledMailer
// ---------------------------------------------------------------------------

/// Stand-in when no mail key is configured. Every send fails with `reason`.
#[derive(Debug, Clone)]
pub struct DisabledMailer {
    reason: String,
}

impl DisabledMailer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _email: &Email) -> Result<MailReceipt> {
        Err(anyhow!("{}", self.reason))
    }
}
