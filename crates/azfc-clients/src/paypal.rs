//! PayPal Orders v2: client-credentials token, create order, capture.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use azfc_schemas::format_cents;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::snippet;

// ---------------------------------------------------------------------------
// Trait + wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentOrder {
    /// Sent as the purchase unit `reference_id`.
    pub tracking_number: String,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    pub brand_name: String,
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPaymentOrder {
    pub paypal_order_id: String,
    /// Where the buyer approves the payment. Absent if PayPal sent no
    /// `approve` link.
    pub approve_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureResult {
    pub capture_id: Option<String>,
    pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, req: &CreatePaymentOrder) -> Result<CreatedPaymentOrder>;
    async fn capture_order(&self, paypal_order_id: &str) -> Result<CaptureResult>;
}

// ---------------------------------------------------------------------------
// PayPalClient
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PayPalClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    secret: String,
}

impl std::fmt::Debug for PayPalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalClient")
            .field("base_url", &self.base_url)
            .field("client_id", &"<REDACTED>")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Link {
    rel: String,
    href: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

impl PayPalClient {
    pub fn new(base_url: &str, client_id: &str, secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            secret: secret.to_string(),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.secret))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .context("PayPal token request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("PayPal token body read failed")?;
        if !status.is_success() {
            let description = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error_description").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| "PayPal token error".to_string());
            bail!("{description} (HTTP {})", status.as_u16());
        }
        let token: TokenResponse =
            serde_json::from_str(&text).context("PayPal token response malformed")?;
        Ok(token.access_token)
    }
}

/// `purchase_units[0].payments.captures[0].id`
fn capture_id(body: &Value) -> Option<String> {
    body.pointer("/purchase_units/0/payments/captures/0/id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    async fn create_order(&self, req: &CreatePaymentOrder) -> Result<CreatedPaymentOrder> {
        let token = self.access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": req.tracking_number,
                "amount": { "currency_code": req.currency, "value": format_cents(req.amount_cents) },
                "description": req.description,
            }],
            "application_context": {
                "brand_name": req.brand_name,
                "user_action": "PAY_NOW",
                "return_url": req.return_url,
                "cancel_url": req.cancel_url,
            },
        });

        let resp = self
            .http
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .context("PayPal order create request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("PayPal order create body read failed")?;
        if !status.is_success() {
            bail!("PayPal order create failed: {}", snippet(&text));
        }
        let created: CreateResponse =
            serde_json::from_str(&text).context("PayPal order create response malformed")?;

        let approve_url = created
            .links
            .into_iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href);
        tracing::info!(tracking = %req.tracking_number, paypal_order_id = %created.id, "paypal order created");
        Ok(CreatedPaymentOrder {
            paypal_order_id: created.id,
            approve_url,
        })
    }

    async fn capture_order(&self, paypal_order_id: &str) -> Result<CaptureResult> {
        let token = self.access_token().await?;
        let mut url = url::Url::parse(&self.base_url).context("invalid PayPal base url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("PayPal base url cannot carry a path"))?
            .pop_if_empty()
            .extend(["v2", "checkout", "orders", paypal_order_id, "capture"]);

        let resp = self
            .http
            .post(url)
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .context("PayPal capture request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("PayPal capture body read failed")?;
        if !status.is_success() {
            bail!("PayPal capture failed: {}", snippet(&text));
        }
        let body: Value = serde_json::from_str(&text).context("PayPal capture response malformed")?;
        Ok(CaptureResult {
            capture_id: capture_id(&body),
            status: body.get("status").and_then(Value::as_str).map(str::to_string),
        })
    }
}
