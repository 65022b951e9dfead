//! Shared in-process harness for azfc-daemon scenario tests.
//!
//! The router is driven through `tower::ServiceExt::oneshot` with no socket.
//! Store, gateway, mailer and object storage are the in-memory fakes, kept
//! behind `Arc`s so tests can inspect them after each call.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use azfc_config::ServiceSettings;
use azfc_daemon::auth::AdminCredentials;
use azfc_daemon::{routes, state::AppState};
use azfc_orders::{record_capture, CheckoutForm, Order};
use azfc_schemas::PaymentCapture;
use azfc_store::{KvStore, MemoryKv, OrderStore, Store};
use azfc_testkit::{FakePaymentGateway, MemoryObjectStorage, RecordingMailer};
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot

pub const SITE: &str = "https://azfilmcredit.org";
pub const ADMIN_PASSWORD: &str = "desert-sun-42";
pub const SESSION_SECRET: &str = "session-secret-for-tests";
pub const ADMIN_TOKEN: &str = "machine-token";
pub const ADMIN_INBOX: &str = "ops@azfilmcredit.org";
pub const CUSTOMER_EMAIL: &str = "dana@saguarofilms.com";

pub struct Harness {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<FakePaymentGateway>,
    pub mailer: Arc<RecordingMailer>,
    pub storage: Arc<MemoryObjectStorage>,
    pub state: Arc<AppState>,
}

pub fn settings() -> ServiceSettings {
    ServiceSettings {
        public_base_url: Some(SITE.to_string()),
        ..ServiceSettings::default()
    }
}

pub fn admin_credentials() -> AdminCredentials {
    AdminCredentials {
        password: Some(ADMIN_PASSWORD.to_string()),
        session_secret: Some(SESSION_SECRET.to_string()),
        api_token: Some(ADMIN_TOKEN.to_string()),
    }
}

impl Harness {
    /// Every collaborator configured.
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: ServiceSettings) -> Self {
        Self::with_store(settings, Arc::new(KvStore::new(MemoryKv::new(), None)))
    }

    /// Every collaborator configured, over a caller-supplied store.
    pub fn with_store(settings: ServiceSettings, store: Arc<dyn Store>) -> Self {
        let gateway = Arc::new(FakePaymentGateway::new());
        let mailer = Arc::new(RecordingMailer::new());
        let storage = Arc::new(MemoryObjectStorage::new());
        let state = Arc::new(
            AppState::new(settings, Arc::clone(&store))
                .with_payments(gateway.clone())
                .with_mailer(mailer.clone())
                .with_storage(storage.clone())
                .with_admin(admin_credentials())
                .with_admin_notify_email(ADMIN_INBOX),
        );
        Self {
            store,
            gateway,
            mailer,
            storage,
            state,
        }
    }

    /// Nothing but the store: no gateway, no storage, no admin secrets,
    /// and a mailer that refuses to send.
    pub fn bare() -> Self {
        let store: Arc<dyn Store> = Arc::new(KvStore::new(MemoryKv::new(), None));
        let state = Arc::new(AppState::new(settings(), Arc::clone(&store)));
        Self {
            store,
            gateway: Arc::new(FakePaymentGateway::new()),
            mailer: Arc::new(RecordingMailer::new()),
            storage: Arc::new(MemoryObjectStorage::new()),
            state,
        }
    }

    pub fn router(&self) -> axum::Router {
        routes::build_router(Arc::clone(&self.state))
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = call(self.router(), req).await;
        (status, parse_json(body))
    }

    pub async fn post(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send(post_json(uri, &body)).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(get(uri)).await
    }

    /// An order stored directly, bypassing checkout. `paid` runs the capture
    /// pipeline so it lands in `READY_FOR_ADMIN_REVIEW`.
    pub async fn seed_order(&self, tracking: &str, paid: bool) -> Order {
        let form: CheckoutForm = serde_json::from_value(serde_json::json!({
            "service_plan": "prep_cpa",
            "company_name": "Saguaro Films LLC",
            "contact_name": "Dana Ruiz",
            "contact_email": CUSTOMER_EMAIL,
            "project_title": "Desert Light",
            "tax_year": 2026
        }))
        .unwrap();
        let mut order = form.into_order(tracking.to_string(), Utc::now()).unwrap();
        order.paypal_order_id = Some(format!("PAYPAL-SEED-{tracking}"));
        if paid {
            record_capture(
                &mut order,
                PaymentCapture {
                    id: Some("CAPTURE-SEED".into()),
                    status: Some("COMPLETED".into()),
                },
                Utc::now(),
            )
            .unwrap();
        }
        self.store.put_order(&order).await.unwrap();
        order
    }
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Drive the router with a single request and return (status, headers, body).
pub async fn call(
    router: axum::Router,
    req: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, headers, body)
}

pub fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}
