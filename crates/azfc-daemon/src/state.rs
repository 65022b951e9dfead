//! Shared runtime state for azfc-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Every external
//! collaborator sits behind a trait object so scenario tests can swap in the
//! `azfc-testkit` fakes.

use std::sync::Arc;

use anyhow::Result;
use azfc_clients::{
    DisabledMailer, Mailer, ObjectStorage, PayPalClient, PaymentGateway, ResendMailer,
    SupabaseStorage, RESEND_BASE_URL,
};
use azfc_config::secrets::ResolvedSecrets;
use azfc_config::ServiceSettings;
use azfc_store::Store;
use serde::{Deserialize, Serialize};

use crate::auth::AdminCredentials;
use crate::error::ApiError;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub settings: ServiceSettings,
    pub store: Arc<dyn Store>,
    /// `None` until PayPal credentials are configured.
    pub payments: Option<Arc<dyn PaymentGateway>>,
    pub mailer: Arc<dyn Mailer>,
    /// `None` until storage credentials are configured.
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub admin: AdminCredentials,
    /// Inbox for new-order notifications; unset disables them.
    pub admin_notify_email: Option<String>,
}

impl AppState {
    /// Bare state: no gateway, no storage, no admin credentials, and a mailer
    /// that refuses to send. Fill in with the `with_*` builders.
    pub fn new(settings: ServiceSettings, store: Arc<dyn Store>) -> Self {
        Self {
            build: BuildInfo {
                service: "azfc-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            settings,
            store,
            payments: None,
            mailer: Arc::new(DisabledMailer::new("Missing RESEND_API_KEY env var")),
            storage: None,
            admin: AdminCredentials::default(),
            admin_notify_email: None,
        }
    }

    /// Wire the real SaaS clients from resolved secrets.
    pub fn from_secrets(
        settings: ServiceSettings,
        store: Arc<dyn Store>,
        secrets: &ResolvedSecrets,
    ) -> Result<Self> {
        let mut st = Self::new(settings, store);

        if let (Some(id), Some(secret)) = (&secrets.paypal_client_id, &secrets.paypal_secret) {
            let client = PayPalClient::new(&st.settings.paypal_base_url, id, secret);
            st.payments = Some(Arc::new(client));
        }
        if let Some(key) = &secrets.resend_api_key {
            st.mailer = Arc::new(ResendMailer::new(RESEND_BASE_URL, key, &st.settings.mail_from));
        }
        if let (Some(url), Some(key)) = (&secrets.storage_url, &secrets.storage_service_key) {
            st.storage = Some(Arc::new(SupabaseStorage::new(url, key)?));
        }
        st.admin = AdminCredentials {
            password: secrets.admin_password.clone(),
            session_secret: secrets.admin_session_secret.clone(),
            api_token: secrets.admin_api_token.clone(),
        };
        st.admin_notify_email = secrets.admin_notify_email.clone();

        tracing::info!(
            payments = st.payments.is_some(),
            storage = st.storage.is_some(),
            mail = secrets.resend_api_key.is_some(),
            admin_login = st.admin.password.is_some() && st.admin.session_secret.is_some(),
            "collaborators wired"
        );
        Ok(st)
    }

    pub fn with_payments(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.payments = Some(gateway);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_admin(mut self, admin: AdminCredentials) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_admin_notify_email(mut self, to: impl Into<String>) -> Self {
        self.admin_notify_email = Some(to.into());
        self
    }

    pub fn payments(&self) -> Result<&Arc<dyn PaymentGateway>, ApiError> {
        self.payments.as_ref().ok_or_else(|| {
            ApiError::Misconfigured("Missing PAYPAL_CLIENT_ID or PAYPAL_SECRET env var".to_string())
        })
    }

    pub fn storage(&self) -> Result<&Arc<dyn ObjectStorage>, ApiError> {
        self.storage.as_ref().ok_or_else(|| {
            ApiError::Misconfigured(
                "Missing SUPABASE_URL or SUPABASE_SERVICE_ROLE_KEY env var".to_string(),
            )
        })
    }
}
