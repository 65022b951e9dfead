//! Deterministic in-process stand-ins for the external collaborators.
//!
//! No network I/O, no randomness: ids come from per-instance counters so
//! scenario tests can assert on exact values. Each fake records what it was
//! asked to do and can be told to fail.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use azfc_clients::{
    CaptureResult, CreatePaymentOrder, CreatedPaymentOrder, Email, MailReceipt, Mailer,
    ObjectStorage, PaymentGateway, SignedUpload,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

fn guard<'a, T>(m: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    m.lock().map_err(|_| anyhow!("{what} lock poisoned"))
}

// ---------------------------------------------------------------------------
// FakePaymentGateway
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GatewayState {
    next_order: u64,
    next_capture: u64,
    created: Vec<CreatePaymentOrder>,
    captured: Vec<String>,
    fail_create: Option<String>,
    fail_capture: Option<String>,
}

/// Issues `PAYPAL-000001`, `PAYPAL-000002`, ... and captures as
/// `CAPTURE-000001`, ... with status `COMPLETED`.
#[derive(Default)]
pub struct FakePaymentGateway {
    state: Mutex<GatewayState>,
}

impl FakePaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent `create_order` fails with `message`.
    pub fn fail_create(&self, message: &str) {
        if let Ok(mut s) = self.state.lock() {
            s.fail_create = Some(message.to_string());
        }
    }

    /// Every subsequent `capture_order` fails with `message`.
    pub fn fail_capture(&self, message: &str) {
        if let Ok(mut s) = self.state.lock() {
            s.fail_capture = Some(message.to_string());
        }
    }

    pub fn created(&self) -> Vec<CreatePaymentOrder> {
        self.state.lock().map(|s| s.created.clone()).unwrap_or_default()
    }

    /// PayPal order ids passed to `capture_order`, in call order.
    pub fn captured(&self) -> Vec<String> {
        self.state.lock().map(|s| s.captured.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_order(&self, req: &CreatePaymentOrder) -> Result<CreatedPaymentOrder> {
        let mut s = guard(&self.state, "fake gateway")?;
        if let Some(msg) = &s.fail_create {
            bail!("PayPal order create failed: {msg}");
        }
        s.next_order += 1;
        let id = format!("PAYPAL-{:06}", s.next_order);
        s.created.push(req.clone());
        Ok(CreatedPaymentOrder {
            approve_url: Some(format!("https://paypal.test/checkoutnow?token={id}")),
            paypal_order_id: id,
        })
    }

    async fn capture_order(&self, paypal_order_id: &str) -> Result<CaptureResult> {
        let mut s = guard(&self.state, "fake gateway")?;
        if let Some(msg) = &s.fail_capture {
            bail!("PayPal capture failed: {msg}");
        }
        s.next_capture += 1;
        s.captured.push(paypal_order_id.to_string());
        Ok(CaptureResult {
            capture_id: Some(format!("CAPTURE-{:06}", s.next_capture)),
            status: Some("COMPLETED".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingMailer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: Mutex<Option<String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent send fails with `message` and records nothing.
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut f) = self.fail.lock() {
            *f = Some(message.to_string());
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, to: &str) -> Vec<Email> {
        self.sent().into_iter().filter(|e| e.to == to).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<MailReceipt> {
        if let Some(msg) = guard(&self.fail, "recording mailer")?.clone() {
            bail!("{msg}");
        }
        let mut sent = guard(&self.sent, "recording mailer")?;
        sent.push(email.clone());
        Ok(MailReceipt {
            id: Some(format!("mail-{:06}", sent.len())),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStorage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
struct StorageState {
    objects: HashMap<(String, String), StoredObject>,
    next_token: u64,
}

/// Signed links use the `memory://` scheme and are never fetched.
#[derive(Default)]
pub struct MemoryObjectStorage {
    state: Mutex<StorageState>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object directly, as a browser upload through a signed URL would.
    pub fn put(&self, bucket: &str, path: &str, bytes: &[u8], content_type: &str) {
        if let Ok(mut s) = self.state.lock() {
            s.objects.insert(
                (bucket.to_string(), path.to_string()),
                StoredObject {
                    bytes: bytes.to_vec(),
                    content_type: content_type.to_string(),
                },
            );
        }
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.state
            .lock()
            .ok()?
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        let mut s = guard(&self.state, "memory storage")?;
        let key = (bucket.to_string(), path.to_string());
        if !upsert && s.objects.contains_key(&key) {
            bail!("storage upload failed (HTTP 409): The resource already exists");
        }
        s.objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn signed_url(&self, bucket: &str, path: &str, expires_secs: u64) -> Result<String> {
        let s = guard(&self.state, "memory storage")?;
        if !s.objects.contains_key(&(bucket.to_string(), path.to_string())) {
            bail!("storage sign failed (HTTP 404): Object not found");
        }
        Ok(format!("memory://{bucket}/{path}?expires={expires_secs}"))
    }

    async fn signed_upload_url(&self, bucket: &str, path: &str) -> Result<SignedUpload> {
        let mut s = guard(&self.state, "memory storage")?;
        s.next_token += 1;
        let token = format!("upload-token-{:06}", s.next_token);
        Ok(SignedUpload {
            signed_url: format!("memory://upload/{bucket}/{path}?token={token}"),
            token,
        })
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let s = guard(&self.state, "memory storage")?;
        s.objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.bytes.clone())
            .ok_or_else(|| anyhow!("storage download failed (HTTP 404): {bucket}/{path}"))
    }
}
