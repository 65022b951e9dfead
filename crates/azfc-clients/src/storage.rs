//! Supabase Storage REST: upload, signed download links, signed upload
//! links, download.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::snippet;

/// A pre-authorised upload target handed to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUpload {
    pub signed_url: String,
    pub token: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()>;

    /// Time-limited download link.
    async fn signed_url(&self, bucket: &str, path: &str, expires_secs: u64) -> Result<String>;

    async fn signed_upload_url(&self, bucket: &str, path: &str) -> Result<SignedUpload>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// SupabaseStorage
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SupabaseStorage {
    http: reqwest::Client,
    base: Url,
    service_key: String,
}

impl std::fmt::Debug for SupabaseStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseStorage")
            .field("base", &self.base.as_str())
            .field("service_key", &"<REDACTED>")
            .finish()
    }
}

impl SupabaseStorage {
    /// `project_url` is the project root, e.g. `https://abc.supabase.co`.
    pub fn new(project_url: &str, service_key: &str) -> Result<Self> {
        let base = Url::parse(project_url.trim_end_matches('/'))
            .with_context(|| format!("invalid storage url: {project_url}"))?;
        if base.cannot_be_a_base() {
            bail!("invalid storage url: {project_url}");
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            service_key: service_key.to_string(),
        })
    }

    /// `{base}/storage/v1/<prefix...>/<bucket>/<path...>` with each segment
    /// percent-encoded and the object path's slashes preserved.
    fn object_url(&self, prefix: &[&str], bucket: &str, path: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("storage url cannot carry a path"))?
            .pop_if_empty()
            .extend(["storage", "v1"])
            .extend(prefix)
            .push(bucket)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Signed paths come back relative to `/storage/v1`.
    fn absolute(&self, relative: &str) -> String {
        let root = self.base.as_str().trim_end_matches('/');
        let rel = if relative.starts_with('/') {
            relative.to_string()
        } else {
            format!("/{relative}")
        };
        format!("{root}/storage/v1{rel}")
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        rb.bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn json_or_error(resp: reqwest::Response, what: &str) -> Result<Value> {
        let status = resp.status();
        let text = resp.text().await.with_context(|| format!("{what}: body read failed"))?;
        if !status.is_success() {
            let msg = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| snippet(&text));
            bail!("{what} failed (HTTP {}): {msg}", status.as_u16());
        }
        serde_json::from_str(&text).with_context(|| format!("{what}: response was not JSON"))
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        let url = self.object_url(&["object"], bucket, path)?;
        let resp = self
            .authed(self.http.post(url))
            .header("Content-Type", content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await
            .context("storage upload request failed")?;
        Self::json_or_error(resp, "storage upload").await?;
        tracing::debug!(bucket, path, "object uploaded");
        Ok(())
    }

    async fn signed_url(&self, bucket: &str, path: &str, expires_secs: u64) -> Result<String> {
        let url = self.object_url(&["object", "sign"], bucket, path)?;
        let resp = self
            .authed(self.http.post(url))
            .json(&json!({ "expiresIn": expires_secs }))
            .send()
            .await
            .context("storage sign request failed")?;
        let body = Self::json_or_error(resp, "storage sign").await?;
        let rel = body
            .get("signedURL")
            .or_else(|| body.get("signedUrl"))
            .and_then(Value::as_str)
            .context("storage sign response missing signedURL")?;
        Ok(self.absolute(rel))
    }

    async fn signed_upload_url(&self, bucket: &str, path: &str) -> Result<SignedUpload> {
        let url = self.object_url(&["object", "upload", "sign"], bucket, path)?;
        let resp = self
            .authed(self.http.post(url))
            .json(&json!({}))
            .send()
            .await
            .context("storage upload-sign request failed")?;
        let body = Self::json_or_error(resp, "storage upload-sign").await?;
        let rel = body
            .get("url")
            .and_then(Value::as_str)
            .context("storage upload-sign response missing url")?;
        let signed_url = self.absolute(rel);
        let token = Url::parse(&signed_url)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "token")
                    .map(|(_, v)| v.into_owned())
            })
            .context("storage upload-sign url carries no token")?;
        Ok(SignedUpload { signed_url, token })
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let url = self.object_url(&["object"], bucket, path)?;
        let resp = self
            .authed(self.http.get(url))
            .send()
            .await
            .context("storage download request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("storage download failed (HTTP {}): {}", status.as_u16(), snippet(&text));
        }
        let bytes = resp.bytes().await.context("storage download body read failed")?;
        Ok(bytes.to_vec())
    }
}
