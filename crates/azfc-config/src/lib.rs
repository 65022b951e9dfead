//! azfc-config
//!
//! Layered YAML configuration for the order service.
//!
//! - YAML docs are deep-merged in order (later layers override earlier ones),
//!   converted to JSON, canonicalized and SHA-256 hashed.
//! - Config holds env var NAMES for credentials, never the values. Leaf strings
//!   that look like secret literals abort the load with `CONFIG_SECRET_DETECTED`.
//! - [`ServiceSettings`] is the typed view of the non-secret keys; secrets are
//!   resolved separately by [`secrets::resolve_secrets`].

pub mod secrets;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

/// Known secret-like prefixes. Any leaf string value starting with one of
/// these aborts the load.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "re_",        // Resend API keys
    "eyJ",        // JWTs (Supabase service-role / anon keys)
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "xoxb-",      // Slack bot token
];

// ---------------------------------------------------------------------------
// Deploy mode
// ---------------------------------------------------------------------------

/// Controls how strictly secrets are enforced at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployMode {
    /// Every external collaborator must be configured.
    Production,
    /// Missing credentials degrade the affected endpoints instead of failing boot.
    Development,
}

impl DeployMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployMode::Production => "PRODUCTION",
            DeployMode::Development => "DEVELOPMENT",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRODUCTION" | "PROD" => Ok(DeployMode::Production),
            "DEVELOPMENT" | "DEV" => Ok(DeployMode::Development),
            other => bail!(
                "CONFIG_UNKNOWN_MODE: unrecognised mode '{}'; expected PRODUCTION | DEVELOPMENT",
                other
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique)
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON-pointer prefixes actually read by [`ServiceSettings::from_config_json`]
/// and [`secrets::resolve_secrets`]. Keep in sync with those readers.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/service/name",
    "/service/mode",
    "/service/bind_addr",
    "/service/public_base_url",
    "/service/cors_origins",
    "/brand/name",
    "/mail/from",
    "/mail/support_inbox",
    "/mail/send_support_confirmation",
    "/mail/keys_env",
    "/payments/paypal/environment",
    "/payments/paypal/base_url",
    "/payments/paypal/keys_env",
    "/storage/uploads_bucket",
    "/storage/packets_bucket",
    "/storage/packet_link_ttl_secs",
    "/storage/keys_env",
    "/store/backend",
    "/store/order_ttl_secs",
    "/store/keys_env",
    "/admin/session_ttl_secs",
    "/admin/keys_env",
    "/ledger/credit_rate_bps",
    "/ledger/insert_chunk_size",
];

/// Produce an unused-key report.
/// `Fail` returns an error when unused keys exist; `Warn` always returns the report.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected. First few: {}",
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" consumes "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.starts_with(prefix)
        && leaf
            .get(prefix.len()..prefix.len() + 1)
            .map(|c| c == "/")
            .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{:?}", take)
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }
    tracing::debug!(layers = yaml_docs.len(), "config layers merged");

    enforce_no_secret_literals(&merged)?;

    // serde_json::Map is key-sorted (no preserve_order), so this is canonical.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        // Null overlay (an empty YAML doc) keeps the base.
        (a_other, Value::Null) => a_other,
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(|val| val.as_str()) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ---------------------------------------------------------------------------
// Typed settings
// ---------------------------------------------------------------------------

/// Storage backend selection for orders and ledger data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    /// Postgres when a database URL resolves, else REST KV when credentials
    /// resolve, else in-memory.
    Auto,
    Memory,
    Kv,
    Postgres,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(StoreBackend::Auto),
            "memory" => Ok(StoreBackend::Memory),
            "kv" => Ok(StoreBackend::Kv),
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            other => bail!(
                "invalid store backend '{}'. expected one of: auto | memory | kv | postgres",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayPalEnvironment {
    Sandbox,
    Live,
}

impl PayPalEnvironment {
    /// Anything other than `live` is sandbox.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("live") {
            PayPalEnvironment::Live
        } else {
            PayPalEnvironment::Sandbox
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            PayPalEnvironment::Live => "https://api-m.paypal.com",
            PayPalEnvironment::Sandbox => "https://api-m.sandbox.paypal.com",
        }
    }
}

/// Non-secret service settings with defaults for every key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub service_name: String,
    pub mode: DeployMode,
    pub bind_addr: String,
    /// Overrides the base URL derived from forwarded headers when set.
    pub public_base_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub brand_name: String,
    pub mail_from: String,
    pub support_inbox: String,
    pub send_support_confirmation: bool,
    pub paypal_environment: PayPalEnvironment,
    pub paypal_base_url: String,
    pub uploads_bucket: String,
    pub packets_bucket: String,
    pub packet_link_ttl_secs: u64,
    pub store_backend: StoreBackend,
    pub order_ttl_secs: u64,
    pub admin_session_ttl_secs: u64,
    pub credit_rate_bps: i64,
    pub insert_chunk_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            service_name: "azfc-daemon".to_string(),
            mode: DeployMode::Development,
            bind_addr: "127.0.0.1:8787".to_string(),
            public_base_url: None,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            brand_name: "AZ Film Credit".to_string(),
            mail_from: "AZ Film Credit <onboarding@resend.dev>".to_string(),
            support_inbox: "support@azfilmcredit.org".to_string(),
            send_support_confirmation: false,
            paypal_environment: PayPalEnvironment::Sandbox,
            paypal_base_url: PayPalEnvironment::Sandbox.base_url().to_string(),
            uploads_bucket: "azfc-uploads".to_string(),
            packets_bucket: "azfc-packets".to_string(),
            packet_link_ttl_secs: 7 * 24 * 60 * 60,
            store_backend: StoreBackend::Auto,
            order_ttl_secs: 30 * 24 * 60 * 60,
            admin_session_ttl_secs: 7 * 24 * 60 * 60,
            credit_rate_bps: 1500,
            insert_chunk_size: 500,
        }
    }
}

impl ServiceSettings {
    /// Read typed settings from a merged config JSON. Absent keys keep defaults;
    /// present keys with the wrong type are an error.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let mut s = ServiceSettings::default();

        if let Some(v) = read_string(cfg, "/service/name")? {
            s.service_name = v;
        }
        if let Some(v) = read_string(cfg, "/service/mode")? {
            s.mode = DeployMode::parse(&v)?;
        }
        if let Some(v) = read_string(cfg, "/service/bind_addr")? {
            s.bind_addr = v;
        }
        s.public_base_url = read_string(cfg, "/service/public_base_url")?
            .map(|v| v.trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());
        if let Some(v) = cfg.pointer("/service/cors_origins") {
            let arr = v
                .as_array()
                .context("/service/cors_origins must be a list of strings")?;
            s.cors_origins = arr
                .iter()
                .map(|o| {
                    o.as_str()
                        .map(str::to_string)
                        .context("/service/cors_origins entries must be strings")
                })
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(v) = read_string(cfg, "/brand/name")? {
            s.brand_name = v;
        }
        if let Some(v) = read_string(cfg, "/mail/from")? {
            s.mail_from = v;
        }
        if let Some(v) = read_string(cfg, "/mail/support_inbox")? {
            s.support_inbox = v;
        }
        if let Some(v) = read_bool(cfg, "/mail/send_support_confirmation")? {
            s.send_support_confirmation = v;
        }
        if let Some(v) = read_string(cfg, "/payments/paypal/environment")? {
            s.paypal_environment = PayPalEnvironment::parse(&v);
        }
        s.paypal_base_url = match read_string(cfg, "/payments/paypal/base_url")? {
            Some(v) if !v.trim().is_empty() => v.trim_end_matches('/').to_string(),
            _ => s.paypal_environment.base_url().to_string(),
        };
        if let Some(v) = read_string(cfg, "/storage/uploads_bucket")? {
            s.uploads_bucket = v;
        }
        if let Some(v) = read_string(cfg, "/storage/packets_bucket")? {
            s.packets_bucket = v;
        }
        if let Some(v) = read_u64(cfg, "/storage/packet_link_ttl_secs")? {
            s.packet_link_ttl_secs = v;
        }
        if let Some(v) = read_string(cfg, "/store/backend")? {
            s.store_backend = StoreBackend::parse(&v)?;
        }
        if let Some(v) = read_u64(cfg, "/store/order_ttl_secs")? {
            s.order_ttl_secs = v;
        }
        if let Some(v) = read_u64(cfg, "/admin/session_ttl_secs")? {
            s.admin_session_ttl_secs = v;
        }
        if let Some(v) = read_u64(cfg, "/ledger/credit_rate_bps")? {
            if v > 10_000 {
                bail!("/ledger/credit_rate_bps must be <= 10000, got {v}");
            }
            s.credit_rate_bps = v as i64;
        }
        if let Some(v) = read_u64(cfg, "/ledger/insert_chunk_size")? {
            if v == 0 || v > MAX_INSERT_CHUNK_SIZE {
                bail!("/ledger/insert_chunk_size must be in 1..={MAX_INSERT_CHUNK_SIZE}, got {v}");
            }
            s.insert_chunk_size = v as usize;
        }

        Ok(s)
    }
}

/// Postgres caps a statement at 65535 bind parameters; a ledger row binds 26.
pub const MAX_INSERT_CHUNK_SIZE: u64 = 2520;

fn read_string(cfg: &Value, pointer: &str) -> Result<Option<String>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => bail!("{pointer} must be a string, got {other}"),
    }
}

fn read_bool(cfg: &Value, pointer: &str) -> Result<Option<bool>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => bail!("{pointer} must be a bool, got {other}"),
    }
}

fn read_u64(cfg: &Value, pointer: &str) -> Result<Option<u64>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .with_context(|| format!("{pointer} must be a non-negative integer, got {v}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pointer_boundaries() {
        assert!(is_prefix_pointer("/mail/keys_env", "/mail/keys_env/resend_api_key"));
        assert!(is_prefix_pointer("/mail/from", "/mail/from"));
        assert!(!is_prefix_pointer("/mail/from", "/mail/from_name"));
        assert!(is_prefix_pointer("/", "/anything"));
    }

    #[test]
    fn null_overlay_keeps_base() {
        let a = serde_json::json!({"a": {"b": 1}});
        let merged = deep_merge(a.clone(), Value::Null);
        assert_eq!(merged, a);
    }

    #[test]
    fn defaults_when_config_empty() {
        let s = ServiceSettings::from_config_json(&serde_json::json!({})).unwrap();
        assert_eq!(s.credit_rate_bps, 1500);
        assert_eq!(s.insert_chunk_size, 500);
        assert_eq!(s.store_backend, StoreBackend::Auto);
        assert_eq!(s.paypal_base_url, "https://api-m.sandbox.paypal.com");
    }

    #[test]
    fn paypal_live_switches_base_url() {
        let cfg = serde_json::json!({"payments": {"paypal": {"environment": "LIVE"}}});
        let s = ServiceSettings::from_config_json(&cfg).unwrap();
        assert_eq!(s.paypal_environment, PayPalEnvironment::Live);
        assert_eq!(s.paypal_base_url, "https://api-m.paypal.com");
    }

    #[test]
    fn rejects_wrong_types() {
        let cfg = serde_json::json!({"ledger": {"credit_rate_bps": "fifteen"}});
        assert!(ServiceSettings::from_config_json(&cfg).is_err());
        let cfg = serde_json::json!({"ledger": {"credit_rate_bps": 20000}});
        assert!(ServiceSettings::from_config_json(&cfg).is_err());
    }

    #[test]
    fn insert_chunk_size_bounded_by_pg_bind_limit() {
        let cfg = serde_json::json!({"ledger": {"insert_chunk_size": 2520}});
        assert_eq!(ServiceSettings::from_config_json(&cfg).unwrap().insert_chunk_size, 2520);
        for bad in [0, 2521, 10_000] {
            let cfg = serde_json::json!({"ledger": {"insert_chunk_size": bad}});
            let err = ServiceSettings::from_config_json(&cfg).unwrap_err();
            assert!(err.to_string().contains("insert_chunk_size"), "{err}");
        }
    }
}
