//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"PAYPAL_SECRET"`), either a
//!   single name or an ordered list of fallback names.
//! - Binaries call [`resolve_secrets`] once at startup and pass the resulting
//!   [`ResolvedSecrets`] into constructors; nothing else reads credentials from
//!   the environment.
//! - `Debug` on every secret-bearing struct redacts values.
//! - Error messages name the env var, never the value.
//!
//! # Mode-aware enforcement
//! | Mode        | Required                                                        |
//! |-------------|-----------------------------------------------------------------|
//! | PRODUCTION  | PayPal client id + secret, Resend key, admin password + session secret, storage url + key |
//! | DEVELOPMENT | nothing (affected endpoints answer 500 until configured)         |

use anyhow::{bail, Result};
use serde_json::Value;

use crate::DeployMode;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// REST KV endpoint + bearer token. **Redacted in `Debug`.**
#[derive(Clone, PartialEq, Eq)]
pub struct KvCredentials {
    pub url: String,
    pub token: String,
}

impl std::fmt::Debug for KvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvCredentials")
            .field("url", &self.url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// All credentials resolved from the environment for one process.
/// **Values are redacted in `Debug` output.**
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    pub paypal_client_id: Option<String>,
    pub paypal_secret: Option<String>,
    pub resend_api_key: Option<String>,
    /// Inbox for new-order notifications. Not secret, but env-provided.
    pub admin_notify_email: Option<String>,
    pub storage_url: Option<String>,
    pub storage_service_key: Option<String>,
    pub database_url: Option<String>,
    pub kv: Option<KvCredentials>,
    pub admin_password: Option<String>,
    pub admin_session_secret: Option<String>,
    /// Static bearer token accepted on admin routes (machine clients).
    pub admin_api_token: Option<String>,
}

fn redact(v: &Option<String>) -> Option<&'static str> {
    v.as_ref().map(|_| "<REDACTED>")
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("paypal_client_id", &redact(&self.paypal_client_id))
            .field("paypal_secret", &redact(&self.paypal_secret))
            .field("resend_api_key", &redact(&self.resend_api_key))
            .field("admin_notify_email", &self.admin_notify_email)
            .field("storage_url", &self.storage_url)
            .field("storage_service_key", &redact(&self.storage_service_key))
            .field("database_url", &redact(&self.database_url))
            .field("kv", &self.kv)
            .field("admin_password", &redact(&self.admin_password))
            .field("admin_session_secret", &redact(&self.admin_session_secret))
            .field("admin_api_token", &redact(&self.admin_api_token))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Env-name parsing
// ---------------------------------------------------------------------------

/// Ordered candidate env var names for one credential.
#[derive(Debug, Clone)]
struct EnvNames(Vec<String>);

impl EnvNames {
    fn display(&self) -> String {
        self.0.join(" | ")
    }
}

/// Read env var name(s) at `pointer`: a string or a list of strings.
/// Falls back to `defaults` when absent or blank.
fn names_at(config: &Value, pointer: &str, defaults: &[&str]) -> EnvNames {
    let from_cfg: Vec<String> = match config.pointer(pointer) {
        Some(Value::String(s)) => vec![s.trim().to_string()],
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .collect(),
        _ => Vec::new(),
    };
    let from_cfg: Vec<String> = from_cfg.into_iter().filter(|s| !s.is_empty()).collect();
    if from_cfg.is_empty() {
        EnvNames(defaults.iter().map(|s| s.to_string()).collect())
    } else {
        EnvNames(from_cfg)
    }
}

/// First candidate whose value is set and non-blank.
fn first_set<F>(names: &EnvNames, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.0.iter().enumerate().find_map(|(i, name)| {
        let value = lookup(name).filter(|v| !v.trim().is_empty())?;
        if i > 0 {
            tracing::debug!(env = %name, "credential resolved from fallback env name");
        }
        Some(value)
    })
}

/// KV url/token come in index-aligned pairs (`KV_REST_API_*`, then
/// `UPSTASH_REDIS_REST_*`); a pair is used only when both halves are set.
fn first_pair<F>(urls: &EnvNames, tokens: &EnvNames, lookup: &F) -> Option<KvCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    urls.0.iter().zip(tokens.0.iter()).find_map(|(u, t)| {
        let url = lookup(u).filter(|v| !v.trim().is_empty())?;
        let token = lookup(t).filter(|v| !v.trim().is_empty())?;
        Some(KvCredentials {
            url: url.trim_end_matches('/').to_string(),
            token,
        })
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve every credential from the process environment.
pub fn resolve_secrets(config_json: &Value, mode: DeployMode) -> Result<ResolvedSecrets> {
    resolve_secrets_with(config_json, mode, |name| std::env::var(name).ok())
}

/// Same as [`resolve_secrets`] with an injectable env lookup.
///
/// # Errors
/// In PRODUCTION, returns `SECRETS_MISSING` naming the env var(s) of the first
/// missing required credential.
pub fn resolve_secrets_with<F>(config_json: &Value, mode: DeployMode, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let paypal_client_id_n = names_at(config_json, "/payments/paypal/keys_env/client_id", &["PAYPAL_CLIENT_ID"]);
    let paypal_secret_n = names_at(config_json, "/payments/paypal/keys_env/secret", &["PAYPAL_SECRET"]);
    let resend_n = names_at(config_json, "/mail/keys_env/resend_api_key", &["RESEND_API_KEY"]);
    let admin_notify_n = names_at(
        config_json,
        "/mail/keys_env/admin_notify_email",
        &["ADMIN_NOTIFY_EMAIL", "MAIL_ADMIN"],
    );
    let storage_url_n = names_at(
        config_json,
        "/storage/keys_env/url",
        &["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"],
    );
    let storage_key_n = names_at(
        config_json,
        "/storage/keys_env/service_role_key",
        &[
            "SUPABASE_SERVICE_ROLE_KEY",
            "SUPABASE_SERVICE_KEY",
            "SUPABASE_SERVICE_ROLE",
            "SUPABASE_SERVICE_ROLE_SECRET",
        ],
    );
    let db_n = names_at(
        config_json,
        "/store/keys_env/database_url",
        &["AZFC_DATABASE_URL", "DATABASE_URL"],
    );
    let kv_url_n = names_at(
        config_json,
        "/store/keys_env/kv_url",
        &["KV_REST_API_URL", "UPSTASH_REDIS_REST_URL"],
    );
    let kv_token_n = names_at(
        config_json,
        "/store/keys_env/kv_token",
        &["KV_REST_API_TOKEN", "UPSTASH_REDIS_REST_TOKEN"],
    );
    let admin_pw_n = names_at(config_json, "/admin/keys_env/password", &["ADMIN_PASSWORD"]);
    let admin_secret_n = names_at(
        config_json,
        "/admin/keys_env/session_secret",
        &["ADMIN_SESSION_SECRET"],
    );
    let admin_token_n = names_at(config_json, "/admin/keys_env/api_token", &["ADMIN_TOKEN"]);

    let secrets = ResolvedSecrets {
        paypal_client_id: first_set(&paypal_client_id_n, &lookup),
        paypal_secret: first_set(&paypal_secret_n, &lookup),
        resend_api_key: first_set(&resend_n, &lookup),
        admin_notify_email: first_set(&admin_notify_n, &lookup).map(|v| v.trim().to_string()),
        storage_url: first_set(&storage_url_n, &lookup).map(|v| v.trim_end_matches('/').to_string()),
        storage_service_key: first_set(&storage_key_n, &lookup),
        database_url: first_set(&db_n, &lookup),
        kv: first_pair(&kv_url_n, &kv_token_n, &lookup),
        admin_password: first_set(&admin_pw_n, &lookup),
        admin_session_secret: first_set(&admin_secret_n, &lookup),
        admin_api_token: first_set(&admin_token_n, &lookup),
    };

    if mode == DeployMode::Production {
        let required: [(&Option<String>, &EnvNames, &str); 7] = [
            (&secrets.paypal_client_id, &paypal_client_id_n, "PayPal client id"),
            (&secrets.paypal_secret, &paypal_secret_n, "PayPal secret"),
            (&secrets.resend_api_key, &resend_n, "Resend api key"),
            (&secrets.admin_password, &admin_pw_n, "admin password"),
            (&secrets.admin_session_secret, &admin_secret_n, "admin session secret"),
            (&secrets.storage_url, &storage_url_n, "storage url"),
            (&secrets.storage_service_key, &storage_key_n, "storage service key"),
        ];
        for (value, names, what) in required {
            if value.is_none() {
                bail!(
                    "SECRETS_MISSING mode=PRODUCTION: required env var '{}' ({}) is not set or empty",
                    names.display(),
                    what,
                );
            }
        }
    }

    Ok(secrets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn falls_back_through_name_list() {
        let cfg = serde_json::json!({});
        let s = resolve_secrets_with(
            &cfg,
            DeployMode::Development,
            env(&[("NEXT_PUBLIC_SUPABASE_URL", "https://x.supabase.co/")]),
        )
        .unwrap();
        assert_eq!(s.storage_url.as_deref(), Some("https://x.supabase.co"));
    }

    #[test]
    fn kv_pair_requires_both_halves() {
        let cfg = serde_json::json!({});
        let s = resolve_secrets_with(
            &cfg,
            DeployMode::Development,
            env(&[
                ("KV_REST_API_URL", "https://kv.example"),
                ("UPSTASH_REDIS_REST_URL", "https://up.example"),
                ("UPSTASH_REDIS_REST_TOKEN", "tok"),
            ]),
        )
        .unwrap();
        let kv = s.kv.unwrap();
        assert_eq!(kv.url, "https://up.example");
        assert_eq!(kv.token, "tok");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let cfg = serde_json::json!({});
        let s = resolve_secrets_with(
            &cfg,
            DeployMode::Development,
            env(&[("RESEND_API_KEY", "   ")]),
        )
        .unwrap();
        assert!(s.resend_api_key.is_none());
    }
}
