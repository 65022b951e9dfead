//! Mode-aware enforcement of `resolve_secrets_with`.
//!
//! The env lookup is injected, so no test mutates the process environment.

use std::collections::HashMap;

use azfc_config::secrets::resolve_secrets_with;
use azfc_config::{load_layered_yaml_from_strings, DeployMode};

fn load(yaml: &str) -> serde_json::Value {
    load_layered_yaml_from_strings(&[yaml])
        .expect("test yaml must parse cleanly")
        .config_json
}

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |k| map.get(k).cloned()
}

const FULL_ENV: &[(&str, &str)] = &[
    ("PAYPAL_CLIENT_ID", "paypal-client-value"),
    ("PAYPAL_SECRET", "paypal-secret-value"),
    ("RESEND_API_KEY", "resend-value"),
    ("ADMIN_PASSWORD", "hunter2"),
    ("ADMIN_SESSION_SECRET", "session-secret-value"),
    ("SUPABASE_URL", "https://proj.supabase.co"),
    ("SUPABASE_SERVICE_ROLE_KEY", "service-key-value"),
];

#[test]
fn production_succeeds_with_full_env() {
    let cfg = load("service: {mode: PRODUCTION}");
    let s = resolve_secrets_with(&cfg, DeployMode::Production, lookup(FULL_ENV)).unwrap();
    assert_eq!(s.paypal_client_id.as_deref(), Some("paypal-client-value"));
    assert_eq!(s.storage_url.as_deref(), Some("https://proj.supabase.co"));
    assert!(s.kv.is_none());
}

#[test]
fn production_fails_closed_naming_the_missing_var() {
    let cfg = load(
        r#"
payments:
  paypal:
    keys_env:
      secret: "AZFC_SENTINEL_PAYPAL_SECRET"
"#,
    );
    let env: Vec<(&str, &str)> = FULL_ENV
        .iter()
        .copied()
        .filter(|(k, _)| *k != "PAYPAL_SECRET")
        .collect();
    let err = resolve_secrets_with(&cfg, DeployMode::Production, lookup(&env))
        .unwrap_err()
        .to_string();
    assert!(err.contains("SECRETS_MISSING"), "got: {err}");
    assert!(err.contains("mode=PRODUCTION"), "got: {err}");
    assert!(err.contains("AZFC_SENTINEL_PAYPAL_SECRET"), "got: {err}");
}

#[test]
fn production_error_lists_all_fallback_names() {
    let cfg = load("{}");
    let env: Vec<(&str, &str)> = FULL_ENV
        .iter()
        .copied()
        .filter(|(k, _)| *k != "SUPABASE_URL")
        .collect();
    let err = resolve_secrets_with(&cfg, DeployMode::Production, lookup(&env))
        .unwrap_err()
        .to_string();
    assert!(err.contains("SUPABASE_URL | NEXT_PUBLIC_SUPABASE_URL"), "got: {err}");
}

#[test]
fn development_tolerates_empty_env() {
    let cfg = load("{}");
    let s = resolve_secrets_with(&cfg, DeployMode::Development, lookup(&[])).unwrap();
    assert!(s.paypal_client_id.is_none());
    assert!(s.admin_session_secret.is_none());
}

#[test]
fn debug_output_is_redacted() {
    let cfg = load("{}");
    let mut env = FULL_ENV.to_vec();
    env.push(("KV_REST_API_URL", "https://kv.example"));
    env.push(("KV_REST_API_TOKEN", "kv-token-value"));
    let s = resolve_secrets_with(&cfg, DeployMode::Production, lookup(&env)).unwrap();

    let dbg = format!("{s:?}");
    for (_, value) in FULL_ENV.iter().filter(|(k, _)| !k.ends_with("_URL")) {
        assert!(!dbg.contains(value), "Debug leaked a secret value: {dbg}");
    }
    assert!(!dbg.contains("kv-token-value"), "Debug leaked kv token: {dbg}");
    assert!(dbg.contains("<REDACTED>"));
}
