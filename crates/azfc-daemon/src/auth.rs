//! Admin authentication.
//!
//! Two ways in:
//! - the `azfc_admin` session cookie issued by `POST /api/admin/login`
//!   (`base64url(json) "." hex(HMAC-SHA256(secret, base64url(json)))`),
//! - `Authorization: Bearer <ADMIN_TOKEN>` for machine clients.
//!
//! Every comparison against a secret is constant-time.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const ADMIN_COOKIE: &str = "azfc_admin";
pub const ADMIN_ROLE: &str = "admin";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Admin secrets held by the daemon. **Redacted in `Debug`.**
#[derive(Clone, Default)]
pub struct AdminCredentials {
    pub password: Option<String>,
    pub session_secret: Option<String>,
    pub api_token: Option<String>,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| v.as_ref().map(|_| "<REDACTED>");
        f.debug_struct("AdminCredentials")
            .field("password", &set(&self.password))
            .field("session_secret", &set(&self.session_secret))
            .field("api_token", &set(&self.api_token))
            .finish()
    }
}

impl AdminCredentials {
    /// Cookie session or static bearer token.
    pub fn is_admin(&self, headers: &HeaderMap, now_ms: i64) -> bool {
        if let (Some(secret), Some(token)) = (&self.session_secret, cookie_value(headers, ADMIN_COOKIE)) {
            if verify_session(secret, &token, now_ms).is_ok() {
                return true;
            }
        }
        match (&self.api_token, bearer_token(headers)) {
            (Some(expected), Some(got)) => secrets_equal(expected, &got),
            _ => false,
        }
    }
}

/// Compares SHA-256 digests so neither content nor length leaks through timing.
pub fn secrets_equal(a: &str, b: &str) -> bool {
    let da = Sha256::digest(a.as_bytes());
    let db = Sha256::digest(b.as_bytes());
    da.iter().zip(db.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ---------------------------------------------------------------------------
// Session tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub role: String,
    /// Expiry, unix milliseconds.
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("malformed session token")]
    Malformed,
    #[error("session signature mismatch")]
    BadSignature,
    #[error("session expired")]
    Expired,
    #[error("session role is not admin")]
    NotAdmin,
    #[error("session secret rejected by HMAC")]
    KeyRejected,
}

fn mac(secret: &str) -> Result<HmacSha256, SessionError> {
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).map_err(|_| SessionError::KeyRejected)
}

/// Issue an admin session valid for `ttl_secs` from `now_ms`.
pub fn sign_session(secret: &str, now_ms: i64, ttl_secs: u64) -> Result<String, SessionError> {
    let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    let claims = SessionClaims {
        role: ADMIN_ROLE.to_string(),
        exp: now_ms.saturating_add(ttl_ms),
    };
    let json = serde_json::to_vec(&claims).unwrap_or_default();
    let payload = URL_SAFE_NO_PAD.encode(json);
    let mut m = mac(secret)?;
    m.update(payload.as_bytes());
    let sig = hex::encode(m.finalize().into_bytes());
    Ok(format!("{payload}.{sig}"))
}

pub fn verify_session(secret: &str, token: &str, now_ms: i64) -> Result<SessionClaims, SessionError> {
    let (payload, sig_hex) = token.split_once('.').ok_or(SessionError::Malformed)?;
    if payload.is_empty() || sig_hex.is_empty() {
        return Err(SessionError::Malformed);
    }
    let sig = hex::decode(sig_hex).map_err(|_| SessionError::Malformed)?;
    let mut m = mac(secret)?;
    m.update(payload.as_bytes());
    m.verify_slice(&sig).map_err(|_| SessionError::BadSignature)?;

    let json = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| SessionError::Malformed)?;
    let claims: SessionClaims = serde_json::from_slice(&json).map_err(|_| SessionError::Malformed)?;
    if claims.exp <= now_ms {
        return Err(SessionError::Expired);
    }
    if claims.role != ADMIN_ROLE {
        return Err(SessionError::NotAdmin);
    }
    Ok(claims)
}

// ---------------------------------------------------------------------------
// Cookies + headers
// ---------------------------------------------------------------------------

pub fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!("{ADMIN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}; Secure")
}

pub fn cleared_cookie() -> String {
    format!("{ADMIN_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure")
}

/// First cookie named `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Present in a handler's arguments = the request is from an admin.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession;

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, st: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        if st.admin.is_admin(&parts.headers, now_ms) {
            Ok(AdminSession)
        } else {
            Err(ApiError::Unauthorized("Unauthorized".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const NOW: i64 = 1_767_225_600_000;

    #[test]
    fn session_round_trip_and_rejections() {
        let token = sign_session("s3cret", NOW, 60).unwrap();
        let claims = verify_session("s3cret", &token, NOW + 1).unwrap();
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp, NOW + 60_000);

        assert_eq!(verify_session("other", &token, NOW), Err(SessionError::BadSignature));
        assert_eq!(verify_session("s3cret", &token, NOW + 60_000), Err(SessionError::Expired));
        assert_eq!(verify_session("s3cret", "nodot", NOW), Err(SessionError::Malformed));
        assert_eq!(verify_session("s3cret", "abc.zz", NOW), Err(SessionError::Malformed));
    }

    #[test]
    fn empty_secret_still_signs() {
        let token = sign_session("", NOW, 60).unwrap();
        assert!(verify_session("", &token, NOW).is_ok());
        assert_eq!(verify_session("x", &token, NOW), Err(SessionError::BadSignature));
    }

    #[test]
    fn non_admin_role_is_refused() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"role":"viewer","exp":9999999999999}"#);
        let mut m = mac("k").unwrap();
        m.update(payload.as_bytes());
        let token = format!("{payload}.{}", hex::encode(m.finalize().into_bytes()));
        assert_eq!(verify_session("k", &token, NOW), Err(SessionError::NotAdmin));
    }

    #[test]
    fn cookie_and_bearer_parsing() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("a=1; azfc_admin=tok.sig; b=2"));
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  machine "));
        assert_eq!(cookie_value(&h, "azfc_admin").as_deref(), Some("tok.sig"));
        assert_eq!(cookie_value(&h, "missing"), None);
        assert_eq!(bearer_token(&h).as_deref(), Some("machine"));
    }

    #[test]
    fn credentials_accept_either_path() {
        let creds = AdminCredentials {
            password: Some("pw".into()),
            session_secret: Some("sec".into()),
            api_token: Some("machine".into()),
        };
        let mut h = HeaderMap::new();
        assert!(!creds.is_admin(&h, NOW));

        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer machine"));
        assert!(creds.is_admin(&h, NOW));

        let mut h = HeaderMap::new();
        let cookie = format!("{ADMIN_COOKIE}={}", sign_session("sec", NOW, 60).unwrap());
        h.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        assert!(creds.is_admin(&h, NOW));
        assert!(!creds.is_admin(&h, NOW + 120_000));
    }

    #[test]
    fn cookie_attributes() {
        assert_eq!(
            session_cookie("t", 604_800),
            "azfc_admin=t; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800; Secure"
        );
        assert!(cleared_cookie().contains("Max-Age=0"));
        assert!(secrets_equal("a", "a"));
        assert!(!secrets_equal("a", "ab"));
    }
}
