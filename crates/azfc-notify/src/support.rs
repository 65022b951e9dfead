//! Contact form normalisation.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

pub const NAME_MAX: usize = 120;
pub const EMAIL_MAX: usize = 200;
pub const PROJECT_MAX: usize = 200;
pub const TOPIC_MAX: usize = 120;
pub const MESSAGE_MAX: usize = 6000;
pub const USER_AGENT_MAX: usize = 500;

/// Trim, then keep at most `max` characters.
pub fn clean(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect()
}

fn email_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("Missing required fields.")]
    MissingFields,
    #[error("Invalid email address.")]
    InvalidEmail,
}

/// Raw body of `POST /api/contact`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub project: Option<String>,
    pub topic: Option<String>,
    pub message: Option<String>,
    pub user_agent: Option<String>,
}

/// A cleaned, validated support request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportRequest {
    pub name: String,
    pub email: String,
    pub project: String,
    pub topic: String,
    pub message: String,
    pub user_agent: String,
}

impl SupportRequest {
    pub fn from_form(form: &ContactForm) -> Result<Self, ContactError> {
        let field = |v: &Option<String>, max| clean(v.as_deref().unwrap_or_default(), max);
        let req = SupportRequest {
            name: field(&form.name, NAME_MAX),
            email: field(&form.email, EMAIL_MAX),
            project: field(&form.project, PROJECT_MAX),
            topic: field(&form.topic, TOPIC_MAX),
            message: field(&form.message, MESSAGE_MAX),
            user_agent: field(&form.user_agent, USER_AGENT_MAX),
        };
        if req.name.is_empty() || req.email.is_empty() || req.message.is_empty() {
            return Err(ContactError::MissingFields);
        }
        if !email_shape().is_match(&req.email) {
            return Err(ContactError::InvalidEmail);
        }
        Ok(req)
    }
}
