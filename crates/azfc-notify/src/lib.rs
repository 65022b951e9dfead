//! azfc-notify
//!
//! Email bodies for every message the service sends. Each builder returns a
//! ready-to-send [`azfc_clients::Email`]; delivery is the caller's concern.
//! Every customer-supplied string is passed through [`escape_html`].

mod support;
mod templates;

pub use support::{clean, ContactError, ContactForm, SupportRequest};
pub use templates::{
    admin_new_order, customer_order_received, packet_ready, status_update, support_confirmation,
    support_request, tracking_link,
};

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
