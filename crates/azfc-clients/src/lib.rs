//! azfc-clients
//!
//! External SaaS collaborators behind narrow traits:
//!
//! - [`PaymentGateway`]: PayPal Orders v2 ([`PayPalClient`]).
//! - [`Mailer`]: Resend ([`ResendMailer`]), or [`DisabledMailer`] when no key
//!   is configured.
//! - [`ObjectStorage`]: Supabase Storage ([`SupabaseStorage`]).
//!
//! Every client takes its base URL explicitly so tests can point it at a
//! mock server.

mod mail;
mod paypal;
mod storage;

pub use mail::{DisabledMailer, Email, MailReceipt, Mailer, ResendMailer, RESEND_BASE_URL};
pub use paypal::{
    CaptureResult, CreatePaymentOrder, CreatedPaymentOrder, PayPalClient, PaymentGateway,
};
pub use storage::{ObjectStorage, SignedUpload, SupabaseStorage};

/// Trimmed response body for error messages.
pub(crate) fn snippet(body: &str) -> String {
    const MAX: usize = 500;
    let t = body.trim();
    if t.chars().count() <= MAX {
        t.to_string()
    } else {
        let cut: String = t.chars().take(MAX).collect();
        format!("{cut}...")
    }
}
