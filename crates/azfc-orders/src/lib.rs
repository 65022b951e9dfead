//! azfc-orders
//!
//! Order lifecycle rules. Pure, deterministic logic: no I/O, no clock reads
//! except in [`generate_tracking_number`], no store access.
//!
//! - `lifecycle`: status predicates, labels and the transition table.
//! - `tracking`: `AZFC-YYMMDD-XXXXXX` tracking numbers.
//! - `plans`: server-side price table and plan copy.
//! - `checkout`: order form validation and initial order construction.
//! - `capture`: double-capture guard and the post-capture pipeline.
//! - `admin`: admin patches (status, notes, assignee).

mod admin;
mod capture;
mod checkout;
mod lifecycle;
mod plans;
mod tracking;

pub use admin::{apply_admin_patch, AdminPatch};
pub use capture::{decide_capture, draft_exports, record_capture, CaptureDecision};
pub use checkout::{CheckoutError, CheckoutForm};
pub use lifecycle::{apply_transition, check_transition, push_timeline, StatusRules, TransitionError};
pub use plans::{paypal_description, plan_name, price_cents};
pub use tracking::{
    generate_tracking_number, is_valid_tracking_number, tracking_number_from,
    TRACKING_GENERATION_ATTEMPTS,
};

pub use azfc_schemas::{Order, OrderStatus, Plan};
