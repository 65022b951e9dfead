//! azfc-daemon library target.
//!
//! Exposes the router, state and auth helpers for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
