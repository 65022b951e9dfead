//! azfc-ledger
//!
//! Cost-ledger CSV parsing and credit computation. Read side only: this crate
//! never touches storage. Callers persist the returned transactions (in
//! chunks) and the computed [`CalcTotals`].
//!
//! ## CSV column contract (trimmed, case-insensitive, order-independent)
//!
//! | Column            | Required | Notes                                        |
//! |-------------------|----------|----------------------------------------------|
//! | `txn_date`        | yes      | Stored as text                               |
//! | `vendor_name`     | yes      |                                              |
//! | `description`     | yes      |                                              |
//! | `amount`          | yes      | `-$1,234.50` style; see [`parse_amount_cents`] |
//! | `qualified_flag`  | no       | Defaults to true; see [`parse_bool`]         |
//! | `az_vendor`       | no       | Defaults to true                             |
//! | `az_work_performed` | no     | Defaults to true                             |
//! | `currency`        | no       | Defaults to `USD`                            |
//!
//! Every other ledger column is optional free text; empty cells become `None`.

mod parse;
mod totals;

pub use parse::{
    parse_amount_cents, parse_bool, parse_ledger, IngestReport, LedgerError, ParsedLedger,
    OPTIONAL_COLUMNS, REQUIRED_COLUMNS,
};
pub use totals::{compute_totals, credit_cents, DEFAULT_CREDIT_RATE_BPS};
