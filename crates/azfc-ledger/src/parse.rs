use std::collections::HashMap;

use azfc_schemas::LedgerTransaction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const REQUIRED_COLUMNS: [&str; 4] = ["txn_date", "vendor_name", "description", "amount"];

pub const OPTIONAL_COLUMNS: [&str; 19] = [
    "vendor_address",
    "vendor_city",
    "vendor_state",
    "vendor_zip",
    "invoice_number",
    "category",
    "department",
    "cost_type",
    "episode",
    "payment_method",
    "currency",
    "az_work_performed",
    "az_vendor",
    "qualified_flag",
    "nonqualified_reason",
    "receipt_filename",
    "contract_filename",
    "location_agreement_filename",
    "notes",
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Ledger rejections. Display strings are shown to the uploader as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("CSV could not be read: {0}")]
    Csv(String),
    #[error("CSV appears empty.")]
    Empty,
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("No valid transactions found to import.")]
    NoValidRows { rows_read: usize },
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Data rows after dropping fully blank lines.
    pub rows_read: usize,
    pub imported: usize,
    pub skipped_zero_or_invalid: usize,
}

#[derive(Debug, Clone)]
pub struct ParsedLedger {
    pub transactions: Vec<LedgerTransaction>,
    pub report: IngestReport,
}

// ---------------------------------------------------------------------------
// Cell parsers
// ---------------------------------------------------------------------------

/// `true/1/yes/y` (any case) is true, any other text is false, an empty cell
/// yields `default`.
pub fn parse_bool(s: &str, default: bool) -> bool {
    let t = s.trim();
    if t.is_empty() {
        return default;
    }
    matches!(t.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "y")
}

/// Parse a money cell into integer cents.
///
/// Accepts an optional sign, an optional `$` (either side of the sign),
/// thousands separators and at most two decimals. Anything else is `None`;
/// floats are never involved.
pub fn parse_amount_cents(s: &str) -> Option<i64> {
    let mut t = s.trim();
    t = t.strip_prefix('$').unwrap_or(t);
    let negative = match t.as_bytes().first() {
        Some(b'-') => {
            t = &t[1..];
            true
        }
        Some(b'+') => {
            t = &t[1..];
            false
        }
        _ => false,
    };
    t = t.strip_prefix('$').unwrap_or(t);

    let cleaned: String = t.chars().filter(|c| *c != ',').collect();
    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.len() > 2
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let frac: i64 = match frac_part.len() {
        0 => 0,
        1 => frac_part.parse::<i64>().ok()? * 10,
        _ => frac_part.parse().ok()?,
    };
    let cents = whole.checked_mul(100)?.checked_add(frac)?;
    Some(if negative { -cents } else { cents })
}

fn optional(v: &str) -> Option<String> {
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

/// Parse ledger CSV bytes into transactions for `order_id`.
///
/// Quoted fields, doubled quotes and CRLF line endings are handled by the
/// `csv` reader. Rows with a zero or unparseable amount are skipped and
/// counted in the report.
pub fn parse_ledger(
    src: &[u8],
    order_id: Uuid,
    source_upload_id: Uuid,
) -> Result<ParsedLedger, LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(src);

    let mut rows: Vec<csv::StringRecord> = Vec::new();
    for rec in reader.records() {
        let rec = rec.map_err(|e| LedgerError::Csv(e.to_string()))?;
        if rec.iter().any(|f| !f.is_empty()) {
            rows.push(rec);
        }
    }
    if rows.len() < 2 {
        return Err(LedgerError::Empty);
    }

    let mut idx: HashMap<String, usize> = HashMap::new();
    for (i, h) in rows[0].iter().enumerate() {
        let name = h.trim_start_matches('\u{feff}').trim().to_ascii_lowercase();
        idx.entry(name).or_insert(i);
    }
    for col in REQUIRED_COLUMNS {
        if !idx.contains_key(col) {
            return Err(LedgerError::MissingColumn(col.to_string()));
        }
    }

    let mut report = IngestReport {
        rows_read: rows.len() - 1,
        ..Default::default()
    };
    let mut transactions = Vec::with_capacity(report.rows_read);

    for rec in &rows[1..] {
        let get = |k: &str| {
            idx.get(k)
                .and_then(|i| rec.get(*i))
                .map(str::trim)
                .unwrap_or("")
        };

        let amount_cents = match parse_amount_cents(get("amount")) {
            Some(c) if c != 0 => c,
            _ => {
                report.skipped_zero_or_invalid += 1;
                continue;
            }
        };

        transactions.push(LedgerTransaction {
            id: Uuid::new_v4(),
            order_id,
            source_upload_id,
            txn_date: optional(get("txn_date")),
            vendor_name: get("vendor_name").to_string(),
            vendor_address: optional(get("vendor_address")),
            vendor_city: optional(get("vendor_city")),
            vendor_state: optional(get("vendor_state")),
            vendor_zip: optional(get("vendor_zip")),
            invoice_number: optional(get("invoice_number")),
            description: get("description").to_string(),
            category: optional(get("category")),
            department: optional(get("department")),
            cost_type: optional(get("cost_type")),
            episode: optional(get("episode")),
            payment_method: optional(get("payment_method")),
            amount_cents,
            currency: optional(get("currency")).unwrap_or_else(|| "USD".to_string()),
            az_work_performed: parse_bool(get("az_work_performed"), true),
            az_vendor: parse_bool(get("az_vendor"), true),
            qualified_flag: parse_bool(get("qualified_flag"), true),
            nonqualified_reason: optional(get("nonqualified_reason")),
            receipt_filename: optional(get("receipt_filename")),
            contract_filename: optional(get("contract_filename")),
            location_agreement_filename: optional(get("location_agreement_filename")),
            notes: optional(get("notes")),
        });
    }

    report.imported = transactions.len();
    if transactions.is_empty() {
        return Err(LedgerError::NoValidRows {
            rows_read: report.rows_read,
        });
    }
    Ok(ParsedLedger {
        transactions,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_variants() {
        for s in ["true", "TRUE", "1", "yes", "Y"] {
            assert!(parse_bool(s, false), "{s}");
        }
        for s in ["false", "0", "no", "n/a"] {
            assert!(!parse_bool(s, true), "{s}");
        }
        assert!(parse_bool("  ", true));
        assert!(!parse_bool("", false));
    }

    #[test]
    fn amount_variants() {
        assert_eq!(parse_amount_cents("1250"), Some(125_000));
        assert_eq!(parse_amount_cents("$1,234.5"), Some(123_450));
        assert_eq!(parse_amount_cents("-$12.34"), Some(-1_234));
        assert_eq!(parse_amount_cents("$-12.34"), Some(-1_234));
        assert_eq!(parse_amount_cents("+.99"), Some(99));
        assert_eq!(parse_amount_cents("7."), Some(700));
        assert_eq!(parse_amount_cents("0.00"), Some(0));
    }

    #[test]
    fn amount_rejects() {
        for s in ["", "$", "-", ".", "12.345", "1e3", "12 USD", "--5", "NaN"] {
            assert_eq!(parse_amount_cents(s), None, "{s:?}");
        }
    }

    #[test]
    fn header_only_is_empty() {
        let err = parse_ledger(b"txn_date,vendor_name,description,amount\n", Uuid::nil(), Uuid::nil())
            .unwrap_err();
        assert_eq!(err, LedgerError::Empty);
        assert_eq!(err.to_string(), "CSV appears empty.");
    }
}
