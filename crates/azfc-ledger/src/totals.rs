use azfc_schemas::{CalcTotals, LedgerTransaction};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 15% of qualified costs.
pub const DEFAULT_CREDIT_RATE_BPS: i64 = 1_500;

/// `qualified_cents * rate_bps / 10_000`, rounded half away from zero.
pub fn credit_cents(qualified_cents: i64, rate_bps: i64) -> i64 {
    let n = qualified_cents as i128 * rate_bps as i128;
    let d: i128 = 10_000;
    let q = if n >= 0 {
        (n + d / 2) / d
    } else {
        -((-n + d / 2) / d)
    };
    q.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Totals over every transaction of one order. The whole credit is claimed
/// in the current year; nothing is carried forward.
pub fn compute_totals(
    order_id: Uuid,
    transactions: &[LedgerTransaction],
    rate_bps: i64,
    now: DateTime<Utc>,
) -> CalcTotals {
    let (qualified, nonqualified) =
        transactions
            .iter()
            .fold((0_i64, 0_i64), |(q, nq), t| {
                if t.qualified_flag {
                    (q.saturating_add(t.amount_cents), nq)
                } else {
                    (q, nq.saturating_add(t.amount_cents))
                }
            });
    let credit = credit_cents(qualified, rate_bps);
    CalcTotals {
        order_id,
        qualified_costs_cents: qualified,
        nonqualified_costs_cents: nonqualified,
        credit_rate_bps: rate_bps,
        credit_computed_cents: credit,
        claim_this_year_cents: credit,
        carryforward_cents: 0,
        updated_at: now,
    }
}
