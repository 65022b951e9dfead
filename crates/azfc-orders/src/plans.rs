use azfc_schemas::Plan;

/// Server-side price table in USD cents. The amount posted by the browser is
/// never trusted.
pub fn price_cents(plan: Plan) -> i64 {
    match plan {
        Plan::Prep => 7_900,
        Plan::PrepCpa => 47_800,
    }
}

/// Purchase-unit description shown on the PayPal approval page.
pub fn paypal_description(plan: Plan) -> &'static str {
    match plan {
        Plan::Prep => "AZ Film Credit - Document Prep Only",
        Plan::PrepCpa => "AZ Film Credit - Document Prep + Certified AZ CPA Sign-Off",
    }
}

pub fn plan_name(plan: Plan) -> &'static str {
    match plan {
        Plan::Prep => "Document Prep",
        Plan::PrepCpa => "Document Prep + CPA Sign-Off",
    }
}
