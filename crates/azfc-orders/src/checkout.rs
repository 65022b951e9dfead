//! Order form validation.

use azfc_schemas::{Customer, Order, OrderStatus, Plan, Project, TimelineEntry};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::plans::price_cents;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Unknown service plan: {0}")]
    UnknownPlan(String),
}

/// Raw order form as posted by the checkout page. Every field is optional at
/// this layer; [`CheckoutForm::validate`] enforces the required set.
///
/// The form also posts an `amount`; it is ignored in favour of the price table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    pub service_plan: Option<String>,
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub project_title: Option<String>,
    pub project_type: Option<String>,
    pub aca_id: Option<String>,
    pub aca_post_cert_id: Option<String>,
    /// Free text on the form ("~$1.2M"); numbers are accepted too.
    pub est_qualified_costs: Option<Value>,
    pub tax_year: Option<Value>,
    pub entity_type: Option<String>,
    pub entity_tax_type: Option<String>,
    pub ein_last4: Option<String>,
    pub prod_start: Option<String>,
    pub prod_end: Option<String>,
    pub notes: Option<String>,
}

fn text(v: &Option<String>) -> String {
    v.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn loose_text(v: &Option<Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn tax_year(v: &Option<Value>) -> Option<i32> {
    match v {
        Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

impl CheckoutForm {
    /// Reports the first missing required field, then the plan.
    pub fn validate(&self) -> Result<Plan, CheckoutError> {
        let required: [(&'static str, &Option<String>); 5] = [
            ("service_plan", &self.service_plan),
            ("company_name", &self.company_name),
            ("contact_name", &self.contact_name),
            ("contact_email", &self.contact_email),
            ("project_title", &self.project_title),
        ];
        for (name, value) in required {
            if text(value).is_empty() {
                return Err(CheckoutError::MissingField(name));
            }
        }
        let raw = text(&self.service_plan);
        Plan::parse(&raw).ok_or(CheckoutError::UnknownPlan(raw))
    }

    /// Validate and build a fresh order in `AWAITING_PAYMENT_APPROVAL`.
    /// `paypal_order_id` is filled in by the caller once the gateway answers.
    pub fn into_order(
        self,
        tracking_number: String,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        let plan = self.validate()?;
        let status = OrderStatus::AwaitingPaymentApproval;
        Ok(Order {
            id: Uuid::new_v4(),
            tracking_number,
            paypal_order_id: None,
            status,
            plan,
            amount_cents: price_cents(plan),
            currency: "USD".to_string(),
            customer: Customer {
                company_name: text(&self.company_name),
                contact_name: text(&self.contact_name),
                contact_email: text(&self.contact_email),
                contact_phone: text(&self.contact_phone),
            },
            project: Project {
                project_title: text(&self.project_title),
                project_type: text(&self.project_type),
                aca_id: text(&self.aca_id),
                aca_post_cert_id: text(&self.aca_post_cert_id),
                est_qualified_costs: loose_text(&self.est_qualified_costs),
                tax_year: tax_year(&self.tax_year),
                entity_type: text(&self.entity_type),
                entity_tax_type: text(&self.entity_tax_type),
                ein_last4: text(&self.ein_last4),
                prod_start: text(&self.prod_start),
                prod_end: text(&self.prod_end),
                notes: text(&self.notes),
            },
            exports: None,
            paypal_capture: None,
            admin_notes: None,
            assigned_to: None,
            packet_path: None,
            timeline: vec![TimelineEntry {
                at: now,
                status,
                note: "PayPal order created".to_string(),
            }],
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> CheckoutForm {
        serde_json::from_value(serde_json::json!({
            "service_plan": "prep_cpa",
            "amount": 1,
            "company_name": " Dust Devil Pictures ",
            "contact_name": "R. Vega",
            "contact_email": "rv@example.com",
            "project_title": "Saguaro Nights",
            "est_qualified_costs": 1250000,
            "tax_year": "2025"
        }))
        .unwrap()
    }

    #[test]
    fn first_missing_field_is_reported() {
        let mut f = form();
        f.contact_name = Some("  ".into());
        f.project_title = None;
        assert_eq!(
            f.validate().unwrap_err().to_string(),
            "Missing required field: contact_name"
        );
    }

    #[test]
    fn unknown_plan_rejected() {
        let mut f = form();
        f.service_plan = Some("gold".into());
        assert_eq!(
            f.validate(),
            Err(CheckoutError::UnknownPlan("gold".to_string()))
        );
    }

    #[test]
    fn builds_awaiting_order_with_server_price() {
        let now = Utc::now();
        let o = form().into_order("AZFC-260101-ABCDEF".into(), now).unwrap();
        assert_eq!(o.status, OrderStatus::AwaitingPaymentApproval);
        assert_eq!(o.amount_cents, 47_800, "posted amount is ignored");
        assert_eq!(o.customer.company_name, "Dust Devil Pictures");
        assert_eq!(o.project.est_qualified_costs, "1250000");
        assert_eq!(o.project.tax_year, Some(2025));
        assert_eq!(o.timeline.len(), 1);
        assert_eq!(o.timeline[0].note, "PayPal order created");
        assert_eq!(o.created_at, now);
    }
}
