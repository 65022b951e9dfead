//! Payment capture: double-capture guard and the post-capture pipeline.

use azfc_schemas::{Exports, Order, OrderStatus, PaymentCapture, Plan};
use chrono::{DateTime, Utc};

use crate::lifecycle::{apply_transition, StatusRules, TransitionError};

/// What the capture endpoint should do with an incoming capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDecision {
    /// Call the gateway and run [`record_capture`].
    Proceed,
    /// Order is already paid; answer with the stored order, do not capture.
    AlreadyCaptured,
    /// Supplied PayPal order id differs from the one created at checkout.
    Mismatch,
    /// Order was cancelled before payment.
    Cancelled,
}

pub fn decide_capture(order: &Order, paypal_order_id: &str) -> CaptureDecision {
    if order.status.is_paid() {
        return CaptureDecision::AlreadyCaptured;
    }
    if order.status == OrderStatus::Cancelled {
        return CaptureDecision::Cancelled;
    }
    match order.paypal_order_id.as_deref() {
        Some(stored) if stored != paypal_order_id.trim() => CaptureDecision::Mismatch,
        _ => CaptureDecision::Proceed,
    }
}

/// Draft documents attached right after capture, chosen by plan.
pub fn draft_exports(plan: Plan) -> Exports {
    let audit_pdf = match plan {
        Plan::PrepCpa => "/samples/AZ_Film_Credit_Full_CPA_Audit_Sample_Series.pdf",
        Plan::Prep => "/samples/AZ_Film_Credit_Full_CPA_Audit_Sample_Feature.pdf",
    };
    Exports {
        audit_pdf: audit_pdf.to_string(),
        state_forms_pdf: "/samples/AZ_Film_Credit_Full_CPA_Audit_Sample_Commercial.pdf".to_string(),
    }
}

/// `PAID` -> `PROCESSING` -> `READY_FOR_ADMIN_REVIEW`, storing the capture
/// and draft exports along the way. Only valid from
/// `AWAITING_PAYMENT_APPROVAL`; the order is unchanged on error.
pub fn record_capture(
    order: &mut Order,
    capture: PaymentCapture,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    if order.status != OrderStatus::AwaitingPaymentApproval {
        return Err(TransitionError::NotAwaitingPayment { from: order.status });
    }
    apply_transition(order, OrderStatus::Paid, "Payment captured", now)?;
    order.paypal_capture = Some(capture);
    apply_transition(order, OrderStatus::Processing, "Building CPA package", now)?;
    order.exports = Some(draft_exports(order.plan));
    apply_transition(
        order,
        OrderStatus::ReadyForAdminReview,
        "Draft generated; awaiting admin review",
        now,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutForm;

    fn awaiting(plan: &str) -> Order {
        let form: CheckoutForm = serde_json::from_value(serde_json::json!({
            "service_plan": plan,
            "company_name": "Co",
            "contact_name": "A",
            "contact_email": "a@example.com",
            "project_title": "P"
        }))
        .unwrap();
        let mut o = form.into_order("AZFC-260101-000001".into(), Utc::now()).unwrap();
        o.paypal_order_id = Some("PP-1".into());
        o
    }

    #[test]
    fn decision_table() {
        let mut o = awaiting("prep");
        assert_eq!(decide_capture(&o, "PP-1"), CaptureDecision::Proceed);
        assert_eq!(decide_capture(&o, "PP-2"), CaptureDecision::Mismatch);

        o.status = OrderStatus::SentToCpa;
        assert_eq!(decide_capture(&o, "PP-2"), CaptureDecision::AlreadyCaptured);

        o.status = OrderStatus::Cancelled;
        assert_eq!(decide_capture(&o, "PP-1"), CaptureDecision::Cancelled);
    }

    #[test]
    fn pipeline_pushes_three_entries_and_exports() {
        let mut o = awaiting("prep_cpa");
        let cap = PaymentCapture {
            id: Some("CAP-9".into()),
            status: Some("COMPLETED".into()),
        };
        record_capture(&mut o, cap.clone(), Utc::now()).unwrap();

        assert_eq!(o.status, OrderStatus::ReadyForAdminReview);
        let statuses: Vec<_> = o.timeline.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![
                OrderStatus::AwaitingPaymentApproval,
                OrderStatus::Paid,
                OrderStatus::Processing,
                OrderStatus::ReadyForAdminReview,
            ]
        );
        assert_eq!(o.paypal_capture, Some(cap));
        assert!(o
            .exports
            .as_ref()
            .unwrap()
            .audit_pdf
            .ends_with("Sample_Series.pdf"));
    }

    #[test]
    fn second_capture_is_refused() {
        let mut o = awaiting("prep");
        record_capture(&mut o, PaymentCapture::default(), Utc::now()).unwrap();
        let before = o.clone();
        assert!(record_capture(&mut o, PaymentCapture::default(), Utc::now()).is_err());
        assert_eq!(o, before);
    }
}
