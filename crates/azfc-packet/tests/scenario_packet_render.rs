use azfc_orders::{record_capture, CheckoutForm, Order};
use azfc_packet::{packet_lines, render_packet_pdf, PACKET_TYPE};
use azfc_schemas::{CalcTotals, PaymentCapture};
use chrono::{TimeZone, Utc};

fn paid_order() -> Order {
    let form: CheckoutForm = serde_json::from_value(serde_json::json!({
        "service_plan": "prep_cpa",
        "company_name": "Mesa Light LLC",
        "contact_name": "Kai",
        "contact_email": "kai@example.com",
        "project_title": "Monsoon"
    }))
    .unwrap();
    let mut o = form.into_order("AZFC-260101-A1B2C3".into(), Utc::now()).unwrap();
    record_capture(&mut o, PaymentCapture::default(), Utc::now()).unwrap();
    o
}

fn totals(o: &Order) -> CalcTotals {
    CalcTotals {
        order_id: o.id,
        qualified_costs_cents: 1_000_000,
        nonqualified_costs_cents: 25_050,
        credit_rate_bps: 1500,
        credit_computed_cents: 150_000,
        claim_this_year_cents: 150_000,
        carryforward_cents: 0,
        updated_at: Utc::now(),
    }
}

#[test]
fn lines_cover_order_and_totals() {
    let o = paid_order();
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let lines = packet_lines(&o, Some(&totals(&o)), at);
    assert_eq!(lines[0], "Tracking #: AZFC-260101-A1B2C3");
    assert!(lines.contains(&"Plan: Document Prep + CPA Sign-Off ($478.00)".to_string()));
    assert!(lines.contains(&"Status: Ready for admin review".to_string()));
    assert!(lines.contains(&"Generated: 2026-01-02T03:04:05Z".to_string()));
    assert!(lines.contains(&"Credit rate: 0.15".to_string()));
    assert!(lines.contains(&"Credit computed: $1500.00".to_string()));

    let without = packet_lines(&o, None, at);
    assert!(without.last().unwrap().starts_with("No ledger"));
}

#[test]
fn renders_a_pdf_document() {
    let o = paid_order();
    let bytes = render_packet_pdf(&o, Some(&totals(&o)), Utc::now()).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.5"));
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("Helvetica-Bold"));
    assert!(text.contains("Tracking #: AZFC-260101-A1B2C3"));
    assert!(text.contains("%%EOF"));
    assert_eq!(PACKET_TYPE, "cpa_packet_pdf");
}
