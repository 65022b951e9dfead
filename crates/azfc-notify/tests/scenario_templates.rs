use azfc_notify::{
    admin_new_order, customer_order_received, packet_ready, status_update, support_confirmation,
    support_request, tracking_link, ContactForm, SupportRequest,
};
use azfc_orders::{apply_transition, record_capture, CheckoutForm, Order, OrderStatus};
use azfc_schemas::PaymentCapture;
use chrono::Utc;

fn order() -> Order {
    let form: CheckoutForm = serde_json::from_value(serde_json::json!({
        "service_plan": "prep",
        "company_name": "<script>alert(1)</script> Films",
        "contact_name": "O'Neil",
        "contact_email": "oneil@example.com",
        "project_title": "Dust & Glory"
    }))
    .unwrap();
    form.into_order("AZFC-260101-A1B2C3".into(), Utc::now()).unwrap()
}

#[test]
fn admin_email_escapes_customer_text_and_sets_reply_to() {
    let e = admin_new_order("ops@site.test", &order());
    assert_eq!(e.to, "ops@site.test");
    assert_eq!(e.subject, "New AZ Film Credit Order: AZFC-260101-A1B2C3");
    assert_eq!(e.reply_to.as_deref(), Some("oneil@example.com"));
    assert!(e.html.contains("&lt;script&gt;alert(1)&lt;/script&gt; Films"));
    assert!(!e.html.contains("<script>"));
    assert!(e.html.contains("Dust &amp; Glory"));
    assert!(e.html.contains("Document Prep ($79.00)"));
    assert!(e.html.contains("AWAITING_PAYMENT_APPROVAL"));
}

#[test]
fn customer_emails_go_to_contact_address() {
    let mut o = order();
    record_capture(&mut o, PaymentCapture::default(), Utc::now()).unwrap();
    let received = customer_order_received(&o, "https://site.test/");
    assert_eq!(received.to, "oneil@example.com");
    assert!(received.html.contains("O&#039;Neil"));
    assert!(received
        .html
        .contains("https://site.test/thank-you.html?tracking=AZFC-260101-A1B2C3"));

    apply_transition(&mut o, OrderStatus::SentToCpa, "Updated by admin", Utc::now()).unwrap();
    let update = status_update(&o, "");
    assert_eq!(update.subject, "AZ Film Credit - Status Update (AZFC-260101-A1B2C3)");
    assert!(update.html.contains("Sent to CPA for review"));
    assert!(update
        .html
        .contains("href=\"/thank-you.html?tracking=AZFC-260101-A1B2C3\""));
}

#[test]
fn packet_email_links_signed_url() {
    let e = packet_ready(&order(), "https://cdn.test/p.pdf?token=a&b=c", 7);
    assert!(e.html.contains("href=\"https://cdn.test/p.pdf?token=a&amp;b=c\""));
    assert!(e.html.contains("link expires in 7 days"));
}

#[test]
fn tracking_link_encodes_query_value() {
    assert_eq!(
        tracking_link("https://site.test", "a b&c"),
        "https://site.test/thank-you.html?tracking=a+b%26c"
    );
}

#[test]
fn support_messages() {
    let form = ContactForm {
        name: Some(" Ana ".into()),
        email: Some("ana@example.com".into()),
        project: Some("Saguaro".into()),
        topic: None,
        message: Some("<b>help</b>".into()),
        user_agent: Some("Mozilla/5.0".into()),
    };
    let req = SupportRequest::from_form(&form).unwrap();

    let inbox = support_request("support@site.test", &req);
    assert_eq!(inbox.to, "support@site.test");
    assert_eq!(inbox.subject, "AZFC Support - Request (Saguaro)");
    assert_eq!(inbox.reply_to.as_deref(), Some("ana@example.com"));
    assert!(inbox.html.contains("&lt;b&gt;help&lt;/b&gt;"));
    assert!(inbox.html.contains("<b>Topic:</b> &mdash;"));
    assert!(inbox.html.contains("Mozilla/5.0"));

    let confirm = support_confirmation(&req);
    assert_eq!(confirm.to, "ana@example.com");
    assert!(confirm.html.contains("Hi Ana,"));
    assert_eq!(confirm.reply_to, None);
}
