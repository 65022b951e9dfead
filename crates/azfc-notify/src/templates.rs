use azfc_clients::Email;
use azfc_orders::{plan_name, StatusRules};
use azfc_schemas::{format_cents, Order};

use crate::escape_html;
use crate::support::SupportRequest;

const WRAP_OPEN: &str = r#"<div style="font-family:Arial,sans-serif;line-height:1.45">"#;
const WRAP_CLOSE: &str = "</div>";
const DASH: &str = "&mdash;";

fn or_dash(s: &str) -> String {
    if s.is_empty() {
        DASH.to_string()
    } else {
        escape_html(s)
    }
}

/// Customer-facing status page for `tracking`. An empty `site_base_url`
/// yields a site-relative link.
pub fn tracking_link(site_base_url: &str, tracking: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(tracking.as_bytes()).collect();
    format!(
        "{}/thank-you.html?tracking={encoded}",
        site_base_url.trim_end_matches('/')
    )
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

pub fn admin_new_order(to: &str, order: &Order) -> Email {
    let t = escape_html(&order.tracking_number);
    let html = format!(
        "{WRAP_OPEN}\
<h2>New Order Received</h2>\
<p><b>Tracking:</b> {t}</p>\
<p><b>Company:</b> {company}</p>\
<p><b>Contact:</b> {contact} &lt;{email}&gt;</p>\
<p><b>Project:</b> {project}</p>\
<p><b>Plan:</b> {plan} (${amount})</p>\
<p>Status: <b>{status}</b></p>\
{WRAP_CLOSE}",
        company = escape_html(&order.customer.company_name),
        contact = escape_html(&order.customer.contact_name),
        email = escape_html(&order.customer.contact_email),
        project = escape_html(&order.project.project_title),
        plan = plan_name(order.plan),
        amount = format_cents(order.amount_cents),
        status = order.status,
    );
    Email {
        to: to.to_string(),
        subject: format!("New AZ Film Credit Order: {}", order.tracking_number),
        html,
        reply_to: Some(order.customer.contact_email.clone()).filter(|e| !e.is_empty()),
    }
}

/// Sent once payment is captured.
pub fn customer_order_received(order: &Order, site_base_url: &str) -> Email {
    let link = escape_html(&tracking_link(site_base_url, &order.tracking_number));
    let html = format!(
        "{WRAP_OPEN}\
<p>Hi {name},</p>\
<p>Thank you. Your payment was received and your order is now being prepared.</p>\
<p><b>Tracking #:</b> {t}<br/><b>Plan:</b> {plan} (${amount})<br/><b>Project:</b> {project}</p>\
<p>Check status here: <a href=\"{link}\">View status</a></p>\
{WRAP_CLOSE}",
        name = escape_html(&order.customer.contact_name),
        t = escape_html(&order.tracking_number),
        plan = plan_name(order.plan),
        amount = format_cents(order.amount_cents),
        project = escape_html(&order.project.project_title),
    );
    Email {
        to: order.customer.contact_email.clone(),
        subject: format!("AZ Film Credit - Order Received ({})", order.tracking_number),
        html,
        reply_to: None,
    }
}

pub fn status_update(order: &Order, site_base_url: &str) -> Email {
    let link = escape_html(&tracking_link(site_base_url, &order.tracking_number));
    let html = format!(
        "{WRAP_OPEN}\
<h2>Status updated</h2>\
<p><b>Tracking #:</b> {t}</p>\
<p><b>New status:</b> {label}</p>\
<p>Check status here: <a href=\"{link}\">View status</a></p>\
{WRAP_CLOSE}",
        t = escape_html(&order.tracking_number),
        label = order.status.label(),
    );
    Email {
        to: order.customer.contact_email.clone(),
        subject: format!("AZ Film Credit - Status Update ({})", order.tracking_number),
        html,
        reply_to: None,
    }
}

/// `link_days` is how long `signed_url` stays valid.
pub fn packet_ready(order: &Order, signed_url: &str, link_days: u64) -> Email {
    let html = format!(
        "{WRAP_OPEN}\
<h2>Your CPA Packet is ready</h2>\
<p><b>Tracking #:</b> {t}</p>\
<p>Download your packet here (link expires in {link_days} days):</p>\
<p><a href=\"{href}\">Download CPA Packet PDF</a></p>\
<hr/>\
<p style=\"color:#666;font-size:12px\">Packet preview. Full schedules and tax templates follow after CPA review.</p>\
{WRAP_CLOSE}",
        t = escape_html(&order.tracking_number),
        href = escape_html(signed_url),
    );
    Email {
        to: order.customer.contact_email.clone(),
        subject: format!(
            "AZ Film Credit - CPA Packet Generated ({})",
            order.tracking_number
        ),
        html,
        reply_to: None,
    }
}

// ---------------------------------------------------------------------------
// Support
// ---------------------------------------------------------------------------

/// Forwarded to the support inbox; replies go to the requester.
pub fn support_request(inbox: &str, req: &SupportRequest) -> Email {
    let topic = if req.topic.is_empty() { "Request" } else { &req.topic };
    let subject = if req.project.is_empty() {
        format!("AZFC Support - {topic}")
    } else {
        format!("AZFC Support - {topic} ({})", req.project)
    };
    let html = format!(
        "{WRAP_OPEN}\
<h2 style=\"margin:0 0 10px 0\">New Support Request</h2>\
<p style=\"margin:0 0 10px 0\"><b>Name:</b> {name}<br/><b>Email:</b> {email}<br/><b>Topic:</b> {topic}<br/><b>Project:</b> {project}</p>\
<hr style=\"border:none;border-top:1px solid #ddd;margin:12px 0\"/>\
<p style=\"white-space:pre-wrap;margin:0\">{message}</p>\
<hr style=\"border:none;border-top:1px solid #eee;margin:12px 0\"/>\
<p style=\"color:#666;font-size:12px;margin:0\">Sent from support.html &bull; {ua}</p>\
{WRAP_CLOSE}",
        name = escape_html(&req.name),
        email = escape_html(&req.email),
        topic = or_dash(&req.topic),
        project = or_dash(&req.project),
        message = escape_html(&req.message),
        ua = escape_html(&req.user_agent),
    );
    Email {
        to: inbox.to_string(),
        subject,
        html,
        reply_to: Some(req.email.clone()),
    }
}

pub fn support_confirmation(req: &SupportRequest) -> Email {
    let html = format!(
        "{WRAP_OPEN}\
<p>Hi {name},</p>\
<p>We received your support request and will reply as soon as possible.</p>\
<p style=\"color:#666;font-size:12px\">Topic: {topic}<br/>Project: {project}</p>\
<hr style=\"border:none;border-top:1px solid #eee;margin:12px 0\"/>\
<p style=\"white-space:pre-wrap;margin:0\">{message}</p>\
<p style=\"color:#666;font-size:12px;margin-top:12px\">AZ Film Credit Support</p>\
{WRAP_CLOSE}",
        name = escape_html(&req.name),
        topic = or_dash(&req.topic),
        project = or_dash(&req.project),
        message = escape_html(&req.message),
    );
    Email {
        to: req.email.clone(),
        subject: "AZ Film Credit - Support request received".to_string(),
        html,
        reply_to: None,
    }
}
