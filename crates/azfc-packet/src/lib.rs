//! azfc-packet
//!
//! Single-page CPA packet PDF: a bold title followed by order and totals
//! lines on a US-letter page. The layout is intentionally plain; the packet
//! is a review artefact, not the filed return.

use anyhow::{Context, Result};
use azfc_orders::{plan_name, StatusRules};
use azfc_schemas::{format_cents, format_rate_bps, CalcTotals, Order};
use chrono::{DateTime, SecondsFormat, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// `packet_type` recorded alongside every generated packet.
pub const PACKET_TYPE: &str = "cpa_packet_pdf";

pub const PAGE_WIDTH: i64 = 612;
pub const PAGE_HEIGHT: i64 = 792;

const MARGIN: i64 = 50;
const TITLE_Y: i64 = 760;
const TITLE_SIZE: i64 = 16;
const BODY_SIZE: i64 = 11;
const LINE_STEP: i64 = 16;
/// No body line is drawn below this baseline.
const BOTTOM_MARGIN: i64 = 80;

pub const TITLE: &str = "AZ Film Credit - CPA Packet";

/// Object path inside the packets bucket.
pub fn packet_path(tracking: &str) -> String {
    format!("{tracking}/AZFC_CPA_Packet_{tracking}.pdf")
}

/// Body lines in drawing order.
pub fn packet_lines(order: &Order, totals: Option<&CalcTotals>, generated_at: DateTime<Utc>) -> Vec<String> {
    let c = &order.customer;
    let mut lines = vec![
        format!("Tracking #: {}", order.tracking_number),
        format!("Company: {}", c.company_name),
        format!("Contact: {} ({})", c.contact_name, c.contact_email),
        format!("Project: {}", order.project.project_title),
        format!("Plan: {} (${})", plan_name(order.plan), format_cents(order.amount_cents)),
        format!("Status: {}", order.status.label()),
        format!(
            "Generated: {}",
            generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        String::new(),
    ];
    match totals {
        Some(t) => lines.extend([
            format!("Qualified costs: ${}", format_cents(t.qualified_costs_cents)),
            format!("Non-qualified costs: ${}", format_cents(t.nonqualified_costs_cents)),
            format!("Credit rate: {}", format_rate_bps(t.credit_rate_bps)),
            format!("Credit computed: ${}", format_cents(t.credit_computed_cents)),
            format!("Claim this year: ${}", format_cents(t.claim_this_year_cents)),
            format!("Carryforward: ${}", format_cents(t.carryforward_cents)),
        ]),
        None => lines.push("No ledger has been imported for this order yet.".to_string()),
    }
    lines
}

/// Standard Type1 fonts only cover Latin-1; anything outside printable
/// ASCII is replaced.
fn pdf_text(s: &str) -> Object {
    let ascii: String = s
        .chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect();
    Object::string_literal(ascii)
}

fn text_op(font: &str, size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![pdf_text(text)]),
        Operation::new("ET", vec![]),
    ]
}

pub fn render_packet_pdf(
    order: &Order,
    totals: Option<&CalcTotals>,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let body_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let title_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => body_font,
            "F2" => title_font,
        },
    });

    let mut ops = text_op("F2", TITLE_SIZE, MARGIN, TITLE_Y, TITLE);
    let mut y = TITLE_Y - 28;
    for line in packet_lines(order, totals, generated_at) {
        if y < BOTTOM_MARGIN {
            break;
        }
        if !line.is_empty() {
            ops.extend(text_op("F1", BODY_SIZE, MARGIN, y, &line));
        }
        y -= LINE_STEP;
    }

    let content = Content { operations: ops };
    let encoded = content.encode().context("packet content encode failed")?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).context("packet pdf write failed")?;
    Ok(out)
}
