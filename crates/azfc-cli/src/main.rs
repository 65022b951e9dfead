//! `azfc`: operator commands for the order-intake service.
//!
//! Everything prints `key=value` lines so output can be grepped in scripts.

use anyhow::{bail, Context, Result};
use azfc_ledger::{compute_totals, parse_ledger};
use azfc_orders::{generate_tracking_number, record_capture, CheckoutForm, Order};
use azfc_schemas::{format_cents, format_rate_bps, CalcTotals, PaymentCapture};
use azfc_store::{LedgerStore, OrderStore};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "azfc")]
#[command(about = "AZ Film Credit operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands (Postgres backend)
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> environment -> local)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Ledger CSV utilities
    Ledger {
        #[command(subcommand)]
        cmd: LedgerCmd,
    },

    /// CPA packet utilities
    Packet {
        #[command(subcommand)]
        cmd: PacketCmd,
    },

    /// Tracking number utilities
    Tracking {
        #[command(subcommand)]
        cmd: TrackingCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply embedded SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum LedgerCmd {
    /// Parse a ledger CSV exactly as ingest would and print the credit totals.
    Check {
        #[arg(long)]
        csv: String,

        /// Credit rate in basis points
        #[arg(long, default_value_t = azfc_ledger::DEFAULT_CREDIT_RATE_BPS)]
        rate_bps: i64,
    },
}

#[derive(Subcommand)]
enum PacketCmd {
    /// Render a packet PDF for a stored order (Postgres), or for a
    /// placeholder paid order with --sample.
    Render {
        #[arg(long)]
        tracking: String,

        /// Output PDF path
        #[arg(long)]
        out: String,

        /// Use a placeholder order instead of reading the database
        #[arg(long, default_value_t = false)]
        sample: bool,

        /// Ledger CSV whose totals go into the packet (overrides stored totals)
        #[arg(long)]
        ledger: Option<String>,
    },
}

#[derive(Subcommand)]
enum TrackingCmd {
    /// Print a fresh tracking number (not checked against any store).
    New,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev convenience; silent when the file is absent.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let url = database_url()?;
            let pool = azfc_store::connect(&url).await?;
            match cmd {
                DbCmd::Status => {
                    let s = azfc_store::status(&pool).await?;
                    println!("db_ok={} has_orders_table={}", s.ok, s.has_orders_table);
                }
                DbCmd::Migrate => {
                    azfc_store::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = azfc_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Ledger { cmd } => match cmd {
            LedgerCmd::Check { csv, rate_bps } => {
                if !(0..=10_000).contains(&rate_bps) {
                    bail!("--rate-bps must be between 0 and 10000, got {rate_bps}");
                }
                let totals = ledger_totals(&csv, Uuid::nil(), rate_bps, true)?;
                print_totals(&totals);
            }
        },

        Commands::Packet { cmd } => match cmd {
            PacketCmd::Render {
                tracking,
                out,
                sample,
                ledger,
            } => {
                let (order, stored_totals) = if sample {
                    (sample_order(&tracking)?, None)
                } else {
                    let pool = azfc_store::connect(&database_url()?).await?;
                    let store = azfc_store::PgStore::new(pool);
                    let order = store
                        .get_order(&tracking)
                        .await?
                        .with_context(|| format!("order not found: {tracking}"))?;
                    let totals = store.get_totals(order.id).await?;
                    (order, totals)
                };
                let totals = match ledger {
                    Some(p) => Some(ledger_totals(
                        &p,
                        order.id,
                        azfc_ledger::DEFAULT_CREDIT_RATE_BPS,
                        false,
                    )?),
                    None => stored_totals,
                };
                let pdf = azfc_packet::render_packet_pdf(&order, totals.as_ref(), Utc::now())?;
                fs::write(&out, &pdf).with_context(|| format!("failed to write {out}"))?;
                println!("packet_written=true path={} bytes={}", out, pdf.len());
            }
        },

        Commands::Tracking { cmd } => match cmd {
            TrackingCmd::New => {
                println!("tracking_number={}", generate_tracking_number(Utc::now()));
            }
        },
    }

    Ok(())
}

fn database_url() -> Result<String> {
    [azfc_store::ENV_DB_URL, "DATABASE_URL"]
        .iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
        .with_context(|| format!("{} (or DATABASE_URL) is not set", azfc_store::ENV_DB_URL))
}

fn ledger_totals(path: &str, order_id: Uuid, rate_bps: i64, report: bool) -> Result<CalcTotals> {
    let bytes = fs::read(path).with_context(|| format!("failed to read ledger: {path}"))?;
    let parsed = parse_ledger(&bytes, order_id, Uuid::nil())?;
    if report {
        println!("rows_read={}", parsed.report.rows_read);
        println!("imported={}", parsed.report.imported);
        println!("skipped={}", parsed.report.skipped_zero_or_invalid);
    }
    Ok(compute_totals(order_id, &parsed.transactions, rate_bps, Utc::now()))
}

fn print_totals(t: &CalcTotals) {
    println!("qualified={}", format_cents(t.qualified_costs_cents));
    println!("nonqualified={}", format_cents(t.nonqualified_costs_cents));
    println!("credit_rate={}", format_rate_bps(t.credit_rate_bps));
    println!("credit={}", format_cents(t.credit_computed_cents));
}

/// A paid order with placeholder customer details.
fn sample_order(tracking: &str) -> Result<Order> {
    let form: CheckoutForm = serde_json::from_value(serde_json::json!({
        "service_plan": "prep_cpa",
        "company_name": "Sample Productions LLC",
        "contact_name": "Sample Contact",
        "contact_email": "sample@example.com",
        "project_title": "Sample Feature",
    }))?;
    let now = Utc::now();
    let mut order = form.into_order(tracking.to_string(), now)?;
    record_capture(&mut order, PaymentCapture::default(), now)?;
    Ok(order)
}
