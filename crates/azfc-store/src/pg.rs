//! Postgres backend (sqlx) with embedded migrations.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use azfc_schemas::{
    CalcTotals, Customer, Exports, GeneratedPacket, LedgerTransaction, Order, OrderStatus,
    ParseStatus, PaymentCapture, Plan, Project, TimelineEntry, Upload,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::{LedgerStore, OrderStore};

pub const ENV_DB_URL: &str = "AZFC_DATABASE_URL";

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_orders_table: exists,
    })
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const ORDER_COLUMNS: &str = r#"
    id, tracking_number, paypal_order_id, status, plan, amount_cents, currency,
    company_name, contact_name, contact_email, contact_phone,
    project, exports, paypal_capture, admin_notes, assigned_to, packet_path,
    timeline, created_at, updated_at
"#;

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let plan: String = row.try_get("plan")?;
    Ok(Order {
        id: row.try_get("id")?,
        tracking_number: row.try_get("tracking_number")?,
        paypal_order_id: row.try_get("paypal_order_id")?,
        status: OrderStatus::parse(&status)
            .ok_or_else(|| anyhow!("invalid order status in db: {status}"))?,
        plan: Plan::parse(&plan).ok_or_else(|| anyhow!("invalid plan in db: {plan}"))?,
        amount_cents: row.try_get("amount_cents")?,
        currency: row.try_get("currency")?,
        customer: Customer {
            company_name: row.try_get("company_name")?,
            contact_name: row.try_get("contact_name")?,
            contact_email: row.try_get("contact_email")?,
            contact_phone: row.try_get("contact_phone")?,
        },
        project: row.try_get::<Json<Project>, _>("project")?.0,
        exports: row
            .try_get::<Option<Json<Exports>>, _>("exports")?
            .map(|j| j.0),
        paypal_capture: row
            .try_get::<Option<Json<PaymentCapture>>, _>("paypal_capture")?
            .map(|j| j.0),
        admin_notes: row.try_get("admin_notes")?,
        assigned_to: row.try_get("assigned_to")?,
        packet_path: row.try_get("packet_path")?,
        timeline: row.try_get::<Json<Vec<TimelineEntry>>, _>("timeline")?.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn upload_from_row(row: &PgRow) -> Result<Upload> {
    let status: String = row.try_get("parse_status")?;
    Ok(Upload {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        kind: row.try_get("kind")?,
        bucket: row.try_get("bucket")?,
        path: row.try_get("path")?,
        original_name: row.try_get("original_name")?,
        mime: row.try_get("mime")?,
        size: row.try_get("size")?,
        parse_status: ParseStatus::parse(&status)
            .ok_or_else(|| anyhow!("invalid parse_status in db: {status}"))?,
        created_at: row.try_get("created_at")?,
    })
}

fn txn_from_row(row: &PgRow) -> Result<LedgerTransaction> {
    Ok(LedgerTransaction {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        source_upload_id: row.try_get("source_upload_id")?,
        txn_date: row.try_get("txn_date")?,
        vendor_name: row.try_get("vendor_name")?,
        vendor_address: row.try_get("vendor_address")?,
        vendor_city: row.try_get("vendor_city")?,
        vendor_state: row.try_get("vendor_state")?,
        vendor_zip: row.try_get("vendor_zip")?,
        invoice_number: row.try_get("invoice_number")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        department: row.try_get("department")?,
        cost_type: row.try_get("cost_type")?,
        episode: row.try_get("episode")?,
        payment_method: row.try_get("payment_method")?,
        amount_cents: row.try_get("amount_cents")?,
        currency: row.try_get("currency")?,
        az_work_performed: row.try_get("az_work_performed")?,
        az_vendor: row.try_get("az_vendor")?,
        qualified_flag: row.try_get("qualified_flag")?,
        nonqualified_reason: row.try_get("nonqualified_reason")?,
        receipt_filename: row.try_get("receipt_filename")?,
        contract_filename: row.try_get("contract_filename")?,
        location_agreement_filename: row.try_get("location_agreement_filename")?,
        notes: row.try_get("notes")?,
    })
}

fn totals_from_row(row: &PgRow) -> Result<CalcTotals> {
    Ok(CalcTotals {
        order_id: row.try_get("order_id")?,
        qualified_costs_cents: row.try_get("qualified_costs_cents")?,
        nonqualified_costs_cents: row.try_get("nonqualified_costs_cents")?,
        credit_rate_bps: row.try_get("credit_rate_bps")?,
        credit_computed_cents: row.try_get("credit_computed_cents")?,
        claim_this_year_cents: row.try_get("claim_this_year_cents")?,
        carryforward_cents: row.try_get("carryforward_cents")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl OrderStore for PgStore {
    async fn put_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            insert into orders (
              id, tracking_number, paypal_order_id, status, plan, amount_cents, currency,
              company_name, contact_name, contact_email, contact_phone,
              project, exports, paypal_capture, admin_notes, assigned_to, packet_path,
              timeline, created_at, updated_at
            ) values (
              $1, $2, $3, $4, $5, $6, $7,
              $8, $9, $10, $11,
              $12, $13, $14, $15, $16, $17,
              $18, $19, $20
            )
            on conflict (tracking_number) do update set
              paypal_order_id = excluded.paypal_order_id,
              status          = excluded.status,
              plan            = excluded.plan,
              amount_cents    = excluded.amount_cents,
              currency        = excluded.currency,
              company_name    = excluded.company_name,
              contact_name    = excluded.contact_name,
              contact_email   = excluded.contact_email,
              contact_phone   = excluded.contact_phone,
              project         = excluded.project,
              exports         = excluded.exports,
              paypal_capture  = excluded.paypal_capture,
              admin_notes     = excluded.admin_notes,
              assigned_to     = excluded.assigned_to,
              packet_path     = excluded.packet_path,
              timeline        = excluded.timeline,
              updated_at      = excluded.updated_at
            "#,
        )
        .bind(order.id)
        .bind(&order.tracking_number)
        .bind(&order.paypal_order_id)
        .bind(order.status.as_str())
        .bind(order.plan.as_str())
        .bind(order.amount_cents)
        .bind(&order.currency)
        .bind(&order.customer.company_name)
        .bind(&order.customer.contact_name)
        .bind(&order.customer.contact_email)
        .bind(&order.customer.contact_phone)
        .bind(Json(&order.project))
        .bind(order.exports.as_ref().map(Json))
        .bind(order.paypal_capture.as_ref().map(Json))
        .bind(&order.admin_notes)
        .bind(&order.assigned_to)
        .bind(&order.packet_path)
        .bind(Json(&order.timeline))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .context("put_order failed")?;
        Ok(())
    }

    async fn get_order(&self, tracking: &str) -> Result<Option<Order>> {
        let sql = format!("select {ORDER_COLUMNS} from orders where tracking_number = $1");
        let row = sqlx::query(&sql)
            .bind(tracking)
            .fetch_optional(&self.pool)
            .await
            .context("get_order failed")?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list_orders(&self, limit: usize) -> Result<Vec<Order>> {
        let sql = format!("select {ORDER_COLUMNS} from orders order by created_at desc limit $1");
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .context("list_orders failed")?;
        rows.iter().map(order_from_row).collect()
    }

    async fn delete_order(&self, tracking: &str) -> Result<bool> {
        let res = sqlx::query("delete from orders where tracking_number = $1")
            .bind(tracking)
            .execute(&self.pool)
            .await
            .context("delete_order failed")?;
        Ok(res.rows_affected() > 0)
    }

    async fn tracking_exists(&self, tracking: &str) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
            "select exists (select 1 from orders where tracking_number = $1)",
        )
        .bind(tracking)
        .fetch_one(&self.pool)
        .await
        .context("tracking_exists failed")?;
        Ok(exists)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn insert_upload(&self, upload: &Upload) -> Result<()> {
        sqlx::query(
            r#"
            insert into uploads (
              id, order_id, kind, bucket, path, original_name, mime, size, parse_status, created_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(upload.id)
        .bind(upload.order_id)
        .bind(&upload.kind)
        .bind(&upload.bucket)
        .bind(&upload.path)
        .bind(&upload.original_name)
        .bind(&upload.mime)
        .bind(upload.size)
        .bind(upload.parse_status.as_str())
        .bind(upload.created_at)
        .execute(&self.pool)
        .await
        .context("insert_upload failed")?;
        Ok(())
    }

    async fn get_upload(&self, id: Uuid) -> Result<Option<Upload>> {
        let row = sqlx::query(
            r#"
            select id, order_id, kind, bucket, path, original_name, mime, size, parse_status, created_at
            from uploads where id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("get_upload failed")?;
        row.as_ref().map(upload_from_row).transpose()
    }

    async fn set_upload_status(&self, id: Uuid, status: ParseStatus) -> Result<()> {
        let res = sqlx::query("update uploads set parse_status = $2 where id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .context("set_upload_status failed")?;
        if res.rows_affected() == 0 {
            return Err(anyhow!("upload {id} not found"));
        }
        Ok(())
    }

    async fn insert_transactions(&self, txns: &[LedgerTransaction]) -> Result<()> {
        if txns.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            insert into transactions (
              id, order_id, source_upload_id,
              txn_date, vendor_name, vendor_address, vendor_city, vendor_state, vendor_zip,
              invoice_number, description,
              category, department, cost_type, episode,
              payment_method, amount_cents, currency,
              az_work_performed, az_vendor, qualified_flag, nonqualified_reason,
              receipt_filename, contract_filename, location_agreement_filename, notes
            )
            "#,
        );
        qb.push_values(txns, |mut b, t| {
            b.push_bind(t.id)
                .push_bind(t.order_id)
                .push_bind(t.source_upload_id)
                .push_bind(&t.txn_date)
                .push_bind(&t.vendor_name)
                .push_bind(&t.vendor_address)
                .push_bind(&t.vendor_city)
                .push_bind(&t.vendor_state)
                .push_bind(&t.vendor_zip)
                .push_bind(&t.invoice_number)
                .push_bind(&t.description)
                .push_bind(&t.category)
                .push_bind(&t.department)
                .push_bind(&t.cost_type)
                .push_bind(&t.episode)
                .push_bind(&t.payment_method)
                .push_bind(t.amount_cents)
                .push_bind(&t.currency)
                .push_bind(t.az_work_performed)
                .push_bind(t.az_vendor)
                .push_bind(t.qualified_flag)
                .push_bind(&t.nonqualified_reason)
                .push_bind(&t.receipt_filename)
                .push_bind(&t.contract_filename)
                .push_bind(&t.location_agreement_filename)
                .push_bind(&t.notes);
        });
        qb.build()
            .execute(&self.pool)
            .await
            .context("insert_transactions failed")?;
        Ok(())
    }

    async fn delete_transactions_for_upload(&self, order_id: Uuid, upload_id: Uuid) -> Result<u64> {
        let res = sqlx::query("delete from transactions where order_id = $1 and source_upload_id = $2")
            .bind(order_id)
            .bind(upload_id)
            .execute(&self.pool)
            .await
            .context("delete_transactions_for_upload failed")?;
        Ok(res.rows_affected())
    }

    async fn transactions_for_order(&self, order_id: Uuid) -> Result<Vec<LedgerTransaction>> {
        let rows = sqlx::query(
            r#"
            select * from transactions
            where order_id = $1
            order by inserted_at asc, id asc
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .context("transactions_for_order failed")?;
        rows.iter().map(txn_from_row).collect()
    }

    async fn upsert_totals(&self, totals: &CalcTotals) -> Result<()> {
        sqlx::query(
            r#"
            insert into calc_totals (
              order_id, qualified_costs_cents, nonqualified_costs_cents, credit_rate_bps,
              credit_computed_cents, claim_this_year_cents, carryforward_cents, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8)
            on conflict (order_id) do update set
              qualified_costs_cents    = excluded.qualified_costs_cents,
              nonqualified_costs_cents = excluded.nonqualified_costs_cents,
              credit_rate_bps          = excluded.credit_rate_bps,
              credit_computed_cents    = excluded.credit_computed_cents,
              claim_this_year_cents    = excluded.claim_this_year_cents,
              carryforward_cents       = excluded.carryforward_cents,
              updated_at               = excluded.updated_at
            "#,
        )
        .bind(totals.order_id)
        .bind(totals.qualified_costs_cents)
        .bind(totals.nonqualified_costs_cents)
        .bind(totals.credit_rate_bps)
        .bind(totals.credit_computed_cents)
        .bind(totals.claim_this_year_cents)
        .bind(totals.carryforward_cents)
        .bind(totals.updated_at)
        .execute(&self.pool)
        .await
        .context("upsert_totals failed")?;
        Ok(())
    }

    async fn get_totals(&self, order_id: Uuid) -> Result<Option<CalcTotals>> {
        let row = sqlx::query("select * from calc_totals where order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .context("get_totals failed")?;
        row.as_ref().map(totals_from_row).transpose()
    }

    async fn record_packet(&self, packet: &GeneratedPacket) -> Result<()> {
        sqlx::query(
            r#"
            insert into generated_packets (tracking_number, packet_path, packet_type, created_at)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(&packet.tracking_number)
        .bind(&packet.packet_path)
        .bind(&packet.packet_type)
        .bind(packet.created_at)
        .execute(&self.pool)
        .await
        .context("record_packet failed")?;
        Ok(())
    }

    async fn latest_packet(&self, tracking: &str) -> Result<Option<GeneratedPacket>> {
        let row = sqlx::query(
            r#"
            select tracking_number, packet_path, packet_type, created_at
            from generated_packets
            where tracking_number = $1
            order by created_at desc, id desc
            limit 1
            "#,
        )
        .bind(tracking)
        .fetch_optional(&self.pool)
        .await
        .context("latest_packet failed")?;
        match row {
            None => Ok(None),
            Some(r) => Ok(Some(GeneratedPacket {
                tracking_number: r.try_get("tracking_number")?,
                packet_path: r.try_get("packet_path")?,
                packet_type: r.try_get("packet_type")?,
                created_at: r.try_get("created_at")?,
            })),
        }
    }
}
