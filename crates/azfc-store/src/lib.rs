//! azfc-store
//!
//! Persistence for orders and ledger data behind two traits:
//!
//! - [`OrderStore`]: order documents keyed by tracking number.
//! - [`LedgerStore`]: uploads, ledger transactions, credit totals, packets.
//!
//! Three interchangeable backends implement both:
//!
//! | Backend                  | Use                                        |
//! |--------------------------|--------------------------------------------|
//! | `KvStore<MemoryKv>`      | tests, local dev; per-key TTL, process-local |
//! | `KvStore<RestKv>`        | REST Redis (Vercel KV / Upstash)           |
//! | [`PgStore`]              | Postgres via sqlx, embedded migrations     |
//!
//! [`open_store`] picks one from [`azfc_config::ServiceSettings`] and the
//! resolved secrets.

mod kv;
mod kv_store;
mod pg;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use azfc_config::secrets::ResolvedSecrets;
use azfc_config::{ServiceSettings, StoreBackend};
use azfc_schemas::{CalcTotals, GeneratedPacket, LedgerTransaction, Order, ParseStatus, Upload};
use uuid::Uuid;

pub use kv::{KvBackend, MemoryKv, RestKv};
pub use kv_store::KvStore;
pub use pg::{connect, migrate, status, DbStatus, PgStore, ENV_DB_URL};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or replace the order stored under its tracking number.
    async fn put_order(&self, order: &Order) -> Result<()>;

    async fn get_order(&self, tracking: &str) -> Result<Option<Order>>;

    /// Newest first by `created_at`, at most `limit` orders.
    async fn list_orders(&self, limit: usize) -> Result<Vec<Order>>;

    /// Returns `true` when an order was removed.
    async fn delete_order(&self, tracking: &str) -> Result<bool>;

    async fn tracking_exists(&self, tracking: &str) -> Result<bool> {
        Ok(self.get_order(tracking).await?.is_some())
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_upload(&self, upload: &Upload) -> Result<()>;

    async fn get_upload(&self, id: Uuid) -> Result<Option<Upload>>;

    /// Errors when the upload does not exist.
    async fn set_upload_status(&self, id: Uuid, status: ParseStatus) -> Result<()>;

    /// Append one batch. Callers chunk large ledgers before calling.
    async fn insert_transactions(&self, txns: &[LedgerTransaction]) -> Result<()>;

    /// Drop every row imported from `upload_id`. Returns how many went.
    async fn delete_transactions_for_upload(&self, order_id: Uuid, upload_id: Uuid) -> Result<u64>;

    async fn transactions_for_order(&self, order_id: Uuid) -> Result<Vec<LedgerTransaction>>;

    async fn upsert_totals(&self, totals: &CalcTotals) -> Result<()>;

    async fn get_totals(&self, order_id: Uuid) -> Result<Option<CalcTotals>>;

    async fn record_packet(&self, packet: &GeneratedPacket) -> Result<()>;

    async fn latest_packet(&self, tracking: &str) -> Result<Option<GeneratedPacket>>;
}

/// Both halves of persistence in one object.
pub trait Store: OrderStore + LedgerStore {}

impl<T: OrderStore + LedgerStore> Store for T {}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Which backend [`open_store`] picked. Logged at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenedBackend {
    Memory,
    RestKv,
    Postgres,
}

impl OpenedBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenedBackend::Memory => "memory",
            OpenedBackend::RestKv => "kv",
            OpenedBackend::Postgres => "postgres",
        }
    }
}

/// Resolve `auto` against the credentials that are actually present:
/// Postgres when a database URL resolved, else REST KV, else memory.
pub fn select_backend(requested: StoreBackend, secrets: &ResolvedSecrets) -> Result<OpenedBackend> {
    Ok(match requested {
        StoreBackend::Memory => OpenedBackend::Memory,
        StoreBackend::Kv => {
            if secrets.kv.is_none() {
                bail!("store backend 'kv' requires KV_REST_API_URL/KV_REST_API_TOKEN (or the UPSTASH_REDIS_REST_* pair)");
            }
            OpenedBackend::RestKv
        }
        StoreBackend::Postgres => {
            if secrets.database_url.is_none() {
                bail!("store backend 'postgres' requires {ENV_DB_URL} (or DATABASE_URL)");
            }
            OpenedBackend::Postgres
        }
        StoreBackend::Auto => {
            if secrets.database_url.is_some() {
                OpenedBackend::Postgres
            } else if secrets.kv.is_some() {
                OpenedBackend::RestKv
            } else {
                OpenedBackend::Memory
            }
        }
    })
}

/// Open the configured store. Postgres is migrated before use.
pub async fn open_store(
    settings: &ServiceSettings,
    secrets: &ResolvedSecrets,
) -> Result<(Arc<dyn Store>, OpenedBackend)> {
    let backend = select_backend(settings.store_backend, secrets)?;
    let ttl = Some(Duration::from_secs(settings.order_ttl_secs));

    let store: Arc<dyn Store> = match (backend, &secrets.kv, &secrets.database_url) {
        (OpenedBackend::Postgres, _, Some(url)) => {
            let pool = connect(url).await?;
            migrate(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        (OpenedBackend::RestKv, Some(kv), _) => {
            Arc::new(KvStore::new(RestKv::new(&kv.url, &kv.token)?, ttl))
        }
        _ => Arc::new(KvStore::new(MemoryKv::new(), ttl)),
    };

    tracing::info!(backend = backend.as_str(), "store opened");
    Ok((store, backend))
}
