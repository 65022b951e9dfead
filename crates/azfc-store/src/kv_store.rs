//! [`OrderStore`] + [`LedgerStore`] over any [`KvBackend`], as JSON documents.
//!
//! Key layout:
//!
//! | Key                  | Kind   | Value                                |
//! |----------------------|--------|--------------------------------------|
//! | `order:<tracking>`   | string | `Order` JSON (TTL)                   |
//! | `orders:all`         | list   | tracking numbers, newest pushed first |
//! | `upload:<id>`        | string | `Upload` JSON (TTL)                  |
//! | `txns:<order_id>`    | list   | `LedgerTransaction` JSON, append order |
//! | `totals:<order_id>`  | string | `CalcTotals` JSON (TTL)              |
//! | `packet:<tracking>`  | list   | `GeneratedPacket` JSON, append order |

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use azfc_schemas::{CalcTotals, GeneratedPacket, LedgerTransaction, Order, ParseStatus, Upload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::kv::KvBackend;
use crate::{LedgerStore, OrderStore};

const ORDER_INDEX: &str = "orders:all";

fn order_key(tracking: &str) -> String {
    format!("order:{tracking}")
}

fn upload_key(id: Uuid) -> String {
    format!("upload:{id}")
}

fn txns_key(order_id: Uuid) -> String {
    format!("txns:{order_id}")
}

fn totals_key(order_id: Uuid) -> String {
    format!("totals:{order_id}")
}

fn packet_key(tracking: &str) -> String {
    format!("packet:{tracking}")
}

pub struct KvStore<B> {
    kv: B,
    ttl: Option<Duration>,
}

impl<B: KvBackend> KvStore<B> {
    /// `ttl` applies to every string document written by this store.
    pub fn new(kv: B, ttl: Option<Duration>) -> Self {
        Self { kv, ttl }
    }

    pub fn backend(&self) -> &B {
        &self.kv
    }

    async fn put_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).with_context(|| format!("encode {key}"))?;
        self.kv.set(key, &raw, self.ttl).await
    }

    /// Undecodable documents read as absent and are logged.
    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                tracing::warn!(key, error = %e, "kv document failed to decode; treating as absent");
                Ok(None)
            }
        }
    }

    async fn list_json<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let raw = self.kv.lrange(key, 0, -1).await?;
        let mut out = Vec::with_capacity(raw.len());
        for item in raw {
            match serde_json::from_str(&item) {
                Ok(v) => out.push(v),
                Err(e) => tracing::warn!(key, error = %e, "kv list item failed to decode; skipped"),
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl<B: KvBackend> OrderStore for KvStore<B> {
    async fn put_order(&self, order: &Order) -> Result<()> {
        let key = order_key(&order.tracking_number);
        let is_new = self.kv.get(&key).await?.is_none();
        self.put_json(&key, order).await?;
        if is_new {
            self.kv.lpush(ORDER_INDEX, &order.tracking_number).await?;
        }
        Ok(())
    }

    async fn get_order(&self, tracking: &str) -> Result<Option<Order>> {
        self.get_json(&order_key(tracking)).await
    }

    async fn list_orders(&self, limit: usize) -> Result<Vec<Order>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = i64::try_from(limit).unwrap_or(i64::MAX).saturating_sub(1);
        let ids = self.kv.lrange(ORDER_INDEX, 0, stop).await?;
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            // Index entries outlive expired documents.
            if let Some(o) = self.get_order(&id).await? {
                orders.push(o);
            }
        }
        orders.sort_by(|a: &Order, b: &Order| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn delete_order(&self, tracking: &str) -> Result<bool> {
        let removed = self.kv.del(&order_key(tracking)).await?;
        self.kv.lrem(ORDER_INDEX, tracking).await?;
        Ok(removed)
    }
}

#[async_trait]
impl<B: KvBackend> LedgerStore for KvStore<B> {
    async fn insert_upload(&self, upload: &Upload) -> Result<()> {
        self.put_json(&upload_key(upload.id), upload).await
    }

    async fn get_upload(&self, id: Uuid) -> Result<Option<Upload>> {
        self.get_json(&upload_key(id)).await
    }

    async fn set_upload_status(&self, id: Uuid, status: ParseStatus) -> Result<()> {
        let mut upload: Upload = self
            .get_upload(id)
            .await?
            .with_context(|| format!("upload {id} not found"))?;
        upload.parse_status = status;
        self.insert_upload(&upload).await
    }

    async fn insert_transactions(&self, txns: &[LedgerTransaction]) -> Result<()> {
        let mut by_order: BTreeMap<Uuid, Vec<String>> = BTreeMap::new();
        for t in txns {
            let raw = serde_json::to_string(t).context("encode ledger transaction")?;
            by_order.entry(t.order_id).or_default().push(raw);
        }
        for (order_id, encoded) in by_order {
            self.kv.rpush(&txns_key(order_id), &encoded).await?;
        }
        Ok(())
    }

    async fn delete_transactions_for_upload(&self, order_id: Uuid, upload_id: Uuid) -> Result<u64> {
        let key = txns_key(order_id);
        let mut removed = 0;
        for raw in self.kv.lrange(&key, 0, -1).await? {
            let t: LedgerTransaction =
                serde_json::from_str(&raw).with_context(|| format!("decode entry of {key}"))?;
            if t.source_upload_id == upload_id {
                self.kv.lrem(&key, &raw).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn transactions_for_order(&self, order_id: Uuid) -> Result<Vec<LedgerTransaction>> {
        self.list_json(&txns_key(order_id)).await
    }

    async fn upsert_totals(&self, totals: &CalcTotals) -> Result<()> {
        self.put_json(&totals_key(totals.order_id), totals).await
    }

    async fn get_totals(&self, order_id: Uuid) -> Result<Option<CalcTotals>> {
        self.get_json(&totals_key(order_id)).await
    }

    async fn record_packet(&self, packet: &GeneratedPacket) -> Result<()> {
        let raw = serde_json::to_string(packet).context("encode packet record")?;
        self.kv.rpush(&packet_key(&packet.tracking_number), &[raw]).await
    }

    async fn latest_packet(&self, tracking: &str) -> Result<Option<GeneratedPacket>> {
        Ok(self.list_json(&packet_key(tracking)).await?.pop())
    }
}
