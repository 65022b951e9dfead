//! Signed upload URLs and ledger ingest into credit totals.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use azfc_config::ServiceSettings;
use azfc_schemas::{CalcTotals, GeneratedPacket, LedgerTransaction, Order, ParseStatus, Upload};
use azfc_store::{KvStore, LedgerStore, MemoryKv, OrderStore, Store};
use common::Harness;
use serde_json::{json, Value};
use uuid::Uuid;

const TRACKING: &str = "AZFC-260301-0A1B2C";

const LEDGER: &str = "txn_date,vendor_name,description,amount,qualified_flag\r\n\
2026-01-04,Saguaro Grip,Grip truck,\"$10,000.00\",yes\r\n\
2026-01-05,LA Post,Color grade,2000,no\r\n\
2026-01-06,Zero Co,Voided,0,\r\n";

/// Ask for an upload URL, then play the browser's PUT into storage.
async fn upload(h: &Harness, filename: &str, bytes: &[u8]) -> Value {
    let (status, json) = h
        .post(
            "/api/uploads/signed-url",
            json!({
                "trackingNumber": TRACKING,
                "type": "ledger",
                "filename": filename,
                "mime": "text/csv",
                "size": bytes.len()
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    h.storage.put(
        json["bucket"].as_str().unwrap(),
        json["path"].as_str().unwrap(),
        bytes,
        "text/csv",
    );
    json
}

async fn ingest(h: &Harness, upload_id: &str) -> (StatusCode, Value) {
    h.post(
        "/api/ingest-ledger",
        json!({"trackingNumber": TRACKING, "uploadId": upload_id}),
    )
    .await
}

#[tokio::test]
async fn signed_url_registers_upload_under_sanitized_path() {
    let h = Harness::new();
    let order = h.seed_order(TRACKING, true).await;

    let json = upload(&h, "Q1 costs (final).csv", LEDGER.as_bytes()).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["bucket"], "azfc-uploads");
    assert_eq!(json["token"], "upload-token-000001");

    let path = json["path"].as_str().unwrap();
    assert!(path.starts_with(&format!("{TRACKING}/ledger/")), "{path}");
    assert!(path.ends_with("_Q1_costs__final_.csv"), "{path}");
    assert!(json["signedUrl"].as_str().unwrap().contains("upload-token-000001"));

    let id = Uuid::parse_str(json["uploadId"].as_str().unwrap()).unwrap();
    let stored = h.store.get_upload(id).await.unwrap().unwrap();
    assert_eq!(stored.order_id, order.id);
    assert_eq!(stored.original_name, "Q1 costs (final).csv");
    assert_eq!(stored.size, Some(LEDGER.len() as i64));
    assert_eq!(stored.parse_status, ParseStatus::Received);
}

#[tokio::test]
async fn signed_url_validates_request() {
    let h = Harness::new();
    let (status, json) = h
        .post("/api/uploads/signed-url", json!({"trackingNumber": TRACKING}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Missing trackingNumber/type/filename");

    let (status, _) = h
        .post(
            "/api/uploads/signed-url",
            json!({"trackingNumber": TRACKING, "type": "ledger", "filename": "a.csv"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ingest_imports_rows_and_computes_credit() {
    let h = Harness::new();
    let order = h.seed_order(TRACKING, true).await;
    let up = upload(&h, "ledger.csv", LEDGER.as_bytes()).await;
    let upload_id = up["uploadId"].as_str().unwrap();

    let (status, json) = ingest(&h, upload_id).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["imported"], 2);
    assert_eq!(json["skipped"], 1);
    assert_eq!(json["report"]["rows_read"], 3);
    assert_eq!(json["totals"]["qualified_costs_cents"], 1_000_000);
    assert_eq!(json["totals"]["nonqualified_costs_cents"], 200_000);
    assert_eq!(json["totals"]["credit_rate_bps"], 1500);
    assert_eq!(json["totals"]["credit_computed_cents"], 150_000);
    assert_eq!(json["totals"]["claim_this_year_cents"], 150_000);
    assert_eq!(json["totals"]["carryforward_cents"], 0);

    let id = Uuid::parse_str(upload_id).unwrap();
    let stored = h.store.get_upload(id).await.unwrap().unwrap();
    assert_eq!(stored.parse_status, ParseStatus::Parsed);
    assert_eq!(h.store.transactions_for_order(order.id).await.unwrap().len(), 2);
    assert!(h.store.get_totals(order.id).await.unwrap().is_some());
}

#[tokio::test]
async fn totals_cover_every_ingested_upload() {
    let h = Harness::new();
    h.seed_order(TRACKING, true).await;
    let first = upload(&h, "jan.csv", LEDGER.as_bytes()).await;
    let second = upload(
        &h,
        "feb.csv",
        b"txn_date,vendor_name,description,amount\n2026-02-01,Desert Dolly,Dolly rental,500\n",
    )
    .await;

    ingest(&h, first["uploadId"].as_str().unwrap()).await;
    let (status, json) = ingest(&h, second["uploadId"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["imported"], 1);
    assert_eq!(json["totals"]["qualified_costs_cents"], 1_050_000);
    assert_eq!(json["totals"]["credit_computed_cents"], 157_500);
}

#[tokio::test]
async fn reingest_of_parsed_upload_is_conflict() {
    let h = Harness::new();
    h.seed_order(TRACKING, true).await;
    let up = upload(&h, "ledger.csv", LEDGER.as_bytes()).await;
    let upload_id = up["uploadId"].as_str().unwrap();

    assert_eq!(ingest(&h, upload_id).await.0, StatusCode::OK);
    let (status, _) = ingest(&h, upload_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn rejected_ledger_marks_upload_failed() {
    let h = Harness::new();
    h.seed_order(TRACKING, true).await;
    let up = upload(&h, "wrong.csv", b"date,payee,total\n2026-01-01,X,5\n").await;
    let upload_id = up["uploadId"].as_str().unwrap();

    let (status, json) = ingest(&h, upload_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Missing required column: txn_date");

    let id = Uuid::parse_str(upload_id).unwrap();
    let stored = h.store.get_upload(id).await.unwrap().unwrap();
    assert_eq!(stored.parse_status, ParseStatus::Failed);
}

#[tokio::test]
async fn ingest_validates_ids_and_ownership() {
    let h = Harness::new();
    h.seed_order(TRACKING, true).await;
    h.seed_order("AZFC-260301-FFFFFF", true).await;

    let (status, json) = ingest(&h, "not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Invalid uploadId");

    let (status, json) = h.post("/api/ingest-ledger", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Missing trackingNumber/uploadId");

    let (status, json) = ingest(&h, &Uuid::new_v4().to_string()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Upload not found");

    // An upload registered against another order is not reachable from this one.
    let (_, other) = h
        .post(
            "/api/uploads/signed-url",
            json!({"trackingNumber": "AZFC-260301-FFFFFF", "type": "ledger", "filename": "l.csv"}),
        )
        .await;
    let (status, _) = ingest(&h, other["uploadId"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Memory store whose `insert_transactions` fails on one chosen call.
struct FailingInsertStore {
    inner: KvStore<MemoryKv>,
    calls: AtomicUsize,
    fail_on_call: usize,
}

#[async_trait]
impl OrderStore for FailingInsertStore {
    async fn put_order(&self, order: &Order) -> anyhow::Result<()> {
        self.inner.put_order(order).await
    }
    async fn get_order(&self, tracking: &str) -> anyhow::Result<Option<Order>> {
        self.inner.get_order(tracking).await
    }
    async fn list_orders(&self, limit: usize) -> anyhow::Result<Vec<Order>> {
        self.inner.list_orders(limit).await
    }
    async fn delete_order(&self, tracking: &str) -> anyhow::Result<bool> {
        self.inner.delete_order(tracking).await
    }
}

#[async_trait]
impl LedgerStore for FailingInsertStore {
    async fn insert_upload(&self, upload: &Upload) -> anyhow::Result<()> {
        self.inner.insert_upload(upload).await
    }
    async fn get_upload(&self, id: Uuid) -> anyhow::Result<Option<Upload>> {
        self.inner.get_upload(id).await
    }
    async fn set_upload_status(&self, id: Uuid, status: ParseStatus) -> anyhow::Result<()> {
        self.inner.set_upload_status(id, status).await
    }
    async fn insert_transactions(&self, txns: &[LedgerTransaction]) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_call {
            anyhow::bail!("connection reset during insert");
        }
        self.inner.insert_transactions(txns).await
    }
    async fn delete_transactions_for_upload(&self, order_id: Uuid, upload_id: Uuid) -> anyhow::Result<u64> {
        self.inner.delete_transactions_for_upload(order_id, upload_id).await
    }
    async fn transactions_for_order(&self, order_id: Uuid) -> anyhow::Result<Vec<LedgerTransaction>> {
        self.inner.transactions_for_order(order_id).await
    }
    async fn upsert_totals(&self, totals: &CalcTotals) -> anyhow::Result<()> {
        self.inner.upsert_totals(totals).await
    }
    async fn get_totals(&self, order_id: Uuid) -> anyhow::Result<Option<CalcTotals>> {
        self.inner.get_totals(order_id).await
    }
    async fn record_packet(&self, packet: &GeneratedPacket) -> anyhow::Result<()> {
        self.inner.record_packet(packet).await
    }
    async fn latest_packet(&self, tracking: &str) -> anyhow::Result<Option<GeneratedPacket>> {
        self.inner.latest_packet(tracking).await
    }
}

#[tokio::test]
async fn interrupted_ingest_retries_without_duplicating_rows() {
    let store: Arc<dyn Store> = Arc::new(FailingInsertStore {
        inner: KvStore::new(MemoryKv::new(), None),
        calls: AtomicUsize::new(0),
        fail_on_call: 2,
    });
    let settings = ServiceSettings {
        insert_chunk_size: 1,
        ..common::settings()
    };
    let h = Harness::with_store(settings, store);
    let order = h.seed_order(TRACKING, true).await;
    let up = upload(
        &h,
        "ledger.csv",
        b"txn_date,vendor_name,description,amount,qualified_flag\n\
2026-01-04,Saguaro Grip,Grip truck,100,yes\n\
2026-01-05,Desert Dolly,Dolly rental,200,yes\n",
    )
    .await;
    let upload_id = up["uploadId"].as_str().unwrap();
    let id = Uuid::parse_str(upload_id).unwrap();

    let (status, json) = ingest(&h, upload_id).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{json}");
    assert_eq!(json["message"], "Could not save ledger rows");
    let stored = h.store.get_upload(id).await.unwrap().unwrap();
    assert_eq!(stored.parse_status, ParseStatus::Failed);
    assert_eq!(h.store.transactions_for_order(order.id).await.unwrap().len(), 1);

    let (status, json) = ingest(&h, upload_id).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["imported"], 2);
    assert_eq!(json["totals"]["qualified_costs_cents"], 30_000);
    assert_eq!(h.store.transactions_for_order(order.id).await.unwrap().len(), 2);
    let stored = h.store.get_upload(id).await.unwrap().unwrap();
    assert_eq!(stored.parse_status, ParseStatus::Parsed);
}
