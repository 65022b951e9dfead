//! REST KV wire protocol against a mock server.

use std::time::Duration;

use azfc_store::{KvBackend, RestKv};
use httpmock::prelude::*;
use serde_json::json;

#[tokio::test]
async fn set_uses_path_form_with_px_and_bearer() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/SET/order:AZFC-1/hello/PX/60000")
                .header("authorization", "Bearer kv-token");
            then.status(200).json_body(json!({"result": "OK"}));
        })
        .await;

    let kv = RestKv::new(&server.base_url(), "kv-token").unwrap();
    kv.set("order:AZFC-1", "hello", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    m.assert_async().await;
}

#[tokio::test]
async fn get_unwraps_result_envelope() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/GET/present");
            then.status(200).json_body(json!({"result": "{\"a\":1}"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/GET/absent");
            then.status(200).json_body(json!({"result": null}));
        })
        .await;

    let kv = RestKv::new(&server.base_url(), "t").unwrap();
    assert_eq!(kv.get("present").await.unwrap().as_deref(), Some("{\"a\":1}"));
    assert_eq!(kv.get("absent").await.unwrap(), None);
}

#[tokio::test]
async fn non_2xx_becomes_kv_error_with_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/GET/k");
            then.status(401).body("unauthorized");
        })
        .await;

    let kv = RestKv::new(&server.base_url(), "bad").unwrap();
    let err = kv.get("k").await.unwrap_err().to_string();
    assert_eq!(err, "KV error: 401 unauthorized");
}

#[tokio::test]
async fn lrange_and_rpush() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/LRANGE/orders:all/0/-1");
            then.status(200).json_body(json!({"result": ["b", "a"]}));
        })
        .await;
    let push = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/")
                .json_body(json!(["RPUSH", "txns:1", "x", "y"]));
            then.status(200).json_body(json!({"result": 2}));
        })
        .await;

    let kv = RestKv::new(&server.base_url(), "t").unwrap();
    assert_eq!(kv.lrange("orders:all", 0, -1).await.unwrap(), vec!["b", "a"]);
    kv.rpush("txns:1", &["x".to_string(), "y".to_string()])
        .await
        .unwrap();
    push.assert_async().await;
}
