//! Cache client lifecycle scenarios against the in-memory store.

use gravity_common::{CacheClient, CacheConfig, ConnectionState, MemoryConnector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    roles: Vec<String>,
}

#[tokio::test]
async fn test_get_before_connect_returns_none_and_connects() {
    let cache = CacheClient::in_memory();
    assert_eq!(cache.state().await, ConnectionState::Disconnected);

    assert_eq!(cache.get("k").await.unwrap(), None);
    assert_eq!(cache.state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn test_set_json_then_get_json() {
    let cache = CacheClient::in_memory();
    cache.set_json("k", &json!({"a": 1}), None).await.unwrap();

    let value: Option<Value> = cache.get_json("k").await.unwrap();
    assert_eq!(value, Some(json!({"a": 1})));
}

#[tokio::test]
async fn test_typed_json_round_trip() {
    let cache = CacheClient::in_memory();
    let session = Session {
        user_id: 7,
        roles: vec!["admin".to_string()],
    };

    cache
        .set_json("session:7", &session, Some(Duration::from_secs(60)))
        .await
        .unwrap();

    let loaded: Option<Session> = cache.get_json("session:7").await.unwrap();
    assert_eq!(loaded, Some(session));
}

#[tokio::test]
async fn test_get_json_swallows_decode_failure() {
    let cache = CacheClient::in_memory();
    cache.set("k", "not json at all", None).await.unwrap();

    let value: Option<Value> = cache.get_json("k").await.unwrap();
    assert_eq!(value, None);

    let missing: Option<Value> = cache.get_json("absent").await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let cache = CacheClient::in_memory();
    cache.connect().await.unwrap();
    cache.set("k", "v", None).await.unwrap();

    cache.disconnect().await;
    cache.disconnect().await;
    assert_eq!(cache.state().await, ConnectionState::Disconnected);

    assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    assert_eq!(cache.state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn test_clients_sharing_a_connector_share_data() {
    let connector = MemoryConnector::new();
    let writer = CacheClient::with_connector(CacheConfig::default(), connector.clone());
    let reader = CacheClient::with_connector(CacheConfig::default(), connector);

    writer.set("shared", "yes", None).await.unwrap();
    assert_eq!(reader.get("shared").await.unwrap().as_deref(), Some("yes"));
}

#[tokio::test]
async fn test_concurrent_increments() {
    let cache = Arc::new(CacheClient::in_memory());

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.incr("counter", 1).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(cache.get("counter").await.unwrap().as_deref(), Some("50"));
}

#[tokio::test]
async fn test_health_check() {
    assert!(CacheClient::in_memory().health_check().await);

    let unreachable = CacheClient::new(CacheConfig::default().with_url("redis://127.0.0.1:1/0"));
    assert!(!unreachable.health_check().await);
}
