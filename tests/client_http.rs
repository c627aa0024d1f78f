//! HTTP client against a local fake explorer API.

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use kalon_explorer::client::{ApiClient, Backend};
use kalon_explorer::error::FetchError;
use kalon_explorer::pagination::{build_request, Filters};
use kalon_explorer::resource::{QueryParams, ResourceKey, ResourceKind, ResourceValue};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const GUARD: Duration = Duration::from_secs(30);

type Queries = Arc<Mutex<Vec<Option<String>>>>;

fn block_json(number: u64) -> Value {
    json!({
        "number": number,
        "hash": format!("{:064x}", number),
        "txCount": 2,
        "timestamp": "2024-05-01T12:00:00Z",
        "miner": "kalon1miner",
        "size": 2048,
        "difficulty": 1000
    })
}

async fn blocks(State(queries): State<Queries>, RawQuery(query): RawQuery) -> Json<Value> {
    queries.lock().push(query);
    Json(json!({
        "success": true,
        "data": [block_json(2), block_json(1)],
        "meta": { "page": 2, "limit": 20, "total": 47, "totalPages": 3 }
    }))
}

async fn block_by_height(Path(height): Path<u64>) -> (StatusCode, Json<Value>) {
    if height == 1 {
        (StatusCode::OK, Json(json!({ "success": true, "data": block_json(1) })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Block not found" })),
        )
    }
}

async fn search(RawQuery(query): RawQuery) -> Json<Value> {
    let q = query.unwrap_or_default();
    let q = q.strip_prefix("q=").unwrap_or(&q).to_string();
    let kind = if q.starts_with("0x") { "block" } else { "unknown" };
    Json(json!({ "success": true, "data": { "query": q, "type": kind, "data": null } }))
}

async fn slow_stats() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "success": true, "data": {} }))
}

/// Serve the fake API on an ephemeral port; returns its base URL.
async fn spawn_api(queries: Queries) -> String {
    let app = Router::new()
        .route("/api/blocks", get(blocks))
        .route("/api/blocks/height/:height", get(block_by_height))
        .route(
            "/api/transactions",
            get(|| async { Json(json!({ "success": true, "data": null, "meta": { "total": 0 } })) }),
        )
        .route(
            "/api/treasury",
            get(|| async { Json(json!({ "success": false, "error": "treasury offline" })) }),
        )
        .route(
            "/api/network/stats",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .route(
            "/api/network/peers",
            get(|| async { Json(json!({ "success": true, "data": "not a list" })) }),
        )
        .route("/api/stats", get(slow_stats))
        .route(
            "/api/health",
            get(|| async {
                Json(json!({
                    "success": true,
                    "data": { "status": "healthy", "timestamp": "2024-05-01T12:00:00Z", "version": "1.0.0" }
                }))
            }),
        )
        .route("/api/search", get(search))
        .with_state(queries);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

async fn client(timeout: Duration) -> (ApiClient, Queries) {
    let queries: Queries = Arc::default();
    let base = spawn_api(queries.clone()).await;
    (ApiClient::new(&base, timeout).unwrap(), queries)
}

#[tokio::test]
async fn test_listing_request_and_envelope_meta() {
    tokio::time::timeout(GUARD, async {
        let (client, queries) = client(Duration::from_secs(5)).await;

        let params = build_request(2, 20, &Filters::search("abc"));
        let listing = client.blocks(&params).await.unwrap();
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.total, Some(47));
        assert_eq!(listing.items[0].number, 2);

        // same key, same wire query, whatever order it was built in
        let reordered = QueryParams::new()
            .with("search", "abc")
            .with("limit", 20)
            .with("page", 2);
        client.blocks(&reordered).await.unwrap();
        let seen = queries.lock().clone();
        assert_eq!(
            seen,
            vec![
                Some("limit=20&page=2&search=abc".to_string()),
                Some("limit=20&page=2&search=abc".to_string()),
            ]
        );
    })
    .await
    .expect("test_listing_request_and_envelope_meta timed out");
}

#[tokio::test]
async fn test_null_list_data_is_empty() {
    tokio::time::timeout(GUARD, async {
        let (client, _) = client(Duration::from_secs(5)).await;
        let listing = client.transactions(&QueryParams::new()).await.unwrap();
        assert!(listing.items.is_empty());
        assert_eq!(listing.total_or_len(), 0);
    })
    .await
    .expect("test_null_list_data_is_empty timed out");
}

#[tokio::test]
async fn test_error_classification() {
    tokio::time::timeout(GUARD, async {
        let (client, _) = client(Duration::from_secs(5)).await;

        match client.treasury().await {
            Err(FetchError::Protocol(msg)) => assert!(msg.contains("treasury offline")),
            other => panic!("expected protocol error, got {:?}", other),
        }
        assert_eq!(client.network_stats().await.unwrap_err(), FetchError::Server(500));
        assert!(matches!(client.peers().await, Err(FetchError::Protocol(_))));

        let missing = client.block_by_height(99).await.unwrap_err();
        assert_eq!(missing, FetchError::Server(404));
        assert!(missing.is_not_found());
        assert_eq!(client.block_by_height(1).await.unwrap().number, 1);

        // no route at all
        assert_eq!(client.latest_block().await.unwrap_err(), FetchError::Server(404));
    })
    .await
    .expect("test_error_classification timed out");
}

#[tokio::test]
async fn test_slow_response_times_out() {
    tokio::time::timeout(GUARD, async {
        let timeout = Duration::from_millis(200);
        let (client, _) = client(timeout).await;
        assert_eq!(client.stats().await.unwrap_err(), FetchError::Timeout(timeout));
    })
    .await
    .expect("test_slow_response_times_out timed out");
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    tokio::time::timeout(GUARD, async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(&format!("http://{}/api", addr), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            client.network_stats().await,
            Err(FetchError::Network(_))
        ));
    })
    .await
    .expect("test_unreachable_backend_is_network_error timed out");
}

#[tokio::test]
async fn test_fetch_resource_dispatches_by_kind() {
    tokio::time::timeout(GUARD, async {
        let (client, queries) = client(Duration::from_secs(5)).await;
        let key = ResourceKey::new(ResourceKind::Blocks, QueryParams::new().with("limit", 5));

        match client.fetch_resource(&key).await.unwrap() {
            ResourceValue::Blocks(listing) => assert_eq!(listing.total, Some(47)),
            other => panic!("expected blocks, got {:?}", other.kind()),
        }
        assert_eq!(queries.lock().last().cloned().flatten().as_deref(), Some("limit=5"));

        let stats = ResourceKey::plain(ResourceKind::NetworkStats);
        assert_eq!(
            client.fetch_resource(&stats).await.unwrap_err(),
            FetchError::Server(500)
        );
    })
    .await
    .expect("test_fetch_resource_dispatches_by_kind timed out");
}

#[tokio::test]
async fn test_health_and_server_search_hint() {
    tokio::time::timeout(GUARD, async {
        let (client, _) = client(Duration::from_secs(5)).await;

        let health = client.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version.as_deref(), Some("1.0.0"));
        assert!(health.timestamp.is_some());

        let hit = client.search("0xabc").await.unwrap();
        assert_eq!(hit.query, "0xabc");
        assert!(hit.is_match());

        let miss = client.search("nothing").await.unwrap();
        assert_eq!(miss.kind, "unknown");
        assert!(!miss.is_match());
    })
    .await
    .expect("test_health_and_server_search_hint timed out");
}
