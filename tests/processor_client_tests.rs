use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vendor_segments::error::AppError;
use vendor_segments::services::processor::{ProcessorApi, ProcessorClient};

/// Local stand-in for the processor that answers with a scripted status per hit
#[derive(Clone)]
struct Upstream {
    hits: Arc<AtomicUsize>,
    script: Arc<Vec<StatusCode>>,
}

async fn list_customers(State(upstream): State<Upstream>) -> (StatusCode, Json<Value>) {
    let hit = upstream.hits.fetch_add(1, Ordering::SeqCst);
    let status = upstream
        .script
        .get(hit)
        .or(upstream.script.last())
        .copied()
        .unwrap_or(StatusCode::OK);

    if status.is_success() {
        let body = json!({
            "status": true,
            "message": "Customers retrieved",
            "data": [{"customer_code": "CUS_1", "email": "ama@example.com"}],
            "meta": {"total": 1, "page": 1, "pageCount": 1, "perPage": 100}
        });
        (status, Json(body))
    } else {
        (status, Json(json!({"status": false, "message": "unavailable"})))
    }
}

async fn list_transactions_slowly(State(upstream): State<Upstream>) -> Json<Value> {
    upstream.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({"status": true, "message": "late", "data": []}))
}

async fn spawn_upstream(script: Vec<StatusCode>) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = Upstream {
        hits: hits.clone(),
        script: Arc::new(script),
    };
    let app = Router::new()
        .route("/customer", get(list_customers))
        .route("/transaction", get(list_transactions_slowly))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), hits)
}

fn client(base_url: String, timeout: Duration, max_retries: u32) -> ProcessorClient {
    ProcessorClient::new(base_url, timeout, max_retries)
        .unwrap()
        .with_retry_delay(Duration::from_millis(5))
}

#[tokio::test]
async fn test_retries_until_success() {
    let (base_url, hits) = spawn_upstream(vec![
        StatusCode::SERVICE_UNAVAILABLE,
        StatusCode::TOO_MANY_REQUESTS,
        StatusCode::OK,
    ])
    .await;

    let page = client(base_url, Duration::from_secs(5), 3)
        .list_customers("sk_test_a", 1, 100)
        .await
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].customer_code, "CUS_1");
    assert!(page.is_last(1, 100));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (base_url, hits) = spawn_upstream(vec![StatusCode::UNAUTHORIZED]).await;

    let err = client(base_url, Duration::from_secs(5), 3)
        .list_customers("sk_test_bad", 1, 100)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Upstream(ref msg) if msg.contains("401")));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_persistent_server_errors_exhaust_retries() {
    let (base_url, hits) = spawn_upstream(vec![StatusCode::INTERNAL_SERVER_ERROR]).await;

    let err = client(base_url, Duration::from_secs(5), 4)
        .list_customers("sk_test_a", 1, 100)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Upstream(ref msg) if msg.contains("after 4 attempts")));
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_slow_processor_times_out() {
    let (base_url, hits) = spawn_upstream(vec![]).await;

    let err = client(base_url, Duration::from_millis(200), 2)
        .list_transactions("sk_test_a", 1, 100)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Upstream(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_verify_rejects_path_like_reference() {
    let (base_url, _) = spawn_upstream(vec![]).await;

    let err = client(base_url, Duration::from_secs(5), 1)
        .verify_transaction("sk_test_a", "../customer")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}
