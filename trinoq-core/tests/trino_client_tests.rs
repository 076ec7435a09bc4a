//! Tests for the Trino client against an in-process fake coordinator
//!
//! The fake serves a scripted sequence of responses, one per request,
//! and records what it was sent.

use arrow_array::{Array, Int64Array, StringArray};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use trinoq_core::cache::{CacheConfig, CachingExecutor, ResultStore};
use trinoq_core::{NullSink, TrinoClient, TrinoConfig, TrinoqError};

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: String,
}

#[derive(Default)]
struct Coordinator {
    script: Mutex<VecDeque<(StatusCode, String)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl Coordinator {
    fn push(&self, status: StatusCode, body: impl Into<String>) {
        self.script.lock().unwrap().push_back((status, body.into()));
    }

    fn push_page(&self, page: Value) {
        self.push(StatusCode::OK, page.to_string());
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(
    State(coordinator): State<Arc<Coordinator>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    coordinator.requests.lock().unwrap().push(Recorded {
        method,
        path: uri.path().to_string(),
        headers,
        body,
    });

    coordinator
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::GONE, "script exhausted".to_string()))
}

async fn start() -> (Arc<Coordinator>, SocketAddr) {
    let coordinator = Arc::new(Coordinator::default());
    let app = Router::new()
        .fallback(handle)
        .with_state(coordinator.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (coordinator, addr)
}

fn client_for(addr: SocketAddr) -> TrinoClient {
    let mut config = TrinoConfig::from_url(&format!(
        "http://{}?user=tester@example.com&catalog=hive&schema=web",
        addr
    ))
    .unwrap()
    .with_token("secret-token");
    config.retry_delay = Duration::from_millis(1);
    config.retry_jitter = 0.0;
    TrinoClient::new(config).unwrap()
}

fn next_uri(addr: SocketAddr, token: u32) -> String {
    format!("http://{}/v1/statement/executing/q1/y/{}", addr, token)
}

fn columns() -> Value {
    json!([
        {"name": "id", "type": "bigint"},
        {"name": "name", "type": "varchar"}
    ])
}

#[tokio::test]
async fn test_paged_results_are_collected() {
    let (coordinator, addr) = start().await;

    coordinator.push_page(json!({
        "id": "q1",
        "nextUri": next_uri(addr, 1),
        "stats": {"state": "QUEUED"}
    }));
    coordinator.push_page(json!({
        "id": "q1",
        "nextUri": next_uri(addr, 2),
        "columns": columns(),
        "data": [[1, "alice"]],
        "stats": {"state": "RUNNING"}
    }));
    coordinator.push_page(json!({
        "id": "q1",
        "columns": columns(),
        "data": [[2, null]],
        "stats": {"state": "FINISHED"}
    }));

    let client = client_for(addr);
    let table = client.query("select id, name from users").await.unwrap();

    assert_eq!(table.column_names(), vec!["id", "name"]);
    assert_eq!(table.num_rows(), 2);

    let batch = table.concat().unwrap();
    let ids = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(ids.values().to_vec(), vec![1, 2]);
    let names = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(names.value(0), "alice");
    assert!(names.is_null(1));

    let requests = coordinator.requests();
    assert_eq!(requests.len(), 3);

    let submit = &requests[0];
    assert_eq!(submit.method, Method::POST);
    assert_eq!(submit.path, "/v1/statement");
    assert_eq!(submit.body, "select id, name from users");
    assert_eq!(submit.headers["x-trino-user"], "tester@example.com");
    assert_eq!(submit.headers["x-trino-catalog"], "hive");
    assert_eq!(submit.headers["x-trino-schema"], "web");
    assert_eq!(submit.headers["x-trino-source"], "trinoq");
    assert_eq!(submit.headers["authorization"], "Bearer secret-token");

    assert_eq!(requests[1].method, Method::GET);
    assert_eq!(requests[1].path, "/v1/statement/executing/q1/y/1");
    assert_eq!(requests[2].path, "/v1/statement/executing/q1/y/2");
}

#[tokio::test]
async fn test_busy_coordinator_is_retried() {
    let (coordinator, addr) = start().await;

    coordinator.push(StatusCode::SERVICE_UNAVAILABLE, "busy");
    coordinator.push_page(json!({
        "id": "q1",
        "columns": [{"name": "_col0", "type": "integer"}],
        "data": [[1]],
        "stats": {"state": "FINISHED"}
    }));

    let table = client_for(addr).query("select 1").await.unwrap();
    assert_eq!(table.num_rows(), 1);

    let requests = coordinator.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.method == Method::POST));
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (coordinator, addr) = start().await;
    for _ in 0..5 {
        coordinator.push(StatusCode::TOO_MANY_REQUESTS, "slow down");
    }

    let mut config = client_for(addr).config().clone();
    config.max_transient_retries = 2;
    let client = TrinoClient::new(config).unwrap();

    let err = client.query("select 1").await.unwrap_err();
    assert!(matches!(err, TrinoqError::Connection(_)));
    assert_eq!(coordinator.requests().len(), 3);
}

#[tokio::test]
async fn test_rejected_credentials() {
    let (coordinator, addr) = start().await;
    coordinator.push(StatusCode::UNAUTHORIZED, "Unauthorized");

    let err = client_for(addr).query("select 1").await.unwrap_err();
    assert!(matches!(err, TrinoqError::Authentication(_)));
    assert_eq!(coordinator.requests().len(), 1);
}

#[tokio::test]
async fn test_engine_error_is_execution_failure() {
    let (coordinator, addr) = start().await;

    coordinator.push_page(json!({
        "id": "q1",
        "nextUri": next_uri(addr, 1),
        "stats": {"state": "QUEUED"}
    }));
    coordinator.push_page(json!({
        "id": "q1",
        "stats": {"state": "FAILED"},
        "error": {
            "message": "line 1:15: Table 'hive.web.nope' does not exist",
            "errorName": "TABLE_NOT_FOUND",
            "errorType": "USER_ERROR",
            "errorCode": 46
        }
    }));

    let err = client_for(addr).query("select * from nope").await.unwrap_err();
    match err {
        TrinoqError::Execution { message, name } => {
            assert!(message.contains("does not exist"));
            assert_eq!(name.as_deref(), Some("TABLE_NOT_FOUND"));
        }
        other => panic!("expected Execution, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreadable_response_is_protocol_error() {
    let (coordinator, addr) = start().await;
    coordinator.push(StatusCode::OK, "<html>proxy login</html>");

    let err = client_for(addr).query("select 1").await.unwrap_err();
    assert!(matches!(err, TrinoqError::Protocol(_)));
}

#[tokio::test]
async fn test_unreachable_coordinator() {
    // Bind and drop to find a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr).query("select 1").await.unwrap_err();
    assert!(matches!(err, TrinoqError::Connection(_)));
}

#[tokio::test]
async fn test_cached_run_contacts_coordinator_once() {
    let (coordinator, addr) = start().await;
    coordinator.push_page(json!({
        "id": "q1",
        "columns": columns(),
        "data": [[7, "bob"]],
        "stats": {"state": "FINISHED"}
    }));

    let dir = TempDir::new().unwrap();
    let store = ResultStore::new(CacheConfig::builder().root(dir.path()).build()).unwrap();
    let cache = CachingExecutor::new(store).with_sink(Arc::new(NullSink));
    let client = client_for(addr);

    let first = cache.run("select id, name from users", &client, false).await.unwrap();
    let second = cache.run("select id, name from users", &client, false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(coordinator.requests().len(), 1);
}
