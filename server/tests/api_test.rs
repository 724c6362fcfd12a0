//! HTTP API tests.
//!
//! Requests go straight into the router with `oneshot`; no socket needed.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use settee_engine::memory::{MemoryDriver, DRIVER_NAME};
use settee_engine::{CancellationToken, Client, MemoryUserStore, Registry};
use settee_server::config::{Config, ConfigStore};
use settee_server::{app, bootstrap, AppState, StartupError};
use std::sync::Arc;
use tower::ServiceExt;

async fn memory_client() -> Client {
    let registry = Registry::new();
    registry.register(DRIVER_NAME, Arc::new(MemoryDriver));
    registry
        .new_client(&CancellationToken::new(), DRIVER_NAME, "")
        .await
        .unwrap()
}

fn settings() -> ConfigStore {
    ConfigStore::new()
        .with("log", "capacity", "10")
        .with("log", "level", "info")
}

/// A server without admins: everything is open.
async fn open_app() -> Router {
    let state = AppState::new(
        memory_client().await,
        settings(),
        Arc::new(MemoryUserStore::new()),
        false,
    );
    app(state)
}

/// A server with one admin, `root:secret`, and authentication required.
async fn secured_app() -> Router {
    let users = MemoryUserStore::new().with_admin("root", "secret");
    let state = AppState::new(memory_client().await, settings(), Arc::new(users), true);
    app(state)
}

struct TestResponse {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Value,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<(&str, &str)>,
    body: Option<Value>,
) -> TestResponse {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some((user, pass)) = auth {
        let token = STANDARD.encode(format!("{user}:{pass}"));
        request = request.header(header::AUTHORIZATION, format!("Basic {token}"));
    }
    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, Method::GET, uri, None, None).await
}

async fn put(app: &Router, uri: &str, body: Value) -> TestResponse {
    send(app, Method::PUT, uri, None, Some(body)).await
}

fn is_rev(value: &Value, generation: u64) -> bool {
    let Some(rev) = value.as_str() else {
        return false;
    };
    let Some((gen, hash)) = rev.split_once('-') else {
        return false;
    };
    gen == generation.to_string()
        && hash.len() == 32
        && hash.chars().all(|c| c.is_ascii_hexdigit())
}

// ============================================================================
// Server
// ============================================================================

#[tokio::test]
async fn root_reports_server_info() {
    let app = open_app().await;
    let res = get(&app, "/").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["couchdb"], "Welcome");
    assert_eq!(res.body["vendor"]["name"], "Settee");
}

#[tokio::test]
async fn uuids_endpoint() {
    let app = open_app().await;

    let res = get(&app, "/_uuids").await;
    assert_eq!(res.body["uuids"].as_array().unwrap().len(), 1);

    let res = get(&app, "/_uuids?count=3").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["uuids"].as_array().unwrap().len(), 3);

    let res = get(&app, "/_uuids?count=1001").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "bad_request");
}

#[tokio::test]
async fn capability_endpoints() {
    let app = open_app().await;

    let res = get(&app, "/_membership").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["all_nodes"], json!(["settee@localhost"]));

    // The memory driver keeps no log
    let res = get(&app, "/_log?bytes=100").await;
    assert_eq!(res.status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(res.body["error"], "not_implemented");
}

// ============================================================================
// Databases
// ============================================================================

#[tokio::test]
async fn database_lifecycle() {
    let app = open_app().await;

    let res = put(&app, "/alpha", Value::Null).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body, json!({"ok": true}));

    let res = put(&app, "/alpha", Value::Null).await;
    assert_eq!(res.status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(res.body["error"], "file_exists");

    let res = put(&app, "/Not_Valid", Value::Null).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = get(&app, "/alpha").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["db_name"], "alpha");
    assert_eq!(res.body["update_seq"], 0);

    let res = send(&app, Method::HEAD, "/alpha", None, None).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = get(&app, "/_all_dbs").await;
    assert_eq!(res.body, json!(["alpha"]));

    let res = send(&app, Method::DELETE, "/alpha", None, None).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = get(&app, "/alpha").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["error"], "not_found");

    let res = send(&app, Method::DELETE, "/alpha", None, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Documents
// ============================================================================

#[tokio::test]
async fn document_crud() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;

    let res = put(&app, "/alpha/doc1", json!({"a": 1})).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["ok"], true);
    assert_eq!(res.body["id"], "doc1");
    assert!(is_rev(&res.body["rev"], 1));
    let rev1 = res.body["rev"].as_str().unwrap().to_string();

    let res = put(&app, "/alpha/doc1", json!({"a": 1})).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["error"], "conflict");

    let res = put(&app, "/alpha/doc1", json!({"_rev": rev1, "a": 2})).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert!(is_rev(&res.body["rev"], 2));
    let rev2 = res.body["rev"].as_str().unwrap().to_string();

    let res = get(&app, "/alpha/doc1").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({"_id": "doc1", "_rev": rev2, "a": 2}));

    let res = get(&app, &format!("/alpha/doc1?rev={rev1}")).await;
    assert_eq!(res.body["a"], 1);

    let res = send(&app, Method::DELETE, "/alpha/doc1", None, None).await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = send(
        &app,
        Method::DELETE,
        &format!("/alpha/doc1?rev={rev2}"),
        None,
        None,
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(is_rev(&res.body["rev"], 3));

    let res = get(&app, "/alpha/doc1").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, json!({"error": "not_found", "reason": "deleted"}));

    let res = get(&app, "/alpha/nothing").await;
    assert_eq!(res.body["reason"], "missing");
}

#[tokio::test]
async fn put_rejects_mismatched_ids_and_revs() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;

    let res = put(&app, "/alpha/doc1", json!({"_id": "other"})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = put(&app, "/alpha/doc1?rev=1-aaa", json!({"_rev": "1-bbb"})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = put(&app, "/alpha/_reserved", json!({})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_creates_document_with_server_id() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;

    let res = send(&app, Method::POST, "/alpha", None, Some(json!({"kind": "note"}))).await;
    assert_eq!(res.status, StatusCode::CREATED);
    let id = res.body["id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 32);

    let res = get(&app, &format!("/alpha/{id}")).await;
    assert_eq!(res.body["kind"], "note");

    let res = send(&app, Method::POST, "/alpha", None, Some(json!({"_id": "named"}))).await;
    assert_eq!(res.body["id"], "named");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/alpha/doc1")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Enumeration & Bulk
// ============================================================================

#[tokio::test]
async fn all_docs_listing() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;

    let res = get(&app, "/alpha/_all_docs").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({"total_rows": 0, "offset": 0, "rows": []}));

    for id in ["c", "a", "b"] {
        put(&app, &format!("/alpha/{id}"), json!({"name": id})).await;
    }

    let res = get(&app, "/alpha/_all_docs").await;
    let ids: Vec<_> = res.body["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let res = get(
        &app,
        "/alpha/_all_docs?startkey=%22b%22&include_docs=true&limit=1",
    )
    .await;
    let rows = res.body["rows"].as_array().unwrap();
    assert_eq!(res.body["total_rows"], 3);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["key"], "b");
    assert_eq!(rows[0]["doc"]["name"], "b");
    assert_eq!(rows[0]["doc"]["_id"], "b");
}

#[tokio::test]
async fn bulk_docs_reports_each_edit() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;
    let res = put(&app, "/alpha/existing", json!({"v": 1})).await;
    let rev = res.body["rev"].clone();

    let body = json!({
        "docs": [
            {"_id": "new1", "v": 1},
            {"_id": "existing", "_rev": rev, "v": 2},
            {"_id": "existing", "_rev": rev, "v": 3},
            {"v": "no id"}
        ]
    });
    let res = send(&app, Method::POST, "/alpha/_bulk_docs", None, Some(body)).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let results = res.body.as_array().unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[1]["ok"], true);
    assert_eq!(results[2]["error"], "conflict");
    assert_eq!(results[2]["id"], "existing");
    assert_eq!(results[3]["id"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn bulk_docs_replication_mode() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;

    let body = json!({
        "new_edits": false,
        "docs": [
            {"_id": "doc", "_rev": "2-bbb", "_revisions": {"start": 2, "ids": ["bbb", "aaa"]}, "side": "b"},
            {"_id": "doc", "_revisions": {"start": 2, "ids": ["ccc", "aaa"]}, "side": "c"}
        ]
    });
    let res = send(&app, Method::POST, "/alpha/_bulk_docs", None, Some(body)).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = get(&app, "/alpha/doc?conflicts=true").await;
    assert_eq!(res.body["_rev"], "2-ccc");
    assert_eq!(res.body["side"], "c");
    assert_eq!(res.body["_conflicts"], json!(["2-bbb"]));
}

// ============================================================================
// Changes
// ============================================================================

#[tokio::test]
async fn normal_changes_feed() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;
    put(&app, "/alpha/a", json!({})).await;
    put(&app, "/alpha/b", json!({})).await;

    let res = get(&app, "/alpha/_changes").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["last_seq"], 2);
    let results = res.body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], "a");
    assert!(is_rev(&results[0]["changes"][0]["rev"], 1));

    let res = get(&app, "/alpha/_changes?since=1").await;
    assert_eq!(res.body["results"].as_array().unwrap().len(), 1);

    let res = get(&app, "/alpha/_changes?feed=longpoll&since=now&timeout=50").await;
    assert_eq!(res.body["results"], json!([]));
    assert_eq!(res.body["last_seq"], 2);
}

#[tokio::test]
async fn continuous_changes_feed_is_line_delimited() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;
    put(&app, "/alpha/a", json!({})).await;
    put(&app, "/alpha/b", json!({})).await;

    let request = Request::builder()
        .uri("/alpha/_changes?feed=continuous&timeout=100")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["seq"], 1);
    assert_eq!(lines[1]["id"], "b");
}

#[tokio::test]
async fn bad_feed_type() {
    let app = open_app().await;
    put(&app, "/alpha", Value::Null).await;
    let res = get(&app, "/alpha/_changes?feed=sideways").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn config_is_readable() {
    let app = open_app().await;

    let res = get(&app, "/_config/log/capacity").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!("10"));

    let res = get(&app, "/_config/log/foobar").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = get(&app, "/_config/logx/level").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = get(&app, "/_config/log").await;
    assert_eq!(res.body, json!({"capacity": "10", "level": "info"}));

    let res = get(&app, "/_config").await;
    assert_eq!(res.body["log"]["capacity"], "10");
}

#[tokio::test]
async fn config_is_read_only() {
    let app = open_app().await;

    let res = put(&app, "/_config/log/capacity", json!("20")).await;
    assert_eq!(res.status, StatusCode::NOT_IMPLEMENTED);

    let res = send(&app, Method::DELETE, "/_config/log/capacity", None, None).await;
    assert_eq!(res.status, StatusCode::NOT_IMPLEMENTED);

    let res = get(&app, "/_config/log/capacity").await;
    assert_eq!(res.body, json!("10"));
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn anonymous_session_when_auth_is_off() {
    let app = open_app().await;
    let res = get(&app, "/_session").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["ok"], true);
    assert_eq!(res.body["userCtx"], json!({"name": null, "roles": []}));
    assert!(res.body["info"].get("authenticated").is_none());
}

#[tokio::test]
async fn basic_auth_session() {
    let app = secured_app().await;

    let res = send(&app, Method::GET, "/_session", Some(("root", "secret")), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["userCtx"]["name"], "root");
    assert_eq!(res.body["userCtx"]["roles"], json!(["_admin"]));
    assert_eq!(res.body["info"]["authenticated"], "default");

    let res = send(&app, Method::GET, "/_session", Some(("root", "wrong")), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "unauthorized");

    let res = get(&app, "/_session").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.headers.contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn admin_routes_need_credentials() {
    let app = secured_app().await;

    assert_eq!(get(&app, "/").await.status, StatusCode::OK);
    assert_eq!(get(&app, "/_config").await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(get(&app, "/_membership").await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        put(&app, "/alpha", Value::Null).await.status,
        StatusCode::UNAUTHORIZED
    );

    let admin = Some(("root", "secret"));
    let res = send(&app, Method::PUT, "/alpha", admin, None).await;
    assert_eq!(res.status, StatusCode::CREATED);

    // Document routes stay open
    let res = put(&app, "/alpha/doc1", json!({"a": 1})).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = send(&app, Method::GET, "/_config/log/capacity", admin, None).await;
    assert_eq!(res.body, json!("10"));

    let res = send(&app, Method::DELETE, "/alpha", admin, None).await;
    assert_eq!(res.status, StatusCode::OK);
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn bootstrap_reads_config_file() {
    let path = std::env::temp_dir().join(format!("settee-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        "[admins]\nroot = \"secret\"\n\n[log]\ncapacity = 10\n",
    )
    .unwrap();

    let registry = Registry::new();
    registry.register(DRIVER_NAME, Arc::new(MemoryDriver));
    let config = Config {
        config_file: Some(path.clone()),
        ..Config::default()
    };
    let state = bootstrap(&config, &registry, CancellationToken::new())
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert!(state.auth_required);
    assert!(state.settings.section("admins").is_err());
    assert_eq!(state.settings.get("log", "capacity").unwrap(), "10");

    let app = app(state);
    let res = send(&app, Method::GET, "/_session", Some(("root", "secret")), None).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn bootstrap_rejects_unknown_driver() {
    let registry = Registry::new();
    registry.register(DRIVER_NAME, Arc::new(MemoryDriver));
    let config = Config {
        driver: "couch".into(),
        ..Config::default()
    };

    let result = bootstrap(&config, &registry, CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(StartupError::Engine(settee_engine::Error::DriverNotFound(_)))
    ));
}

#[tokio::test]
async fn require_auth_can_be_forced_off() {
    let path = std::env::temp_dir().join(format!("settee-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, "[admins]\nroot = \"secret\"\n").unwrap();

    let registry = Registry::new();
    registry.register(DRIVER_NAME, Arc::new(MemoryDriver));
    let config = Config {
        config_file: Some(path.clone()),
        require_auth: Some(false),
        ..Config::default()
    };
    let state = bootstrap(&config, &registry, CancellationToken::new())
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert!(!state.auth_required);
}
