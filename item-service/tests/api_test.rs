//! API integration tests for the item service.
//!
//! The router is driven in-process against an in-memory store, an
//! unconfigured descriptor, and a descriptor pointing at a closed port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionDescriptor, DbKind, Item, Password, TableDescriptor};
use item_service::store::{require_name, ItemStore, SharedStore};
use item_service::{create_router, AppState};

const SECRET: &str = "sup3r-s3cret-pw";

// =============================================================================
// Test Helpers
// =============================================================================

#[derive(Default)]
struct MemoryStore {
    items: Mutex<Vec<Item>>,
    down: AtomicBool,
}

#[async_trait]
impl ItemStore for MemoryStore {
    fn kind(&self) -> DbKind {
        DbKind::PostgreSql
    }

    async fn ping(&self) -> AppResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::ConnectFailure("connection reset".into()));
        }
        Ok(())
    }

    async fn list_tables(&self) -> AppResult<Vec<TableDescriptor>> {
        Ok(vec![TableDescriptor::new("items")])
    }

    async fn list_items(&self) -> AppResult<Vec<Item>> {
        Ok(self.items.lock().unwrap().clone())
    }

    async fn get_item(&self, id: i64) -> AppResult<Item> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("item {id}")))
    }

    async fn insert_item(&self, name: &str) -> AppResult<Item> {
        require_name(name)?;
        let mut items = self.items.lock().unwrap();
        let item = Item {
            id: items.len() as i64 + 1,
            name: name.to_string(),
            created_at: Some(Utc::now()),
        };
        items.push(item.clone());
        Ok(item)
    }
}

fn test_config() -> AppConfig {
    let vars = HashMap::from([("DB_CONNECT_TIMEOUT_SECS".to_string(), "1".to_string())]);
    AppConfig::from_vars("item-service-test", &vars)
}

fn configured_descriptor(port: u16) -> ConnectionDescriptor {
    ConnectionDescriptor {
        kind: DbKind::PostgreSql,
        host: Some("127.0.0.1".into()),
        port: Some(port),
        name: Some("app".into()),
        user: Some("app".into()),
        password: Some(Password::new(SECRET)),
    }
}

fn memory_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let shared: SharedStore = store.clone();
    let state = AppState::with_store(test_config(), configured_descriptor(5432), shared);
    (create_router(state), store)
}

fn unset_app() -> Router {
    create_router(AppState::new(test_config(), ConnectionDescriptor::unset()))
}

/// Nothing listens on port 1, so every connect is refused.
fn unreachable_app() -> Router {
    create_router(AppState::new(test_config(), configured_descriptor(1)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, "GET", uri, None).await;
    (status, serde_json::from_str(&body).unwrap_or(Value::Null))
}

// =============================================================================
// Unconditional Routes
// =============================================================================

#[tokio::test]
async fn test_ok_without_database() {
    for app in [unset_app(), unreachable_app()] {
        let (status, body) = send(&app, "GET", "/ok", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}

#[tokio::test]
async fn test_gateway_timeout_always_504() {
    let (memory, _) = memory_app();
    for app in [unset_app(), unreachable_app(), memory] {
        let (status, body) = send(&app, "GET", "/gateway-timeout", None).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body, "Gateway Timeout");
    }
}

#[tokio::test]
async fn test_health_reflects_ping() {
    let (app, store) = memory_app();
    let (status, body) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    store.down.store(true, Ordering::SeqCst);
    let (status, body) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unavailable");

    let (status, body) = get_json(&unreachable_app(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unavailable");
}

// =============================================================================
// Fallback
// =============================================================================

#[tokio::test]
async fn test_fallback_when_unreachable() {
    for app in [unset_app(), unreachable_app()] {
        for uri in ["/", "/api/tables", "/api/items", "/api/items/1", "/api/config", "/sample", "/api"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{uri}");
            assert_eq!(response.headers()["x-service-status"], "unavailable");
            assert!(response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/html"));
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = String::from_utf8_lossy(&bytes);
            assert!(body.contains("Service unavailable"), "{uri}");
            assert!(!body.contains(SECRET), "{uri}");
        }

        let (status, _) = send(&app, "POST", "/api/items", Some(r#"{"name":"widget"}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(&app, "GET", "/ok", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_fallback_is_path_independent() {
    let app = unset_app();
    let (_, index) = send(&app, "GET", "/", None).await;
    let (_, tables) = send(&app, "GET", "/api/tables", None).await;
    let (_, items) = send(&app, "GET", "/api/items", None).await;
    assert_eq!(index, tables);
    assert_eq!(tables, items);
}

#[tokio::test]
async fn test_fallback_after_store_goes_down() {
    let (app, store) = memory_app();
    let (status, _) = send(&app, "GET", "/api/items", None).await;
    assert_eq!(status, StatusCode::OK);

    store.down.store(true, Ordering::SeqCst);
    let (status, body) = send(&app, "GET", "/api/items", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("Ping failed"));
}

// =============================================================================
// Items
// =============================================================================

#[tokio::test]
async fn test_create_then_get_item() {
    let (app, _) = memory_app();

    let (status, body) = send(&app, "POST", "/api/items", Some(r#"{"name":"widget"}"#)).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(created["name"], "widget");
    let id = created["id"].as_i64().unwrap();

    let (status, item) = get_json(&app, &format!("/api/items/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["name"], "widget");
    assert_eq!(item["id"], id);
    assert!(item["createdAt"].is_string());

    let (status, items) = get_json(&app, "/api/items").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items, json!([item]));
}

#[tokio::test]
async fn test_create_rejects_missing_name() {
    let (app, store) = memory_app();

    for body in ["{}", r#"{"name":""}"#, r#"{"name":"   "}"#, r#"{"name":null}"#, "not json", ""] {
        let (status, response) = send(&app, "POST", "/api/items", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        let response: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(response["success"], false);
        assert_eq!(response["error"]["code"], "VALIDATION_ERROR");
    }

    assert!(store.items.lock().unwrap().is_empty());
    let (_, items) = get_json(&app, "/api/items").await;
    assert_eq!(items, json!([]));
}

#[tokio::test]
async fn test_create_reports_malformed_body() {
    let (app, store) = memory_app();
    let (status, body) = send(&app, "POST", "/api/items", Some(r#"{"name":42}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("invalid JSON body"), "{message}");
    assert!(store.items.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_missing_item_is_404() {
    let (app, _) = memory_app();
    for uri in ["/api/items/999", "/api/items/not-a-number"] {
        let (status, body) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_config_masks_password() {
    let (app, _) = memory_app();
    let (status, body) = send(&app, "GET", "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains(SECRET));

    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["dbType"], "POSTGRESQL");
    assert_eq!(value["configured"], true);
    assert_eq!(value["env"]["DB_PASSWORD"], "********");
    assert_eq!(value["env"]["DB_HOST"], "127.0.0.1");
}

#[tokio::test]
async fn test_tables_and_index() {
    let (app, _) = memory_app();
    let (status, tables) = get_json(&app, "/api/tables").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tables, json!(["items"]));

    let (status, html) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<li>items</li>"));

    let (status, html) = send(&app, "GET", "/sample", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("/api/items"));
}

#[tokio::test]
async fn test_api_info_and_openapi() {
    let (app, _) = memory_app();
    let (status, info) = get_json(&app, "/api").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["message"], "API Server");
    assert_eq!(info["endpoints"]["itemsById"], "GET /api/items/:id");

    let (status, doc) = get_json(&app, "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/items"].is_object());
}

// =============================================================================
// Over TCP
// =============================================================================

#[tokio::test]
async fn test_served_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, unset_app()).await.unwrap();
    });

    let client = reqwest::Client::new();
    let resp = client.get(format!("http://{addr}/ok")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.text().await.unwrap(), "OK");

    let resp = client.get(format!("http://{addr}/api/items")).send().await.unwrap();
    assert_eq!(resp.status(), 503);
}
