use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use orderline_api::{app, AppState};
use orderline_catalog::{InMemoryInventory, InMemoryUserDirectory};
use orderline_core::{CoreResult, InventoryStore, NewItem, NewUser, User, UserDirectory};
use orderline_store::app_config::{Config, Role};
use orderline_store::{CircuitBreaker, RemoteInventoryStore, RemoteUserDirectory};

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with(app, Request::builder().method(method).uri(uri), body).await
}

async fn send_with(
    app: &Router,
    builder: axum::http::request::Builder,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

/// In-memory app with user Ann and a Widget holding 5 units.
async fn seeded() -> (Router, String, String) {
    let app = app(AppState::in_memory());

    let (status, user) = send(&app, "POST", "/v1/users", Some(json!({"name": "Ann", "email": "a@x.com"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, item) = send(&app, "POST", "/v1/items", Some(json!({"name": "Widget", "quantity": 5}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["quantity"], 5);

    (app, user["id"].as_str().unwrap().to_string(), item["id"].as_str().unwrap().to_string())
}

async fn stock(app: &Router, item_id: &str) -> i64 {
    let (status, item) = send(app, "GET", &format!("/v1/items/{}", item_id), None).await;
    assert_eq!(status, StatusCode::OK);
    item["quantity"].as_i64().unwrap()
}

#[tokio::test]
async fn test_order_reduces_stock() {
    let (app, user_id, item_id) = seeded().await;

    let (status, order) = send(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": user_id, "item_id": item_id, "quantity": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["quantity"], 3);
    assert_eq!(stock(&app, &item_id).await, 2);

    let (status, fetched) = send(&app, "GET", &format!("/v1/orders/{}", order["id"].as_str().unwrap()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, order);
}

#[tokio::test]
async fn test_insufficient_stock() {
    let (app, user_id, item_id) = seeded().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": user_id, "item_id": item_id, "quantity": 10})),
    )
    .await;

    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["message"], "not enough stock");
    assert_eq!(body["reason"], "insufficient_stock");
    assert_eq!(stock(&app, &item_id).await, 5);
}

#[tokio::test]
async fn test_unknown_user() {
    let (app, _, item_id) = seeded().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": "does-not-exist", "item_id": item_id, "quantity": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["message"], "user not found");
    assert_eq!(body["reason"], "user_not_found");
    assert_eq!(stock(&app, &item_id).await, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_for_marginal_stock() {
    let (app, user_id, item_id) = seeded().await;
    let order = json!({"user_id": user_id, "item_id": item_id, "quantity": 3});

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let app = app.clone();
            let order = order.clone();
            tokio::spawn(async move { send(&app, "POST", "/v1/orders", Some(order)).await })
        })
        .collect();
    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }
    let (a, b) = (results.remove(0), results.remove(0));

    let mut statuses = [a.0.as_u16(), b.0.as_u16()];
    statuses.sort();
    assert_eq!(statuses, [201, 412]);
    let rejected = if a.0 == StatusCode::CREATED { b.1 } else { a.1 };
    assert_eq!(rejected["reason"], "insufficient_stock");
    assert_eq!(stock(&app, &item_id).await, 2);
}

#[tokio::test]
async fn test_invalid_input() {
    let (app, user_id, item_id) = seeded().await;

    let (status, body) = send(&app, "POST", "/v1/users", Some(json!({"name": "", "email": "b@x.com"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
    assert_eq!(body["message"], "name and email are required");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": user_id, "item_id": item_id, "quantity": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Malformed bodies get the same JSON error shape
    let (status, body) = send(&app, "POST", "/v1/items", Some(json!({"name": "Widget"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let (status, body) = send(&app, "POST", "/v1/items", Some(json!({"name": "Widget", "quantity": -1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "quantity must be >= 0");
}

#[tokio::test]
async fn test_unknown_order() {
    let (app, _, _) = seeded().await;

    let (status, body) = send(&app, "GET", "/v1/orders/nonexistent-id", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = send(&app, "GET", "/v1/users/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reservation_endpoints() {
    let (app, _, item_id) = seeded().await;
    let reservations = format!("/v1/items/{}/reservations", item_id);

    let (status, held) = send(&app, "POST", &reservations, Some(json!({"quantity": 4}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(held["quantity"], 4);
    assert_eq!(held["item"]["quantity"], 1);
    let held_id = held["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", &reservations, Some(json!({"quantity": 2}))).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["available"], 1);

    let release = format!("{}/{}/release", reservations, held_id);
    let (status, item) = send(&app, "POST", &release, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["quantity"], 5);

    // A reservation goes back at most once
    let (status, body) = send(&app, "POST", &release, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert_eq!(stock(&app, &item_id).await, 5);

    let (_, sold) = send(&app, "POST", &reservations, Some(json!({"quantity": 5}))).await;
    let sold_id = sold["id"].as_str().unwrap();
    let (status, item) = send(&app, "POST", &format!("{}/{}/commit", reservations, sold_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["quantity"], 0);
    let (status, _) = send(&app, "POST", &format!("{}/{}/release", reservations, sold_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(stock(&app, &item_id).await, 0);

    let (status, _) = send(&app, "POST", "/v1/items/missing/reservations", Some(json!({"quantity": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ordered_stock_cannot_be_handed_back() {
    let (app, user_id, item_id) = seeded().await;
    let order = json!({"user_id": user_id, "item_id": item_id, "quantity": 5});

    let (status, placed) = send(&app, "POST", "/v1/orders", Some(order.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(stock(&app, &item_id).await, 0);

    // Neither the order id nor a bare quantity gives the units back
    let order_id = placed["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/items/{}/reservations/{}/release", item_id, order_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", &format!("/v1/items/{}/releases", item_id), Some(json!({"quantity": 5}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(stock(&app, &item_id).await, 0);

    let (status, body) = send(&app, "POST", "/v1/orders", Some(order)).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["reason"], "insufficient_stock");
    assert_eq!(body["available"], 0);
}

#[tokio::test]
async fn test_health_and_role_routing() {
    let (app, _, _) = seeded().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "role": "all"}));

    let users_only = app_for_role(Role::Users);
    let (status, _) = send(&users_only, "GET", "/v1/orders/anything", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&users_only, "POST", "/v1/items", Some(json!({"name": "Widget", "quantity": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn app_for_role(role: Role) -> Router {
    app(AppState::new(
        role,
        Arc::new(InMemoryUserDirectory::new()),
        Arc::new(InMemoryInventory::new()),
    ))
}

#[tokio::test]
async fn test_placed_orders_reach_subscribers() {
    let state = AppState::in_memory();
    let mut rx = state.sse_tx.subscribe();
    let app = app(state);

    // The stream never ends, so only the head is checked
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/v1/orders/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    drop(response);

    let (_, user) = send(&app, "POST", "/v1/users", Some(json!({"name": "Ann", "email": "a@x.com"}))).await;
    let (_, item) = send(&app, "POST", "/v1/items", Some(json!({"name": "Widget", "quantity": 5}))).await;
    let (_, order) = send(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": user["id"], "item_id": item["id"], "quantity": 2})),
    )
    .await;

    let event = rx.recv().await.unwrap();
    assert_eq!(event.order_id, order["id"].as_str().unwrap());
    assert_eq!(event.remaining_stock, 3);
}

struct SlowUsers(InMemoryUserDirectory);

#[async_trait]
impl UserDirectory for SlowUsers {
    async fn create_user(&self, new_user: NewUser) -> CoreResult<User> {
        self.0.create_user(new_user).await
    }

    async fn get_user(&self, id: &str) -> CoreResult<User> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.0.get_user(id).await
    }
}

#[tokio::test]
async fn test_request_deadline_header() {
    let users = Arc::new(SlowUsers(InMemoryUserDirectory::new()));
    let inventory = Arc::new(InMemoryInventory::new());
    let user = users
        .create_user(NewUser { name: "Ann".to_string(), email: "a@x.com".to_string() })
        .await
        .unwrap();
    let item = inventory
        .create_item(NewItem { name: "Widget".to_string(), quantity: 5 })
        .await
        .unwrap();
    let app = app(AppState::new(Role::All, users, inventory.clone()));
    let order = json!({"user_id": user.id, "item_id": item.id, "quantity": 1});

    let tight = Request::builder()
        .method("POST")
        .uri("/v1/orders")
        .header("x-request-timeout-ms", "20");
    let (status, body) = send_with(&app, tight, Some(order.clone())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "unavailable");
    assert_eq!(inventory.get_item(&item.id).await.unwrap().quantity, 5);

    // Default budget is long enough
    let (status, _) = send(&app, "POST", "/v1/orders", Some(order.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let bad = Request::builder()
        .method("POST")
        .uri("/v1/orders")
        .header("x-request-timeout-ms", "later");
    let (status, _) = send_with(&app, bad, Some(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn serve(role: Role) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app_for_role(role);
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

fn orders_config(users_url: &str, inventory_url: &str) -> Config {
    Config::from_toml(&format!(
        "[server]\nrole = \"orders\"\n[upstream]\nusers_url = \"{}\"\ninventory_url = \"{}\"\ncall_timeout_ms = 1000\n",
        users_url, inventory_url
    ))
    .unwrap()
}

/// Orders role talking to separately served users and inventory over HTTP.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_orders_role_over_http() {
    let users_url = serve(Role::Users).await;
    let inventory_url = serve(Role::Inventory).await;

    let breaker = || Arc::new(CircuitBreaker::new("test", 5, Duration::from_secs(30)));
    let users = RemoteUserDirectory::new(&users_url, Duration::from_secs(1), breaker()).unwrap();
    let inventory = RemoteInventoryStore::new(&inventory_url, Duration::from_secs(1), breaker()).unwrap();
    let user = users
        .create_user(NewUser { name: "Ann".to_string(), email: "a@x.com".to_string() })
        .await
        .unwrap();
    let item = inventory
        .create_item(NewItem { name: "Widget".to_string(), quantity: 5 })
        .await
        .unwrap();

    let orders = app(AppState::from_config(&orders_config(&users_url, &inventory_url)).unwrap());

    let (status, order) = send(
        &orders,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": user.id, "item_id": item.id, "quantity": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(inventory.get_item(&item.id).await.unwrap().quantity, 2);

    let (status, body) = send(
        &orders,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": user.id, "item_id": item.id, "quantity": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["reason"], "insufficient_stock");

    let (status, body) = send(
        &orders,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": "does-not-exist", "item_id": item.id, "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["reason"], "user_not_found");

    let (status, body) = send(
        &orders,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": user.id, "item_id": "no-such-item", "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["reason"], "item_not_found");

    assert_eq!(inventory.get_item(&item.id).await.unwrap().quantity, 2);
}

#[tokio::test]
async fn test_orders_role_with_inventory_down() {
    let users_url = serve(Role::Users).await;
    let users = RemoteUserDirectory::new(
        &users_url,
        Duration::from_secs(1),
        Arc::new(CircuitBreaker::new("users", 5, Duration::from_secs(30))),
    )
    .unwrap();
    let user = users
        .create_user(NewUser { name: "Ann".to_string(), email: "a@x.com".to_string() })
        .await
        .unwrap();

    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let inventory_url = format!("http://{}", closed.local_addr().unwrap());
    drop(closed);

    let orders = app(AppState::from_config(&orders_config(&users_url, &inventory_url)).unwrap());
    let (status, body) = send(
        &orders,
        "POST",
        "/v1/orders",
        Some(json!({"user_id": user.id, "item_id": "i-1", "quantity": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "unavailable");
}
