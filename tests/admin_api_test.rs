//! # 管理 API 集成测试
//!
//! 使用内存存储组装完整的应用上下文，通过路由器直接发送请求。

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use key_pool_proxy::{AppConfig, app::AppContext, management::ManagementServer};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn build_server() -> (ManagementServer, Arc<AppContext>) {
    let mut config = AppConfig::default();
    config.database.url = "memory://".to_string();
    let context = Arc::new(AppContext::build(config).await.unwrap());
    let server = ManagementServer::new(context.config.management.clone(), Arc::clone(&context));
    (server, context)
}

fn insert_request(key: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/keys")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "key": key }).to_string()))
        .unwrap()
}

fn stats_request() -> Request<Body> {
    Request::builder()
        .uri("/keys/stats")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn insert_then_stats() {
    let (server, _context) = build_server().await;
    let router = server.router();

    for key in ["jina_one", "jina_two", "jina_three"] {
        let response = router.clone().oneshot(insert_request(key)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = router.oneshot(stats_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], json!({ "count": 3, "balance": 3_000_000 }));
}

#[tokio::test]
async fn duplicate_insert_is_idempotent() {
    let (server, _context) = build_server().await;
    let router = server.router();

    for _ in 0..3 {
        let response = router
            .clone()
            .oneshot(insert_request("jina_same"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let body = body_json(router.oneshot(stats_request()).await.unwrap()).await;
    assert_eq!(body["data"]["count"], 1);
}

#[tokio::test]
async fn inserted_key_is_visible_to_proxy_side() {
    let (server, context) = build_server().await;

    let response = server
        .router()
        .oneshot(insert_request("jina_shared"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let key = context.key_acquirer.acquire_best_key().await.unwrap();
    assert_eq!(key.as_deref(), Some("jina_shared"));
}

#[tokio::test]
async fn empty_pool_stats_are_zero() {
    let (server, _context) = build_server().await;
    let body = body_json(server.router().oneshot(stats_request()).await.unwrap()).await;
    assert_eq!(body["data"], json!({ "count": 0, "balance": 0 }));
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (server, _context) = build_server().await;
    let huge = "k".repeat(128 * 1024);
    let response = server.router().oneshot(insert_request(&huge)).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn ping_and_unknown_route() {
    let (server, _context) = build_server().await;
    let router = server.router();

    let ping = Request::builder().uri("/ping").body(Body::empty()).unwrap();
    let response = router.clone().oneshot(ping).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let missing = Request::builder()
        .uri("/does-not-exist")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn serve_on_real_listener() {
    let (server, _context) = build_server().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(server.serve_on(listener));

    // 原始 HTTP/1.1 请求，避免引入额外的客户端依赖
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = "GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    tokio::io::AsyncWriteExt::write_all(&mut stream, request.as_bytes())
        .await
        .unwrap();
    let mut raw = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut raw)
        .await
        .unwrap();

    assert!(raw.starts_with("HTTP/1.1 200"));
    assert!(raw.ends_with("pong"));
    handle.abort();
}
