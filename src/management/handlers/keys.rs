//! 密钥池管理处理器

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};
use crate::key_pool::{InsertKeyParams, types::{MAX_KEY_LENGTH, mask_key}};
use crate::management::{response, server::AppState};
use crate::{lerror, linfo, logging::{LogComponent, LogStage}};

/// 插入密钥请求体
#[derive(Debug, Deserialize)]
pub struct InsertKeyRequest {
    pub key: String,
}

/// 插入密钥响应
#[derive(Debug, Serialize)]
pub struct InsertKeyResponse {
    pub key: String,
}

/// 校验密钥格式
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(ProxyError::validation("key 不能为空", Some("key")));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(ProxyError::validation(
            format!("key 长度不能超过 {MAX_KEY_LENGTH} 字节"),
            Some("key"),
        ));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ProxyError::validation(
            "key 不能包含空白或控制字符",
            Some("key"),
        ));
    }
    Ok(())
}

/// `POST /keys`：幂等插入密钥
pub async fn insert_key(
    State(state): State<AppState>,
    payload: std::result::Result<Json<InsertKeyRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return response::app_error(ProxyError::validation(
                format!("请求体格式错误: {}", rejection.body_text()),
                None,
            ));
        }
    };

    if let Err(e) = validate_key(&request.key) {
        return response::app_error(e);
    }

    let masked = mask_key(&request.key);
    match state
        .key_admin
        .insert_key(InsertKeyParams::new(request.key))
        .await
    {
        Ok(()) => {
            linfo!(
                "system",
                LogStage::Management,
                LogComponent::Management,
                "insert_key",
                "密钥插入请求完成",
                key = %masked
            );
            response::created(InsertKeyResponse { key: masked }, "密钥已加入密钥池")
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Management,
                LogComponent::Management,
                "insert_key_failed",
                "插入密钥失败",
                key = %masked,
                error = %e
            );
            response::app_error(e)
        }
    }
}

/// `GET /keys/stats`：密钥数量与余额总和
pub async fn get_key_stats(State(state): State<AppState>) -> Response {
    match state.key_admin.get_key_stats().await {
        Ok(stats) => response::success(stats),
        Err(e) => {
            lerror!(
                "system",
                LogStage::Management,
                LogComponent::Management,
                "key_stats_failed",
                "获取密钥统计失败",
                error = %e
            );
            response::app_error(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppContext;
    use crate::config::AppConfig;
    use crate::key_pool::KeyStats;
    use crate::management::ManagementServer;
    use crate::testing::{MockKeyAcquirer, MockKeyAdmin};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::Router;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router_with(admin: MockKeyAdmin) -> Router {
        let config = Arc::new(AppConfig::default());
        let context = AppContext::new(
            Arc::clone(&config),
            Arc::new(admin),
            Arc::new(MockKeyAcquirer::new()),
        );
        ManagementServer::create_router(AppState::new(Arc::new(context)), &config.management)
    }

    fn post_keys(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/keys")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("jina_abc123").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("   ").is_err());
        assert!(validate_key("has space").is_err());
        assert!(validate_key("tab\tkey").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH)).is_ok());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[tokio::test]
    async fn test_insert_key_created() {
        let mut admin = MockKeyAdmin::new();
        admin
            .expect_insert_key()
            .withf(|params| params.key == "jina_abcdef")
            .times(1)
            .returning(|_| Ok(()));

        let response = router_with(admin)
            .oneshot(post_keys(r#"{"key":"jina_abcdef"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["key"], "jina****");
    }

    #[tokio::test]
    async fn test_insert_key_rejects_bad_bodies() {
        for body in [r#"{"key": "#, r#"{"other":"x"}"#, r#"{"key":"  "}"#, r#"{"key":42}"#] {
            let mut admin = MockKeyAdmin::new();
            admin.expect_insert_key().never();

            let response = router_with(admin).oneshot(post_keys(body)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            let json = read_json(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_insert_key_store_failure() {
        let mut admin = MockKeyAdmin::new();
        admin
            .expect_insert_key()
            .times(1)
            .returning(|_| Err(ProxyError::database("connection reset")));

        let response = router_with(admin)
            .oneshot(post_keys(r#"{"key":"k1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["error"]["code"], "DATABASE_ERROR");
        assert!(!json["error"]["message"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_get_key_stats() {
        let mut admin = MockKeyAdmin::new();
        admin.expect_get_key_stats().times(1).returning(|| {
            Ok(KeyStats {
                count: 6,
                balance: 6_000_000,
            })
        });

        let request = Request::builder()
            .uri("/keys/stats")
            .body(Body::empty())
            .unwrap();
        let response = router_with(admin).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["data"]["count"], 6);
        assert_eq!(json["data"]["balance"], 6_000_000);
    }

    #[tokio::test]
    async fn test_get_key_stats_failure() {
        let mut admin = MockKeyAdmin::new();
        admin
            .expect_get_key_stats()
            .returning(|| Err(ProxyError::database("query failed")));

        let request = Request::builder()
            .uri("/keys/stats")
            .body(Body::empty())
            .unwrap();
        let response = router_with(admin).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
