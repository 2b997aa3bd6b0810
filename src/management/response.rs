//! # API 响应结构
//!
//! 管理接口统一的 JSON 响应格式：成功为 `{success, data?, message?, timestamp}`，
//! 失败为 `{success: false, error: {code, message}, timestamp}`。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, ProxyError};

/// # 标准成功响应
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// # 标准错误信息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

/// # API响应枚举
///
/// 统一所有API出口，方便转换为 `axum::response::Response`
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Success(T),
    Created(T, String),
    Error(StatusCode, String, String),
    AppError(ProxyError),
}

fn success_body<T: Serialize>(data: Option<T>, message: String) -> Json<SuccessResponse<T>> {
    Json(SuccessResponse {
        success: true,
        data,
        message: Some(message),
        timestamp: Utc::now(),
    })
}

fn error_body(code: String, message: String) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        success: false,
        error: ErrorInfo { code, message },
        timestamp: Utc::now(),
    })
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Success(data) => {
                (StatusCode::OK, success_body(Some(data), "操作成功".to_string())).into_response()
            }
            Self::Created(data, message) => {
                (StatusCode::CREATED, success_body(Some(data), message)).into_response()
            }
            Self::Error(status, code, message) => {
                (status, error_body(code, message)).into_response()
            }
            Self::AppError(error) => {
                let (status, code) = error.to_http_response_parts();
                // 服务端错误不向调用方暴露内部细节
                let message = if error.category() == ErrorCategory::Server {
                    "服务内部错误，请稍后重试".to_string()
                } else {
                    error.to_string()
                };
                (status, error_body(code.to_string(), message)).into_response()
            }
        }
    }
}

/// # 便捷函数：成功响应
pub fn success<T: Serialize>(data: T) -> Response {
    ApiResponse::Success(data).into_response()
}

/// # 便捷函数：创建成功响应（201）
pub fn created<T: Serialize>(data: T, message: &str) -> Response {
    ApiResponse::Created(data, message.to_string()).into_response()
}

/// # 便捷函数：HTTP错误响应
pub fn error(status: StatusCode, code: &str, message: &str) -> Response {
    ApiResponse::<()>::Error(status, code.to_string(), message.to_string()).into_response()
}

/// # 便捷函数：应用错误响应
pub fn app_error(error: ProxyError) -> Response {
    ApiResponse::<()>::AppError(error).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = success(serde_json::json!({"count": 1}));
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["count"], 1);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_validation_error_keeps_message() {
        let response = app_error(ProxyError::validation("key 不能为空", Some("key")));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"].as_str().unwrap().contains("key 不能为空"));
    }

    #[tokio::test]
    async fn test_server_error_hides_details() {
        let response = app_error(ProxyError::database("password authentication failed"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "DATABASE_ERROR");
        assert!(!body["error"]["message"].as_str().unwrap().contains("password"));
    }
}
