//! 系统信息处理器

use crate::management::response;

/// 根路径：服务信息
pub async fn root_handler() -> axum::response::Response {
    response::success(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["POST /keys", "GET /keys/stats", "GET /ping"]
    }))
}

/// Ping 处理器
pub async fn ping_handler() -> &'static str {
    "pong"
}

/// 未匹配路由
pub async fn not_found_handler() -> axum::response::Response {
    response::error(axum::http::StatusCode::NOT_FOUND, "NOT_FOUND", "接口不存在")
}
