//! # 路由配置

use axum::Router;
use axum::routing::{get, post};

use crate::management::handlers::{keys, system};
use crate::management::server::AppState;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .merge(key_routes())
        .route("/ping", get(system::ping_handler))
        .route("/", get(system::root_handler))
        .fallback(system::not_found_handler)
        .with_state(state)
}

/// 密钥池路由
fn key_routes() -> Router<AppState> {
    Router::new()
        .route("/keys", post(keys::insert_key))
        .route("/keys/stats", get(keys::get_key_stats))
}
