//! # 管理API模块
//!
//! 密钥池的插入与统计接口

pub mod handlers;
pub mod response;
pub mod routes;
pub mod server;

pub use routes::create_routes;
pub use server::{AppState, ManagementServer};
