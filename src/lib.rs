//! # Key Pool Proxy Library
//!
//! 共享 API 密钥池的凭据注入代理核心库

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod key_pool;
pub mod logging;
pub mod management;
pub mod proxy;
pub mod server_setup;
pub mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ProxyError, Result};
