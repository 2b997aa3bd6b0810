//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod database;
mod manager;

pub use app_config::{AppConfig, DEFAULT_KEY_BALANCE, KeyPoolConfig, ManagementConfig, ProxyConfig};
pub use database::{DatabaseConfig, MEMORY_URL_PREFIX};
pub use manager::{CONFIG_PATH_ENV, ConfigManager, apply_env_overrides};

use crate::error::{ProxyError, Result};

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.database.url.trim().is_empty() {
        return Err(ProxyError::config("数据库URL不能为空"));
    }

    if config.database.max_connections == 0 {
        return Err(ProxyError::config("数据库最大连接数必须大于0"));
    }

    if config.proxy.port == 0 {
        return Err(ProxyError::config("代理端口不能为0"));
    }

    if config.management.port == 0 {
        return Err(ProxyError::config("管理端口不能为0"));
    }

    if config.proxy.port == config.management.port
        && same_host(&config.proxy.host, &config.management.bind_address)
    {
        return Err(ProxyError::config(format!(
            "代理端口与管理端口冲突: {}",
            config.proxy.port
        )));
    }

    if !matches!(config.proxy.default_scheme.as_str(), "http" | "https") {
        return Err(ProxyError::config(format!(
            "不支持的默认协议: {}",
            config.proxy.default_scheme
        )));
    }

    if let Some(upstream) = &config.proxy.upstream {
        crate::proxy::parse_upstream_url(upstream, &config.proxy.default_scheme).map_err(|e| {
            ProxyError::config_with_source(format!("无效的上游地址: {upstream}"), e)
        })?;
    }

    if config.key_pool.default_balance <= 0 {
        return Err(ProxyError::config("默认余额必须大于0"));
    }

    if config.key_pool.auth_header.trim().is_empty() {
        return Err(ProxyError::config("凭证请求头名称不能为空"));
    }

    Ok(())
}

/// 两个监听地址是否可能绑定到同一网卡
fn same_host(a: &str, b: &str) -> bool {
    a == b || a == "0.0.0.0" || b == "0.0.0.0"
}
