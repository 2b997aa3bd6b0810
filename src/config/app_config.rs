//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{ProxyError, Result};

/// 新插入密钥的默认余额
pub const DEFAULT_KEY_BALANCE: i32 = 1_000_000;

/// 应用主配置结构
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 数据库配置
    pub database: super::DatabaseConfig,
    /// 代理端口配置
    pub proxy: ProxyConfig,
    /// 管理端口配置
    pub management: ManagementConfig,
    /// 密钥池配置
    pub key_pool: KeyPoolConfig,
}

/// 代理服务配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 固定上游地址，例如 `https://api.jina.ai`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    /// 仅凭 Host 头解析上游时使用的协议
    pub default_scheme: String,
    /// 上游连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 上游读取超时（秒）
    pub read_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            upstream: None,
            default_scheme: "https".to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 120,
        }
    }
}

impl ProxyConfig {
    /// 代理监听地址字符串
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 管理服务配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// 绑定地址
    pub bind_address: String,
    /// 监听端口
    pub port: u16,
    /// 请求体大小上限（字节）
    pub max_request_size: usize,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 9090,
            max_request_size: 64 * 1024,
        }
    }
}

impl ManagementConfig {
    /// 解析管理服务监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| {
                ProxyError::config_with_source(
                    format!("无效的管理服务地址: {}:{}", self.bind_address, self.port),
                    e,
                )
            })
    }
}

/// 密钥池配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPoolConfig {
    /// 新密钥的初始余额
    pub default_balance: i32,
    /// 注入凭证的请求头名称
    pub auth_header: String,
    /// 凭证前缀，例如 `Bearer`
    pub auth_scheme: String,
}

impl Default for KeyPoolConfig {
    fn default() -> Self {
        Self {
            default_balance: DEFAULT_KEY_BALANCE,
            auth_header: "authorization".to_string(),
            auth_scheme: "Bearer".to_string(),
        }
    }
}
