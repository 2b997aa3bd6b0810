//! 上游地址解析工具
//!
//! 上游来源依次为：配置的固定上游、absolute-form 请求 URI、`Host` 请求头。
//! 输出可用于 Pingora 的 `host:port`、`Host` 头和 SNI。

use axum::http::Uri;
use url::{Host, Url};

use crate::ensure;
use crate::error::{ProxyError, Result, config::ConfigError};

/// 解析后的上游目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// `host:port`
    pub addr: String,
    /// 发往上游的 `Host` 头
    pub host_header: String,
    /// TLS SNI
    pub sni: String,
    /// 是否使用 TLS
    pub tls: bool,
    /// 路径前缀（固定上游带路径时使用）
    pub base_path: String,
}

impl UpstreamTarget {
    /// 把原始请求的路径与查询串拼到上游路径前缀之后
    #[must_use]
    pub fn upstream_path(&self, path_and_query: &str) -> String {
        let prefix = self.base_path.trim_end_matches('/');
        if prefix.is_empty() {
            path_and_query.to_string()
        } else if path_and_query.starts_with('/') {
            format!("{prefix}{path_and_query}")
        } else {
            format!("{prefix}/{path_and_query}")
        }
    }
}

/// 解析上游 URL；没有协议时使用 `default_scheme`
pub fn parse_upstream_url(raw: &str, default_scheme: &str) -> Result<UpstreamTarget> {
    let trimmed = raw.trim();
    ensure!(
        !trimmed.is_empty(),
        ConfigError::Load("上游地址不能为空".to_string())
    );

    let url = if trimmed.contains("://") {
        Url::parse(trimmed)?
    } else {
        Url::parse(&format!("{default_scheme}://{trimmed}"))?
    };

    let tls = match url.scheme() {
        "https" => true,
        "http" => false,
        other => {
            return Err(ProxyError::validation(
                format!("不支持的上游协议: {other}"),
                Some("upstream"),
            ));
        }
    };

    let host = url
        .host()
        .ok_or_else(|| ConfigError::Load(format!("上游地址缺少 host: {trimmed}")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ConfigError::Load(format!("上游地址缺少端口: {trimmed}")))?;

    let (host_display, sni) = match host {
        Host::Domain(domain) => (domain.to_string(), domain.to_string()),
        Host::Ipv4(ip) => (ip.to_string(), ip.to_string()),
        Host::Ipv6(ip) => (format!("[{ip}]"), ip.to_string()),
    };

    let addr = format!("{host_display}:{port}");
    let host_header = if url.port().is_some() {
        format!("{host_display}:{port}")
    } else {
        host_display
    };

    Ok(UpstreamTarget {
        addr,
        host_header,
        sni,
        tls,
        base_path: url.path().to_string(),
    })
}

/// 为一个下游请求确定上游
pub fn resolve_upstream(
    fixed: Option<&UpstreamTarget>,
    uri: &Uri,
    host_header: Option<&str>,
    default_scheme: &str,
) -> Result<UpstreamTarget> {
    if let Some(target) = fixed {
        return Ok(target.clone());
    }

    if let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) {
        let mut target = parse_upstream_url(&format!("{scheme}://{authority}"), default_scheme)?;
        target.base_path = String::new();
        return Ok(target);
    }

    if let Some(host) = host_header.map(str::trim).filter(|h| !h.is_empty()) {
        let mut target = parse_upstream_url(host, default_scheme)?;
        target.base_path = String::new();
        return Ok(target);
    }

    Err(ProxyError::validation(
        "无法确定上游地址：请求既不是 absolute-form，也没有 Host 头",
        Some("host"),
    ))
}

/// absolute-form 或 origin-form URI 的路径与查询部分
#[must_use]
pub fn origin_path(uri: &Uri) -> &str {
    uri.path_and_query().map_or("/", |pq| pq.as_str())
}
