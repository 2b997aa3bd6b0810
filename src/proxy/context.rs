//! # 代理上下文模块

use std::time::Instant;
use uuid::Uuid;

use super::upstream::UpstreamTarget;

/// 请求上下文
#[derive(Debug, Clone)]
pub struct ProxyContext {
    /// 请求ID
    pub request_id: String,
    /// 开始时间
    pub start_time: Instant,
    /// 本次请求选中的密钥，整个请求期间只选择一次
    pub credential: Option<String>,
    /// 解析得到的上游
    pub upstream: Option<UpstreamTarget>,
    /// 下游请求的路径与查询串
    pub path_and_query: String,
}

impl Default for ProxyContext {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            start_time: Instant::now(),
            credential: None,
            upstream: None,
            path_and_query: "/".to_string(),
        }
    }
}

impl ProxyContext {
    /// 是否已注入凭证
    #[must_use]
    pub const fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}
