//! # 凭证注入
//!
//! 每个下游请求只选择一次密钥；选择失败时请求照常转发，不携带凭证。

use pingora_http::RequestHeader;
use std::sync::Arc;

use crate::config::KeyPoolConfig;
use crate::key_pool::{KeyAcquirer, types::mask_key};
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// 凭证注入器
#[derive(Clone)]
pub struct CredentialInjector {
    acquirer: Arc<dyn KeyAcquirer>,
    header_name: String,
    scheme: String,
}

impl CredentialInjector {
    #[must_use]
    pub fn new(acquirer: Arc<dyn KeyAcquirer>, config: &KeyPoolConfig) -> Self {
        Self {
            acquirer,
            header_name: config.auth_header.trim().to_ascii_lowercase(),
            scheme: config.auth_scheme.trim().to_string(),
        }
    }

    /// 注入的请求头名称
    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// 为一个请求选择凭证，任何失败都只记录日志并返回 `None`
    pub async fn acquire_credential(&self, request_id: &str) -> Option<String> {
        match self.acquirer.acquire_best_key().await {
            Ok(Some(key)) => {
                let masked = mask_key(&key);
                ldebug!(
                    request_id,
                    LogStage::KeyAcquisition,
                    LogComponent::Interceptor,
                    "credential_acquired",
                    "已为请求选择密钥",
                    key = %masked
                );
                Some(key)
            }
            Ok(None) => {
                lwarn!(
                    request_id,
                    LogStage::KeyAcquisition,
                    LogComponent::Interceptor,
                    "no_credential",
                    "密钥池无可用密钥，请求将不带凭证转发"
                );
                None
            }
            Err(e) => {
                lwarn!(
                    request_id,
                    LogStage::KeyAcquisition,
                    LogComponent::Interceptor,
                    "credential_error",
                    "选择密钥失败，请求将不带凭证转发",
                    error = %e
                );
                None
            }
        }
    }

    /// 凭证请求头的值，例如 `Bearer <key>`
    #[must_use]
    pub fn header_value(&self, key: &str) -> String {
        if self.scheme.is_empty() {
            key.to_string()
        } else {
            format!("{} {key}", self.scheme)
        }
    }

    /// 写入凭证请求头，覆盖已有值；没有凭证时不改动请求
    pub fn apply(
        &self,
        request: &mut RequestHeader,
        credential: Option<&str>,
    ) -> pingora_core::Result<bool> {
        let Some(key) = credential else {
            return Ok(false);
        };
        request.insert_header(self.header_name.clone(), self.header_value(key))?;
        Ok(true)
    }
}
