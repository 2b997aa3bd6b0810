//! # Pingora 代理服务器
//!
//! 引导 Pingora `Server`，在 `proxy.host:proxy.port` 上注册凭证注入代理并在阻塞线程中运行

use pingora_core::server::{Server, configuration::Opt};
use pingora_proxy::http_proxy_service;
use std::sync::Arc;

use super::injector::CredentialInjector;
use super::service::KeyInjectionProxy;
use crate::config::AppConfig;
use crate::error::{ProxyError, Result};
use crate::key_pool::KeyAcquirer;
use crate::{linfo, logging::{LogComponent, LogStage}};

/// Pingora 代理服务器
pub struct PingoraProxyServer {
    config: Arc<AppConfig>,
    acquirer: Arc<dyn KeyAcquirer>,
}

impl PingoraProxyServer {
    /// 创建新的代理服务器
    #[must_use]
    pub fn new(config: Arc<AppConfig>, acquirer: Arc<dyn KeyAcquirer>) -> Self {
        Self { config, acquirer }
    }

    /// 创建Pingora服务器选项
    fn create_pingora_options() -> Opt {
        Opt {
            daemon: false,
            upgrade: false,
            nocapture: true,
            ..Opt::default()
        }
    }

    /// 代理服务器监听地址
    #[must_use]
    pub fn get_server_address(&self) -> String {
        self.config.proxy.listen_addr()
    }

    /// 构建代理服务
    pub fn build_service(&self) -> Result<KeyInjectionProxy> {
        let injector = CredentialInjector::new(Arc::clone(&self.acquirer), &self.config.key_pool);
        KeyInjectionProxy::new(injector, &self.config.proxy)
    }

    /// 启动服务器，直到 Pingora 退出才返回
    pub async fn start(self) -> Result<()> {
        let proxy_service = self.build_service()?;

        let mut server = Server::new(Some(Self::create_pingora_options()))
            .map_err(|e| ProxyError::server_init_with_source("创建Pingora服务器失败", *e))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "bootstrapping_server",
            "启动Pingora服务器引导"
        );
        server.bootstrap();

        let mut http_service = http_proxy_service(&server.configuration, proxy_service);
        let server_address = self.get_server_address();
        http_service.add_tcp(&server_address);
        server.add_service(http_service);

        let upstream_label = self
            .config
            .proxy
            .upstream
            .clone()
            .unwrap_or_else(|| "per-request".to_string());
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "starting_server",
            "启动Pingora代理服务器",
            address = %server_address,
            upstream = %upstream_label
        );

        tokio::task::spawn_blocking(move || {
            server.run_forever();
        })
        .await
        .map_err(|e| ProxyError::server_start(format!("Pingora服务器任务失败: {e}")))
    }
}
