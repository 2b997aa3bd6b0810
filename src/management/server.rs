//! # 管理服务器
//!
//! Axum HTTP服务器，提供密钥池管理API

use axum::Router;
use axum::extract::DefaultBodyLimit;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::app::context::AppContext;
use crate::config::ManagementConfig;
use crate::error::{ProxyError, Result};
use crate::{linfo, logging::{LogComponent, LogStage}};

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// 管理服务器
pub struct ManagementServer {
    config: ManagementConfig,
    router: Router,
}

impl ManagementServer {
    /// 创建新的管理服务器
    #[must_use]
    pub fn new(config: ManagementConfig, context: Arc<AppContext>) -> Self {
        let router = Self::create_router(AppState::new(context), &config);
        Self { config, router }
    }

    /// 创建路由器
    pub fn create_router(state: AppState, config: &ManagementConfig) -> Router {
        super::routes::create_routes(state).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(config.max_request_size)),
        )
    }

    /// 路由器（测试中直接 oneshot 调用）
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 绑定地址
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.config.socket_addr()
    }

    /// 启动服务器
    pub async fn serve(self) -> Result<()> {
        let addr = self.bind_address()?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            ProxyError::server_init_with_source(format!("管理服务器绑定失败: {addr}"), e)
        })?;
        self.serve_on(listener).await
    }

    /// 在已绑定的监听器上运行
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            &format!("Starting management server on {addr}")
        );

        axum::serve(listener, self.router)
            .await
            .map_err(|e| ProxyError::network_with_source("管理服务器运行失败", e))
    }
}
