//! # 双端口服务器生命周期
//!
//! 管理服务器与 Pingora 代理并行运行，Ctrl+C、SIGTERM 或任一服务器退出即触发关闭

use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::app::AppContext;
use crate::config::AppConfig;
use crate::error::Result;
use crate::management::ManagementServer;
use crate::proxy::PingoraProxyServer;
use crate::{lerror, linfo, logging::{LogComponent, LogStage}};

/// 从上下文构建两个服务器实例
#[must_use]
pub fn create_servers(context: &Arc<AppContext>) -> (ManagementServer, PingoraProxyServer) {
    let config = &context.config;

    let management_addr = format!("{}:{}", config.management.bind_address, config.management.port);
    let proxy_addr = config.proxy.listen_addr();
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::ServerSetup,
        "listen_info",
        "服务器监听地址",
        management = %management_addr,
        proxy = %proxy_addr
    );

    let management_server = ManagementServer::new(config.management.clone(), Arc::clone(context));
    let proxy_server =
        PingoraProxyServer::new(Arc::clone(config), Arc::clone(&context.key_acquirer));
    (management_server, proxy_server)
}

/// 处理 Ctrl+C 信号
async fn handle_ctrl_c_signal() -> String {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl+C signal".to_string(),
        Err(e) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "ctrl_c_error",
                &format!("Failed to listen for Ctrl+C: {e:?}")
            );
            "Ctrl+C handler error".to_string()
        }
    }
}

/// 等待 SIGTERM
///
/// 监听在调用时立即注册，返回的 future 只负责等待。
#[cfg(unix)]
fn terminate_signal() -> impl Future<Output = String> {
    use tokio::signal::unix::{SignalKind, signal};

    let listener = signal(SignalKind::terminate());
    async move {
        match listener {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM signal".to_string()
            }
            Err(e) => {
                lerror!(
                    "system",
                    LogStage::Shutdown,
                    LogComponent::ServerSetup,
                    "sigterm_error",
                    &format!("Failed to listen for SIGTERM: {e:?}")
                );
                std::future::pending().await
            }
        }
    }
}

#[cfg(not(unix))]
fn terminate_signal() -> impl Future<Output = String> {
    std::future::pending()
}

/// 处理服务器任务退出结果
fn handle_task_result(
    server_name: &str,
    result: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> String {
    match result {
        Ok(Ok(())) => format!("{server_name} exit"),
        Ok(Err(e)) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "server_error",
                &format!("{server_name} error: {e:?}")
            );
            format!("{server_name} error")
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "server_panic",
                &format!("{server_name} panicked: {e:?}")
            );
            format!("{server_name} panic")
        }
    }
}

/// 等待关闭原因
async fn await_shutdown_reason(
    management_task: &mut JoinHandle<Result<()>>,
    proxy_task: &mut JoinHandle<Result<()>>,
) -> String {
    tokio::select! {
        reason = handle_ctrl_c_signal() => reason,
        reason = terminate_signal() => reason,
        result = management_task => handle_task_result("Management server", result),
        result = proxy_task => handle_task_result("Proxy server", result),
    }
}

/// 启动两个服务器并阻塞到关闭
pub async fn run_servers(config: AppConfig) -> Result<()> {
    let context = Arc::new(AppContext::build(config).await?);
    let (management_server, proxy_server) = create_servers(&context);

    let mut management_task = tokio::spawn(async move { management_server.serve().await });
    let mut proxy_task = tokio::spawn(async move { proxy_server.start().await });

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::ServerSetup,
        "all_components_started",
        "All components started"
    );

    let reason = await_shutdown_reason(&mut management_task, &mut proxy_task).await;

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::ServerSetup,
        "shutdown_initiated",
        "开始关闭服务",
        reason = %reason
    );

    // Pingora 在阻塞线程里运行，abort 只会丢弃句柄；进程退出时一并结束
    management_task.abort();
    proxy_task.abort();

    Ok(())
}
