//! # Key Pool Proxy 主程序
//!
//! 基于 Pingora 的凭据注入代理，附带密钥管理 API

use std::path::PathBuf;

use clap::Parser;
use key_pool_proxy::{
    Result,
    config::ConfigManager,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    server_setup,
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "key-pool-proxy", version, about)]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别（未设置 `RUST_LOG` 时生效）
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref());

    let config = ConfigManager::load(args.config.as_deref())?.into_config();

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动"
    );
    if let Err(e) = server_setup::run_servers(config).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务启动失败: {e:?}")
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}
