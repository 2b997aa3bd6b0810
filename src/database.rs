//! # 数据库模块
//!
//! 数据库连接和迁移管理

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{ProxyError, Result, database::DatabaseError};
use crate::{lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    if !(config.is_sqlite() || config.url.starts_with("postgres")) {
        return Err(DatabaseError::UnsupportedUrl(config.redacted_url()).into());
    }

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "connect",
        &format!("正在连接数据库: {}", config.redacted_url())
    );

    config.ensure_database_path()?;

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);

    // 内存数据库每个连接都是独立的库
    if config.is_sqlite_memory() {
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await.map_err(|e| {
        ProxyError::from(DatabaseError::Connection(format!(
            "{}: {e}",
            config.redacted_url()
        )))
    })?;

    linfo!("system", LogStage::Startup, LogComponent::Database, "connected", "数据库连接成功");
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    linfo!("system", LogStage::Startup, LogComponent::Database, "migrate", "开始运行数据库迁移");

    match ::migration::Migrator::up(db, None).await {
        Ok(()) => {
            linfo!("system", LogStage::Startup, LogComponent::Database, "migrate", "数据库迁移完成");
            Ok(())
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "migrate",
                &format!("数据库迁移失败: {e}")
            );
            Err(ProxyError::database_with_source("数据库迁移失败", e))
        }
    }
}

/// 检查是否存在未应用的迁移
pub async fn check_database_status(db: &DatabaseConnection) -> Result<usize> {
    let pending = ::migration::Migrator::get_pending_migrations(db).await?;

    if pending.is_empty() {
        linfo!("system", LogStage::Startup, LogComponent::Database, "migration_status", "所有迁移都已应用");
    } else {
        lwarn!(
            "system",
            LogStage::Startup,
            LogComponent::Database,
            "migration_status",
            &format!("有 {} 个待应用的迁移", pending.len())
        );
    }

    Ok(pending.len())
}
