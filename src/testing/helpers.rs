//! # 测试辅助函数

use sea_orm::DatabaseConnection;

use crate::config::DatabaseConfig;
use crate::database::{init_database, run_migrations};
use crate::error::Result;
use crate::key_pool::{KeyRecord, KeyStore};

/// 创建已迁移的 SQLite 内存数据库
pub async fn create_test_db() -> Result<DatabaseConnection> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    let db = init_database(&config).await?;
    run_migrations(&db).await?;
    Ok(db)
}

/// 写入一批记录
pub async fn seed_keys(store: &dyn KeyStore, records: Vec<KeyRecord>) -> Result<()> {
    for record in records {
        store.insert(record).await?;
    }
    Ok(())
}
