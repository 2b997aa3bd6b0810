//! # 凭证密钥池模块
//!
//! 共享密钥池的存储、并发安全的选择算法以及对外的账本服务

pub mod database_store;
pub mod memory_store;
pub mod ranking;
mod row_claims;
pub mod selector;
pub mod service;
pub mod store;
pub mod types;

pub use database_store::DatabaseKeyStore;
pub use memory_store::MemoryKeyStore;
pub use selector::KeySelector;
pub use service::{KeyAcquirer, KeyAdmin, KeyLedgerService};
pub use store::{KeyStore, KeyTransaction};
pub use types::{InsertKeyParams, KeyRecord, KeyStats};

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::database::{check_database_status, init_database, run_migrations};
use crate::error::Result;
use crate::{linfo, logging::{LogComponent, LogStage}};

/// 按数据库 URL 打开对应的存储后端
///
/// `memory://` 使用进程内存储，其余 URL 连接数据库，并在 `auto_migrate` 时执行迁移。
pub async fn open_key_store(config: &DatabaseConfig) -> Result<Arc<dyn KeyStore>> {
    let store: Arc<dyn KeyStore> = if config.is_memory_store() {
        Arc::new(MemoryKeyStore::new())
    } else {
        let db = init_database(config).await?;
        if config.auto_migrate {
            run_migrations(&db).await?;
        } else {
            check_database_status(&db).await?;
        }
        Arc::new(DatabaseKeyStore::new(Arc::new(db)))
    };

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::KeyStore,
        "open_store",
        "密钥存储已就绪",
        backend = store.backend_name()
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_store() {
        let config = DatabaseConfig {
            url: "memory://".to_string(),
            ..DatabaseConfig::default()
        };
        let store = open_key_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_open_sqlite_store_runs_migrations() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        let store = open_key_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "sqlite");
        assert!(store.insert(KeyRecord::new("k", 1)).await.unwrap());
    }
}
