//! 应用上下文
//!
//! 统一持有跨模块共享的服务实例，便于在测试中注入替身实现。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::key_pool::{KeyAcquirer, KeyAdmin, KeyLedgerService, open_key_store};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    /// 管理接口使用的能力
    pub key_admin: Arc<dyn KeyAdmin>,
    /// 代理拦截器使用的能力
    pub key_acquirer: Arc<dyn KeyAcquirer>,
}

impl AppContext {
    pub fn new(
        config: Arc<AppConfig>,
        key_admin: Arc<dyn KeyAdmin>,
        key_acquirer: Arc<dyn KeyAcquirer>,
    ) -> Self {
        Self {
            config,
            key_admin,
            key_acquirer,
        }
    }

    /// 两种能力都由同一个账本服务提供
    pub fn from_ledger(config: Arc<AppConfig>, ledger: Arc<KeyLedgerService>) -> Self {
        Self::new(config, ledger.clone(), ledger)
    }

    /// 打开存储并组装上下文
    pub async fn build(config: AppConfig) -> Result<Self> {
        let store = open_key_store(&config.database).await?;
        let ledger = Arc::new(KeyLedgerService::new(store, config.key_pool.default_balance));
        Ok(Self::from_ledger(Arc::new(config), ledger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_pool::InsertKeyParams;

    #[tokio::test]
    async fn test_build_with_memory_store() {
        let mut config = AppConfig::default();
        config.database.url = "memory://".to_string();

        let context = AppContext::build(config).await.unwrap();
        context.key_admin.insert_key(InsertKeyParams::new("k1")).await.unwrap();

        // 管理与拦截两侧看到同一个密钥池
        assert_eq!(context.key_acquirer.acquire_best_key().await.unwrap().as_deref(), Some("k1"));
        assert_eq!(context.key_admin.get_key_stats().await.unwrap().count, 1);
    }
}
