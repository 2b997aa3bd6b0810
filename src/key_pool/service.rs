//! # 密钥账本服务
//!
//! 对外暴露插入、选择、统计三个操作，拦截器和管理接口只依赖这里的能力 trait。

use async_trait::async_trait;
use std::sync::Arc;

use super::selector::KeySelector;
use super::store::KeyStore;
use super::types::{InsertKeyParams, KeyRecord, KeyStats, mask_key};
use crate::error::Result;
use crate::{linfo, logging::{LogComponent, LogStage}};

/// 为请求选择凭证的能力
#[async_trait]
pub trait KeyAcquirer: Send + Sync {
    /// 选出最优可用密钥，没有可用密钥时返回 `None`
    async fn acquire_best_key(&self) -> Result<Option<String>>;
}

/// 管理密钥池的能力
#[async_trait]
pub trait KeyAdmin: Send + Sync {
    /// 幂等插入
    async fn insert_key(&self, params: InsertKeyParams) -> Result<()>;

    /// 密钥数量与余额总和
    async fn get_key_stats(&self) -> Result<KeyStats>;
}

/// 密钥账本服务
#[derive(Clone)]
pub struct KeyLedgerService {
    store: Arc<dyn KeyStore>,
    selector: KeySelector,
    default_balance: i32,
}

impl KeyLedgerService {
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>, default_balance: i32) -> Self {
        Self {
            selector: KeySelector::new(Arc::clone(&store)),
            store,
            default_balance,
        }
    }

    /// 底层存储
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }
}

#[async_trait]
impl KeyAcquirer for KeyLedgerService {
    async fn acquire_best_key(&self) -> Result<Option<String>> {
        self.selector.acquire_best_key().await
    }
}

#[async_trait]
impl KeyAdmin for KeyLedgerService {
    async fn insert_key(&self, params: InsertKeyParams) -> Result<()> {
        let masked = mask_key(&params.key);
        let inserted = self
            .store
            .insert(KeyRecord::new(params.key, self.default_balance))
            .await?;

        linfo!(
            "system",
            LogStage::Management,
            LogComponent::KeyStore,
            "insert_key",
            if inserted { "密钥已加入密钥池" } else { "密钥已存在，忽略" },
            key = %masked
        );
        Ok(())
    }

    async fn get_key_stats(&self) -> Result<KeyStats> {
        self.store.count_and_sum_balance().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_KEY_BALANCE;
    use crate::key_pool::memory_store::MemoryKeyStore;
    use pretty_assertions::assert_eq;

    fn service() -> KeyLedgerService {
        KeyLedgerService::new(Arc::new(MemoryKeyStore::new()), DEFAULT_KEY_BALANCE)
    }

    #[tokio::test]
    async fn test_insert_uses_default_balance() {
        let service = service();
        service.insert_key(InsertKeyParams::new("jina_1")).await.unwrap();
        service.insert_key(InsertKeyParams::new("jina_1")).await.unwrap();

        let record = service.store().find("jina_1").await.unwrap().unwrap();
        assert_eq!(record.balance, DEFAULT_KEY_BALANCE);
        assert_eq!(record.used_at, None);
        assert_eq!(
            service.get_key_stats().await.unwrap(),
            KeyStats {
                count: 1,
                balance: i64::from(DEFAULT_KEY_BALANCE)
            }
        );
    }

    #[tokio::test]
    async fn test_acquire_delegates_to_selector() {
        let service = service();
        assert_eq!(service.acquire_best_key().await.unwrap(), None);

        service.insert_key(InsertKeyParams::new("jina_1")).await.unwrap();
        assert_eq!(service.acquire_best_key().await.unwrap().as_deref(), Some("jina_1"));
        assert!(service.store().find("jina_1").await.unwrap().unwrap().used_at.is_some());
    }
}
