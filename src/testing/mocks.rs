//! # 测试 Mock 对象
//!
//! 密钥池能力 trait 的 Mock 实现

use async_trait::async_trait;
use mockall::mock;

use crate::error::Result;
use crate::key_pool::{InsertKeyParams, KeyAcquirer, KeyAdmin, KeyStats};

mock! {
    /// Mock 密钥选择能力
    pub KeyAcquirer {}

    #[async_trait]
    impl KeyAcquirer for KeyAcquirer {
        async fn acquire_best_key(&self) -> Result<Option<String>>;
    }
}

mock! {
    /// Mock 密钥管理能力
    pub KeyAdmin {}

    #[async_trait]
    impl KeyAdmin for KeyAdmin {
        async fn insert_key(&self, params: InsertKeyParams) -> Result<()>;
        async fn get_key_stats(&self) -> Result<KeyStats>;
    }
}
