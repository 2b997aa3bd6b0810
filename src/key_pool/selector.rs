//! # 密钥选择器
//!
//! 在一次事务内：锁定排名最高且未被占用的密钥，写入 `used_at`，提交后返回。
//! 被其他选择占用的密钥直接跳过，调用方不会互相等待。

use chrono::Utc;
use std::sync::Arc;

use super::store::KeyStore;
use super::types::mask_key;
use crate::error::Result;
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// 并发安全的密钥选择器
#[derive(Clone)]
pub struct KeySelector {
    store: Arc<dyn KeyStore>,
}

impl KeySelector {
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// 选出当前最优的可用密钥并标记为已使用
    ///
    /// 没有密钥或所有密钥都被占用时返回 `Ok(None)`。任何错误都会回滚事务后向上返回。
    pub async fn acquire_best_key(&self) -> Result<Option<String>> {
        let mut tx = self.store.begin().await?;

        let key = match tx.lock_best_available().await {
            Ok(Some(key)) => key,
            Ok(None) => {
                tx.rollback().await?;
                ldebug!(
                    "system",
                    LogStage::KeyAcquisition,
                    LogComponent::KeySelector,
                    "no_key_available",
                    "没有可用密钥",
                    backend = self.store.backend_name()
                );
                return Ok(None);
            }
            Err(e) => {
                Self::rollback_quietly(tx).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.mark_used(&key, Utc::now()).await {
            Self::rollback_quietly(tx).await;
            return Err(e);
        }

        tx.commit().await?;

        let masked = mask_key(&key);
        ldebug!(
            "system",
            LogStage::KeyAcquisition,
            LogComponent::KeySelector,
            "key_acquired",
            "密钥选择完成",
            key = %masked,
            backend = self.store.backend_name()
        );
        Ok(Some(key))
    }

    /// 已经在处理错误时，回滚失败只记录日志
    async fn rollback_quietly(tx: Box<dyn super::store::KeyTransaction>) {
        if let Err(e) = tx.rollback().await {
            lwarn!(
                "system",
                LogStage::KeyAcquisition,
                LogComponent::KeySelector,
                "rollback_failed",
                &format!("回滚密钥选择事务失败: {e}")
            );
        }
    }
}
