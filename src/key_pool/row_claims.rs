//! # 进程内行占用表
//!
//! SQLite 只有库级写锁，没有 `SKIP LOCKED`。选择事务在这里登记自己占用的密钥，
//! 登记失败说明该行正被其他事务使用，调用方直接换下一行。占用随 [`RowClaim`] 一起释放。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

type ClaimSet = Arc<Mutex<HashSet<String>>>;

/// 同一存储实例共享的占用表
#[derive(Clone, Default)]
pub struct RowClaims {
    claimed: ClaimSet,
}

impl RowClaims {
    /// 尝试占用一行，已被占用时立即返回 `None`
    #[must_use]
    pub fn try_claim(&self, key: &str) -> Option<RowClaim> {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        if !claimed.insert(key.to_string()) {
            return None;
        }
        Some(RowClaim {
            key: key.to_string(),
            claimed: Arc::clone(&self.claimed),
        })
    }

    /// 当前被占用的密钥
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// 一行的占用凭据，丢弃即释放
pub struct RowClaim {
    key: String,
    claimed: ClaimSet,
}

impl RowClaim {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RowClaim {
    fn drop(&mut self) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
