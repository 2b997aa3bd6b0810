//! # 进程内密钥存储
//!
//! 每一行带一把独立的 `tokio::sync::Mutex`，通过 `try_lock_owned` 实现非阻塞的跳过锁语义。
//! 修改在提交时才写回表中，丢弃事务即回滚。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::ranking::sort_by_priority;
use super::store::{KeyStore, KeyTransaction};
use super::types::{KeyRecord, KeyStats};
use crate::error::{Result, key_pool::KeyPoolError};

struct MemoryRow {
    record: KeyRecord,
    row_lock: Arc<Mutex<()>>,
}

type Table = Arc<RwLock<BTreeMap<String, MemoryRow>>>;

/// 进程内密钥存储
#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    rows: Table,
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn insert(&self, record: KeyRecord) -> Result<bool> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&record.key) {
            return Ok(false);
        }
        rows.insert(
            record.key.clone(),
            MemoryRow {
                record,
                row_lock: Arc::new(Mutex::new(())),
            },
        );
        Ok(true)
    }

    async fn find(&self, key: &str) -> Result<Option<KeyRecord>> {
        Ok(self.rows.read().await.get(key).map(|row| row.record.clone()))
    }

    async fn count_and_sum_balance(&self) -> Result<KeyStats> {
        let rows = self.rows.read().await;
        Ok(KeyStats {
            count: i64::try_from(rows.len()).unwrap_or(i64::MAX),
            balance: rows.values().map(|row| i64::from(row.record.balance)).sum(),
        })
    }

    async fn begin(&self) -> Result<Box<dyn KeyTransaction>> {
        Ok(Box::new(MemoryKeyTransaction {
            rows: Arc::clone(&self.rows),
            held: None,
            staged_used_at: None,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryKeyTransaction {
    rows: Table,
    held: Option<(String, OwnedMutexGuard<()>)>,
    staged_used_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl KeyTransaction for MemoryKeyTransaction {
    async fn lock_best_available(&mut self) -> Result<Option<String>> {
        if let Some((key, _)) = &self.held {
            return Ok(Some(key.clone()));
        }

        // 持有读锁期间其他事务无法提交，排序快照与加锁尝试看到的是同一状态
        let rows = self.rows.read().await;
        let ranked = sort_by_priority(rows.values().map(|row| &row.record));

        for record in ranked {
            let Some(row) = rows.get(&record.key) else {
                continue;
            };
            if let Ok(guard) = Arc::clone(&row.row_lock).try_lock_owned() {
                self.held = Some((record.key.clone(), guard));
                return Ok(Some(record.key.clone()));
            }
        }

        Ok(None)
    }

    async fn mark_used(&mut self, key: &str, now: DateTime<Utc>) -> Result<()> {
        match &self.held {
            Some((held, _)) if held == key => {
                self.staged_used_at = Some(now);
                Ok(())
            }
            _ => Err(KeyPoolError::KeyNotLocked {
                key: key.to_string(),
            }
            .into()),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            rows,
            held,
            staged_used_at,
        } = *self;

        if let (Some((key, guard)), Some(now)) = (held, staged_used_at) {
            let mut rows = rows.write().await;
            if let Some(row) = rows.get_mut(&key) {
                // used_at 只前进不后退
                row.record.used_at = Some(row.record.used_at.map_or(now, |prev| prev.max(now)));
            }
            drop(guard);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
