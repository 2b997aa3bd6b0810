//! # 密钥存储接口
//!
//! 存储后端负责持久化与行级加锁，选择算法本身在 [`super::selector::KeySelector`] 中实现。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{KeyRecord, KeyStats};
use crate::error::Result;

/// 密钥存储
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// 插入一条记录；主键已存在时不做任何修改，返回 `false`
    async fn insert(&self, record: KeyRecord) -> Result<bool>;

    /// 按密钥值读取记录
    async fn find(&self, key: &str) -> Result<Option<KeyRecord>>;

    /// 统计密钥数量与余额总和，空表返回 `(0, 0)`
    async fn count_and_sum_balance(&self) -> Result<KeyStats>;

    /// 开启一次选择事务
    async fn begin(&self) -> Result<Box<dyn KeyTransaction>>;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &'static str;
}

/// 单次选择的事务视图
///
/// 未提交就被丢弃的事务等同于回滚。
#[async_trait]
pub trait KeyTransaction: Send {
    /// 按优先级锁定第一条可以立即加锁的记录；已被其他事务锁定的记录直接跳过
    async fn lock_best_available(&mut self) -> Result<Option<String>>;

    /// 将当前事务锁定的记录标记为已使用
    async fn mark_used(&mut self, key: &str, now: DateTime<Utc>) -> Result<()>;

    /// 提交
    async fn commit(self: Box<Self>) -> Result<()>;

    /// 回滚
    async fn rollback(self: Box<Self>) -> Result<()>;
}
