//! # 数据库密钥存储
//!
//! 基于 Sea-ORM 的 `keys` 表实现。候选顺序为
//! `ORDER BY created_at DESC, used_at ASC NULLS LAST, balance DESC, key ASC LIMIT 1`。
//!
//! - Postgres/MySQL：在数据库事务内追加 `FOR UPDATE SKIP LOCKED`。
//! - SQLite：没有行锁，改由进程内占用表跳过正在使用的行；
//!   `used_at` 暂存到提交时以单条 `UPDATE` 写入，不持有跨语句的写事务。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::keys;
use sea_orm::sea_query::{Expr, LockBehavior, LockType, NullOrdering, OnConflict, Order};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait, UpdateMany,
};
use std::sync::Arc;

use super::row_claims::{RowClaim, RowClaims};
use super::store::{KeyStore, KeyTransaction};
use super::types::{KeyRecord, KeyStats, mask_key};
use crate::error::{Context, ProxyError, Result, key_pool::KeyPoolError};
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// 数据库密钥存储
#[derive(Clone)]
pub struct DatabaseKeyStore {
    db: Arc<DatabaseConnection>,
    claims: RowClaims,
}

impl DatabaseKeyStore {
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            claims: RowClaims::default(),
        }
    }
}

/// 按优先级排序的单条候选查询
fn best_candidate() -> Select<keys::Entity> {
    keys::Entity::find()
        .select_only()
        .column(keys::Column::Key)
        .order_by_desc(keys::Column::CreatedAt)
        .order_by_with_nulls(keys::Column::UsedAt, Order::Asc, NullOrdering::Last)
        .order_by_desc(keys::Column::Balance)
        .order_by_asc(keys::Column::Key)
        .limit(1)
}

/// 写入使用时间，`used_at` 只前进不后退
fn advance_used_at(key: &str, now: DateTime<Utc>) -> UpdateMany<keys::Entity> {
    keys::Entity::update_many()
        .col_expr(keys::Column::UsedAt, Expr::value(now))
        .filter(keys::Column::Key.eq(key))
        .filter(
            Condition::any()
                .add(keys::Column::UsedAt.is_null())
                .add(keys::Column::UsedAt.lt(now)),
        )
}

fn not_locked(key: &str) -> ProxyError {
    KeyPoolError::KeyNotLocked {
        key: mask_key(key),
    }
    .into()
}

#[async_trait]
impl KeyStore for DatabaseKeyStore {
    async fn insert(&self, record: KeyRecord) -> Result<bool> {
        let masked = mask_key(&record.key);
        let model = keys::ActiveModel {
            key: Set(record.key),
            balance: Set(record.balance),
            used_at: Set(record.used_at),
            created_at: Set(record.created_at),
        };

        let affected = keys::Entity::insert(model)
            .on_conflict(OnConflict::column(keys::Column::Key).do_nothing().to_owned())
            .exec_without_returning(self.db.as_ref())
            .await
            .context("插入密钥失败")?;

        ldebug!(
            "system",
            LogStage::Management,
            LogComponent::KeyStore,
            "insert_key",
            "密钥写入完成",
            key = %masked,
            inserted = affected > 0
        );
        Ok(affected > 0)
    }

    async fn find(&self, key: &str) -> Result<Option<KeyRecord>> {
        let model = keys::Entity::find_by_id(key.to_string())
            .one(self.db.as_ref())
            .await
            .context("查询密钥失败")?;
        Ok(model.map(KeyRecord::from))
    }

    async fn count_and_sum_balance(&self) -> Result<KeyStats> {
        let row: Option<(i64, Option<i64>)> = keys::Entity::find()
            .select_only()
            .column_as(Expr::col(keys::Column::Key).count(), "count")
            .column_as(Expr::col(keys::Column::Balance).sum(), "balance")
            .into_tuple()
            .one(self.db.as_ref())
            .await
            .context("统计密钥失败")?;

        let (count, balance) = row.unwrap_or((0, None));
        Ok(KeyStats {
            count,
            balance: balance.unwrap_or(0),
        })
    }

    async fn begin(&self) -> Result<Box<dyn KeyTransaction>> {
        if self.db.get_database_backend() == DbBackend::Sqlite {
            return Ok(Box::new(SqliteKeyTransaction {
                db: Arc::clone(&self.db),
                claims: self.claims.clone(),
                claim: None,
                staged_used_at: None,
            }));
        }

        let txn = self.db.begin().await.context("开启密钥选择事务失败")?;
        Ok(Box::new(DatabaseKeyTransaction { txn, locked: None }))
    }

    fn backend_name(&self) -> &'static str {
        match self.db.get_database_backend() {
            DbBackend::Postgres => "postgres",
            DbBackend::Sqlite => "sqlite",
            _ => "mysql",
        }
    }
}

/// 行锁事务（Postgres/MySQL）
struct DatabaseKeyTransaction {
    txn: DatabaseTransaction,
    locked: Option<String>,
}

#[async_trait]
impl KeyTransaction for DatabaseKeyTransaction {
    async fn lock_best_available(&mut self) -> Result<Option<String>> {
        let key: Option<String> = best_candidate()
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .into_tuple()
            .one(&self.txn)
            .await
            .context("锁定候选密钥失败")?;

        self.locked.clone_from(&key);
        Ok(key)
    }

    async fn mark_used(&mut self, key: &str, now: DateTime<Utc>) -> Result<()> {
        if self.locked.as_deref() != Some(key) {
            return Err(not_locked(key));
        }

        advance_used_at(key, now)
            .exec(&self.txn)
            .await
            .context("更新密钥使用时间失败")?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.txn.commit().await.context("提交密钥选择事务失败")
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.txn.rollback().await.context("回滚密钥选择事务失败")
    }
}

/// SQLite 选择事务：占用表代替行锁，提交时一次写入
struct SqliteKeyTransaction {
    db: Arc<DatabaseConnection>,
    claims: RowClaims,
    claim: Option<RowClaim>,
    staged_used_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl KeyTransaction for SqliteKeyTransaction {
    async fn lock_best_available(&mut self) -> Result<Option<String>> {
        if let Some(claim) = &self.claim {
            return Ok(Some(claim.key().to_string()));
        }

        loop {
            let busy = self.claims.snapshot();
            let mut query = best_candidate();
            if !busy.is_empty() {
                query = query.filter(keys::Column::Key.is_not_in(busy));
            }

            let Some(key) = query
                .into_tuple::<String>()
                .one(self.db.as_ref())
                .await
                .context("查询候选密钥失败")?
            else {
                return Ok(None);
            };

            // 查询与登记之间被其他事务抢先占用时，带着新的快照重查
            if let Some(claim) = self.claims.try_claim(&key) {
                self.claim = Some(claim);
                return Ok(Some(key));
            }
        }
    }

    async fn mark_used(&mut self, key: &str, now: DateTime<Utc>) -> Result<()> {
        match &self.claim {
            Some(claim) if claim.key() == key => {
                self.staged_used_at = Some(now);
                Ok(())
            }
            _ => Err(not_locked(key)),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            db,
            claim,
            staged_used_at,
            ..
        } = *self;

        if let (Some(claim), Some(now)) = (claim, staged_used_at) {
            advance_used_at(claim.key(), now)
                .exec(db.as_ref())
                .await
                .context("更新密钥使用时间失败")?;
            drop(claim);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_test_db, seed_keys};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    async fn store_with(records: Vec<KeyRecord>) -> DatabaseKeyStore {
        let store = DatabaseKeyStore::new(Arc::new(create_test_db().await.unwrap()));
        seed_keys(&store, records).await.unwrap();
        store
    }

    async fn lock_and_commit(store: &DatabaseKeyStore) -> Option<String> {
        let mut tx = store.begin().await.unwrap();
        let key = tx.lock_best_available().await.unwrap();
        if let Some(key) = &key {
            tx.mark_used(key, Utc::now()).await.unwrap();
        }
        tx.commit().await.unwrap();
        key
    }

    #[tokio::test]
    async fn test_latest_created_wins() {
        let store = store_with(vec![
            KeyRecord::new("old", 9_000).with_created_at(at(1)),
            KeyRecord::new("new", 1).with_created_at(at(2)).with_used_at(Some(at(9))),
        ])
        .await;
        assert_eq!(lock_and_commit(&store).await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_earlier_used_wins() {
        let store = store_with(vec![
            KeyRecord::new("recent", 100).with_created_at(at(1)).with_used_at(Some(at(5))),
            KeyRecord::new("earlier", 100).with_created_at(at(1)).with_used_at(Some(at(2))),
        ])
        .await;
        assert_eq!(lock_and_commit(&store).await.as_deref(), Some("earlier"));
    }

    #[tokio::test]
    async fn test_used_key_beats_never_used() {
        let store = store_with(vec![
            KeyRecord::new("never", 100).with_created_at(at(1)),
            KeyRecord::new("used", 100).with_created_at(at(1)).with_used_at(Some(at(2))),
        ])
        .await;
        assert_eq!(lock_and_commit(&store).await.as_deref(), Some("used"));
    }

    #[tokio::test]
    async fn test_higher_balance_wins() {
        let store = store_with(vec![
            KeyRecord::new("poor", 1000).with_created_at(at(1)).with_used_at(Some(at(2))),
            KeyRecord::new("rich", 2000).with_created_at(at(1)).with_used_at(Some(at(2))),
        ])
        .await;
        assert_eq!(lock_and_commit(&store).await.as_deref(), Some("rich"));
    }

    #[tokio::test]
    async fn test_acquisition_sets_used_at() {
        let store = store_with(vec![KeyRecord::new("k", 1)]).await;
        let before = Utc::now() - Duration::milliseconds(1);

        assert_eq!(lock_and_commit(&store).await.as_deref(), Some("k"));
        let used_at = store.find("k").await.unwrap().unwrap().used_at.unwrap();
        assert!(used_at >= before);
    }

    #[tokio::test]
    async fn test_rollback_discards_mark() {
        let store = store_with(vec![KeyRecord::new("k", 1)]).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_best_available().await.unwrap();
        tx.mark_used("k", Utc::now()).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.find("k").await.unwrap().unwrap().used_at, None);
    }

    #[tokio::test]
    async fn test_in_flight_row_is_skipped() {
        let store = store_with(vec![
            KeyRecord::new("best", 10).with_created_at(at(2)),
            KeyRecord::new("second", 10).with_created_at(at(1)),
        ])
        .await;

        let mut first = store.begin().await.unwrap();
        assert_eq!(first.lock_best_available().await.unwrap().as_deref(), Some("best"));

        let mut second = store.begin().await.unwrap();
        assert_eq!(second.lock_best_available().await.unwrap().as_deref(), Some("second"));

        let mut third = store.begin().await.unwrap();
        assert_eq!(third.lock_best_available().await.unwrap(), None);
        third.rollback().await.unwrap();

        first.rollback().await.unwrap();
        let mut fourth = store.begin().await.unwrap();
        assert_eq!(fourth.lock_best_available().await.unwrap().as_deref(), Some("best"));

        // 丢弃未提交的事务同样释放占用
        drop(fourth);
        drop(second);
        assert_eq!(lock_and_commit(&store).await.as_deref(), Some("best"));
    }

    #[tokio::test]
    async fn test_used_at_written_on_commit() {
        let store = store_with(vec![KeyRecord::new("k", 1)]).await;
        let now = Utc::now();

        let mut tx = store.begin().await.unwrap();
        let key = tx.lock_best_available().await.unwrap().unwrap();
        tx.mark_used(&key, now).await.unwrap();
        assert_eq!(store.find("k").await.unwrap().unwrap().used_at, None);

        tx.commit().await.unwrap();
        let used_at = store.find("k").await.unwrap().unwrap().used_at.unwrap();
        assert!(used_at >= now - Duration::seconds(1));
    }

    #[tokio::test]
    async fn test_mark_used_requires_claim() {
        let store = store_with(vec![KeyRecord::new("a", 1), KeyRecord::new("b", 1)]).await;
        let mut tx = store.begin().await.unwrap();
        assert!(tx.mark_used("a", Utc::now()).await.is_err());

        let locked = tx.lock_best_available().await.unwrap().unwrap();
        let other = if locked == "a" { "b" } else { "a" };
        assert!(tx.mark_used(other, Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_table() {
        let store = store_with(Vec::new()).await;
        assert_eq!(lock_and_commit(&store).await, None);
        assert_eq!(store.count_and_sum_balance().await.unwrap(), KeyStats::default());
    }

    #[tokio::test]
    async fn test_insert_idempotent_and_stats() {
        let store = store_with(vec![
            KeyRecord::new("a", 1000).with_created_at(at(1)),
            KeyRecord::new("b", 2000),
            KeyRecord::new("c", 3000),
        ])
        .await;

        assert!(!store.insert(KeyRecord::new("a", 5)).await.unwrap());
        let a = store.find("a").await.unwrap().unwrap();
        assert_eq!(a.balance, 1000);
        assert_eq!(a.created_at, at(1));

        assert_eq!(
            store.count_and_sum_balance().await.unwrap(),
            KeyStats {
                count: 3,
                balance: 6000
            }
        );
        assert_eq!(store.backend_name(), "sqlite");
    }
}
