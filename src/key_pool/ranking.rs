//! # 密钥优先级排序
//!
//! 选择顺序：`created_at` 降序，`used_at` 升序（从未使用排在最后），`balance` 降序，
//! 最后按密钥值升序，得到严格全序。SQL 后端的 `ORDER BY` 与此保持一致。

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use super::types::KeyRecord;

/// 比较两条记录的选择优先级，`Less` 表示 `a` 更优先
#[must_use]
pub fn compare_priority(a: &KeyRecord, b: &KeyRecord) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| compare_used_at(a.used_at, b.used_at))
        .then_with(|| b.balance.cmp(&a.balance))
        .then_with(|| a.key.cmp(&b.key))
}

/// 升序，`None` 排在所有时间之后（NULLS LAST）
fn compare_used_at(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 按优先级排序
pub fn sort_by_priority<'a, I>(records: I) -> Vec<&'a KeyRecord>
where
    I: IntoIterator<Item = &'a KeyRecord>,
{
    let mut sorted: Vec<&KeyRecord> = records.into_iter().collect();
    sorted.sort_by(|a, b| compare_priority(a, b));
    sorted
}
