//! # 密钥池数据类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 密钥最大长度（字节），与表结构一致
pub const MAX_KEY_LENGTH: usize = 512;

/// 一条密钥记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// 凭证值，同时是主键
    pub key: String,
    /// 额度计数
    pub balance: i32,
    /// 最近一次被选中的时间
    pub used_at: Option<DateTime<Utc>>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl KeyRecord {
    /// 以当前时间创建一条从未使用过的记录
    #[must_use]
    pub fn new(key: impl Into<String>, balance: i32) -> Self {
        Self {
            key: key.into(),
            balance,
            used_at: None,
            created_at: Utc::now(),
        }
    }

    /// 指定创建时间
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// 指定最近使用时间
    #[must_use]
    pub const fn with_used_at(mut self, used_at: Option<DateTime<Utc>>) -> Self {
        self.used_at = used_at;
        self
    }
}

impl From<entity::keys::Model> for KeyRecord {
    fn from(model: entity::keys::Model) -> Self {
        Self {
            key: model.key,
            balance: model.balance,
            used_at: model.used_at,
            created_at: model.created_at,
        }
    }
}

/// 密钥池统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStats {
    /// 密钥数量
    pub count: i64,
    /// 余额总和
    pub balance: i64,
}

/// 插入密钥参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertKeyParams {
    pub key: String,
}

impl InsertKeyParams {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// 日志中展示的密钥，只保留前四个字符
#[must_use]
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{prefix}****")
    }
}
