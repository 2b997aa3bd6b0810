//! # 凭证密钥池实体定义
//!
//! 共享密钥池表 `keys` 的 Sea-ORM 实体模型，密钥值本身即主键

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 密钥池记录
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "keys")]
pub struct Model {
    /// 凭证值，创建后不可变
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    /// 额度计数，仅在创建时写入
    pub balance: i32,
    /// 最近一次被选中的时间，从未使用时为空
    pub used_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
