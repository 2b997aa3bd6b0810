//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义

pub mod keys;

pub use keys::Entity as Keys;
