//! # 管理接口处理器

pub mod keys;
pub mod system;
