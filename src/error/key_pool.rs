use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyPoolError {
    #[error("密钥 {key} 未被当前事务锁定")]
    KeyNotLocked { key: String },
}
