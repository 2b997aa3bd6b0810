//! # 错误处理
//!
//! `ProxyError` 是全局错误类型，领域错误（密钥池、数据库、配置）通过 `From` 汇入。

pub mod config;
pub mod database;
pub mod key_pool;
pub mod macros;
pub mod types;

pub use types::ProxyError;

/// 全局 `Result` 别名
pub type Result<T> = std::result::Result<T, ProxyError>;

/// 为任意可转换为 `ProxyError` 的错误附加上下文说明
pub trait Context<T> {
    #[track_caller]
    fn context<C: std::fmt::Display>(self, context: C) -> Result<T>;

    #[track_caller]
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E: Into<ProxyError>> Context<T> for std::result::Result<T, E> {
    fn context<C: std::fmt::Display>(self, context: C) -> Result<T> {
        self.with_context(|| context)
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|error| ProxyError::Context {
            context: f().to_string(),
            source: Box::new(error.into()),
        })
    }
}

/// 错误归类，决定对外暴露的细节程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 调用方输入错误（4xx）
    Client,
    /// 服务端或依赖故障（5xx）
    Server,
}
