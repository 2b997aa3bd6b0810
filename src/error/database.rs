use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("数据库连接失败: {0}")]
    Connection(String),

    #[error("不支持的数据库URL: {0}")]
    UnsupportedUrl(String),
}
