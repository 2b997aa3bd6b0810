//! # 数据库配置

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ProxyError, Result};
use crate::{linfo, logging::{LogComponent, LogStage}};

/// 内存存储的 URL 前缀
pub const MEMORY_URL_PREFIX: &str = "memory://";

/// 数据库配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库URL（`postgres://`、`sqlite://` 或 `memory://`）
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout: u64,
    /// 启动时自动执行迁移
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/keys.db?mode=rwc".to_string(),
            max_connections: 10,
            connect_timeout: 30,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// 检查是否为进程内存储
    #[must_use]
    pub fn is_memory_store(&self) -> bool {
        self.url.starts_with(MEMORY_URL_PREFIX)
    }

    /// 检查是否为SQLite数据库
    #[must_use]
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    /// 检查是否为SQLite内存数据库
    #[must_use]
    pub fn is_sqlite_memory(&self) -> bool {
        self.is_sqlite() && self.url.contains(":memory:")
    }

    /// SQLite 文件路径（去掉协议前缀和查询参数）
    #[must_use]
    pub fn sqlite_file_path(&self) -> Option<PathBuf> {
        if !self.is_sqlite() || self.is_sqlite_memory() {
            return None;
        }
        let raw = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))?;
        let path = raw.split('?').next().unwrap_or(raw);
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }

    /// 确保数据库目录存在（仅对SQLite文件数据库）
    pub fn ensure_database_path(&self) -> Result<()> {
        let Some(db_path) = self.sqlite_file_path() else {
            return Ok(());
        };

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ProxyError::config_with_source(
                        format!("无法创建数据库目录: {}", parent.display()),
                        e,
                    )
                })?;
                linfo!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Database,
                    "create_db_dir",
                    &format!("创建数据库目录: {}", parent.display())
                );
            }
        }

        if !Path::new(&db_path).exists() {
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "create_db_file_info",
                &format!("数据库文件将在首次连接时创建: {}", db_path.display())
            );
        }

        Ok(())
    }

    /// 日志里展示的 URL，隐藏密码
    #[must_use]
    pub fn redacted_url(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(mut parsed) if parsed.password().is_some() => {
                let _ = parsed.set_password(Some("***"));
                parsed.to_string()
            }
            _ => self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_url(url: &str) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn test_backend_detection() {
        assert!(with_url("memory://").is_memory_store());
        assert!(with_url("sqlite::memory:").is_sqlite_memory());
        assert!(!with_url("postgres://u:p@localhost/keys").is_sqlite());
    }

    #[test]
    fn test_sqlite_file_path_strips_query() {
        let config = with_url("sqlite://./data/keys.db?mode=rwc");
        assert_eq!(config.sqlite_file_path(), Some(PathBuf::from("./data/keys.db")));
        assert_eq!(with_url("sqlite::memory:").sqlite_file_path(), None);
    }

    #[test]
    fn test_ensure_database_path_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db_file = dir.path().join("nested").join("keys.db");
        let config = with_url(&format!("sqlite://{}?mode=rwc", db_file.display()));

        config.ensure_database_path().unwrap();
        assert!(db_file.parent().unwrap().exists());
    }

    #[test]
    fn test_redacted_url_hides_password() {
        let config = with_url("postgres://proxy:secret@db:5432/keys");
        let shown = config.redacted_url();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("proxy"));
    }
}
