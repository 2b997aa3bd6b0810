//! # 配置管理器
//!
//! 解析配置文件路径、加载 TOML、应用环境变量覆盖并校验

use std::env;
use std::path::{Path, PathBuf};

use super::{AppConfig, validate_config};
use crate::error::{ProxyError, Result};
use crate::{ldebug, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "KEY_POOL_PROXY_CONFIG_PATH";

/// 配置来源
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigSource {
    /// 命令行或环境变量显式指定，文件必须存在
    Explicit(PathBuf),
    /// 按 `RUST_ENV` 推导的默认路径，缺失时使用内置默认值
    Default(PathBuf),
}

/// 配置管理器
pub struct ConfigManager {
    config: AppConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 按 `--config` → `KEY_POOL_PROXY_CONFIG_PATH` → `config/config.{RUST_ENV}.toml` 的顺序加载
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        Self::load_with(cli_path, |name| env::var(name).ok())
    }

    /// 使用自定义环境变量查询函数加载
    pub fn load_with<F>(cli_path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Self::resolve_source(cli_path, &lookup);

        let (mut config, loaded_from) = match &source {
            ConfigSource::Explicit(path) => (Self::load_config_file(path)?, Some(path.clone())),
            ConfigSource::Default(path) if path.exists() => {
                (Self::load_config_file(path)?, Some(path.clone()))
            }
            ConfigSource::Default(path) => {
                lwarn!(
                    "system",
                    LogStage::Configuration,
                    LogComponent::Config,
                    "config_fallback",
                    &format!("配置文件不存在，使用内置默认配置: {}", path.display())
                );
                (AppConfig::default(), None)
            }
        };

        let applied = apply_env_overrides(&mut config, &lookup)?;
        validate_config(&config)?;

        let source_label = loaded_from
            .as_ref()
            .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
        let database_label = config.database.redacted_url();
        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Config,
            "config_loaded",
            "配置加载完成",
            source = %source_label,
            env_overrides = applied,
            database = %database_label
        );

        Ok(Self {
            config,
            source: loaded_from,
        })
    }

    /// 当前配置
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 取出配置
    #[must_use]
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// 实际加载的配置文件（使用默认值时为 `None`）
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn resolve_source<F>(cli_path: Option<&Path>, lookup: &F) -> ConfigSource
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = cli_path {
            return ConfigSource::Explicit(path.to_path_buf());
        }
        if let Some(path) = lookup(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return ConfigSource::Explicit(PathBuf::from(path));
        }
        let env = lookup("RUST_ENV").unwrap_or_else(|| "dev".to_string());
        ConfigSource::Default(PathBuf::from(format!("config/config.{env}.toml")))
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Err(ProxyError::config(format!(
                "配置文件不存在: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| {
            ProxyError::config_with_source(
                format!("TOML解析失败 - 配置文件: {}, 详细错误: {e}", path.display()),
                e,
            )
        })
    }
}

/// 应用环境变量覆盖，返回生效的覆盖数量
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: &F) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;

    let database_url = lookup("DATABASE_URL")
        .filter(|v| !v.is_empty())
        .or_else(|| lookup("GOOSE_DBSTRING").filter(|v| !v.is_empty()));
    if let Some(url) = database_url {
        config.database.url = url;
        applied += 1;
    }

    if let Some(host) = lookup("KEY_POOL_PROXY_HOST") {
        config.proxy.host = host;
        applied += 1;
    }
    if let Some(port) = lookup("KEY_POOL_PROXY_PORT") {
        config.proxy.port = parse_port("KEY_POOL_PROXY_PORT", &port)?;
        applied += 1;
    }
    if let Some(host) = lookup("KEY_POOL_MANAGEMENT_HOST") {
        config.management.bind_address = host;
        applied += 1;
    }
    if let Some(port) = lookup("KEY_POOL_MANAGEMENT_PORT") {
        config.management.port = parse_port("KEY_POOL_MANAGEMENT_PORT", &port)?;
        applied += 1;
    }
    if let Some(upstream) = lookup("KEY_POOL_UPSTREAM") {
        config.proxy.upstream = Some(upstream).filter(|u| !u.is_empty());
        applied += 1;
    }

    ldebug!(
        "system",
        LogStage::Configuration,
        LogComponent::Config,
        "env_overrides",
        "环境变量覆盖已应用",
        count = applied
    );
    Ok(applied)
}

fn parse_port(name: &str, value: &str) -> Result<u16> {
    value.trim().parse().map_err(|e| {
        ProxyError::config_with_source(format!("无效的端口号 {name}={value}"), e)
    })
}
