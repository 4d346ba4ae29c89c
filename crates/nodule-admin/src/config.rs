//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值、配置文件、`NODULE__` 前缀的环境变量。
//! 命令行参数由启动程序在加载后覆盖。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info};

/// 环境变量前缀，例如 `NODULE__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "NODULE";
pub const ENV_SEPARATOR: &str = "__";

/// 系统完整配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoduleConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 上传存储配置
    pub storage: StorageConfig,
    /// Web服务配置
    pub web: WebConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 启动时写入默认管理员和医生账户
    pub seed_default_users: bool,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite连接字符串
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
}

/// 上传存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// 上传根目录
    pub uploads_dir: String,
    /// 种子检查目录前缀
    pub seed_prefix: String,
}

/// Web服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// 单次上传最多文件数
    pub max_upload_files: usize,
    /// 上传请求体上限（字节）
    pub max_upload_bytes: usize,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 默认过滤级别，`RUST_LOG` 设置时以其为准
    pub level: String,
    pub format: LogFormat,
}

impl Default for NoduleConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            web: WebConfig::default(),
            logging: LoggingConfig::default(),
            seed_default_users: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://nodule.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: "./uploads".to_string(),
            seed_prefix: "STD-".to_string(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            max_upload_files: 500,
            max_upload_bytes: 1024 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

impl NoduleConfig {
    /// 从可选配置文件和进程环境变量加载配置
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(config_path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(env.separator(ENV_SEPARATOR).try_parsing(true))
            .build()
            .context("Failed to read configuration sources")?;

        let config: NoduleConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        ConfigValidator::new().validate(&config)?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 监听地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 配置验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&NoduleConfig) -> Result<()>,
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port",
                validator: |config| {
                    if config.server.port == 0 {
                        Err(anyhow::anyhow!("Server port cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "database.max_connections",
                validator: |config| {
                    if config.database.max_connections == 0 {
                        Err(anyhow::anyhow!("Database max connections cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "web.max_upload_files",
                validator: |config| {
                    if config.web.max_upload_files == 0 {
                        Err(anyhow::anyhow!("At least one file per upload must be allowed"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "storage.uploads_dir",
                validator: |config| {
                    if config.storage.uploads_dir.trim().is_empty() {
                        Err(anyhow::anyhow!("Uploads directory cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &NoduleConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("Invalid {}: {}", rule.field_path, e));
            }
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
