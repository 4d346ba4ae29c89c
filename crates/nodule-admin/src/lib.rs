//! # 运维管理模块
//!
//! 提供服务配置加载与校验、日志初始化等启动期功能

pub mod config;
pub mod logging;

pub use config::{
    ConfigValidator, DatabaseConfig, LogFormat, LoggingConfig, NoduleConfig, ServerConfig,
    StorageConfig, WebConfig,
};
pub use logging::init_logging;
