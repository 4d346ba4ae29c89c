//! # 数据库模块
//!
//! 负责患者、检查、DICOM文件、结节、报告、用户和活动日志的存储，
//! 提供SQLite连接池、表结构初始化以及完整的CRUD操作。

pub mod connection;
pub mod models;
pub mod queries;
pub mod schema;

// 重新导出主要类型
pub use connection::DatabasePool;
pub use queries::DatabaseQueries;
pub use schema::{create_tables, seed_default_users};
