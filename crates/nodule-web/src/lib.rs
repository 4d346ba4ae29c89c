//! # Web服务模块
//!
//! 基于axum的REST API：患者、检查、DICOM上传、结节、用户、报告、
//! 工作列表以及上传目录的静态文件服务。

pub mod admin;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod reports;
pub mod server;
pub mod state;
pub mod static_files;
pub mod upload;

pub use error::{ApiError, ApiResult};
pub use server::{build_router, WebServer};
pub use state::{AppState, WebSettings};
