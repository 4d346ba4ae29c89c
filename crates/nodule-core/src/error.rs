//! 错误定义模块

use thiserror::Error;

/// 工作列表系统统一错误类型
#[derive(Error, Debug)]
pub enum NoduleError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("DICOM处理错误: {0}")]
    Dicom(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("资源冲突: {0}")]
    Conflict(String),

    #[error("认证失败: {0}")]
    Unauthorized(String),

    #[error("请求体过大: {0}")]
    PayloadTooLarge(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl NoduleError {
    /// 面向客户端的错误描述（不带分类前缀）
    pub fn message(&self) -> String {
        match self {
            NoduleError::Config(msg)
            | NoduleError::Database(msg)
            | NoduleError::Dicom(msg)
            | NoduleError::Storage(msg)
            | NoduleError::Validation(msg)
            | NoduleError::NotFound(msg)
            | NoduleError::Conflict(msg)
            | NoduleError::Unauthorized(msg)
            | NoduleError::PayloadTooLarge(msg)
            | NoduleError::Internal(msg) => msg.clone(),
            NoduleError::Io(e) => e.to_string(),
            NoduleError::Serialization(e) => e.to_string(),
            NoduleError::InvalidStateTransition { from, event } => {
                format!("Cannot apply {} to a study in state {}", event, from)
            }
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for NoduleError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => NoduleError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                NoduleError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                NoduleError::Validation(db_err.message().to_string())
            }
            other => NoduleError::Database(other.to_string()),
        }
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, NoduleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_strips_category() {
        let err = NoduleError::NotFound("Patient not found".to_string());
        assert_eq!(err.message(), "Patient not found");
        assert_eq!(err.to_string(), "资源未找到: Patient not found");
    }

    #[test]
    fn test_state_transition_message() {
        let err = NoduleError::InvalidStateTransition {
            from: "pending".to_string(),
            event: "Reopened".to_string(),
        };
        assert_eq!(err.message(), "Cannot apply Reopened to a study in state pending");
    }
}
