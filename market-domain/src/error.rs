//! 领域层统一错误定义
//!
//! 聚焦序列化、事件系统、仓储与领域规则校验等最小必要集合，
//! 便于在各实现层统一转换为 `DomainError`。
//!
//! `DomainError::kind` 给出稳定的异常分类标签，写入故障事件的 `exceptionType`，
//! 故障处理器据此匹配修复规则。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 事件系统 ---
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
    #[error("event handler error: handler={handler}, reason={reason}")]
    EventHandler { handler: String, reason: String },
    #[error("handler already registered: event_type={event_type}")]
    HandlerAlreadyRegistered { event_type: String },
    #[error("timed out after {elapsed_ms}ms: {operation}")]
    Timeout { operation: String, elapsed_ms: u128 },

    // --- 仓储/持久化 ---
    #[error("outbox error: {reason}")]
    Outbox { reason: String },
    #[error("database error: {reason}")]
    Database { reason: String },
    #[error("version conflict: expected={expected}, actual={actual}")]
    VersionConflict { expected: usize, actual: usize },

    // --- 领域规则 ---
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
    #[error("unauthorized: actor={actor}, owner={owner}")]
    Unauthorized { actor: String, owner: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },
    #[error("unknown aggregate: type={aggregate_type}, id={aggregate_id}")]
    UnknownAggregate {
        aggregate_type: String,
        aggregate_id: String,
    },
}

impl DomainError {
    pub fn event_bus(reason: impl Into<String>) -> Self {
        Self::EventBus {
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// 稳定的异常分类标签（不随错误信息文本变化）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serde { .. } => "Serialization",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::EventBus { .. } => "EventBus",
            Self::EventHandler { .. } => "EventHandler",
            Self::HandlerAlreadyRegistered { .. } => "HandlerAlreadyRegistered",
            Self::Timeout { .. } => "Timeout",
            Self::Outbox { .. } => "Outbox",
            Self::Database { .. } => "Database",
            Self::VersionConflict { .. } => "VersionConflict",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::InvalidValue { .. } => "InvalidValue",
            Self::Unauthorized { .. } => "Unauthorized",
            Self::NotFound { .. } => "NotFound",
            Self::UnknownAggregate { .. } => "UnknownAggregate",
        }
    }

    /// 基础设施类的瞬时故障（可重试，不属于业务错误）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::EventBus { .. }
                | Self::Timeout { .. }
                | Self::Database { .. }
                | Self::Outbox { .. }
        )
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::InvalidValue {
            reason: err.to_string(),
        }
    }
}
