use crate::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 故障事件类型：`Fault<AuctionCreated>`
pub fn fault_event_type(event_type: &str) -> String {
    format!("Fault<{event_type}>")
}

pub fn is_fault_event_type(event_type: &str) -> bool {
    faulted_event_type(event_type).is_some()
}

/// `Fault<AuctionCreated>` → `AuctionCreated`
pub fn faulted_event_type(event_type: &str) -> Option<&str> {
    event_type.strip_prefix("Fault<")?.strip_suffix('>')
}

/// 单次处理失败的分类与描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    pub exception_type: String,
    pub message: String,
}

impl From<&DomainError> for ExceptionInfo {
    fn from(err: &DomainError) -> Self {
        Self {
            exception_type: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// 消费失败且重试耗尽后，由消费运行时发出的故障事件。
///
/// `message` 为原始载荷；运行时以 `Fault<serde_json::Value>` 构造，
/// 故障处理器按具体契约类型反序列化为 `Fault<T>`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fault<T> {
    pub message: T,
    pub exceptions: Vec<ExceptionInfo>,
    pub attempts: u32,
    pub consumer_group: String,
    pub faulted_at: DateTime<Utc>,
}

impl<T> Fault<T> {
    pub fn first_exception(&self) -> Option<&ExceptionInfo> {
        self.exceptions.first()
    }
}
