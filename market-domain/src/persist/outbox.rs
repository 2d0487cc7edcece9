//! Outbox 存储协议
//!
//! 记录在拥有它的事务提交后才可见，按提交顺序返回以保持同一聚合的因果顺序。
//!
use super::serialized_event::SerializedEvent;
use crate::error::DomainResult as Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outbox 记录标识（等于事件 ID）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutboxId(String);

impl OutboxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OutboxId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for OutboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    Pending,
    Sent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// 提交顺序
    pub sequence: u64,
    pub id: OutboxId,
    pub event: SerializedEvent,
    pub status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl OutboxRecord {
    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }
}

/// Outbox 存储：调度器从中拉取待投递事件并回写投递结果
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// 按提交顺序拉取至多 `limit` 条待投递记录
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxRecord>>;

    /// 总线确认后标记为已发送
    async fn mark_sent(&self, id: &OutboxId) -> Result<()>;

    /// 记录一次投递失败（增加 attempts，保持 pending）
    async fn mark_failed(&self, id: &OutboxId, reason: &str) -> Result<()>;

    async fn pending_count(&self) -> Result<usize>;
}
