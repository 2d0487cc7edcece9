//! 事件持久化/传输模型（SerializedEvent）
//!
//! 事件在 Outbox 与总线上的标准形态：元信息 + JSON 载荷 + 业务上下文。
//! 由发布器在写事务内构造，之后不可变。
//!
use crate::{
    aggregate::Aggregate,
    domain_event::{BusinessContext, DomainEvent, IntegrationEvent},
    error::{DomainError, DomainResult},
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// 事件唯一标识符（同时作为 Outbox 记录标识）
    event_id: String,
    /// 事件类型，即总线主题
    event_type: String,
    /// 聚合 ID，标识事件所属的聚合根实例
    aggregate_id: String,
    /// 聚合类型
    aggregate_type: String,
    /// 产生事件后的聚合版本
    aggregate_version: usize,
    /// 关联 ID，用于将多个事件关联到同一个业务操作
    correlation_id: Option<String>,
    /// 因果 ID，用于表示事件的触发来源
    causation_id: Option<String>,
    /// 触发事件的主体类型（如用户、系统等）
    actor_type: Option<String>,
    /// 触发事件的主体 ID
    actor_id: Option<String>,
    /// 事件发生时间
    occurred_at: DateTime<Utc>,
    /// 事件负载（扁平快照）
    payload: Value,
    /// 业务上下文信息（冗余存储，便于查询）
    context: Value,
}

impl SerializedEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_version(&self) -> usize {
        self.aggregate_version
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn actor_type(&self) -> Option<&str> {
        self.actor_type.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    /// 将载荷反序列化为具体契约类型
    pub fn decode<T: DeserializeOwned>(&self) -> DomainResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(DomainError::from)
    }

    /// 校验事件类型后再反序列化
    pub fn decode_as<T: IntegrationEvent>(&self) -> DomainResult<T> {
        if self.event_type != T::EVENT_TYPE {
            return Err(DomainError::TypeMismatch {
                expected: T::EVENT_TYPE.to_string(),
                found: self.event_type.clone(),
            });
        }
        self.decode()
    }

    /// 由聚合事件构造（写事务内调用）
    pub fn from_domain_event<A>(
        aggregate: &A,
        event: &A::Event,
        context: &BusinessContext,
    ) -> DomainResult<Self>
    where
        A: Aggregate,
    {
        Ok(Self {
            event_id: Uuid::new_v4().to_string(),
            event_type: event.event_type().to_string(),
            aggregate_id: event.aggregate_id(),
            aggregate_type: A::TYPE.to_string(),
            aggregate_version: aggregate.version(),
            correlation_id: context.correlation_id().map(|s| s.to_string()),
            causation_id: context.causation_id().map(|s| s.to_string()),
            actor_type: context.actor_type().map(|s| s.to_string()),
            actor_id: context.actor_id().map(|s| s.to_string()),
            occurred_at: Utc::now(),
            payload: event.to_payload()?,
            context: serde_json::to_value(context)?,
        })
    }

    /// 由集成事件构造一条全新的事件（例如故障修复后的重新发布）
    pub fn from_integration_event<T>(
        aggregate_type: &str,
        event: &T,
        context: &BusinessContext,
    ) -> DomainResult<Self>
    where
        T: IntegrationEvent,
    {
        Ok(Self {
            event_id: Uuid::new_v4().to_string(),
            event_type: T::EVENT_TYPE.to_string(),
            aggregate_id: event.aggregate_id(),
            aggregate_type: aggregate_type.to_string(),
            aggregate_version: 0,
            correlation_id: context.correlation_id().map(|s| s.to_string()),
            causation_id: context.causation_id().map(|s| s.to_string()),
            actor_type: context.actor_type().map(|s| s.to_string()),
            actor_id: context.actor_id().map(|s| s.to_string()),
            occurred_at: Utc::now(),
            payload: serde_json::to_value(event)?,
            context: serde_json::to_value(context)?,
        })
    }
}
