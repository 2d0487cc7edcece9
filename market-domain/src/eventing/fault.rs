//! 故障处理（FaultConsumer）
//!
//! 消费 `Fault<T>`：取第一条异常在修复规则表中查找，
//! 命中且产出修复后的载荷 → 作为一条全新事件经 Outbox 重新发布；
//! 否则交给 `FaultRecorder` 记录，留待人工处理，消息照常确认。
//!
use super::handler::{EventHandler, HandledEventType};
use crate::contracts::{ExceptionInfo, Fault, fault_event_type, faulted_event_type};
use crate::domain_event::{BusinessContext, IntegrationEvent};
use crate::error::{DomainError, DomainResult};
use crate::persist::{AuctionRepository, OutboxId, SerializedEvent, UnitOfWork};
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// 修复规则：对可识别的失败给出修复后的载荷
pub trait RepairRule<T>: Send + Sync {
    fn name(&self) -> &str;

    /// 不适用时返回 `None`
    fn repair(&self, exception: &ExceptionInfo, message: &T) -> Option<T>;
}

/// 重新发布通道（经 Outbox，不直接访问总线）
#[async_trait]
pub trait Republisher: Send + Sync {
    async fn republish(&self, event: SerializedEvent) -> DomainResult<OutboxId>;
}

/// 以只追加 Outbox 的工作单元提交到主存储
pub struct OutboxRepublisher {
    repository: Arc<dyn AuctionRepository>,
}

impl OutboxRepublisher {
    pub fn new(repository: Arc<dyn AuctionRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Republisher for OutboxRepublisher {
    async fn republish(&self, event: SerializedEvent) -> DomainResult<OutboxId> {
        let mut uow = UnitOfWork::new();
        let id = uow.append(event);
        self.repository.commit(uow).await?;
        Ok(id)
    }
}

/// 留待人工处理的故障
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub fault_event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub exceptions: Vec<ExceptionInfo>,
    pub attempts: u32,
    pub consumer_group: String,
    pub recorded_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl FaultRecord {
    /// 故障事件本身处理失败且重试耗尽：保留原故障内容，追加最后一次错误
    pub fn unresolved(event: &SerializedEvent, err: &DomainError) -> Self {
        let event_type = faulted_event_type(event.event_type())
            .unwrap_or(event.event_type())
            .to_string();
        let last = ExceptionInfo::from(err);
        let base = Self {
            fault_event_id: event.event_id().to_string(),
            event_type,
            aggregate_id: event.aggregate_id().to_string(),
            exceptions: vec![],
            attempts: 0,
            consumer_group: String::new(),
            recorded_at: Utc::now(),
            payload: event.payload().clone(),
        };

        match event.decode::<Fault<serde_json::Value>>() {
            Ok(fault) => {
                let mut exceptions = fault.exceptions;
                exceptions.push(last);
                Self {
                    exceptions,
                    attempts: fault.attempts,
                    consumer_group: fault.consumer_group,
                    payload: fault.message,
                    ..base
                }
            }
            Err(_) => Self {
                exceptions: vec![last],
                ..base
            },
        }
    }
}

#[async_trait]
pub trait FaultRecorder: Send + Sync {
    async fn record(&self, record: FaultRecord) -> DomainResult<()>;
}

/// 内存故障日志
#[derive(Clone, Default)]
pub struct FaultLog {
    entries: Arc<Mutex<Vec<FaultRecord>>>,
}

impl FaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<FaultRecord> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FaultRecorder for FaultLog {
    async fn record(&self, record: FaultRecord) -> DomainResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultDecision {
    Repaired { rule: String, outbox_id: OutboxId },
    Recorded,
}

#[derive(Builder)]
pub struct FaultConsumer<T: IntegrationEvent> {
    #[builder(default = String::from("fault-handler"), into)]
    name: String,
    /// 重新发布事件的聚合类型
    #[builder(into)]
    aggregate_type: String,
    #[builder(default)]
    rules: Vec<Arc<dyn RepairRule<T>>>,
    republisher: Arc<dyn Republisher>,
    recorder: Arc<dyn FaultRecorder>,
}

impl<T: IntegrationEvent> FaultConsumer<T> {
    pub async fn resolve(&self, event: &SerializedEvent) -> DomainResult<FaultDecision> {
        let fault: Fault<T> = event.decode()?;

        if let Some(exception) = fault.first_exception() {
            for rule in &self.rules {
                let Some(repaired) = rule.repair(exception, &fault.message) else {
                    continue;
                };

                let context = BusinessContext::builder()
                    .maybe_correlation_id(event.correlation_id().map(str::to_string))
                    .causation_id(event.event_id().to_string())
                    .actor_type("system".to_string())
                    .actor_id(self.name.clone())
                    .build();
                let republished = SerializedEvent::from_integration_event(
                    &self.aggregate_type,
                    &repaired,
                    &context,
                )?;
                let new_event_id = republished.event_id().to_string();
                let outbox_id = self.republisher.republish(republished).await?;

                info!(
                    fault_event_id = %event.event_id(),
                    aggregate_id = %event.aggregate_id(),
                    rule = %rule.name(),
                    new_event_id = %new_event_id,
                    "fault repaired and republished"
                );
                return Ok(FaultDecision::Repaired {
                    rule: rule.name().to_string(),
                    outbox_id,
                });
            }
        }

        warn!(
            fault_event_id = %event.event_id(),
            aggregate_id = %event.aggregate_id(),
            attempts = fault.attempts,
            consumer_group = %fault.consumer_group,
            "no repair rule matched, fault recorded for manual handling"
        );
        self.recorder
            .record(FaultRecord {
                fault_event_id: event.event_id().to_string(),
                event_type: T::EVENT_TYPE.to_string(),
                aggregate_id: event.aggregate_id().to_string(),
                exceptions: fault.exceptions,
                attempts: fault.attempts,
                consumer_group: fault.consumer_group,
                recorded_at: Utc::now(),
                payload: serde_json::to_value(&fault.message)?,
            })
            .await?;
        Ok(FaultDecision::Recorded)
    }
}

#[async_trait]
impl<T: IntegrationEvent> EventHandler for FaultConsumer<T> {
    fn handler_name(&self) -> &str {
        &self.name
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::One(fault_event_type(T::EVENT_TYPE))
    }

    async fn handle(&self, event: &SerializedEvent) -> DomainResult<()> {
        self.resolve(event).await.map(|_| ())
    }
}
