//! 事件发布器（EventPublisher）
//!
//! 在写事务内把事件序列化并追加到工作单元的 Outbox 部分，
//! 随实体写入一起提交；从不直接访问总线。
//!
use crate::aggregate::Aggregate;
use crate::domain_event::{BusinessContext, IntegrationEvent};
use crate::error::DomainResult;
use crate::persist::{OutboxId, SerializedEvent, UnitOfWork};

pub struct EventPublisher<'a> {
    unit_of_work: &'a mut UnitOfWork,
    context: &'a BusinessContext,
}

impl<'a> EventPublisher<'a> {
    pub fn new(unit_of_work: &'a mut UnitOfWork, context: &'a BusinessContext) -> Self {
        Self {
            unit_of_work,
            context,
        }
    }

    /// 追加聚合刚产生（且已 apply）的事件
    pub fn domain_events<A: Aggregate>(
        &mut self,
        aggregate: &A,
        events: &[A::Event],
    ) -> DomainResult<Vec<OutboxId>> {
        let mut ids = Vec::with_capacity(events.len());
        for event in events {
            let serialized = SerializedEvent::from_domain_event(aggregate, event, self.context)?;
            ids.push(self.unit_of_work.append(serialized));
        }
        Ok(ids)
    }

    pub fn integration_event<T: IntegrationEvent>(
        &mut self,
        aggregate_type: &str,
        event: &T,
    ) -> DomainResult<OutboxId> {
        let serialized =
            SerializedEvent::from_integration_event(aggregate_type, event, self.context)?;
        Ok(self.unit_of_work.append(serialized))
    }
}
