//! 事件总线（EventBus）协议
//!
//! 至少一次投递：发布确认后不会静默丢失，可能重复。订阅返回 'static 生命周期的
//! 投递流，便于在 tokio::spawn 中消费；每条投递必须显式 `ack` 或 `nack`，
//! 未结算即丢弃的投递视同 `nack` 并被重新投递。
//!
use crate::{error::DomainResult as Result, persist::SerializedEvent};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use std::sync::Arc;

/// 事件总线：主题即事件类型，队列按（主题，消费组）声明
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &SerializedEvent) -> Result<()>;

    async fn publish_batch(&self, events: &[SerializedEvent]) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// 声明持久队列并绑定到主题（幂等），返回队列名
    async fn declare(&self, topic: &str, consumer_group: &str) -> Result<String>;

    /// 订阅某消费组在该主题上的队列；同组内每条消息只投给一个订阅者
    async fn subscribe(
        &self,
        topic: &str,
        consumer_group: &str,
    ) -> Result<BoxStream<'static, Result<Delivery>>>;
}

/// 投递结算回调，由具体总线实现
pub trait Acknowledger: Send + Sync {
    fn ack(&self, delivery_tag: u64);

    /// 放回队首等待重投（重投计数 +1）
    fn nack(&self, delivery_tag: u64);
}

/// 一次投递
pub struct Delivery {
    event: SerializedEvent,
    redelivery_count: u32,
    delivery_tag: u64,
    acknowledger: Arc<dyn Acknowledger>,
    settled: bool,
}

impl Delivery {
    pub fn new(
        event: SerializedEvent,
        redelivery_count: u32,
        delivery_tag: u64,
        acknowledger: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            event,
            redelivery_count,
            delivery_tag,
            acknowledger,
            settled: false,
        }
    }

    pub fn event(&self) -> &SerializedEvent {
        &self.event
    }

    /// 此前已被重投的次数（首次投递为 0）
    pub fn redelivery_count(&self) -> u32 {
        self.redelivery_count
    }

    pub fn ack(mut self) {
        self.settled = true;
        self.acknowledger.ack(self.delivery_tag);
    }

    pub fn nack(mut self) {
        self.settled = true;
        self.acknowledger.nack(self.delivery_tag);
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.settled {
            self.acknowledger.nack(self.delivery_tag);
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("event_id", &self.event.event_id())
            .field("event_type", &self.event.event_type())
            .field("redelivery_count", &self.redelivery_count)
            .field("delivery_tag", &self.delivery_tag)
            .finish()
    }
}
