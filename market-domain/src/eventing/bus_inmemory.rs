//! 内存版事件总线（InMemoryEventBus）
//!
//! 模拟带持久队列的消息中间件，满足 `EventBus` 协议：
//! - `publish`：把事件复制到绑定该主题的每个队列（每个消费组一份）；
//! - `subscribe`：同一队列的多个订阅者竞争消费，每条消息只投给其中一个；
//! - `nack`/未结算丢弃：消息回到队首，重投计数 +1，保持同一队列内的顺序；
//! - `set_available(false)`：模拟中间件宕机，发布返回错误；
//! - `published`：已确认发布的事件记录，便于测试断言。
//!
//! 典型用途：测试环境、示例与本地开发。
//!
use super::bus::{Acknowledger, Delivery, EventBus};
use super::topology::queue_name;
use crate::error::{DomainError, DomainResult as Result};
use crate::persist::SerializedEvent;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Message {
    event: SerializedEvent,
    redelivery_count: u32,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Message>,
    unacked: HashMap<u64, Message>,
}

struct Queue {
    name: String,
    state: Mutex<QueueState>,
    notify: Notify,
    next_tag: AtomicU64,
}

impl Queue {
    fn new(name: String) -> Self {
        Self {
            name,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            next_tag: AtomicU64::new(1),
        }
    }

    fn push(&self, event: SerializedEvent) {
        lock(&self.state).ready.push_back(Message {
            event,
            redelivery_count: 0,
        });
        self.notify.notify_one();
    }

    fn try_take(self: &Arc<Self>) -> Option<Delivery> {
        let mut state = lock(&self.state);
        let message = state.ready.pop_front()?;
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed);
        let delivery = Delivery::new(
            message.event.clone(),
            message.redelivery_count,
            tag,
            self.clone(),
        );
        state.unacked.insert(tag, message);
        Some(delivery)
    }

    async fn take(self: Arc<Self>) -> Delivery {
        loop {
            if let Some(delivery) = self.try_take() {
                return delivery;
            }
            self.notify.notified().await;
        }
    }

    fn depth(&self) -> usize {
        let state = lock(&self.state);
        state.ready.len() + state.unacked.len()
    }
}

impl Acknowledger for Queue {
    fn ack(&self, delivery_tag: u64) {
        lock(&self.state).unacked.remove(&delivery_tag);
    }

    fn nack(&self, delivery_tag: u64) {
        let mut state = lock(&self.state);
        if let Some(mut message) = state.unacked.remove(&delivery_tag) {
            message.redelivery_count += 1;
            tracing::debug!(
                queue = %self.name,
                event_id = %message.event.event_id(),
                redelivery_count = message.redelivery_count,
                "message requeued"
            );
            state.ready.push_front(message);
            drop(state);
            self.notify.notify_one();
        }
    }
}

#[derive(Default)]
struct Topology {
    queues: HashMap<String, Arc<Queue>>,
    bindings: HashMap<String, Vec<Arc<Queue>>>,
}

struct BusInner {
    available: AtomicBool,
    topology: Mutex<Topology>,
    published: Mutex<Vec<SerializedEvent>>,
}

/// 内存事件总线
#[derive(Clone)]
pub struct InMemoryEventBus {
    inner: Arc<BusInner>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                available: AtomicBool::new(true),
                topology: Mutex::new(Topology::default()),
                published: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 模拟中间件宕机/恢复
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// 已确认发布的全部事件
    pub fn published(&self) -> Vec<SerializedEvent> {
        lock(&self.inner.published).clone()
    }

    pub fn published_of(&self, event_type: &str) -> Vec<SerializedEvent> {
        lock(&self.inner.published)
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// 队列中尚未确认的消息数（含投递中）
    pub fn queue_depth(&self, queue: &str) -> usize {
        lock(&self.inner.topology)
            .queues
            .get(queue)
            .map(|q| q.depth())
            .unwrap_or(0)
    }

    fn declare_queue(&self, topic: &str, consumer_group: &str) -> Arc<Queue> {
        let name = queue_name(consumer_group, topic);
        let mut topology = lock(&self.inner.topology);
        if let Some(queue) = topology.queues.get(&name) {
            return queue.clone();
        }

        let queue = Arc::new(Queue::new(name.clone()));
        topology.queues.insert(name, queue.clone());
        topology
            .bindings
            .entry(topic.to_string())
            .or_default()
            .push(queue.clone());
        queue
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: &SerializedEvent) -> Result<()> {
        if !self.is_available() {
            return Err(DomainError::event_bus("broker unavailable"));
        }

        let queues = lock(&self.inner.topology)
            .bindings
            .get(event.event_type())
            .cloned()
            .unwrap_or_default();
        if queues.is_empty() {
            tracing::debug!(event_type = %event.event_type(), "no queue bound to topic");
        }
        for queue in queues {
            queue.push(event.clone());
        }

        lock(&self.inner.published).push(event.clone());
        Ok(())
    }

    async fn declare(&self, topic: &str, consumer_group: &str) -> Result<String> {
        Ok(self.declare_queue(topic, consumer_group).name.clone())
    }

    async fn subscribe(
        &self,
        topic: &str,
        consumer_group: &str,
    ) -> Result<BoxStream<'static, Result<Delivery>>> {
        if !self.is_available() {
            return Err(DomainError::event_bus("broker unavailable"));
        }

        let queue = self.declare_queue(topic, consumer_group);
        let deliveries = stream::unfold(queue, |queue| async move {
            let delivery = queue.clone().take().await;
            Some((Ok(delivery), queue))
        });
        Ok(Box::pin(deliveries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::BusinessContext;
    use chrono::Utc;
    use futures_util::StreamExt;
    use std::time::Duration;

    fn mk_event(id: &str, ty: &str) -> SerializedEvent {
        SerializedEvent::builder()
            .event_id(id.to_string())
            .event_type(ty.to_string())
            .aggregate_id("agg-1".to_string())
            .aggregate_type("auction".to_string())
            .aggregate_version(1)
            .occurred_at(Utc::now())
            .payload(serde_json::json!({ "id": id }))
            .context(serde_json::to_value(BusinessContext::default()).unwrap())
            .build()
    }

    #[tokio::test]
    async fn each_group_receives_its_own_copy() {
        let bus = InMemoryEventBus::new();
        let mut search = bus.subscribe("AuctionCreated", "search").await.unwrap();
        let mut bidding = bus.subscribe("AuctionCreated", "bidding").await.unwrap();

        bus.publish(&mk_event("e1", "AuctionCreated")).await.unwrap();

        let a = search.next().await.unwrap().unwrap();
        let b = bidding.next().await.unwrap().unwrap();
        assert_eq!(a.event().event_id(), "e1");
        assert_eq!(b.event().event_id(), "e1");
        a.ack();
        b.ack();
        assert_eq!(bus.queue_depth("search-auction-created"), 0);
    }

    #[tokio::test]
    async fn declared_queue_retains_messages_without_subscribers() {
        let bus = InMemoryEventBus::new();
        let name = bus.declare("AuctionCreated", "search").await.unwrap();
        assert_eq!(name, "search-auction-created");

        bus.publish(&mk_event("e1", "AuctionCreated")).await.unwrap();
        assert_eq!(bus.queue_depth(&name), 1);

        let mut sub = bus.subscribe("AuctionCreated", "search").await.unwrap();
        let d = sub.next().await.unwrap().unwrap();
        assert_eq!(d.event().event_id(), "e1");
        d.ack();
    }

    #[tokio::test]
    async fn nack_and_drop_redeliver_at_head() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe("AuctionCreated", "search").await.unwrap();
        bus.publish(&mk_event("e1", "AuctionCreated")).await.unwrap();
        bus.publish(&mk_event("e2", "AuctionCreated")).await.unwrap();

        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.redelivery_count(), 0);
        first.nack();

        let again = sub.next().await.unwrap().unwrap();
        assert_eq!(again.event().event_id(), "e1");
        assert_eq!(again.redelivery_count(), 1);
        drop(again);

        let third = sub.next().await.unwrap().unwrap();
        assert_eq!(third.event().event_id(), "e1");
        assert_eq!(third.redelivery_count(), 2);
        third.ack();

        let next = sub.next().await.unwrap().unwrap();
        assert_eq!(next.event().event_id(), "e2");
        next.ack();
    }

    #[tokio::test]
    async fn competing_consumers_share_one_queue() {
        let bus = InMemoryEventBus::new();
        let mut c1 = bus.subscribe("AuctionCreated", "search").await.unwrap();
        let mut c2 = bus.subscribe("AuctionCreated", "search").await.unwrap();
        bus.publish(&mk_event("e1", "AuctionCreated")).await.unwrap();

        let got = c1.next().await.unwrap().unwrap();
        got.ack();
        let other = tokio::time::timeout(Duration::from_millis(50), c2.next()).await;
        assert!(other.is_err(), "message must be delivered once per group");
    }

    #[tokio::test]
    async fn unavailable_broker_rejects_publish() {
        let bus = InMemoryEventBus::new();
        bus.set_available(false);
        let err = bus
            .publish(&mk_event("e1", "AuctionCreated"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "EventBus");
        assert!(bus.published().is_empty());

        bus.set_available(true);
        bus.publish(&mk_event("e1", "AuctionCreated")).await.unwrap();
        assert_eq!(bus.published_of("AuctionCreated").len(), 1);
    }
}
