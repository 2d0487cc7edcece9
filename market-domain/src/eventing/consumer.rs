//! 消费运行时（ConsumerRuntime）
//!
//! 单条消息的生命周期：`Received → Handling → {Acked | Retrying | Faulted}`。
//! - 处理成功后才确认（ack）；
//! - 失败且仍有重试额度：等待 `retry.interval`（可被关闭打断）后 nack，消息回到队首；
//! - 额度耗尽：发布 `Fault<T>`（原始载荷 + 异常列表）后确认；故障事件发布失败则 nack，
//!   消息不丢失；
//! - 故障事件自身重试耗尽时不产生“故障的故障”，而是交给 `FaultRecorder`；
//!   记录失败则 nack。
//!
use super::bus::{Delivery, EventBus};
use super::fault::{FaultRecord, FaultRecorder};
use super::handler::EventHandler;
use super::retry::RetryPolicy;
use crate::contracts::{ExceptionInfo, Fault, fault_event_type, is_fault_event_type};
use crate::error::{DomainError, DomainResult};
use crate::persist::SerializedEvent;
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 单条消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Acked,
    /// 已 nack，等待第 `attempt` 次重投
    Retrying { attempt: u32 },
    /// 重试耗尽，已路由到故障路径
    Faulted { attempts: u32 },
    /// 故障事件发布失败，消息放回队列
    Requeued,
}

pub struct ConsumerRuntime {
    bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    event_type: String,
    consumer_group: String,
    retry: RetryPolicy,
    handler_timeout: Duration,
    publish_timeout: Duration,
    fault_recorder: Option<Arc<dyn FaultRecorder>>,
}

impl ConsumerRuntime {
    pub fn new(
        bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        event_type: impl Into<String>,
        consumer_group: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            handler,
            event_type: event_type.into(),
            consumer_group: consumer_group.into(),
            retry: RetryPolicy::default(),
            handler_timeout: Duration::from_secs(30),
            publish_timeout: Duration::from_secs(5),
            fault_recorder: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, handler_timeout: Duration, publish_timeout: Duration) -> Self {
        self.handler_timeout = handler_timeout;
        self.publish_timeout = publish_timeout;
        self
    }

    /// 故障事件处理耗尽重试后的去处
    pub fn with_fault_recorder(mut self, recorder: Arc<dyn FaultRecorder>) -> Self {
        self.fault_recorder = Some(recorder);
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// 订阅并循环处理，直到取消；正在处理的消息会先处理完
    pub async fn run(self: Arc<Self>, token: CancellationToken) -> DomainResult<()> {
        let mut stream = self
            .bus
            .subscribe(&self.event_type, &self.consumer_group)
            .await?;
        info!(
            event_type = %self.event_type,
            consumer_group = %self.consumer_group,
            handler = %self.handler.handler_name(),
            "consumer started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                next = stream.next() => {
                    match next {
                        Some(Ok(delivery)) => {
                            self.process(delivery, &token).await;
                        }
                        Some(Err(err)) => {
                            warn!(
                                event_type = %self.event_type,
                                error = %err,
                                "subscription error"
                            );
                        }
                        None => break,
                    }
                }
            }
        }

        debug!(event_type = %self.event_type, "consumer stopped");
        Ok(())
    }

    /// 处理一条投递并结算
    pub async fn process(&self, delivery: Delivery, token: &CancellationToken) -> ConsumeOutcome {
        let redelivery_count = delivery.redelivery_count();
        let err = match self.invoke(delivery.event()).await {
            Ok(()) => {
                delivery.ack();
                return ConsumeOutcome::Acked;
            }
            Err(err) => err,
        };

        let event = delivery.event();
        if self.retry.should_retry(redelivery_count) {
            let attempt = redelivery_count + 1;
            warn!(
                event_id = %event.event_id(),
                event_type = %event.event_type(),
                handler = %self.handler.handler_name(),
                attempt,
                limit = self.retry.limit,
                error = %err,
                "handler failed, scheduling redelivery"
            );
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(self.retry.interval) => {}
            }
            delivery.nack();
            return ConsumeOutcome::Retrying { attempt };
        }

        let attempts = redelivery_count + 1;
        if is_fault_event_type(event.event_type()) {
            return self.park_fault(delivery, &err, attempts).await;
        }

        let fault = match self.fault_event(event, &err, attempts) {
            Ok(fault) => fault,
            Err(build_err) => {
                error!(
                    event_id = %event.event_id(),
                    error = %build_err,
                    "failed to build fault event"
                );
                delivery.nack();
                return ConsumeOutcome::Requeued;
            }
        };

        match tokio::time::timeout(self.publish_timeout, self.bus.publish(&fault)).await {
            Ok(Ok(())) => {
                error!(
                    event_id = %event.event_id(),
                    event_type = %event.event_type(),
                    fault_event_id = %fault.event_id(),
                    attempts,
                    error = %err,
                    "retries exhausted, message routed to fault topic"
                );
                delivery.ack();
                ConsumeOutcome::Faulted { attempts }
            }
            Ok(Err(publish_err)) => {
                warn!(
                    event_id = %event.event_id(),
                    error = %publish_err,
                    "fault publish failed, requeueing"
                );
                delivery.nack();
                ConsumeOutcome::Requeued
            }
            Err(_) => {
                warn!(event_id = %event.event_id(), "fault publish timed out, requeueing");
                delivery.nack();
                ConsumeOutcome::Requeued
            }
        }
    }

    /// 故障事件重试耗尽：交给记录器留待人工处理
    async fn park_fault(
        &self,
        delivery: Delivery,
        err: &DomainError,
        attempts: u32,
    ) -> ConsumeOutcome {
        let event = delivery.event();
        let Some(recorder) = &self.fault_recorder else {
            error!(
                event_id = %event.event_id(),
                event_type = %event.event_type(),
                attempts,
                error = %err,
                "fault handling failed and no recorder is configured, dropping fault message"
            );
            delivery.ack();
            return ConsumeOutcome::Faulted { attempts };
        };

        match recorder.record(FaultRecord::unresolved(event, err)).await {
            Ok(()) => {
                error!(
                    event_id = %event.event_id(),
                    event_type = %event.event_type(),
                    attempts,
                    error = %err,
                    "fault handling failed, recorded for manual handling"
                );
                delivery.ack();
                ConsumeOutcome::Faulted { attempts }
            }
            Err(record_err) => {
                warn!(
                    event_id = %event.event_id(),
                    error = %record_err,
                    "fault record failed, requeueing"
                );
                delivery.nack();
                ConsumeOutcome::Requeued
            }
        }
    }

    async fn invoke(&self, event: &SerializedEvent) -> DomainResult<()> {
        match tokio::time::timeout(self.handler_timeout, self.handler.handle(event)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::Timeout {
                operation: format!(
                "{} handling {}",
                self.handler.handler_name(),
                event.event_type()
            ),
                elapsed_ms: self.handler_timeout.as_millis(),
            }),
        }
    }

    fn fault_event(
        &self,
        event: &SerializedEvent,
        err: &DomainError,
        attempts: u32,
    ) -> DomainResult<SerializedEvent> {
        let fault = Fault {
            message: event.payload().clone(),
            exceptions: vec![ExceptionInfo::from(err)],
            attempts,
            consumer_group: self.consumer_group.clone(),
            faulted_at: Utc::now(),
        };

        Ok(SerializedEvent::builder()
            .event_id(Uuid::new_v4().to_string())
            .event_type(fault_event_type(event.event_type()))
            .aggregate_id(event.aggregate_id().to_string())
            .aggregate_type(event.aggregate_type().to_string())
            .aggregate_version(event.aggregate_version())
            .maybe_correlation_id(event.correlation_id().map(str::to_string))
            .causation_id(event.event_id().to_string())
            .maybe_actor_type(event.actor_type().map(str::to_string))
            .maybe_actor_id(event.actor_id().map(str::to_string))
            .occurred_at(fault.faulted_at)
            .payload(serde_json::to_value(&fault)?)
            .context(event.context().clone())
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::BusinessContext;
    use crate::eventing::{HandledEventType, InMemoryEventBus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl EventHandler for Flaky {
        fn handler_name(&self) -> &str {
            "flaky"
        }
        fn handled_event_type(&self) -> HandledEventType {
            HandledEventType::One("AuctionCreated".into())
        }
        async fn handle(&self, _event: &SerializedEvent) -> DomainResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                return Err(DomainError::invalid_argument(format!("attempt {n} rejected")));
            }
            Ok(())
        }
    }

    fn mk_event(id: &str) -> SerializedEvent {
        SerializedEvent::builder()
            .event_id(id.to_string())
            .event_type("AuctionCreated".to_string())
            .aggregate_id("agg-1".to_string())
            .aggregate_type("auction".to_string())
            .aggregate_version(1)
            .correlation_id("cor-1".to_string())
            .occurred_at(Utc::now())
            .payload(serde_json::json!({ "model": "Foo" }))
            .context(serde_json::to_value(BusinessContext::default()).unwrap())
            .build()
    }

    async fn drive(
        runtime: &ConsumerRuntime,
        bus: &InMemoryEventBus,
        rounds: usize,
    ) -> Vec<ConsumeOutcome> {
        let token = CancellationToken::new();
        let mut stream = bus.subscribe("AuctionCreated", "search").await.unwrap();
        let mut outcomes = Vec::new();
        for _ in 0..rounds {
            let delivery = stream.next().await.unwrap().unwrap();
            outcomes.push(runtime.process(delivery, &token).await);
        }
        outcomes
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let bus = InMemoryEventBus::new();
        bus.declare("AuctionCreated", "search").await.unwrap();
        let handler = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let runtime = ConsumerRuntime::new(
            Arc::new(bus.clone()),
            handler.clone(),
            "AuctionCreated",
            "search",
        )
        .with_retry(RetryPolicy::interval(3, Duration::from_millis(1)));

        bus.publish(&mk_event("e1")).await.unwrap();
        let outcomes = drive(&runtime, &bus, 3).await;

        assert_eq!(
            outcomes,
            vec![
                ConsumeOutcome::Retrying { attempt: 1 },
                ConsumeOutcome::Retrying { attempt: 2 },
                ConsumeOutcome::Acked,
            ]
        );
        assert_eq!(bus.queue_depth("search-auction-created"), 0);
    }

    #[tokio::test]
    async fn exhausted_retries_publish_fault_with_original_payload() {
        let bus = InMemoryEventBus::new();
        bus.declare("AuctionCreated", "search").await.unwrap();
        let handler = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        });
        let runtime = ConsumerRuntime::new(
            Arc::new(bus.clone()),
            handler.clone(),
            "AuctionCreated",
            "search",
        )
        .with_retry(RetryPolicy::interval(2, Duration::from_millis(1)));

        bus.publish(&mk_event("e1")).await.unwrap();
        let outcomes = drive(&runtime, &bus, 3).await;
        assert_eq!(outcomes[2], ConsumeOutcome::Faulted { attempts: 3 });
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

        let faults = bus.published_of("Fault<AuctionCreated>");
        assert_eq!(faults.len(), 1);
        let fault: Fault<serde_json::Value> = faults[0].decode().unwrap();
        assert_eq!(fault.message["model"], "Foo");
        assert_eq!(fault.attempts, 3);
        assert_eq!(fault.consumer_group, "search");
        assert_eq!(fault.first_exception().unwrap().exception_type, "InvalidArgument");
        assert_eq!(faults[0].causation_id(), Some("e1"));
        assert_eq!(faults[0].correlation_id(), Some("cor-1"));
        assert_eq!(bus.queue_depth("search-auction-created"), 0);
    }

    #[tokio::test]
    async fn fault_publish_failure_requeues_message() {
        let bus = InMemoryEventBus::new();
        bus.declare("AuctionCreated", "search").await.unwrap();
        let handler = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        });
        let runtime =
            ConsumerRuntime::new(Arc::new(bus.clone()), handler, "AuctionCreated", "search")
                .with_retry(RetryPolicy::none());

        bus.publish(&mk_event("e1")).await.unwrap();
        let mut stream = bus.subscribe("AuctionCreated", "search").await.unwrap();
        let delivery = stream.next().await.unwrap().unwrap();

        bus.set_available(false);
        let outcome = runtime.process(delivery, &CancellationToken::new()).await;
        assert_eq!(outcome, ConsumeOutcome::Requeued);
        assert_eq!(bus.queue_depth("search-auction-created"), 1);
    }

    fn mk_fault(id: &str) -> SerializedEvent {
        let fault = Fault {
            message: serde_json::json!({ "model": "Foo" }),
            exceptions: vec![ExceptionInfo::from(&DomainError::invalid_argument("Foo"))],
            attempts: 4,
            consumer_group: "search".into(),
            faulted_at: Utc::now(),
        };
        SerializedEvent::builder()
            .event_id(id.to_string())
            .event_type(fault_event_type("AuctionCreated"))
            .aggregate_id("agg-1".to_string())
            .aggregate_type("auction".to_string())
            .aggregate_version(1)
            .occurred_at(Utc::now())
            .payload(serde_json::to_value(&fault).unwrap())
            .context(serde_json::json!({}))
            .build()
    }

    struct Unavailable;

    #[async_trait]
    impl FaultRecorder for Unavailable {
        async fn record(&self, _record: FaultRecord) -> DomainResult<()> {
            Err(DomainError::Database {
                reason: "fault log unavailable".into(),
            })
        }
    }

    async fn exhaust_fault(recorder: Arc<dyn FaultRecorder>) -> (ConsumeOutcome, usize) {
        let bus = InMemoryEventBus::new();
        bus.declare("Fault<AuctionCreated>", "auction").await.unwrap();
        let handler = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        });
        let runtime = ConsumerRuntime::new(
            Arc::new(bus.clone()),
            handler,
            "Fault<AuctionCreated>",
            "auction",
        )
        .with_retry(RetryPolicy::none())
        .with_fault_recorder(recorder);

        bus.publish(&mk_fault("f1")).await.unwrap();
        let mut stream = bus.subscribe("Fault<AuctionCreated>", "auction").await.unwrap();
        let delivery = stream.next().await.unwrap().unwrap();
        let outcome = runtime.process(delivery, &CancellationToken::new()).await;
        (outcome, bus.queue_depth("auction-fault-auction-created"))
    }

    #[tokio::test]
    async fn exhausted_fault_goes_to_recorder_not_fault_of_fault() {
        let log = crate::eventing::FaultLog::new();
        let (outcome, depth) = exhaust_fault(Arc::new(log.clone())).await;

        assert_eq!(outcome, ConsumeOutcome::Faulted { attempts: 1 });
        assert_eq!(depth, 0);
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fault_event_id, "f1");
        assert_eq!(entries[0].event_type, "AuctionCreated");
        assert_eq!(entries[0].exceptions.len(), 2);
    }

    #[tokio::test]
    async fn fault_record_failure_requeues_fault() {
        let (outcome, depth) = exhaust_fault(Arc::new(Unavailable)).await;
        assert_eq!(outcome, ConsumeOutcome::Requeued);
        assert_eq!(depth, 1);
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        struct Slow;
        #[async_trait]
        impl EventHandler for Slow {
            fn handler_name(&self) -> &str {
                "slow"
            }
            fn handled_event_type(&self) -> HandledEventType {
                HandledEventType::One("AuctionCreated".into())
            }
            async fn handle(&self, _event: &SerializedEvent) -> DomainResult<()> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        }

        let bus = InMemoryEventBus::new();
        let runtime =
            ConsumerRuntime::new(Arc::new(bus), Arc::new(Slow), "AuctionCreated", "search")
                .with_timeouts(Duration::from_millis(10), Duration::from_secs(1));
        let err = runtime.invoke(&mk_event("e1")).await.unwrap_err();
        assert_eq!(err.kind(), "Timeout");
    }
}
