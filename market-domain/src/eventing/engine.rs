//! 事件引擎（EventEngine）
//!
//! 统一编排“投递 → 订阅 → 分发处理”的长驻任务：
//! - 启动前按（事件类型，消费组）声明持久队列；
//! - 周期性执行 Outbox 调度（单飞，错过的节拍直接跳过）；
//! - 每个已注册事件类型一个消费任务，负责确认、重试与故障路由；
//! - 提供关闭与等待的 `EngineHandle`。
//!
use super::consumer::ConsumerRuntime;
use super::dispatcher::OutboxDispatcher;
use super::fault::FaultRecorder;
use super::handler::{EventHandler, HandlerRegistry};
use super::retry::RetryPolicy;
use super::EventBus;
use crate::error::DomainResult;
use crate::persist::OutboxStore;
use bon::Builder;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::event_engine_builder::{IsUnset, SetRegistry, State as BuilderState};

/// EventEngine：
/// - 若配置了 Outbox，周期性把待投递事件发布到 Bus
/// - 为每个注册的事件类型订阅消费组队列并交给对应 Handler
#[derive(Builder)]
pub struct EventEngine {
    event_bus: Arc<dyn EventBus>,
    /// 纯消费方（如搜索服务）没有 Outbox
    outbox: Option<Arc<dyn OutboxStore>>,
    /// 故障事件处理耗尽重试后的记录器
    fault_recorder: Option<Arc<dyn FaultRecorder>>,
    #[builder(default, setters(vis = "pub(crate)"))]
    registry: HandlerRegistry,
    #[builder(default)]
    config: EventEngineConfig,
}

// 自定义 Builder 方法：接收 handlers，内部转换为 HandlerRegistry 并设置到 builder 的 registry 字段。
// 受 typestate 限制，仅当 `registry` 尚未设置时可调用；重复的事件类型在此处报错。
impl<S: BuilderState> EventEngineBuilder<S> {
    pub fn event_handlers(
        self,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> DomainResult<EventEngineBuilder<SetRegistry<S>>>
    where
        <S as BuilderState>::Registry: IsUnset,
    {
        Ok(self.registry(HandlerRegistry::from_handlers(handlers)?))
    }
}

impl EventEngine {
    pub fn config(&self) -> &EventEngineConfig {
        &self.config
    }

    /// 声明本消费组的全部队列，返回队列名
    pub async fn declare_topology(&self) -> DomainResult<Vec<String>> {
        let mut queues = Vec::with_capacity(self.registry.len());
        for (event_type, _) in self.registry.iter() {
            queues.push(
                self.event_bus
                    .declare(event_type, &self.config.consumer_group)
                    .await?,
            );
        }
        Ok(queues)
    }

    /// 启动事件引擎，返回可用于关闭/等待的句柄
    pub async fn start(self: Arc<Self>) -> DomainResult<EngineHandle> {
        let queues = self.declare_topology().await?;
        info!(
            consumer_group = %self.config.consumer_group,
            queues = ?queues,
            "event engine starting"
        );

        let token = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(self.registry.len() + 1);

        // deliver worker（周期任务）
        if let Some(outbox) = self.outbox.clone() {
            let dispatcher = Arc::new(OutboxDispatcher::new(
                outbox,
                self.event_bus.clone(),
                self.config.batch_size,
                self.config.publish_timeout,
            ));
            let interval = self.config.deliver_interval;

            tasks.push(Self::spawn_periodic(token.clone(), interval, move || {
                let dispatcher = dispatcher.clone();
                async move {
                    if let Err(err) = dispatcher.dispatch_once().await {
                        error!(error = %err, "outbox dispatch failed");
                    }
                }
            }));
        }

        // consume workers（每个事件类型一个长循环）
        for (event_type, handler) in self.registry.iter() {
            let mut runtime = ConsumerRuntime::new(
                self.event_bus.clone(),
                handler.clone(),
                event_type,
                self.config.consumer_group.clone(),
            )
            .with_retry(self.config.retry)
            .with_timeouts(self.config.handler_timeout, self.config.publish_timeout);
            if let Some(recorder) = self.fault_recorder.clone() {
                runtime = runtime.with_fault_recorder(recorder);
            }
            let runtime = Arc::new(runtime);
            let token = token.clone();
            tasks.push(tokio::spawn(async move {
                let event_type = runtime.event_type().to_string();
                if let Err(err) = runtime.run(token).await {
                    error!(event_type = %event_type, error = %err, "consumer exited with error");
                }
            }));
        }

        Ok(EngineHandle { token, tasks })
    }

    fn spawn_periodic<F, Fut>(
        token: CancellationToken,
        interval: Duration,
        mut f: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => f().await,
                }
            }
        })
    }
}

/// 事件引擎配置
#[derive(Clone, Debug)]
pub struct EventEngineConfig {
    /// 消费组（同时作为队列名前缀）
    pub consumer_group: String,
    /// Outbox -> Bus 的推送间隔
    pub deliver_interval: Duration,
    /// 单轮调度最多读取的记录数
    pub batch_size: usize,
    pub publish_timeout: Duration,
    pub handler_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EventEngineConfig {
    fn default() -> Self {
        Self {
            consumer_group: "default".to_string(),
            deliver_interval: Duration::from_secs(10),
            batch_size: 100,
            publish_timeout: Duration::from_secs(5),
            handler_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// 引擎运行句柄：用于优雅关闭与等待任务结束
pub struct EngineHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::BusinessContext;
    use crate::error::{DomainError, DomainResult};
    use crate::eventing::{HandledEventType, InMemoryEventBus};
    use crate::persist::{AuctionRepository, InMemoryAuctionStore, SerializedEvent, UnitOfWork};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct SpyHandler {
        name: &'static str,
        types: HandledEventType,
        fail_on: Option<&'static str>,
        handled: Arc<Mutex<Vec<String>>>,
    }
    #[async_trait]
    impl EventHandler for SpyHandler {
        async fn handle(&self, event: &SerializedEvent) -> DomainResult<()> {
            if let Some(bad) = self.fail_on {
                if event.event_type() == bad {
                    return Err(DomainError::EventHandler {
                        handler: self.name.into(),
                        reason: "fail requested".into(),
                    });
                }
            }
            self.handled.lock().unwrap().push(event.event_id().to_string());
            Ok(())
        }
        fn handled_event_type(&self) -> HandledEventType {
            self.types.clone()
        }
        fn handler_name(&self) -> &str {
            self.name
        }
    }

    fn mk_event(id: &str, ty: &str) -> SerializedEvent {
        let biz = BusinessContext::builder()
            .correlation_id(format!("cor-{id}"))
            .actor_type("user".into())
            .actor_id("u-1".into())
            .build();
        SerializedEvent::builder()
            .event_id(id.to_string())
            .event_type(ty.to_string())
            .aggregate_id("agg-1".to_string())
            .aggregate_type("auction".to_string())
            .aggregate_version(1)
            .correlation_id(format!("cor-{id}"))
            .actor_type("user".into())
            .actor_id("u-1".into())
            .occurred_at(Utc::now())
            .payload(serde_json::json!({"id": id}))
            .context(serde_json::to_value(&biz).expect("serialize BusinessContext"))
            .build()
    }

    fn fast_config(group: &str) -> EventEngineConfig {
        EventEngineConfig {
            consumer_group: group.to_string(),
            deliver_interval: Duration::from_millis(20),
            retry: RetryPolicy::interval(1, Duration::from_millis(5)),
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn engine_end_to_end_dispatch_consume_and_fault() {
        let bus = Arc::new(InMemoryEventBus::new());
        let store = InMemoryAuctionStore::new();
        let handled = Arc::new(Mutex::new(Vec::new()));
        let ok = Arc::new(SpyHandler {
            name: "ok",
            types: HandledEventType::One("Ok".into()),
            fail_on: None,
            handled: handled.clone(),
        });
        let fail = Arc::new(SpyHandler {
            name: "fail",
            types: HandledEventType::One("FailMe".into()),
            fail_on: Some("FailMe"),
            handled: handled.clone(),
        });

        let engine = Arc::new(
            EventEngine::builder()
                .event_bus(bus.clone())
                .outbox(Arc::new(store.clone()))
                .event_handlers(vec![ok, fail])
                .unwrap()
                .config(fast_config("search"))
                .build(),
        );
        let handle = engine.start().await.unwrap();

        let mut uow = UnitOfWork::new();
        uow.append(mk_event("e1", "Ok"));
        uow.append(mk_event("e2", "FailMe"));
        uow.append(mk_event("e3", "Ok"));
        store.commit(uow).await.unwrap();

        // 使用 timeout + 条件轮询，减少固定 sleep 的脆弱性
        let _ = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if handled.lock().unwrap().len() >= 2
                    && !bus.published_of("Fault<FailMe>").is_empty()
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        handle.shutdown();
        handle.join().await;

        assert_eq!(*handled.lock().unwrap(), vec!["e1".to_string(), "e3".to_string()]);
        assert_eq!(bus.published_of("Fault<FailMe>").len(), 1);
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_handler_types_fail_at_build() {
        let handled = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::new(SpyHandler {
            name: "a",
            types: HandledEventType::One("Ok".into()),
            fail_on: None,
            handled: handled.clone(),
        });
        let b = Arc::new(SpyHandler { name: "b", ..(*a).clone() });

        let result = EventEngine::builder()
            .event_bus(Arc::new(InMemoryEventBus::new()) as Arc<dyn EventBus>)
            .event_handlers(vec![a, b]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn start_declares_group_queues() {
        let bus = Arc::new(InMemoryEventBus::new());
        let handler = Arc::new(SpyHandler {
            name: "ok",
            types: HandledEventType::Many(vec!["AuctionCreated".into(), "AuctionUpdated".into()]),
            fail_on: None,
            handled: Arc::new(Mutex::new(Vec::new())),
        });
        let engine = EventEngine::builder()
            .event_bus(bus.clone())
            .event_handlers(vec![handler])
            .unwrap()
            .config(fast_config("search"))
            .build();

        let mut queues = engine.declare_topology().await.unwrap();
        queues.sort();
        assert_eq!(queues, vec!["search-auction-created", "search-auction-updated"]);
    }
}
