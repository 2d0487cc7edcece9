//! 事件子系统（eventing）
//!
//! 提供事件发布/订阅与处理的基础抽象与运行时：
//! - `EventBus`：至少一次投递的总线协议，按主题 + 消费组声明持久队列；
//! - `EventPublisher`：写事务内把事件追加到 Outbox（从不直接访问总线）；
//! - `OutboxDispatcher`：周期性把 Outbox 中的待投递事件转发到总线；
//! - `EventHandler`/`HandlerRegistry`：按事件类型显式注册处理器；
//! - `ConsumerRuntime`：单条消息的确认、重试与故障路由；
//! - `FaultConsumer`：按修复规则表修复并重新发布，或记录待人工处理；
//! - `EventEngine`：编排调度与消费任务，提供关闭与等待的 `EngineHandle`。
//!
pub mod bus;
pub mod bus_inmemory;
pub mod consumer;
pub mod dispatcher;
pub mod engine;
pub mod fault;
pub mod handler;
pub mod publisher;
pub mod retry;
pub mod topology;

pub use bus::{Acknowledger, Delivery, EventBus};
pub use bus_inmemory::InMemoryEventBus;
pub use consumer::{ConsumeOutcome, ConsumerRuntime};
pub use dispatcher::{DispatchReport, OutboxDispatcher};
pub use engine::{EngineHandle, EventEngine, EventEngineConfig};
pub use fault::{
    FaultConsumer, FaultDecision, FaultLog, FaultRecord, FaultRecorder, OutboxRepublisher,
    RepairRule, Republisher,
};
pub use handler::{EventHandler, HandledEventType, HandlerRegistry};
pub use publisher::EventPublisher;
pub use retry::RetryPolicy;
