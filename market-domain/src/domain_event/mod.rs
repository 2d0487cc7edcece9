//! 领域事件（Domain Event）
//!
//! 定义聚合事件需要实现的最小接口（`DomainEvent`）、跨服务传输的集成事件
//! 契约（`IntegrationEvent`），以及随事件传播的业务上下文 `BusinessContext`。

mod business_context;
mod domain_event_trait;

pub use business_context::BusinessContext;
pub use domain_event_trait::{DomainEvent, IntegrationEvent};
