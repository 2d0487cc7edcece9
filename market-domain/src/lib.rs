//! 拍卖市场领域层（market-domain）
//!
//! 提供拍卖服务与搜索服务之间“事件驱动一致性”的核心构件：
//! - 聚合（`aggregate`）与实体（`entity`）建模，拍卖聚合（`auction`）及其物品值对象；
//! - 跨服务线上契约（`contracts`）：创建/更新/删除事件与故障事件 `Fault<T>`；
//! - 持久化协议（`persist`）：工作单元、拍卖仓储、Outbox 存储与内存实现；
//! - 读模型（`read_model`）：搜索文档与搜索存储协议；
//! - 事件系统（`eventing`）：总线、发布器、Outbox 调度、消费运行时、故障处理与引擎。
//!
//! 典型用法：
//! 1. 写路径在同一个 `UnitOfWork` 中暂存聚合变更与 Outbox 事件，并原子提交；
//! 2. `EventEngine` 周期性把 Outbox 中的待投递事件发布到总线；
//! 3. 订阅方按事件类型注册处理器，由消费运行时负责确认、重试与故障路由。
//!
pub mod aggregate;
pub mod auction;
pub mod contracts;
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod eventing;
pub mod persist;
pub mod read_model;
pub mod value_object;
