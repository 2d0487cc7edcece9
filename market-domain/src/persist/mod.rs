//! 持久化协议（persist）
//!
//! 定义写路径与 Outbox 的协作契约：
//! - `UnitOfWork`：调用方事务，暂存聚合写入与 Outbox 追加，提交时原子生效；
//! - `AuctionRepository`：主存储读写与增量快照查询；
//! - `OutboxStore`：调度器读取待投递记录并标记结果；
//! - `InMemoryAuctionStore`：同时实现以上协议的内存主存储（测试、示例与本地开发）。
//!
mod auction_repository;
mod in_memory;
mod outbox;
mod serialized_event;
mod unit_of_work;

pub use auction_repository::AuctionRepository;
pub use in_memory::InMemoryAuctionStore;
pub use outbox::{OutboxId, OutboxRecord, OutboxStatus, OutboxStore};
pub use serialized_event::SerializedEvent;
pub use unit_of_work::{AuctionWrite, UnitOfWork};
