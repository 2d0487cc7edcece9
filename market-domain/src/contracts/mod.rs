//! 跨服务线上契约（contracts）
//!
//! 拍卖服务发布、搜索服务消费的事件形态，以及消费失败时由运行时发出的
//! `Fault<T>`。字段以 camelCase 序列化，发布后不可变。
//!
mod auction;
mod fault;

pub use auction::{AuctionCreated, AuctionDeleted, AuctionSnapshot, AuctionStatus, AuctionUpdated};
pub use fault::{
    ExceptionInfo, Fault, fault_event_type, faulted_event_type, is_fault_event_type,
};
