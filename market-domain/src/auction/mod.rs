//! 拍卖聚合（Auction）
//!
//! 拍卖服务的记录系统：拍卖本身及其嵌套的物品值对象共享生命周期，
//! 由写路径通过命令变更，每次变更产生一条可发布的事件。
//!
mod aggregate;
mod item;

pub use aggregate::{Auction, AuctionCommand, AuctionEvent};
pub use item::{Item, ItemPatch};

pub use crate::contracts::AuctionStatus;
