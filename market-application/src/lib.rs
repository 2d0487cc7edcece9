//! 拍卖市场应用层（market-application）
//!
//! - `auction_service`：拍卖服务写路径（创建/更新/删除 + 授权校验）与增量快照查询；
//! - `repair`：故障修复规则与拍卖服务侧的故障消费者装配；
//! - `search`：搜索服务的投影器、对账器与内存文档库；
//! - `wiring`：两个服务各自的事件引擎装配。
//!
pub mod auction_service;
pub mod context;
pub mod dto;
pub mod error;
pub mod repair;
pub mod search;
pub mod wiring;

pub use auction_service::AuctionService;
pub use context::AppContext;
pub use error::{AppError, AppResult};

/// 拍卖服务的消费组（队列名前缀）
pub const AUCTION_CONSUMER_GROUP: &str = "auction";
/// 搜索服务的消费组（队列名前缀）
pub const SEARCH_CONSUMER_GROUP: &str = "search";
