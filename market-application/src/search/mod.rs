//! 搜索服务
//!
//! - `InMemorySearchStore`：内存文档库（带墓碑）；
//! - `SearchProjector`：幂等地把拍卖事件投影到文档库；
//! - `Reconciler`：从拍卖服务拉取快照补齐投影（启动追赶与候选修复）。
//!
mod projector;
mod reconciler;
mod store;

pub use projector::{ProjectOutcome, SearchProjector};
pub use reconciler::{AuctionSnapshotSource, Reconciler};
pub use store::InMemorySearchStore;
