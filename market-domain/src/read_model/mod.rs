//! 读模型（read_model）
//!
//! 搜索服务的非规范化投影：拍卖与物品字段扁平存放，附加竞价相关字段。
//! 与主存储最终一致，仅由投影器与对账器写入。
//!
mod search_item;
mod search_store;

pub use search_item::SearchItem;
pub use search_store::{DeleteOutcome, SearchStore, UpsertOutcome};
