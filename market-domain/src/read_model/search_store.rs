use super::search_item::SearchItem;
use crate::error::DomainResult as Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 条件写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Written,
    /// `decide` 放弃写入；`existed` 表示当时是否已有文档
    Kept { existed: bool },
    /// 已删除，`decide` 未被调用
    Tombstoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    /// 从未投影过，仍记录墓碑
    Unknown,
    AlreadyDeleted,
}

/// 搜索存储（文档库）
///
/// 删除会留下墓碑，使乱序或重复到达的事件无法让已删除的文档复活。
/// 墓碑检查、读取与写入必须在同一临界区内完成，并发的投影与删除才能收敛。
#[async_trait]
pub trait SearchStore: Send + Sync {
    async fn get(&self, id: &Uuid) -> Result<Option<SearchItem>>;

    /// 原子地读取当前文档并按 `decide` 的返回值写入；墓碑 id 直接返回 `Tombstoned`
    async fn upsert_with(
        &self,
        id: &Uuid,
        decide: &(dyn for<'a> Fn(Option<&'a SearchItem>) -> Option<SearchItem> + Send + Sync),
    ) -> Result<UpsertOutcome>;

    /// 删除并记录墓碑
    async fn delete(&self, id: &Uuid) -> Result<DeleteOutcome>;

    async fn is_tombstoned(&self, id: &Uuid) -> Result<bool>;

    /// 最近一次更新时间（对账的增量起点）
    async fn latest_updated_at(&self) -> Result<Option<DateTime<Utc>>>;

    async fn count(&self) -> Result<usize>;
}
