use super::outbox::OutboxId;
use super::unit_of_work::UnitOfWork;
use crate::auction::Auction;
use crate::error::DomainResult as Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// 拍卖主存储
#[async_trait]
pub trait AuctionRepository: Send + Sync {
    async fn get(&self, id: &Uuid) -> Result<Option<Auction>>;

    /// 增量快照：`updated_at` 晚于 `since` 的拍卖，按 `updated_at` 升序
    async fn list_updated_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Auction>>;

    /// 原子提交工作单元；失败时其中的写入与 Outbox 事件均不生效
    async fn commit(&self, unit_of_work: UnitOfWork) -> Result<Vec<OutboxId>>;
}

#[async_trait]
impl<T> AuctionRepository for Arc<T>
where
    T: AuctionRepository + ?Sized,
{
    async fn get(&self, id: &Uuid) -> Result<Option<Auction>> {
        (**self).get(id).await
    }

    async fn list_updated_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Auction>> {
        (**self).list_updated_since(since).await
    }

    async fn commit(&self, unit_of_work: UnitOfWork) -> Result<Vec<OutboxId>> {
        (**self).commit(unit_of_work).await
    }
}
