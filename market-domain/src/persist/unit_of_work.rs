use super::outbox::OutboxId;
use super::serialized_event::SerializedEvent;
use crate::auction::Auction;
use uuid::Uuid;

/// 对主存储的一次写入
#[derive(Debug, Clone)]
pub enum AuctionWrite {
    Save(Auction),
    Remove(Uuid),
}

/// 调用方事务：聚合写入与 Outbox 追加一起暂存，由仓储 `commit` 原子生效。
///
/// 未提交即丢弃等同于回滚，其中的事件永远不会对调度器可见。
#[derive(Debug, Default)]
pub struct UnitOfWork {
    writes: Vec<AuctionWrite>,
    outbox: Vec<SerializedEvent>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, auction: Auction) {
        self.writes.push(AuctionWrite::Save(auction));
    }

    pub fn remove(&mut self, id: Uuid) {
        self.writes.push(AuctionWrite::Remove(id));
    }

    /// 追加 Outbox 事件，返回其 Outbox 标识
    pub fn append(&mut self, event: SerializedEvent) -> OutboxId {
        let id = OutboxId::from(event.event_id());
        self.outbox.push(event);
        id
    }

    pub fn writes(&self) -> &[AuctionWrite] {
        &self.writes
    }

    pub fn outbox(&self) -> &[SerializedEvent] {
        &self.outbox
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.outbox.is_empty()
    }

    pub fn into_parts(self) -> (Vec<AuctionWrite>, Vec<SerializedEvent>) {
        (self.writes, self.outbox)
    }
}
