//! 内存版主存储（InMemoryAuctionStore）
//!
//! 拍卖数据与 Outbox 共用一把锁，`commit` 在同一临界区内完成全部写入，
//! 模拟关系库事务的原子性。可通过 `fail_commits` 注入提交失败。
//! 待投递扫描从“首个未发送序号”开始，已发送的前缀不再遍历。
//!
use super::auction_repository::AuctionRepository;
use super::outbox::{OutboxId, OutboxRecord, OutboxStatus, OutboxStore};
use super::unit_of_work::{AuctionWrite, UnitOfWork};
use crate::auction::Auction;
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult as Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct State {
    auctions: HashMap<Uuid, Auction>,
    outbox: BTreeMap<u64, OutboxRecord>,
    index: HashMap<OutboxId, u64>,
    next_sequence: u64,
    /// 最小的可能待投递序号；之前的记录都已发送
    pending_from: u64,
}

impl State {
    fn pending(&self) -> impl Iterator<Item = &OutboxRecord> {
        self.outbox
            .range(self.pending_from..)
            .map(|(_, r)| r)
            .filter(|r| r.is_pending())
    }

    /// 越过已发送的前缀
    fn advance_cursor(&mut self) {
        let next = self
            .pending()
            .next()
            .map(|r| r.sequence)
            .unwrap_or(self.next_sequence + 1);
        self.pending_from = next;
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuctionStore {
    state: Arc<Mutex<State>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryAuctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的提交全部失败（模拟存储不可用）
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// 全部 Outbox 记录（含已发送），按提交顺序
    pub fn outbox_records(&self) -> Result<Vec<OutboxRecord>> {
        Ok(self.state()?.outbox.values().cloned().collect())
    }

    pub fn auction_count(&self) -> Result<usize> {
        Ok(self.state()?.auctions.len())
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| DomainError::Database {
            reason: "auction store lock poisoned".to_string(),
        })
    }

    fn check_version(state: &State, auction: &Auction) -> Result<()> {
        let actual = state
            .auctions
            .get(auction.id())
            .map(|stored| stored.version())
            .unwrap_or(0);
        let expected = auction.version().saturating_sub(1);
        if actual != expected {
            return Err(DomainError::VersionConflict { expected, actual });
        }
        Ok(())
    }
}

#[async_trait]
impl AuctionRepository for InMemoryAuctionStore {
    async fn get(&self, id: &Uuid) -> Result<Option<Auction>> {
        Ok(self.state()?.auctions.get(id).cloned())
    }

    async fn list_updated_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Auction>> {
        let state = self.state()?;
        let mut auctions: Vec<Auction> = state
            .auctions
            .values()
            .filter(|a| since.is_none_or(|since| a.updated_at() > since))
            .cloned()
            .collect();
        auctions.sort_by_key(|a| (a.updated_at(), *a.id()));
        Ok(auctions)
    }

    async fn commit(&self, unit_of_work: UnitOfWork) -> Result<Vec<OutboxId>> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(DomainError::Database {
                reason: "commit rejected: store unavailable".to_string(),
            });
        }

        let mut state = self.state()?;

        // 先整体校验，再统一写入，保证要么全部生效要么全部不生效
        for write in unit_of_work.writes() {
            if let AuctionWrite::Save(auction) = write {
                Self::check_version(&state, auction)?;
            }
        }

        let (writes, events) = unit_of_work.into_parts();
        for write in writes {
            match write {
                AuctionWrite::Save(auction) => {
                    state.auctions.insert(*auction.id(), auction);
                }
                AuctionWrite::Remove(id) => {
                    state.auctions.remove(&id);
                }
            }
        }

        let now = Utc::now();
        let mut ids = Vec::with_capacity(events.len());
        for event in events {
            state.next_sequence += 1;
            let sequence = state.next_sequence;
            let id = OutboxId::from(event.event_id());
            state.index.insert(id.clone(), sequence);
            state.outbox.insert(
                sequence,
                OutboxRecord {
                    sequence,
                    id: id.clone(),
                    event,
                    status: OutboxStatus::Pending,
                    created_at: now,
                    sent_at: None,
                    attempts: 0,
                    last_error: None,
                },
            );
            ids.push(id);
        }

        Ok(ids)
    }
}

#[async_trait]
impl OutboxStore for InMemoryAuctionStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        Ok(self.state()?.pending().take(limit).cloned().collect())
    }

    async fn mark_sent(&self, id: &OutboxId) -> Result<()> {
        let mut state = self.state()?;
        let sequence = *state.index.get(id).ok_or_else(|| DomainError::Outbox {
            reason: format!("unknown outbox record {id}"),
        })?;
        if let Some(record) = state.outbox.get_mut(&sequence) {
            record.status = OutboxStatus::Sent;
            record.sent_at = Some(Utc::now());
        }
        state.advance_cursor();
        Ok(())
    }

    async fn mark_failed(&self, id: &OutboxId, reason: &str) -> Result<()> {
        let mut state = self.state()?;
        let sequence = *state.index.get(id).ok_or_else(|| DomainError::Outbox {
            reason: format!("unknown outbox record {id}"),
        })?;
        if let Some(record) = state.outbox.get_mut(&sequence) {
            record.attempts += 1;
            record.last_error = Some(reason.to_string());
        }
        Ok(())
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self.state()?.pending().count())
    }
}
