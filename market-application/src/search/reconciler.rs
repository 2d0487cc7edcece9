//! 对账器
//!
//! 投影可能因乱序、故障或停机而落后；对账器从拍卖服务拉取快照补齐：
//! - `catch_up`：以已投影的最新 `updated_at` 为起点做增量同步（启动时执行）；
//! - `resolve_candidates`：拉取全量快照，只投影记录在案的候选 id。
//!
use super::projector::{ProjectOutcome, SearchProjector};
use crate::auction_service::AuctionService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_domain::contracts::AuctionSnapshot;
use market_domain::error::{DomainError, DomainResult};
use market_domain::read_model::SearchStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// 快照来源（拍卖服务的增量查询接口）
#[async_trait]
pub trait AuctionSnapshotSource: Send + Sync {
    async fn list_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<AuctionSnapshot>>;
}

#[async_trait]
impl AuctionSnapshotSource for AuctionService {
    async fn list_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<AuctionSnapshot>> {
        AuctionService::list_updated_since(self, since)
            .await
            .map_err(|err| DomainError::Database {
                reason: err.to_string(),
            })
    }
}

pub struct Reconciler {
    source: Arc<dyn AuctionSnapshotSource>,
    store: Arc<dyn SearchStore>,
    projector: Arc<SearchProjector>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn AuctionSnapshotSource>,
        store: Arc<dyn SearchStore>,
        projector: Arc<SearchProjector>,
    ) -> Self {
        Self {
            source,
            store,
            projector,
        }
    }

    /// 增量同步，返回实际投影的快照数
    pub async fn catch_up(&self) -> DomainResult<usize> {
        let since = self.store.latest_updated_at().await?;
        let snapshots = self.source.list_updated_since(since).await?;

        let mut applied = 0;
        for snapshot in &snapshots {
            if self.projector.project_snapshot(snapshot).await? == ProjectOutcome::Applied {
                applied += 1;
            }
        }
        info!(since = ?since, fetched = snapshots.len(), applied, "search catch-up finished");
        Ok(applied)
    }

    /// 修复候选 id，返回已解决的数量；主存储中已不存在的候选一并清除
    pub async fn resolve_candidates(&self) -> DomainResult<usize> {
        let candidates: HashSet<_> = self.projector.candidates().into_iter().collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let snapshots = self.source.list_updated_since(None).await?;
        let mut resolved = 0;
        let mut seen = HashSet::new();
        for snapshot in snapshots.iter().filter(|s| candidates.contains(&s.id)) {
            seen.insert(snapshot.id);
            self.projector.project_snapshot(snapshot).await?;
            self.projector.resolve_candidate(&snapshot.id);
            resolved += 1;
        }
        for missing in candidates.difference(&seen) {
            self.projector.resolve_candidate(missing);
        }

        info!(candidates = candidates.len(), resolved, "reconciliation candidates resolved");
        Ok(resolved)
    }
}
