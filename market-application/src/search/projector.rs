//! 搜索投影器
//!
//! 以 id 为键的幂等 upsert/delete：
//! - Created：已有墓碑或库中文档更新（`updated_at` 更大）时忽略，重复应用等同一次；
//! - Updated：未知 id 记为对账候选并返回 `UnknownAggregate`，交由重投重试；
//!   比库中文档旧的更新视为过期忽略；
//! - Deleted：删除并记录墓碑，未知 id 也记录墓碑；
//! - 已删除 id 上的 Updated/Deleted 只记录异常日志。
//!
use async_trait::async_trait;
use dashmap::DashSet;
use market_domain::auction::Auction;
use market_domain::aggregate::Aggregate;
use market_domain::contracts::{
    AuctionCreated, AuctionDeleted, AuctionSnapshot, AuctionUpdated,
};
use market_domain::domain_event::IntegrationEvent;
use market_domain::error::{DomainError, DomainResult};
use market_domain::eventing::{EventHandler, HandledEventType};
use market_domain::persist::SerializedEvent;
use market_domain::read_model::{DeleteOutcome, SearchItem, SearchStore, UpsertOutcome};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOutcome {
    Applied,
    /// 比库中文档旧
    Stale,
    /// 目标 id 已删除
    Tombstoned,
}

pub struct SearchProjector {
    store: Arc<dyn SearchStore>,
    /// 拒绝该型号的创建事件（用于演练故障路径）
    rejected_model: Option<String>,
    candidates: DashSet<Uuid>,
}

impl SearchProjector {
    pub fn new(store: Arc<dyn SearchStore>) -> Self {
        Self {
            store,
            rejected_model: None,
            candidates: DashSet::new(),
        }
    }

    pub fn rejecting_model(mut self, model: impl Into<String>) -> Self {
        self.rejected_model = Some(model.into());
        self
    }

    /// 待对账的 id
    pub fn candidates(&self) -> Vec<Uuid> {
        self.candidates.iter().map(|id| *id).collect()
    }

    pub(crate) fn resolve_candidate(&self, id: &Uuid) {
        self.candidates.remove(id);
    }

    pub async fn apply(&self, event: &SerializedEvent) -> DomainResult<ProjectOutcome> {
        match event.event_type() {
            t if t == AuctionCreated::EVENT_TYPE => {
                let created: AuctionCreated = event.decode_as()?;
                if self.rejected_model.as_deref() == Some(created.model.as_str()) {
                    return Err(DomainError::invalid_argument(format!(
                        "Cannot sell cars with name of {}",
                        created.model
                    )));
                }
                self.project_snapshot(&created).await
            }
            t if t == AuctionUpdated::EVENT_TYPE => {
                self.project_update(&event.decode_as()?).await
            }
            t if t == AuctionDeleted::EVENT_TYPE => {
                self.project_delete(&event.decode_as()?).await
            }
            other => Err(DomainError::TypeMismatch {
                expected: "AuctionCreated|AuctionUpdated|AuctionDeleted".to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// 完整快照的 upsert（创建事件与对账共用）
    pub async fn project_snapshot(
        &self,
        snapshot: &AuctionSnapshot,
    ) -> DomainResult<ProjectOutcome> {
        let item = SearchItem::from(snapshot);
        let decide = |existing: Option<&SearchItem>| match existing {
            Some(current) if current.updated_at > item.updated_at => None,
            _ => Some(item.clone()),
        };

        match self.store.upsert_with(&snapshot.id, &decide).await? {
            UpsertOutcome::Tombstoned => {
                debug!(auction_id = %snapshot.id, "snapshot for deleted auction ignored");
                Ok(ProjectOutcome::Tombstoned)
            }
            UpsertOutcome::Kept { .. } => {
                debug!(auction_id = %snapshot.id, "stale snapshot ignored");
                Ok(ProjectOutcome::Stale)
            }
            UpsertOutcome::Written => {
                self.candidates.remove(&snapshot.id);
                info!(auction_id = %snapshot.id, model = %snapshot.model, "search item projected");
                Ok(ProjectOutcome::Applied)
            }
        }
    }

    async fn project_update(&self, update: &AuctionUpdated) -> DomainResult<ProjectOutcome> {
        let decide = |existing: Option<&SearchItem>| {
            let current = existing?;
            if current.updated_at > update.updated_at {
                return None;
            }
            let mut item = current.clone();
            item.apply_update(update);
            Some(item)
        };

        match self.store.upsert_with(&update.id, &decide).await? {
            UpsertOutcome::Tombstoned => {
                warn!(auction_id = %update.id, "update for deleted auction ignored");
                Ok(ProjectOutcome::Tombstoned)
            }
            UpsertOutcome::Kept { existed: false } => {
                self.candidates.insert(update.id);
                warn!(auction_id = %update.id, "update before create, recorded for reconciliation");
                Err(DomainError::UnknownAggregate {
                    aggregate_type: Auction::TYPE.to_string(),
                    aggregate_id: update.id.to_string(),
                })
            }
            UpsertOutcome::Kept { existed: true } => {
                debug!(auction_id = %update.id, "stale update ignored");
                Ok(ProjectOutcome::Stale)
            }
            UpsertOutcome::Written => {
                info!(auction_id = %update.id, "search item updated");
                Ok(ProjectOutcome::Applied)
            }
        }
    }

    async fn project_delete(&self, deleted: &AuctionDeleted) -> DomainResult<ProjectOutcome> {
        let outcome = self.store.delete(&deleted.id).await?;
        if outcome == DeleteOutcome::AlreadyDeleted {
            warn!(auction_id = %deleted.id, "duplicate delete ignored");
            return Ok(ProjectOutcome::Tombstoned);
        }
        self.candidates.remove(&deleted.id);
        let existed = outcome == DeleteOutcome::Removed;
        info!(auction_id = %deleted.id, existed, "search item deleted");
        Ok(ProjectOutcome::Applied)
    }
}

#[async_trait]
impl EventHandler for SearchProjector {
    fn handler_name(&self) -> &str {
        "search-projector"
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::Many(vec![
            AuctionCreated::EVENT_TYPE.to_string(),
            AuctionUpdated::EVENT_TYPE.to_string(),
            AuctionDeleted::EVENT_TYPE.to_string(),
        ])
    }

    async fn handle(&self, event: &SerializedEvent) -> DomainResult<()> {
        self.apply(event).await.map(|_| ())
    }
}
