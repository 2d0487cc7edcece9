use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use market_domain::error::DomainResult;
use market_domain::read_model::{DeleteOutcome, SearchItem, SearchStore, UpsertOutcome};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
enum Slot {
    Live(SearchItem),
    Tombstone,
}

/// 内存文档库
///
/// 文档与墓碑放在同一个 `DashMap` 中，按 id 的条目锁覆盖检查与写入。
#[derive(Clone, Default)]
pub struct InMemorySearchStore {
    slots: Arc<DashMap<Uuid, Slot>>,
}

impl InMemorySearchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<SearchItem> {
        self.slots
            .iter()
            .filter_map(|e| match e.value() {
                Slot::Live(item) => Some(item.clone()),
                Slot::Tombstone => None,
            })
            .collect()
    }
}

#[async_trait]
impl SearchStore for InMemorySearchStore {
    async fn get(&self, id: &Uuid) -> DomainResult<Option<SearchItem>> {
        Ok(self.slots.get(id).and_then(|e| match e.value() {
            Slot::Live(item) => Some(item.clone()),
            Slot::Tombstone => None,
        }))
    }

    async fn upsert_with(
        &self,
        id: &Uuid,
        decide: &(dyn for<'a> Fn(Option<&'a SearchItem>) -> Option<SearchItem> + Send + Sync),
    ) -> DomainResult<UpsertOutcome> {
        let outcome = match self.slots.entry(*id) {
            Entry::Occupied(mut entry) => {
                let next = match entry.get() {
                    Slot::Tombstone => return Ok(UpsertOutcome::Tombstoned),
                    Slot::Live(current) => decide(Some(current)),
                };
                match next {
                    Some(item) => {
                        entry.insert(Slot::Live(item));
                        UpsertOutcome::Written
                    }
                    None => UpsertOutcome::Kept { existed: true },
                }
            }
            Entry::Vacant(entry) => match decide(None) {
                Some(item) => {
                    entry.insert(Slot::Live(item));
                    UpsertOutcome::Written
                }
                None => UpsertOutcome::Kept { existed: false },
            },
        };
        Ok(outcome)
    }

    async fn delete(&self, id: &Uuid) -> DomainResult<DeleteOutcome> {
        Ok(match self.slots.insert(*id, Slot::Tombstone) {
            Some(Slot::Live(_)) => DeleteOutcome::Removed,
            Some(Slot::Tombstone) => DeleteOutcome::AlreadyDeleted,
            None => DeleteOutcome::Unknown,
        })
    }

    async fn is_tombstoned(&self, id: &Uuid) -> DomainResult<bool> {
        Ok(self
            .slots
            .get(id)
            .is_some_and(|e| matches!(e.value(), Slot::Tombstone)))
    }

    async fn latest_updated_at(&self) -> DomainResult<Option<DateTime<Utc>>> {
        Ok(self
            .slots
            .iter()
            .filter_map(|e| match e.value() {
                Slot::Live(item) => Some(item.updated_at),
                Slot::Tombstone => None,
            })
            .max())
    }

    async fn count(&self) -> DomainResult<usize> {
        Ok(self
            .slots
            .iter()
            .filter(|e| matches!(e.value(), Slot::Live(_)))
            .count())
    }
}
