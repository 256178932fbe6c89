//! Repository seams consumed by the engine, plus an in-process store.
//!
//! Persistence technology is a collaborator, not a commitment: the engine
//! only needs these three traits. [`MemoryStore`] implements all of them
//! behind a single mutex, which is what makes its `insert_if_absent` the
//! atomic check-and-insert the pair-uniqueness invariant requires. A
//! SQL-backed implementation would get the same guarantee from a unique
//! index over (lost_id, found_id) and map the conflict to
//! [`RepoError::DuplicatePair`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::RepoError;
use crate::types::{Embedding, Item, ItemId, ItemKind, MatchResult, Notification, PairKey};

/// Outcome of an atomic pair insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairInsert {
    Inserted,
    /// The pair was evaluated before; the new row was discarded.
    AlreadyRecorded,
}

/// Read/write access to reported items.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn get(&self, kind: ItemKind, id: ItemId) -> Result<Item, RepoError>;

    async fn insert(&self, item: Item) -> Result<(), RepoError>;

    /// Overwrite the cached embedding for one item.
    async fn set_embedding(
        &self,
        kind: ItemKind,
        id: ItemId,
        embedding: Embedding,
    ) -> Result<(), RepoError>;

    /// Snapshot of every `kind` item that has a stored embedding.
    ///
    /// The snapshot is read-only for the duration of one matching pass;
    /// items created mid-scan need not be visible to it.
    async fn embedded_corpus(&self, kind: ItemKind) -> Result<Vec<Item>, RepoError>;
}

/// Persisted pairwise comparison outcomes.
#[async_trait]
pub trait MatchResultRepository: Send + Sync {
    /// Insert unless a row for the same pair key already exists. This is
    /// the one operation that needs true mutual exclusion.
    async fn insert_if_absent(&self, result: MatchResult) -> Result<PairInsert, RepoError>;

    /// Flip the notified flag for a recorded pair.
    async fn mark_notified(&self, pair: PairKey) -> Result<(), RepoError>;

    async fn results_for_item(&self, kind: ItemKind, id: ItemId)
        -> Result<Vec<MatchResult>, RepoError>;

    async fn all(&self) -> Result<Vec<MatchResult>, RepoError>;
}

/// Persisted outbound notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: Notification) -> Result<(), RepoError>;

    async fn all(&self) -> Result<Vec<Notification>, RepoError>;
}

#[derive(Default)]
struct StoreInner {
    lost: HashMap<ItemId, Item>,
    found: HashMap<ItemId, Item>,
    results: Vec<MatchResult>,
    pairs: HashSet<PairKey>,
    notifications: Vec<Notification>,
}

impl StoreInner {
    fn shelf(&self, kind: ItemKind) -> &HashMap<ItemId, Item> {
        match kind {
            ItemKind::Lost => &self.lost,
            ItemKind::Found => &self.found,
        }
    }

    fn shelf_mut(&mut self, kind: ItemKind) -> &mut HashMap<ItemId, Item> {
        match kind {
            ItemKind::Lost => &mut self.lost,
            ItemKind::Found => &mut self.found,
        }
    }
}

/// In-process implementation of all three repositories. Used by the test
/// suite and by embedded deployments that don't need durable storage.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemRepository for MemoryStore {
    async fn get(&self, kind: ItemKind, id: ItemId) -> Result<Item, RepoError> {
        let inner = self.inner.lock().await;
        inner
            .shelf(kind)
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound { kind, id })
    }

    async fn insert(&self, item: Item) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        inner.shelf_mut(item.kind).insert(item.id, item);
        Ok(())
    }

    async fn set_embedding(
        &self,
        kind: ItemKind,
        id: ItemId,
        embedding: Embedding,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        let item = inner
            .shelf_mut(kind)
            .get_mut(&id)
            .ok_or(RepoError::NotFound { kind, id })?;
        item.embedding = Some(embedding);
        Ok(())
    }

    async fn embedded_corpus(&self, kind: ItemKind) -> Result<Vec<Item>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .shelf(kind)
            .values()
            .filter(|item| item.embedding.is_some())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MatchResultRepository for MemoryStore {
    async fn insert_if_absent(&self, result: MatchResult) -> Result<PairInsert, RepoError> {
        let mut inner = self.inner.lock().await;
        if !inner.pairs.insert(result.pair) {
            return Ok(PairInsert::AlreadyRecorded);
        }
        inner.results.push(result);
        Ok(PairInsert::Inserted)
    }

    async fn mark_notified(&self, pair: PairKey) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        for result in &mut inner.results {
            if result.pair == pair {
                result.notified = true;
                return Ok(());
            }
        }
        Err(RepoError::Storage(format!(
            "no match result for pair (lost={}, found={})",
            pair.lost_id, pair.found_id
        )))
    }

    async fn results_for_item(
        &self,
        kind: ItemKind,
        id: ItemId,
    ) -> Result<Vec<MatchResult>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .results
            .iter()
            .filter(|result| match kind {
                ItemKind::Lost => result.pair.lost_id == id,
                ItemKind::Found => result.pair.found_id == id,
            })
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<MatchResult>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner.results.clone())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create(&self, notification: Notification) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        inner.notifications.push(notification);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Notification>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner.notifications.clone())
    }
}
