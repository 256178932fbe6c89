//! Match orchestration: the per-item pipeline and its dispatch backends.
//!
//! One ingested item moves through a terminal state machine:
//! Received → Embedded → Scanning → Recorded → Dispatched. Items without
//! an image stop at Received; items whose embedding cannot be produced
//! stop at Embedded. The scan is exhaustive pairwise over the opposite
//! corpus; every comparison is persisted (matches and non-matches alike)
//! through an atomic insert-if-absent keyed on (lost_id, found_id), so
//! cross-triggered or retried evaluations collapse into one row and at
//! most one notification dispatch.
//!
//! The same orchestration runs from both call paths: inline on the
//! ingestion request, or on a background worker fed by a bounded queue.
//! Which one is a configuration choice, not a second code path.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::config::{DispatchBackend, EngineConfig};
use crate::embedding::{EmbeddingGenerator, VisionModel};
use crate::error::{EmbeddingError, MatchError, RepoError};
use crate::notify::{NotificationDispatcher, NotificationTransport};
use crate::repo::{
    ItemRepository, MatchResultRepository, NotificationRepository, PairInsert,
};
use crate::similarity::cosine;
use crate::types::{
    Embedding, Item, ItemId, ItemKind, MatchResult, MatchStatus, PairKey,
};

use serde::Serialize;

/// One scored candidate from a matching pass, as returned to manual
/// `rematch` callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub other_item_id: ItemId,
    pub score: f32,
    pub status: MatchStatus,
}

#[derive(Debug, Clone, Copy)]
struct MatchTask {
    kind: ItemKind,
    id: ItemId,
}

enum Backend {
    Inline,
    Queued(mpsc::Sender<MatchTask>),
}

/// The matching engine. Construct once at startup and share.
///
/// With the queued backend the constructor spawns the worker task, so it
/// must run inside a Tokio runtime.
pub struct MatchEngine {
    core: Arc<EngineCore>,
    backend: Backend,
}

impl MatchEngine {
    pub fn new(
        config: EngineConfig,
        items: Arc<dyn ItemRepository>,
        matches: Arc<dyn MatchResultRepository>,
        notifications: Arc<dyn NotificationRepository>,
        transport: Arc<dyn NotificationTransport>,
        model: Option<Arc<dyn VisionModel>>,
    ) -> Self {
        let generator = Arc::new(EmbeddingGenerator::new(&config, model));
        let dispatcher =
            NotificationDispatcher::new(notifications, transport, config.notification_channel);
        let backend_kind = config.dispatch_backend;
        let queue_capacity = config.queue_capacity;
        let core = Arc::new(EngineCore {
            config,
            items,
            matches,
            dispatcher,
            generator,
        });
        let backend = match backend_kind {
            DispatchBackend::Inline => Backend::Inline,
            DispatchBackend::Queued => Backend::Queued(spawn_worker(Arc::clone(&core), queue_capacity)),
        };
        Self { core, backend }
    }

    /// Ingestion trigger: run (or enqueue) the matching pass for a fresh
    /// item. Fire-and-forget; failures are logged, never surfaced, so the
    /// worst outcome for the caller is "no matches recorded".
    pub async fn on_item_created(&self, kind: ItemKind, id: ItemId) {
        match &self.backend {
            Backend::Inline => {
                if let Err(err) = self.core.run_match_pass(kind, id).await {
                    warn!(%kind, id, error = %err, "match pass failed");
                }
            }
            Backend::Queued(queue) => {
                if queue.send(MatchTask { kind, id }).await.is_err() {
                    error!(%kind, id, "match worker is gone; dropping task");
                }
            }
        }
    }

    /// Manual re-match: re-run the scan for one item and return every
    /// candidate comparison. Pairs evaluated earlier keep their stored
    /// rows; they still appear in the returned list with fresh scores.
    pub async fn rematch(
        &self,
        kind: ItemKind,
        id: ItemId,
    ) -> Result<Vec<Comparison>, MatchError> {
        if !self.core.generator.is_available() {
            return Err(MatchError::Unavailable);
        }
        self.core.run_match_pass(kind, id).await
    }

    /// Recompute and overwrite the stored embedding after a photo change
    /// (invalidate-and-recompute, never in-place edit). Returns whether a
    /// new embedding was stored. Does not re-trigger matching; call
    /// [`MatchEngine::rematch`] afterwards if retroactive matching is
    /// wanted.
    pub async fn refresh_embedding(
        &self,
        kind: ItemKind,
        id: ItemId,
    ) -> Result<bool, MatchError> {
        let item = self.core.items.get(kind, id).await?;
        let Some(image) = item.image else {
            return Ok(false);
        };
        match self.core.embed(image).await? {
            Some(embedding) => {
                self.core.items.set_embedding(kind, id, embedding).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn spawn_worker(core: Arc<EngineCore>, capacity: usize) -> mpsc::Sender<MatchTask> {
    let (tx, mut rx) = mpsc::channel::<MatchTask>(capacity);
    tokio::spawn(async move {
        while let Some(task) = rx.recv().await {
            if let Err(err) = core.run_match_pass(task.kind, task.id).await {
                warn!(
                    kind = %task.kind,
                    id = task.id,
                    error = %err,
                    "background match pass failed"
                );
            }
        }
        debug!("match worker shutting down; queue closed");
    });
    tx
}

struct EngineCore {
    config: EngineConfig,
    items: Arc<dyn ItemRepository>,
    matches: Arc<dyn MatchResultRepository>,
    dispatcher: NotificationDispatcher,
    generator: Arc<EmbeddingGenerator>,
}

impl EngineCore {
    /// Run generation on the blocking pool under the configured budget.
    /// Decode and inference are the only operations in the pass that may
    /// stall, so the timeout lives here.
    async fn embed(&self, image: Vec<u8>) -> Result<Option<Embedding>, EmbeddingError> {
        let generator = Arc::clone(&self.generator);
        let budget = self.config.embedding_timeout();
        let job = tokio::task::spawn_blocking(move || generator.generate(&image));
        match tokio::time::timeout(budget, job).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(EmbeddingError::Inference(join_err.to_string())),
            Err(_) => Err(EmbeddingError::Timeout(self.config.embedding_timeout_ms)),
        }
    }

    /// Embedding for the ingested item: reuse the cached one or compute
    /// and store it. `Ok(None)` means the pass ends here.
    async fn item_embedding(&self, item: &Item) -> Result<Option<Embedding>, MatchError> {
        if let Some(embedding) = &item.embedding {
            return Ok(Some(embedding.clone()));
        }
        let Some(image) = item.image.clone() else {
            debug!(kind = %item.kind, id = item.id, "item has no image; nothing to match");
            return Ok(None);
        };
        let computed = self.embed(image).await.map_err(|err| match err {
            EmbeddingError::ModelUnavailable => MatchError::Unavailable,
            other => MatchError::Embedding(other),
        })?;
        match computed {
            Some(embedding) => {
                self.items
                    .set_embedding(item.kind, item.id, embedding.clone())
                    .await?;
                Ok(Some(embedding))
            }
            None => Ok(None),
        }
    }

    async fn run_match_pass(
        &self,
        kind: ItemKind,
        id: ItemId,
    ) -> Result<Vec<Comparison>, MatchError> {
        let mut item = self.items.get(kind, id).await?;

        let Some(embedding) = self.item_embedding(&item).await? else {
            return Ok(Vec::new());
        };
        // Keep the local snapshot in sync with the repository so the
        // recorded rows carry this side's embedding bytes.
        item.embedding = Some(embedding.clone());

        let corpus = self.items.embedded_corpus(kind.opposite()).await?;
        let threshold = self.config.similarity_threshold;
        let mut comparisons = Vec::with_capacity(corpus.len());

        for candidate in &corpus {
            let Some(other) = candidate.embedding.as_ref() else {
                continue;
            };
            let score = cosine(embedding.as_slice(), other.as_slice());
            let status = if score >= threshold {
                MatchStatus::Matched
            } else {
                MatchStatus::NotMatched
            };
            comparisons.push(Comparison {
                other_item_id: candidate.id,
                score,
                status,
            });

            // The pair key is oriented lost→found no matter which side
            // triggered this pass.
            let (lost, found) = match kind {
                ItemKind::Lost => (&item, candidate),
                ItemKind::Found => (candidate, &item),
            };
            let record = MatchResult {
                pair: PairKey {
                    lost_id: lost.id,
                    found_id: found.id,
                },
                lost_embedding: lost
                    .embedding
                    .as_ref()
                    .map(Embedding::to_le_bytes)
                    .unwrap_or_default(),
                found_embedding: found
                    .embedding
                    .as_ref()
                    .map(Embedding::to_le_bytes)
                    .unwrap_or_default(),
                score,
                threshold,
                status,
                notified: false,
                created_at: Utc::now(),
            };
            let pair = record.pair;

            let outcome = match self.matches.insert_if_absent(record).await {
                Ok(outcome) => outcome,
                Err(RepoError::DuplicatePair(_)) => PairInsert::AlreadyRecorded,
                Err(err) => {
                    // One bad comparison must not abort the scan.
                    warn!(
                        lost = pair.lost_id,
                        found = pair.found_id,
                        error = %err,
                        "failed to record comparison; continuing"
                    );
                    continue;
                }
            };

            if outcome == PairInsert::Inserted && status == MatchStatus::Matched {
                self.dispatcher.dispatch(lost, found).await;
                if let Err(err) = self.matches.mark_notified(pair).await {
                    warn!(
                        lost = pair.lost_id,
                        found = pair.found_id,
                        error = %err,
                        "failed to flag match result as notified"
                    );
                }
            }
        }

        debug!(
            %kind,
            id,
            candidates = comparisons.len(),
            matched = comparisons
                .iter()
                .filter(|c| c.status == MatchStatus::Matched)
                .count(),
            "match pass complete"
        );
        Ok(comparisons)
    }
}
