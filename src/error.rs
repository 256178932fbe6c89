//! Error taxonomy for the matching engine.
//!
//! The original behavior this replaces was broad catch-and-log handling;
//! here every failure class is an explicit variant so callers can tell
//! "degraded but continued" from "stopped for this item". Only
//! decode/timeout failures stop an individual item's pipeline; duplicate
//! pairs and delivery failures are absorbed where they occur.

use thiserror::Error;

use crate::types::{ItemId, ItemKind, PairKey};

/// Failures while turning image bytes into an embedding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbeddingError {
    /// Corrupt or unsupported image bytes. Stops the pipeline for the
    /// item unless the fallback path is enabled.
    #[error("image decode failed: {0}")]
    Decode(String),
    /// No vision model is configured and the deployment disabled the
    /// fallback pseudo-embedding ("exact only" mode).
    #[error("no vision model configured and fallback embedding is disabled")]
    ModelUnavailable,
    /// Model inference reported an error.
    #[error("model inference failed: {0}")]
    Inference(String),
    /// Decode plus inference exceeded the configured budget.
    #[error("embedding generation exceeded {0} ms")]
    Timeout(u64),
}

/// Failures surfaced by the repository collaborators.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{kind} item {id} not found")]
    NotFound { kind: ItemKind, id: ItemId },
    /// Uniqueness conflict on the (lost, found) key. The orchestrator
    /// treats this as "already recorded", never as a hard failure.
    #[error("match result already recorded for pair (lost={}, found={})", .0.lost_id, .0.found_id)]
    DuplicatePair(PairKey),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// A notification transport attempt that did not go through. Recorded as
/// `sent = false` and logged; never propagated to the matching pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Errors returned by a matching pass. Ingestion-triggered passes log
/// these and move on; the manual re-match surfaces them to the caller.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The embedding subsystem is not usable in this deployment: no model
    /// and fallback disabled.
    #[error("embedding subsystem not configured for this deployment")]
    Unavailable,
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
}
