//! Embedding-based matching engine for lost & found item reports.
//!
//! When an item is reported, its photo is turned into a fixed-length
//! numeric fingerprint, compared against every item of the opposite kind
//! (lost ↔ found) by cosine similarity, and every comparison is persisted
//! as a [`MatchResult`]. Scores at or above the configured threshold
//! classify the pair as matched and fire at most one notification per
//! side of the pair.
//!
//! ## Components
//!
//! - [`embedding::EmbeddingGenerator`] — image bytes → f32 vector, via an
//!   injected [`embedding::VisionModel`] or a deterministic fallback.
//! - [`similarity::cosine`] — bounded pairwise score.
//! - [`engine::MatchEngine`] — the orchestration state machine, driven
//!   inline or from a background worker depending on configuration.
//! - [`notify::NotificationDispatcher`] — at-most-once notification per
//!   matched pair, one row per side with a resolvable contact.
//! - [`repo`] — repository traits for items, match results, and
//!   notifications, with an in-process [`repo::MemoryStore`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use refind::{EngineConfig, Item, ItemKind, MatchEngine, MemoryStore};
//! use refind::notify::LogTransport;
//!
//! # async fn demo() {
//! let store = Arc::new(MemoryStore::new());
//! let engine = MatchEngine::new(
//!     EngineConfig::default(),
//!     store.clone(),
//!     store.clone(),
//!     store.clone(),
//!     Arc::new(LogTransport),
//!     None, // no vision model: deterministic fallback embeddings
//! );
//!
//! let mut item = Item::new(1, ItemKind::Lost, "black umbrella");
//! item.image = Some(std::fs::read("umbrella.jpg").unwrap());
//! refind::repo::ItemRepository::insert(store.as_ref(), item).await.unwrap();
//!
//! engine.on_item_created(ItemKind::Lost, 1).await;
//! # }
//! ```

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod notify;
pub mod repo;
pub mod similarity;
pub mod types;

pub use crate::config::{ConfigError, DispatchBackend, EngineConfig};
pub use crate::embedding::{EmbeddingGenerator, VisionModel};
pub use crate::engine::{Comparison, MatchEngine};
pub use crate::error::{DeliveryError, EmbeddingError, MatchError, RepoError};
pub use crate::notify::{NotificationDispatcher, NotificationTransport};
pub use crate::repo::{
    ItemRepository, MatchResultRepository, MemoryStore, NotificationRepository, PairInsert,
};
pub use crate::similarity::cosine;
pub use crate::types::{
    Contact, Embedding, GeoPoint, Item, ItemId, ItemKind, MatchResult, MatchStatus, Notification,
    NotificationChannel, PairKey,
};
