//! Core data model: reported items, their embeddings, evaluated match
//! results, and outbound notifications.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a reported item. Assigned by the upstream CRUD layer.
pub type ItemId = u64;

/// Which side of the lost/found corpus an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Lost,
    Found,
}

impl ItemKind {
    /// The corpus an item of this kind is matched against.
    pub fn opposite(self) -> Self {
        match self {
            ItemKind::Lost => ItemKind::Found,
            ItemKind::Found => ItemKind::Lost,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Lost => write!(f, "lost"),
            ItemKind::Found => write!(f, "found"),
        }
    }
}

/// Reporter contact details. Which field is usable depends on the
/// configured notification channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Optional geolocation attached to a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// A reported lost or found item.
///
/// Owned by the reporting user upstream; this engine only reads it and
/// writes back the cached embedding. An item whose photo changes needs its
/// embedding invalidated and recomputed, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub description: String,
    /// Raw bytes of the report photo, when one was uploaded.
    #[serde(default)]
    pub image: Option<Vec<u8>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub position: Option<GeoPoint>,
    #[serde(default)]
    pub contact: Option<Contact>,
    /// Embedding cached after the first successful generation.
    #[serde(default)]
    pub embedding: Option<Embedding>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Minimal item with every optional field unset.
    pub fn new(id: ItemId, kind: ItemKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            description: String::new(),
            image: None,
            location: None,
            position: None,
            contact: None,
            embedding: None,
            created_at: Utc::now(),
        }
    }
}

/// Fixed-length image fingerprint: a sequence of 32-bit floats.
///
/// The persisted form is a raw little-endian f32 array, matching the
/// `embedding` blob layout described in the storage contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Serialize to the raw little-endian f32 blob format.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() * 4);
        for v in &self.0 {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Deserialize from the raw blob format. A trailing partial chunk
    /// (blob length not a multiple of four) is ignored.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Embedding(values)
    }
}

/// Natural key of one evaluated (lost, found) comparison.
///
/// The key is the same no matter which side triggered the scan, which is
/// what makes cross-triggered evaluations collide instead of duplicating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub lost_id: ItemId,
    pub found_id: ItemId,
}

/// Outcome classification of a single comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    NotMatched,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Matched => write!(f, "Matched"),
            MatchStatus::NotMatched => write!(f, "Not Matched"),
        }
    }
}

/// One persisted pairwise comparison between a lost and a found item.
///
/// Non-matches are recorded too, so a future pass can skip pairs that were
/// already evaluated and auditors can see every score that was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub pair: PairKey,
    /// Source embeddings as stored blobs; empty when a side had none.
    pub lost_embedding: Vec<u8>,
    pub found_embedding: Vec<u8>,
    pub score: f32,
    /// Threshold that was in force when this pair was evaluated.
    pub threshold: f32,
    pub status: MatchStatus,
    /// Set once the dispatcher has fired for this pair.
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

/// Delivery channel for match notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    #[default]
    Email,
    Sms,
    #[serde(rename = "whatsapp")]
    WhatsApp,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationChannel::Email => write!(f, "email"),
            NotificationChannel::Sms => write!(f, "sms"),
            NotificationChannel::WhatsApp => write!(f, "whatsapp"),
        }
    }
}

/// An outbound message recorded for one side of a matched pair.
///
/// The row exists whether or not delivery succeeded; `sent` flips only
/// after a successful transport attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub channel: NotificationChannel,
    pub message: String,
    pub sent: bool,
    pub sent_at: DateTime<Utc>,
}
