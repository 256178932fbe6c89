//! Engine configuration with YAML file support.
//!
//! All knobs have serde defaults so a deployment can supply only the
//! fields it cares about:
//!
//! ```yaml
//! similarity_threshold: 0.80
//! embedding_dimension: 512
//! dispatch_backend: queued
//! queue_capacity: 256
//! notification_channel: email
//! fallback_embedding: true
//! embedding_timeout_ms: 10000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::NotificationChannel;

/// Errors that can occur when loading an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Execution strategy for ingestion-triggered matching passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchBackend {
    /// Run the pass on the calling task before returning.
    #[default]
    Inline,
    /// Hand the pass to a background worker over a bounded queue.
    Queued,
}

/// Configuration for the matching engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum cosine similarity for a pair to be classified `Matched`.
    /// The boundary is inclusive.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Length of fallback vectors, and the expected model output
    /// dimensionality for this deployment.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    #[serde(default)]
    pub dispatch_backend: DispatchBackend,

    /// Channel depth for the queued backend.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub notification_channel: NotificationChannel,

    /// When false the deployment runs "exact only": without a vision
    /// model every embedding attempt fails explicitly instead of
    /// degrading to the pseudo-embedding.
    #[serde(default = "true_value")]
    pub fallback_embedding: bool,

    /// Budget for image decode plus model inference per item.
    #[serde(default = "default_embedding_timeout_ms")]
    pub embedding_timeout_ms: u64,
}

impl EngineConfig {
    /// Load a YAML configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML configuration from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Validation(
                "similarity_threshold must be within [-1.0, 1.0]".to_string(),
            ));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::Validation(
                "embedding_dimension must be >= 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "queue_capacity must be >= 1".to_string(),
            ));
        }
        if self.embedding_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "embedding_timeout_ms must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            embedding_dimension: default_embedding_dimension(),
            dispatch_backend: DispatchBackend::default(),
            queue_capacity: default_queue_capacity(),
            notification_channel: NotificationChannel::default(),
            fallback_embedding: true,
            embedding_timeout_ms: default_embedding_timeout_ms(),
        }
    }
}

// Helper functions for serde defaults
fn default_similarity_threshold() -> f32 {
    0.80
}
fn default_embedding_dimension() -> usize {
    512
}
fn default_queue_capacity() -> usize {
    256
}
fn default_embedding_timeout_ms() -> u64 {
    10_000
}
fn true_value() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.similarity_threshold, 0.80);
        assert_eq!(cfg.embedding_dimension, 512);
        assert_eq!(cfg.dispatch_backend, DispatchBackend::Inline);
        assert_eq!(cfg.notification_channel, NotificationChannel::Email);
        assert!(cfg.fallback_embedding);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg = EngineConfig::from_yaml("similarity_threshold: 0.9\n").unwrap();
        assert_eq!(cfg.similarity_threshold, 0.9);
        assert_eq!(cfg.embedding_dimension, 512);
        assert_eq!(cfg.queue_capacity, 256);
    }

    #[test]
    fn full_yaml_parses() {
        let yaml = r#"
similarity_threshold: 0.75
embedding_dimension: 256
dispatch_backend: queued
queue_capacity: 32
notification_channel: whatsapp
fallback_embedding: false
embedding_timeout_ms: 2000
"#;
        let cfg = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.dispatch_backend, DispatchBackend::Queued);
        assert_eq!(cfg.queue_capacity, 32);
        assert_eq!(cfg.notification_channel, NotificationChannel::WhatsApp);
        assert!(!cfg.fallback_embedding);
        assert_eq!(cfg.embedding_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"dispatch_backend: inline\n").unwrap();
        let cfg = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.dispatch_backend, DispatchBackend::Inline);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let err = EngineConfig::from_yaml("similarity_threshold: 1.5\n").unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));
    }

    #[test]
    fn zero_dimension_rejected() {
        let err = EngineConfig::from_yaml("embedding_dimension: 0\n").unwrap_err();
        assert!(err.to_string().contains("embedding_dimension"));
    }

    #[test]
    fn unknown_channel_rejected_by_serde() {
        let result = EngineConfig::from_yaml("notification_channel: pigeon\n");
        assert!(matches!(result, Err(ConfigError::YamlParse(_))));
    }
}
