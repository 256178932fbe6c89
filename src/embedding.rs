//! Embedding generation: image bytes in, fixed-length f32 vector out.
//!
//! Two paths produce a vector:
//!
//! 1. **Model path** — when a [`VisionModel`] is injected, the image is
//!    decoded, resized so its shorter side is 256 px, center-cropped to
//!    224×224, channel-normalized with the ImageNet mean/std triple, and
//!    fed to the model. The model is constructed once at startup and
//!    shared read-only across concurrent calls; there is no lazy global
//!    singleton here.
//! 2. **Fallback path** — without a model (or when the model path fails
//!    and the fallback is enabled), a deterministic pseudo-embedding is
//!    derived from the raw bytes: cyclic-repeat to the configured
//!    dimension, cast to f32, L2-normalize. Functional degradation, not
//!    semantics, but identical bytes always land at similarity 1.0.
//!
//! Both paths are pure functions of their input plus immutable weights:
//! byte-identical input yields identical output.

use std::sync::Arc;

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::EmbeddingError;
use crate::types::Embedding;

/// Shorter-side target before the center crop.
pub const RESIZE_SHORTER_SIDE: u32 = 256;
/// Side length of the square model input.
pub const CROP_SIZE: u32 = 224;
/// Per-channel normalization mean (RGB).
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel normalization std (RGB).
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A pretrained image feature extractor.
///
/// Implementations load their weights once and must be safe to share
/// across concurrent embedding calls; `infer` must not mutate them.
/// Inference runs with any gradient or randomness machinery disabled so
/// repeated calls are numerically stable.
pub trait VisionModel: Send + Sync {
    /// Model identifier used in logs.
    fn name(&self) -> &str;

    /// Run inference over a preprocessed CHW tensor and return the
    /// flattened feature vector.
    fn infer(&self, pixels: &[f32], shape: (usize, usize, usize)) -> Result<Vec<f32>, EmbeddingError>;
}

/// Turns raw image bytes into embeddings. Cheap to share behind an `Arc`.
pub struct EmbeddingGenerator {
    model: Option<Arc<dyn VisionModel>>,
    dimension: usize,
    fallback_enabled: bool,
}

impl EmbeddingGenerator {
    pub fn new(config: &EngineConfig, model: Option<Arc<dyn VisionModel>>) -> Self {
        Self {
            model,
            dimension: config.embedding_dimension,
            fallback_enabled: config.fallback_embedding,
        }
    }

    /// Generator for deployments without a vision model.
    pub fn fallback_only(dimension: usize) -> Self {
        Self {
            model: None,
            dimension,
            fallback_enabled: true,
        }
    }

    /// Whether `generate` can produce anything at all in this deployment.
    pub fn is_available(&self) -> bool {
        self.model.is_some() || self.fallback_enabled
    }

    /// Generate an embedding for the given image bytes.
    ///
    /// Empty input means "no image" and yields `Ok(None)`. With the
    /// fallback enabled this never returns an error; model or decode
    /// failures degrade to the pseudo-embedding. With the fallback
    /// disabled, failures surface as [`EmbeddingError`].
    pub fn generate(&self, image: &[u8]) -> Result<Option<Embedding>, EmbeddingError> {
        if image.is_empty() {
            return Ok(None);
        }

        if let Some(model) = &self.model {
            match model_embedding(model.as_ref(), image) {
                Ok(vector) => return Ok(Some(Embedding(vector))),
                Err(err) if self.fallback_enabled => {
                    warn!(
                        model = model.name(),
                        error = %err,
                        "model embedding failed; degrading to fallback"
                    );
                }
                Err(err) => return Err(err),
            }
        } else if !self.fallback_enabled {
            return Err(EmbeddingError::ModelUnavailable);
        }

        debug!(dimension = self.dimension, "generating fallback pseudo-embedding");
        Ok(Some(Embedding(fallback_embedding(image, self.dimension))))
    }
}

fn model_embedding(model: &dyn VisionModel, bytes: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|err| EmbeddingError::Decode(err.to_string()))?;
    let tensor = preprocess(&decoded);
    model.infer(
        &tensor,
        (3, CROP_SIZE as usize, CROP_SIZE as usize),
    )
}

/// Resize (shorter side to 256), center-crop to 224×224, and normalize
/// into a CHW f32 tensor.
pub fn preprocess(img: &DynamicImage) -> Vec<f32> {
    let (w, h) = (img.width().max(1), img.height().max(1));
    let (new_w, new_h) = if w <= h {
        let scaled = (u64::from(h) * u64::from(RESIZE_SHORTER_SIDE) / u64::from(w)) as u32;
        (RESIZE_SHORTER_SIDE, scaled.max(RESIZE_SHORTER_SIDE))
    } else {
        let scaled = (u64::from(w) * u64::from(RESIZE_SHORTER_SIDE) / u64::from(h)) as u32;
        (scaled.max(RESIZE_SHORTER_SIDE), RESIZE_SHORTER_SIDE)
    };
    let resized = img.resize_exact(new_w, new_h, FilterType::Triangle);

    let left = (new_w - CROP_SIZE) / 2;
    let top = (new_h - CROP_SIZE) / 2;
    let cropped = resized.crop_imm(left, top, CROP_SIZE, CROP_SIZE).to_rgb8();

    let plane = (CROP_SIZE * CROP_SIZE) as usize;
    let mut out = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in cropped.enumerate_pixels() {
        let offset = (y * CROP_SIZE + x) as usize;
        for c in 0..3 {
            out[c * plane + offset] =
                (f32::from(pixel[c]) / 255.0 - CHANNEL_MEAN[c]) / CHANNEL_STD[c];
        }
    }
    out
}

/// Deterministic pseudo-embedding from raw bytes: cyclic-repeat to
/// `dimension` components, cast to f32, L2-normalize. A zero-norm input
/// (all zero bytes) is returned un-normalized.
pub fn fallback_embedding(bytes: &[u8], dimension: usize) -> Vec<f32> {
    if bytes.is_empty() || dimension == 0 {
        return vec![0.0; dimension];
    }
    let mut vector: Vec<f32> = (0..dimension)
        .map(|i| f32::from(bytes[i % bytes.len()]))
        .collect();
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}
