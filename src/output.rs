//! Data model shared by the pipeline stages and returned to callers.

use crate::error::ImageError;
use serde::{Deserialize, Serialize};

/// Declared pixel size of an `<img>`, present only when both attributes were
/// positive numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// One candidate image found in the article HTML.
///
/// `url` is never empty and never a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    pub url: String,
    pub alt: Option<String>,
    /// Set only by the prioritizer, for the image matching the featured URL.
    pub is_featured: bool,
    pub dimensions: Option<Dimensions>,
}

impl ImageReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt: None,
            is_featured: false,
            dimensions: None,
        }
    }
}

/// Whether an image is inlined or left as a remote reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedType {
    Base64,
    External,
}

/// Encoding of the bytes behind a data URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Re-encoded to the lossy target (JPEG).
    Lossy,
    /// The bytes exactly as fetched.
    Original,
}

impl OutputFormat {
    /// MIME type of the lossy target.
    pub const LOSSY_MIME: &'static str = "image/jpeg";
}

/// Why the policy kept an image external without it being a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Preference is `Never`.
    PreferenceNever,
    /// `max_embedded_images` already reached.
    BudgetExhausted,
    /// `Smart` preference and the fetched size exceeded the threshold.
    OverThreshold,
}

/// The embedding outcome for one detected image.
///
/// `data_url` is `Some` exactly when `embed_type` is [`EmbedType::Base64`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    pub original_url: String,
    pub embed_type: EmbedType,
    pub data_url: Option<String>,
    pub format: OutputFormat,
    pub alt: Option<String>,
    pub is_featured: bool,
    /// Wall-clock time spent on this image, from the policy decision to the
    /// final outcome.
    pub processing_time_ms: Option<f64>,
    pub error: Option<ImageError>,
    pub skip_reason: Option<SkipReason>,
}

impl ProcessedImage {
    /// An external entry carrying no data URL.
    pub(crate) fn external(reference: &ImageReference) -> Self {
        Self {
            original_url: reference.url.clone(),
            embed_type: EmbedType::External,
            data_url: None,
            format: OutputFormat::Original,
            alt: reference.alt.clone(),
            is_featured: reference.is_featured,
            processing_time_ms: None,
            error: None,
            skip_reason: None,
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.embed_type == EmbedType::Base64
    }
}

/// Summary statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedStats {
    /// References after detection and prioritisation.
    pub detected: usize,
    pub embedded: usize,
    pub external: usize,
    /// External entries that carry an error.
    pub failed: usize,
    /// Total characters of all data URLs produced.
    pub embedded_chars: usize,
    pub total_duration_ms: u64,
}

impl EmbedStats {
    pub(crate) fn from_images(images: &[ProcessedImage], total_duration_ms: u64) -> Self {
        let embedded = images.iter().filter(|i| i.is_embedded()).count();
        Self {
            detected: images.len(),
            embedded,
            external: images.len() - embedded,
            failed: images.iter().filter(|i| i.error.is_some()).count(),
            embedded_chars: images
                .iter()
                .filter_map(|i| i.data_url.as_ref())
                .map(String::len)
                .sum(),
            total_duration_ms,
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedOutput {
    /// One entry per detected image, in prioritised order.
    pub images: Vec<ProcessedImage>,
    pub stats: EmbedStats,
}
