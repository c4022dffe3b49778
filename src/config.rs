//! Image handling settings for one capture.
//!
//! All embedding behaviour is controlled through [`ImageHandlingSettings`].
//! Settings are owned by the caller (they normally come from the
//! settings/storage layer as JSON) and are immutable for the duration of a
//! run. Build them with [`ImageHandlingSettings::builder()`] to get
//! validation, or deserialise them with [`ImageHandlingSettings::from_json`].

use crate::error::EmbedError;
use serde::{Deserialize, Serialize};

/// Hard ceiling on the length of one assembled data URL, in characters.
///
/// Larger inline payloads break downstream markdown rendering, so this is
/// enforced for every image, the featured one included.
pub const MAX_DATA_URL_CHARS: usize = 2_000_000;

/// Wall-clock budget for one decode/re-encode, in milliseconds.
///
/// Independent of `fetch_timeout_ms`.
pub const TRANSCODE_DEADLINE_MS: u64 = 2000;

/// Hard cap on a single image download, in bytes.
pub const MAX_FETCH_BYTES: usize = 25 * 1024 * 1024;

/// Settings controlling which images get inlined.
///
/// # Example
/// ```rust
/// use webclip_images::{ImageHandlingSettings, ImagePreference};
///
/// let settings = ImageHandlingSettings::builder()
///     .preference(ImagePreference::Always)
///     .max_embedded_images(5)
///     .quality(70)
///     .build()
///     .unwrap();
/// assert_eq!(settings.max_embedded_images, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageHandlingSettings {
    /// When to inline images. Default: [`ImagePreference::Smart`].
    pub preference: ImagePreference,

    /// Under `Smart`, non-featured images whose fetched size exceeds this are
    /// left external. Default: 512000 (500 KiB).
    pub size_threshold_bytes: u64,

    /// Maximum number of images inlined per capture. Default: 20.
    pub max_embedded_images: usize,

    /// Lossy re-encode quality, 0–100. Default: 85.
    pub quality: u8,

    /// Per-image fetch timeout in milliseconds. Default: 5000.
    pub fetch_timeout_ms: u64,
}

impl Default for ImageHandlingSettings {
    fn default() -> Self {
        Self {
            preference: ImagePreference::default(),
            size_threshold_bytes: 512_000,
            max_embedded_images: 20,
            quality: 85,
            fetch_timeout_ms: 5000,
        }
    }
}

impl ImageHandlingSettings {
    /// Create a new builder for `ImageHandlingSettings`.
    pub fn builder() -> ImageHandlingSettingsBuilder {
        ImageHandlingSettingsBuilder {
            settings: Self::default(),
        }
    }

    /// Parse settings from the JSON shape used by the settings store.
    ///
    /// Missing fields take their defaults; the result is validated.
    pub fn from_json(json: &str) -> Result<Self, EmbedError> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| EmbedError::InvalidConfig(format!("malformed settings JSON: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the range constraints the builder enforces.
    pub fn validate(&self) -> Result<(), EmbedError> {
        if self.quality > 100 {
            return Err(EmbedError::InvalidConfig(format!(
                "quality must be 0–100, got {}",
                self.quality
            )));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(EmbedError::InvalidConfig(
                "fetch timeout must be ≥ 1ms".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ImageHandlingSettings`].
#[derive(Debug)]
pub struct ImageHandlingSettingsBuilder {
    settings: ImageHandlingSettings,
}

impl ImageHandlingSettingsBuilder {
    pub fn preference(mut self, preference: ImagePreference) -> Self {
        self.settings.preference = preference;
        self
    }

    pub fn size_threshold_bytes(mut self, bytes: u64) -> Self {
        self.settings.size_threshold_bytes = bytes;
        self
    }

    pub fn max_embedded_images(mut self, n: usize) -> Self {
        self.settings.max_embedded_images = n;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.settings.quality = quality.min(100);
        self
    }

    pub fn fetch_timeout_ms(mut self, ms: u64) -> Self {
        self.settings.fetch_timeout_ms = ms;
        self
    }

    /// Build the settings, validating constraints.
    pub fn build(self) -> Result<ImageHandlingSettings, EmbedError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

/// User preference for inlining images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePreference {
    /// Inline every image, subject only to the count budget and the hard ceiling.
    Always,
    /// Inline the featured image, and other images only when their fetched
    /// size is under the threshold. (default)
    #[default]
    Smart,
    /// Never inline; no image is fetched.
    Never,
}

impl std::str::FromStr for ImagePreference {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "smart" => Ok(Self::Smart),
            "never" => Ok(Self::Never),
            other => Err(EmbedError::InvalidConfig(format!(
                "unknown image preference '{other}' (expected always, smart or never)"
            ))),
        }
    }
}
