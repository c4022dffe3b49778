//! # webclip-images
//!
//! Adaptive image embedding for web clippings.
//!
//! A web clipper turns an article into a markdown note. Images in that note
//! are remote links that can rot, so the clipper may inline them as base64
//! data URLs instead. Inlining everything bloats notes and can break
//! markdown renderers, so this crate decides per image, under four budgets:
//!
//! - a byte-size threshold (`Smart` preference, non-featured images only),
//! - a maximum number of inlined images per capture,
//! - a hard 2,000,000-character ceiling on each data URL,
//! - a 2-second deadline on the lossy re-encode step.
//!
//! ## Pipeline Overview
//!
//! ```text
//! article HTML + featured URL + settings
//!  │
//!  ├─ 1. Detect      distinct <img> references, declared dimensions
//!  ├─ 2. Prioritise  featured image first
//!  ├─ 3. Policy      skip before fetching (Never, budget exhausted)
//!  ├─ 4. Fetch       GET with a hard timeout (the only network I/O)
//!  ├─ 5. Transcode   JPEG re-encode on the blocking pool, soft deadline
//!  ├─ 6. Encode      chunked base64 data URL
//!  └─ 7. Assemble    one ProcessedImage per detected image
//! ```
//!
//! Nothing after detection fails the run. A failed image keeps its external
//! URL and records the reason on its [`ProcessedImage`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use webclip_images::{embed_images, rewrite_markdown, ImageHandlingSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let html = r#"<article><img src="https://example.com/hero.jpg" alt="Hero"></article>"#;
//!     let settings = ImageHandlingSettings::default();
//!     let output = embed_images(html, Some("https://example.com/hero.jpg"), &settings).await?;
//!
//!     let markdown = "![Hero](https://example.com/hero.jpg)";
//!     println!("{}", rewrite_markdown(markdown, &output.images));
//!     eprintln!("{}/{} images inlined", output.stats.embedded, output.stats.detected);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `webclip-images` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod embed;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ImageHandlingSettings, ImageHandlingSettingsBuilder, ImagePreference, MAX_DATA_URL_CHARS,
    TRANSCODE_DEADLINE_MS,
};
pub use embed::{embed_images, embed_images_sync, embed_into_markdown, ImageEmbedder};
pub use error::{EmbedError, FetchError, ImageError};
pub use output::{
    Dimensions, EmbedOutput, EmbedStats, EmbedType, ImageReference, OutputFormat, ProcessedImage,
    SkipReason,
};
pub use pipeline::detect::detect_images;
pub use pipeline::fetch::{FetchedImage, HttpFetcher, ImageFetcher};
pub use pipeline::prioritize::prioritize;
pub use pipeline::rewrite::rewrite_markdown;
pub use progress::{EmbedProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{embed_stream, ImageStream};
