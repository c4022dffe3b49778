//! Eager entry points: process every image of a document, then return.
//!
//! [`ImageEmbedder`] sequences the pipeline stages for one capture:
//!
//! ```text
//! detect → prioritize → for each image: policy → fetch → size check
//!                                        → transcode → encode → ceiling
//! ```
//!
//! Images are handled one at a time in prioritised order. The running count
//! of inlined images is a local accumulator of the loop, so concurrent
//! captures never share state. Once the loop starts nothing fails the run:
//! every problem degrades a single entry to an external link.
//!
//! Use [`crate::stream::embed_stream`] to receive entries as they finish.

use crate::config::ImageHandlingSettings;
use crate::error::{EmbedError, FetchError, ImageError};
use crate::output::{EmbedOutput, EmbedStats, EmbedType, ImageReference, OutputFormat, ProcessedImage, SkipReason};
use crate::pipeline::fetch::{self, HttpFetcher, ImageFetcher};
use crate::pipeline::policy::{self, Decision};
use crate::pipeline::transcode::{self, TRANSCODE_DEADLINE};
use crate::pipeline::{detect, encode, prioritize, rewrite};
use crate::progress::ProgressCallback;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Runs the embedding pipeline for captures that share one set of settings.
///
/// # Example
/// ```rust,no_run
/// use webclip_images::{ImageEmbedder, ImageHandlingSettings};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let embedder = ImageEmbedder::new(ImageHandlingSettings::default())?;
/// let html = r#"<article><img src="https://example.com/a.png"></article>"#;
/// let output = embedder.embed(html, Some("https://example.com/a.png")).await;
/// assert_eq!(output.images.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct ImageEmbedder<F = HttpFetcher> {
    settings: ImageHandlingSettings,
    fetcher: F,
    transcode_deadline: Duration,
    base_url: Option<Url>,
    progress: Option<ProgressCallback>,
}

impl ImageEmbedder<HttpFetcher> {
    /// Validate `settings` and build an embedder with its own HTTP client.
    pub fn new(settings: ImageHandlingSettings) -> Result<Self, EmbedError> {
        settings.validate()?;
        Ok(Self::with_fetcher(settings, HttpFetcher::new()?))
    }
}

impl<F: ImageFetcher> ImageEmbedder<F> {
    /// Build an embedder around any [`ImageFetcher`].
    pub fn with_fetcher(settings: ImageHandlingSettings, fetcher: F) -> Self {
        Self {
            settings,
            fetcher,
            transcode_deadline: TRANSCODE_DEADLINE,
            base_url: None,
            progress: None,
        }
    }

    /// Override the transcode deadline (default 2000 ms).
    pub fn transcode_deadline(mut self, deadline: Duration) -> Self {
        self.transcode_deadline = deadline;
        self
    }

    /// Base URL for resolving relative `<img src>` values.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn settings(&self) -> &ImageHandlingSettings {
        &self.settings
    }

    pub(crate) fn progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_ref()
    }

    /// Detect and prioritise, without touching the network.
    pub fn prepare(&self, html: &str, featured_url: Option<&str>) -> Vec<ImageReference> {
        prioritize::prioritize(detect::detect_images(html), featured_url)
    }

    /// Process every image in `html`, returning one entry per detected image.
    pub async fn embed(&self, html: &str, featured_url: Option<&str>) -> EmbedOutput {
        let start = Instant::now();
        let references = self.prepare(html, featured_url);
        let total = references.len();
        info!(
            "Embedding images: {} detected, preference {:?}, budget {}",
            total, self.settings.preference, self.settings.max_embedded_images
        );

        if let Some(cb) = self.progress() {
            cb.on_run_start(total);
        }

        let mut images = Vec::with_capacity(total);
        let mut embedded_count = 0usize;
        for (index, reference) in references.iter().enumerate() {
            if let Some(cb) = self.progress() {
                cb.on_image_start(index, total, &reference.url);
            }

            let image = self.process_one(reference, embedded_count).await;
            if image.is_embedded() {
                embedded_count += 1;
            }

            if let Some(cb) = self.progress() {
                cb.on_image_complete(index, total, &image);
            }
            images.push(image);
        }

        let stats = EmbedStats::from_images(&images, start.elapsed().as_millis() as u64);
        info!(
            "Image embedding complete: {}/{} inlined, {} failed, {}ms",
            stats.embedded, stats.detected, stats.failed, stats.total_duration_ms
        );

        if let Some(cb) = self.progress() {
            cb.on_run_complete(total, embedded_count);
        }

        EmbedOutput { images, stats }
    }

    /// Embed the images of `html` and substitute them into `markdown`, the
    /// converted form of the same document.
    pub async fn embed_into_markdown(
        &self,
        html: &str,
        markdown: &str,
        featured_url: Option<&str>,
    ) -> (String, EmbedOutput) {
        let output = self.embed(html, featured_url).await;
        let rewritten = rewrite::rewrite_markdown(markdown, &output.images);
        (rewritten, output)
    }

    /// Like [`embed`](Self::embed), returning only the per-image entries.
    pub async fn process_images(&self, html: &str, featured_url: Option<&str>) -> Vec<ProcessedImage> {
        self.embed(html, featured_url).await.images
    }

    /// Run policy, fetch, transcode and encode for one reference.
    ///
    /// `embedded_count` is the number of images already inlined in this run.
    /// Always returns an entry; failures are recorded on it.
    pub async fn process_one(&self, reference: &ImageReference, embedded_count: usize) -> ProcessedImage {
        let started = Instant::now();
        let mut result = ProcessedImage::external(reference);

        let size_limit = match policy::decide(reference, &self.settings, embedded_count) {
            Decision::Skip(reason) => {
                debug!("Keeping {} external: {:?}", reference.url, reason);
                result.skip_reason = Some(reason);
                result.processing_time_ms = Some(elapsed_ms(started));
                return result;
            }
            Decision::Embed { size_limit } => size_limit,
        };

        match self.inline(reference, size_limit).await {
            Ok(inlined) => {
                debug!(
                    "Inlined {} as {:?} ({} chars)",
                    reference.url,
                    inlined.format,
                    inlined.data_url.len()
                );
                result.embed_type = EmbedType::Base64;
                result.format = inlined.format;
                result.data_url = Some(inlined.data_url);
            }
            Err(Fallback::Skipped(reason)) => {
                debug!("Keeping {} external: {:?}", reference.url, reason);
                result.skip_reason = Some(reason);
            }
            Err(Fallback::Failed(error)) => {
                warn!("Image {} left external: {}", reference.url, error);
                result.error = Some(error);
            }
        }
        result.processing_time_ms = Some(elapsed_ms(started));
        result
    }

    async fn inline(&self, reference: &ImageReference, size_limit: Option<u64>) -> Result<Inlined, Fallback> {
        let url = fetch::resolve_url(&reference.url, self.base_url.as_ref())?;
        let timeout = Duration::from_millis(self.settings.fetch_timeout_ms);
        let fetched = self.fetcher.fetch(url.as_str(), timeout).await?;

        policy::check_fetched_size(size_limit, fetched.bytes.len()).map_err(Fallback::Skipped)?;

        let transcoded = transcode::transcode(fetched.bytes, self.settings.quality, self.transcode_deadline).await;
        let Some(mime) = encode::mime_for(transcoded.format, &transcoded.bytes, fetched.content_type.as_deref())
        else {
            return Err(ImageError::NotAnImage {
                content_type: fetched.content_type.unwrap_or_else(|| "none".to_string()),
            }
            .into());
        };
        let data_url = encode::to_data_url(&transcoded.bytes, &mime);
        if data_url.is_empty() {
            return Err(ImageError::EncodeFailed {
                bytes: transcoded.bytes.len(),
            }
            .into());
        }

        policy::check_output_size(&data_url)?;
        Ok(Inlined {
            data_url,
            format: transcoded.format,
        })
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

struct Inlined {
    data_url: String,
    format: OutputFormat,
}

/// Why an image that passed the pre-fetch policy still ended up external.
enum Fallback {
    Skipped(SkipReason),
    Failed(ImageError),
}

impl From<ImageError> for Fallback {
    fn from(e: ImageError) -> Self {
        Fallback::Failed(e)
    }
}

impl From<FetchError> for Fallback {
    fn from(e: FetchError) -> Self {
        Fallback::Failed(e.into())
    }
}

/// Embed the images of `html` with a fresh [`ImageEmbedder`].
///
/// # Errors
/// Returns `Err(EmbedError)` only when the settings are invalid or the HTTP
/// client cannot be built. Per-image problems are reported on the entries.
pub async fn embed_images(
    html: &str,
    featured_url: Option<&str>,
    settings: &ImageHandlingSettings,
) -> Result<EmbedOutput, EmbedError> {
    let embedder = ImageEmbedder::new(settings.clone())?;
    Ok(embedder.embed(html, featured_url).await)
}

/// Synchronous wrapper around [`embed_images`].
///
/// Creates a temporary tokio runtime internally.
pub fn embed_images_sync(
    html: &str,
    featured_url: Option<&str>,
    settings: &ImageHandlingSettings,
) -> Result<EmbedOutput, EmbedError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| EmbedError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(embed_images(html, featured_url, settings))
}

/// Embed the images of `html` and substitute them into `markdown` with a
/// fresh [`ImageEmbedder`].
pub async fn embed_into_markdown(
    html: &str,
    markdown: &str,
    featured_url: Option<&str>,
    settings: &ImageHandlingSettings,
) -> Result<(String, EmbedOutput), EmbedError> {
    let embedder = ImageEmbedder::new(settings.clone())?;
    Ok(embedder.embed_into_markdown(html, markdown, featured_url).await)
}
