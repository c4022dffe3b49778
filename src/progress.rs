//! Progress-callback trait for per-image embedding events.
//!
//! Attach an [`Arc<dyn EmbedProgressCallback>`] with
//! [`crate::embed::ImageEmbedder::progress_callback`] to receive events as
//! the orchestrator works through a document's images. Callers can forward
//! them to a progress bar, a log, or telemetry without the library knowing
//! how the host communicates.
//!
//! # Example
//!
//! ```rust
//! use webclip_images::{EmbedProgressCallback, ProcessedImage};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl EmbedProgressCallback for Counter {
//!     fn on_image_complete(&self, _index: usize, _total: usize, image: &ProcessedImage) {
//!         if image.is_embedded() {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use crate::output::ProcessedImage;
use std::sync::Arc;

/// Called by the orchestrator as it processes each image.
///
/// Images are handled one at a time, but different captures may share one
/// callback from different tasks, so implementations must be `Send + Sync`.
/// All methods default to no-ops.
pub trait EmbedProgressCallback: Send + Sync {
    /// Called once after detection, before any image is processed.
    ///
    /// # Arguments
    /// * `total_images`: number of references that will be processed
    fn on_run_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called before the policy is consulted for an image.
    ///
    /// # Arguments
    /// * `index`: 0-based position in prioritised order
    /// * `total`: total images in this run
    /// * `url`  : the image's original URL
    fn on_image_start(&self, index: usize, total: usize, url: &str) {
        let _ = (index, total, url);
    }

    /// Called with the final outcome for an image, embedded or not.
    fn on_image_complete(&self, index: usize, total: usize, image: &ProcessedImage) {
        let _ = (index, total, image);
    }

    /// Called once after every image has an outcome.
    ///
    /// # Arguments
    /// * `total_images`  : images processed
    /// * `embedded_count`: images inlined as data URLs
    fn on_run_complete(&self, total_images: usize, embedded_count: usize) {
        let _ = (total_images, embedded_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl EmbedProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type held by [`crate::embed::ImageEmbedder`].
pub type ProgressCallback = Arc<dyn EmbedProgressCallback>;
