//! Streaming API: emit each image's outcome as soon as it is decided.
//!
//! [`embed_stream`] runs exactly the same per-image step as
//! [`crate::embed::ImageEmbedder::embed`] and yields entries in prioritised
//! order. Processing stays sequential; the stream just lets a caller start
//! rewriting or reporting before the slowest image has finished.

use crate::embed::ImageEmbedder;
use crate::output::{ImageReference, ProcessedImage};
use crate::pipeline::fetch::ImageFetcher;
use futures::stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-image outcomes.
pub type ImageStream = Pin<Box<dyn Stream<Item = ProcessedImage> + Send>>;

struct StreamState<F> {
    embedder: Arc<ImageEmbedder<F>>,
    references: std::vec::IntoIter<ImageReference>,
    total: usize,
    index: usize,
    embedded_count: usize,
}

/// Detect and prioritise the images of `html`, then process them lazily as
/// the returned stream is polled.
pub fn embed_stream<F>(embedder: Arc<ImageEmbedder<F>>, html: &str, featured_url: Option<&str>) -> ImageStream
where
    F: ImageFetcher + 'static,
{
    let references = embedder.prepare(html, featured_url);
    let total = references.len();
    info!("Starting streaming image embedding: {} detected", total);

    if let Some(cb) = embedder.progress() {
        cb.on_run_start(total);
    }

    let state = StreamState {
        embedder,
        references: references.into_iter(),
        total,
        index: 0,
        embedded_count: 0,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        let Some(reference) = state.references.next() else {
            if let Some(cb) = state.embedder.progress() {
                cb.on_run_complete(state.total, state.embedded_count);
            }
            return None;
        };

        if let Some(cb) = state.embedder.progress() {
            cb.on_image_start(state.index, state.total, &reference.url);
        }
        let image = state.embedder.process_one(&reference, state.embedded_count).await;
        if image.is_embedded() {
            state.embedded_count += 1;
        }
        if let Some(cb) = state.embedder.progress() {
            cb.on_image_complete(state.index, state.total, &image);
        }

        state.index += 1;
        Some((image, state))
    }))
}
