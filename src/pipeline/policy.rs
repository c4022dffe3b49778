//! Per-image embedding policy.
//!
//! Decisions happen in two places: [`decide`] runs before any network call
//! (so `Never` and an exhausted budget cost nothing), and the size checks
//! run once the bytes are known.

use crate::config::{ImageHandlingSettings, ImagePreference, MAX_DATA_URL_CHARS};
use crate::error::ImageError;
use crate::output::{ImageReference, SkipReason};

/// Pre-fetch verdict for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Fetch it and try to inline it. `size_limit` is the byte threshold the
    /// fetched body must not exceed, when one applies.
    Embed { size_limit: Option<u64> },
    /// Leave it external without fetching.
    Skip(SkipReason),
}

/// Decide whether to fetch `reference` given how many images are already
/// inlined.
///
/// The count budget applies to every image. The featured image is always
/// processed first, so in practice it is only refused when the budget is 0.
pub fn decide(
    reference: &ImageReference,
    settings: &ImageHandlingSettings,
    embedded_count: usize,
) -> Decision {
    if settings.preference == ImagePreference::Never {
        return Decision::Skip(SkipReason::PreferenceNever);
    }
    if embedded_count >= settings.max_embedded_images {
        return Decision::Skip(SkipReason::BudgetExhausted);
    }
    // Smart embeds non-featured images tentatively: the remote size is only
    // known after the fetch.
    let size_limit = (settings.preference == ImagePreference::Smart && !reference.is_featured)
        .then_some(settings.size_threshold_bytes);
    Decision::Embed { size_limit }
}

/// Post-fetch threshold check against the limit chosen by [`decide`].
pub fn check_fetched_size(size_limit: Option<u64>, fetched_len: usize) -> Result<(), SkipReason> {
    match size_limit {
        Some(limit) if fetched_len as u64 > limit => Err(SkipReason::OverThreshold),
        _ => Ok(()),
    }
}

/// Hard ceiling on the assembled data URL, applied to every image.
pub fn check_output_size(data_url: &str) -> Result<(), ImageError> {
    if data_url.len() > MAX_DATA_URL_CHARS {
        return Err(ImageError::OutputOverflow {
            chars: data_url.len(),
            limit: MAX_DATA_URL_CHARS,
        });
    }
    Ok(())
}
