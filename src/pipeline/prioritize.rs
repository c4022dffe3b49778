//! Featured-image prioritisation.
//!
//! Page metadata (e.g. an `og:image` preview) may single out one image. It is
//! moved to the front so it is processed first, while the embedded-count
//! budget is still untouched.

use crate::output::ImageReference;

/// Move the reference whose URL equals `featured_url` to index 0 and mark it
/// featured. Every other reference keeps its relative order.
///
/// Returns the input unchanged when `featured_url` is `None` or matches
/// nothing.
pub fn prioritize(mut refs: Vec<ImageReference>, featured_url: Option<&str>) -> Vec<ImageReference> {
    let Some(featured_url) = featured_url else {
        return refs;
    };
    let Some(pos) = refs.iter().position(|r| r.url == featured_url) else {
        return refs;
    };

    refs[pos].is_featured = true;
    // Shifts [0, pos) right by one; O(n), order of the rest preserved.
    refs[..=pos].rotate_right(1);
    refs
}
