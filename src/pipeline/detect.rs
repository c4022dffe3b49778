//! Image detection: enumerate candidate `<img>` references in article HTML.
//!
//! html5ever (via `scraper`) recovers from any malformed markup the way a
//! browser does, so there is no parse error to surface: broken input yields
//! whatever images survive recovery, often none. No network, no side effects.

use crate::output::{Dimensions, ImageReference};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());

/// Find every distinct image in document order.
///
/// - `data:` sources are skipped (already inline).
/// - Duplicates by exact URL are dropped; the first occurrence wins.
/// - `dimensions` is set only when both `width` and `height` are positive.
pub fn detect_images(html: &str) -> Vec<ImageReference> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for img in document.select(&IMG_SELECTOR) {
        let Some(url) = img.value().attr("src").map(str::trim) else {
            continue;
        };
        if url.is_empty() || is_data_url(url) {
            continue;
        }
        if !seen.insert(url.to_string()) {
            continue;
        }

        refs.push(ImageReference {
            url: url.to_string(),
            alt: img
                .value()
                .attr("alt")
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            is_featured: false,
            dimensions: declared_dimensions(&img),
        });
    }

    debug!("Detected {} distinct images", refs.len());
    refs
}

/// True for `data:` URLs, case-insensitively.
pub fn is_data_url(url: &str) -> bool {
    url.get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

fn declared_dimensions(img: &ElementRef<'_>) -> Option<Dimensions> {
    let width = parse_dimension(img.value().attr("width")?)?;
    let height = parse_dimension(img.value().attr("height")?)?;
    Some(Dimensions { width, height })
}

/// Parse an HTML dimension attribute (`"640"`, `"640.5"`, `"640px"`).
fn parse_dimension(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let raw = raw.strip_suffix("px").unwrap_or(raw).trim_end();
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    let rounded = value.round();
    if rounded < 1.0 || rounded > u32::MAX as f64 {
        return None;
    }
    Some(rounded as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(refs: &[ImageReference]) -> Vec<&str> {
        refs.iter().map(|r| r.url.as_str()).collect()
    }

    #[test]
    fn finds_images_in_document_order() {
        let html = r#"<article><p>intro</p><img src="https://x.test/a.png" alt="A">
            <figure><img src="https://x.test/b.jpg"></figure></article>"#;
        let refs = detect_images(html);
        assert_eq!(urls(&refs), vec!["https://x.test/a.png", "https://x.test/b.jpg"]);
        assert_eq!(refs[0].alt.as_deref(), Some("A"));
        assert_eq!(refs[1].alt, None);
        assert!(refs.iter().all(|r| !r.is_featured));
    }

    #[test]
    fn skips_data_urls_and_empty_src() {
        let html = r#"<img src="data:image/png;base64,AAAA"><img src="DATA:image/gif;base64,R0"><img src="  ">
            <img src="https://x.test/real.png">"#;
        assert_eq!(urls(&detect_images(html)), vec!["https://x.test/real.png"]);
    }

    #[test]
    fn dedupes_first_occurrence_wins() {
        let html = r#"<img src="/a.png" alt="first"><img src="/b.png"><img src="/a.png" alt="second">"#;
        let refs = detect_images(html);
        assert_eq!(urls(&refs), vec!["/a.png", "/b.png"]);
        assert_eq!(refs[0].alt.as_deref(), Some("first"));
    }

    #[test]
    fn dimensions_require_both_positive() {
        let html = r#"
            <img src="/both.png" width="640" height="480">
            <img src="/px.png" width="100px" height=" 50 ">
            <img src="/only-width.png" width="640">
            <img src="/zero.png" width="0" height="480">
            <img src="/negative.png" width="-3" height="4">
            <img src="/junk.png" width="auto" height="10">"#;
        let refs = detect_images(html);
        assert_eq!(refs[0].dimensions, Some(Dimensions { width: 640, height: 480 }));
        assert_eq!(refs[1].dimensions, Some(Dimensions { width: 100, height: 50 }));
        assert!(refs[2..].iter().all(|r| r.dimensions.is_none()));
    }

    #[test]
    fn malformed_html_does_not_panic() {
        let inputs = [
            "",
            "<<<>>>",
            "<img src=",
            "<img src=\"/unterminated.png",
            "<div><img src='/ok.png'><p></div></span>",
            "\u{0}\u{FFFD}<img src=\"/x.png\">",
        ];
        for html in inputs {
            let _ = detect_images(html);
        }
        assert_eq!(urls(&detect_images("<div><img src='/ok.png'><p></div></span>")), vec!["/ok.png"]);
    }

    #[test]
    fn img_without_src_is_ignored() {
        assert!(detect_images(r#"<img alt="no source"><img data-src="/lazy.png">"#).is_empty());
    }

    #[test]
    fn is_data_url_is_case_insensitive() {
        assert!(is_data_url("data:image/png;base64,"));
        assert!(is_data_url("Data:x"));
        assert!(!is_data_url("https://data.example/x.png"));
        assert!(!is_data_url("dat"));
    }
}
