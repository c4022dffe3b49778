//! Substitute inlined images into converted markdown.
//!
//! The HTML→markdown conversion happens elsewhere; this is the last step of
//! that contract: every `![alt](url "title")` whose `url` was embedded gets
//! its data URL instead. External entries, and any URL that merely appears in
//! prose or in ordinary links, are left exactly as they were.

use crate::output::ProcessedImage;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::debug;

static RE_MD_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[(?P<alt>[^\]]*)\]\(\s*(?:<(?P<angled>[^>]+)>|(?P<bare>(?:[^()\s]|\([^()\s]*\))+))(?P<title>\s+"[^"]*")?\s*\)"#)
        .unwrap()
});

/// Replace embedded image URLs in `markdown` with their data URLs.
pub fn rewrite_markdown(markdown: &str, images: &[ProcessedImage]) -> String {
    let replacements: HashMap<&str, &str> = images
        .iter()
        .filter_map(|img| Some((img.original_url.as_str(), img.data_url.as_deref()?)))
        .collect();
    if replacements.is_empty() {
        return markdown.to_string();
    }

    let mut replaced = 0usize;
    let out = RE_MD_IMAGE.replace_all(markdown, |caps: &Captures<'_>| {
        let url = caps
            .name("angled")
            .or_else(|| caps.name("bare"))
            .map_or("", |m| m.as_str());
        match replacements.get(url) {
            Some(data_url) => {
                replaced += 1;
                let title = caps.name("title").map_or("", |m| m.as_str());
                format!("![{}]({}{})", &caps["alt"], data_url, title)
            }
            None => caps[0].to_string(),
        }
    });

    debug!("Rewrote {} markdown image links", replaced);
    out.into_owned()
}
