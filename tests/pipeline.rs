//! Orchestration tests against an in-memory fetcher.
//!
//! These cover the whole per-image loop (policy, fetch, transcode, encode,
//! ceiling) without touching the network.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, RgbImage};
use webclip_images::{
    EmbedType, FetchError, FetchedImage, ImageEmbedder, ImageError, ImageFetcher,
    ImageHandlingSettings, ImagePreference, OutputFormat, ProcessedImage, SkipReason,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Serves canned responses by URL and counts calls.
#[derive(Default, Clone)]
struct MockFetcher {
    responses: HashMap<String, Result<FetchedImage, FetchError>>,
    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn image(mut self, url: &str, bytes: Vec<u8>, content_type: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Ok(FetchedImage {
                bytes,
                content_type: Some(content_type.to_string()),
            }),
        );
        self
    }

    fn failing(mut self, url: &str, error: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }
}

impl ImageFetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedImage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses.get(url).cloned().unwrap_or(Err(FetchError::Status { status: 404 }))
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([(x * 7) as u8, (y * 13) as u8, 90]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode test png");
    buf.into_inner()
}

fn settings(preference: ImagePreference) -> ImageHandlingSettings {
    ImageHandlingSettings {
        preference,
        ..Default::default()
    }
}

fn urls(images: &[ProcessedImage]) -> Vec<&str> {
    images.iter().map(|i| i.original_url.as_str()).collect()
}

const THREE_IMAGES: &str = r#"
<article>
  <img src="https://cdn.test/a.png" alt="A">
  <p>text</p>
  <img src="https://cdn.test/b.png" alt="B">
  <img src="https://cdn.test/c.png" alt="C">
</article>"#;

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn budget_of_two_leaves_third_image_external() {
    let fetcher = MockFetcher::default()
        .image("https://cdn.test/a.png", png(8, 8), "image/png")
        .image("https://cdn.test/b.png", png(8, 8), "image/png")
        .image("https://cdn.test/c.png", png(8, 8), "image/png");
    let calls = fetcher.calls();
    let mut s = settings(ImagePreference::Always);
    s.max_embedded_images = 2;
    let embedder = ImageEmbedder::with_fetcher(s, fetcher);

    let output = embedder.embed(THREE_IMAGES, None).await;

    assert_eq!(output.images.len(), 3);
    assert_eq!(output.images[0].embed_type, EmbedType::Base64);
    assert_eq!(output.images[1].embed_type, EmbedType::Base64);
    assert_eq!(output.images[2].embed_type, EmbedType::External);
    assert_eq!(output.images[2].skip_reason, Some(SkipReason::BudgetExhausted));
    // The third image is refused before any fetch.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(output.stats.embedded, 2);
    assert_eq!(output.stats.external, 1);
}

#[tokio::test]
async fn featured_image_is_processed_first() {
    let html = r#"<img src="https://cdn.test/first.png"><img src="https://cdn.test/second.png">"#;
    let fetcher = MockFetcher::default()
        .image("https://cdn.test/first.png", png(4, 4), "image/png")
        .image("https://cdn.test/second.png", png(4, 4), "image/png");
    let embedder = ImageEmbedder::with_fetcher(settings(ImagePreference::Smart), fetcher);

    let output = embedder.embed(html, Some("https://cdn.test/second.png")).await;

    assert_eq!(urls(&output.images), vec!["https://cdn.test/second.png", "https://cdn.test/first.png"]);
    assert!(output.images[0].is_featured);
    assert_eq!(output.images[0].embed_type, EmbedType::Base64);
    assert!(!output.images[1].is_featured);
}

#[tokio::test]
async fn network_failure_only_affects_that_image() {
    let fetcher = MockFetcher::default()
        .image("https://cdn.test/a.png", png(8, 8), "image/png")
        .failing(
            "https://cdn.test/b.png",
            FetchError::Transport {
                detail: "connection reset".into(),
            },
        )
        .image("https://cdn.test/c.png", png(8, 8), "image/png");
    let embedder = ImageEmbedder::with_fetcher(settings(ImagePreference::Always), fetcher);

    let output = embedder.embed(THREE_IMAGES, None).await;

    let failed = &output.images[1];
    assert_eq!(failed.embed_type, EmbedType::External);
    assert!(failed.data_url.is_none());
    let err = failed.error.as_ref().expect("error recorded");
    assert!(matches!(err, ImageError::Fetch { source: FetchError::Transport { .. } }));
    assert!(!err.to_string().is_empty());

    assert_eq!(output.images[0].embed_type, EmbedType::Base64);
    assert_eq!(output.images[2].embed_type, EmbedType::Base64);
    assert_eq!(output.stats.failed, 1);
}

#[tokio::test]
async fn decodable_image_is_reencoded_as_jpeg() {
    let fetcher = MockFetcher::default().image("https://cdn.test/a.png", png(16, 16), "image/png");
    let embedder = ImageEmbedder::with_fetcher(settings(ImagePreference::Always), fetcher);

    let output = embedder.embed(r#"<img src="https://cdn.test/a.png">"#, None).await;

    let img = &output.images[0];
    assert_eq!(img.format, OutputFormat::Lossy);
    let data_url = img.data_url.as_deref().expect("data url");
    assert!(data_url.starts_with("data:image/jpeg;base64,"), "got {}", &data_url[..40]);
    assert!(!data_url.contains('\n'));
    assert!(img.processing_time_ms.is_some());
}

#[tokio::test]
async fn undecodable_bytes_keep_original_format() {
    let fetcher = MockFetcher::default().image(
        "https://cdn.test/logo.svg",
        b"<svg xmlns='http://www.w3.org/2000/svg'/>".to_vec(),
        "image/svg+xml",
    );
    let embedder = ImageEmbedder::with_fetcher(settings(ImagePreference::Always), fetcher);

    let output = embedder.embed(r#"<img src="https://cdn.test/logo.svg">"#, None).await;

    assert_eq!(output.images[0].format, OutputFormat::Original);
    assert!(output.images[0]
        .data_url
        .as_deref()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));
}

#[tokio::test]
async fn html_body_is_not_inlined_and_keeps_budget() {
    let fetcher = MockFetcher::default()
        .image(
            "https://cdn.test/a.png",
            b"<html><body>Please log in to view this image</body></html>".to_vec(),
            "text/html",
        )
        .image("https://cdn.test/b.png", png(4, 4), "image/png");
    let mut s = settings(ImagePreference::Always);
    s.max_embedded_images = 1;
    let embedder = ImageEmbedder::with_fetcher(s, fetcher);

    let output = embedder
        .embed(r#"<img src="https://cdn.test/a.png"><img src="https://cdn.test/b.png">"#, None)
        .await;

    let login_wall = &output.images[0];
    assert_eq!(login_wall.embed_type, EmbedType::External);
    assert!(login_wall.data_url.is_none());
    assert_eq!(
        login_wall.error,
        Some(ImageError::NotAnImage {
            content_type: "text/html".into()
        })
    );
    // The failure did not use up the only slot.
    assert_eq!(output.images[1].embed_type, EmbedType::Base64);
}

#[tokio::test]
async fn embed_into_markdown_rewrites_only_inlined_links() {
    let html = r#"<img src="https://cdn.test/a.png" alt="A"><img src="https://cdn.test/b.png" alt="B">"#;
    let markdown = "# Post\n\n![A](https://cdn.test/a.png)\n\n![B](https://cdn.test/b.png \"Bee\")\n";
    let fetcher = MockFetcher::default()
        .image("https://cdn.test/a.png", png(4, 4), "image/png")
        .failing("https://cdn.test/b.png", FetchError::Timeout { ms: 5000 });
    let embedder = ImageEmbedder::with_fetcher(settings(ImagePreference::Always), fetcher);

    let (note, output) = embedder.embed_into_markdown(html, markdown, None).await;

    let data_url = output.images[0].data_url.as_deref().expect("a.png inlined");
    assert!(note.contains(&format!("![A]({data_url})")));
    assert!(note.contains(r#"![B](https://cdn.test/b.png "Bee")"#));
    assert!(note.starts_with("# Post\n"));
    assert!(!note.contains("https://cdn.test/a.png"));
}

// ── Policy ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn never_preference_makes_no_fetches() {
    let fetcher = MockFetcher::default()
        .image("https://cdn.test/a.png", png(8, 8), "image/png")
        .image("https://cdn.test/b.png", png(8, 8), "image/png");
    let calls = fetcher.calls();
    let embedder = ImageEmbedder::with_fetcher(settings(ImagePreference::Never), fetcher);

    let output = embedder.embed(THREE_IMAGES, Some("https://cdn.test/a.png")).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(output.images.iter().all(|i| i.embed_type == EmbedType::External));
    assert!(output.images.iter().all(|i| i.processing_time_ms.is_some()));
    assert!(output
        .images
        .iter()
        .all(|i| i.skip_reason == Some(SkipReason::PreferenceNever) && i.error.is_none()));
}

#[tokio::test]
async fn smart_threshold_exempts_featured_image() {
    let big = vec![7u8; 5000];
    let fetcher = MockFetcher::default()
        .image("https://cdn.test/a.png", big.clone(), "image/png")
        .image("https://cdn.test/b.png", big, "image/png")
        .image("https://cdn.test/c.png", vec![7u8; 50], "image/png");
    let mut s = settings(ImagePreference::Smart);
    s.size_threshold_bytes = 1000;
    let embedder = ImageEmbedder::with_fetcher(s, fetcher);

    let output = embedder.embed(THREE_IMAGES, Some("https://cdn.test/b.png")).await;

    assert_eq!(
        urls(&output.images),
        vec!["https://cdn.test/b.png", "https://cdn.test/a.png", "https://cdn.test/c.png"]
    );
    // Featured: over threshold but still inlined.
    assert_eq!(output.images[0].embed_type, EmbedType::Base64);
    // Non-featured over threshold: external, no error.
    assert_eq!(output.images[1].embed_type, EmbedType::External);
    assert_eq!(output.images[1].skip_reason, Some(SkipReason::OverThreshold));
    assert!(output.images[1].error.is_none());
    // Non-featured under threshold.
    assert_eq!(output.images[2].embed_type, EmbedType::Base64);
}

#[tokio::test]
async fn zero_budget_refuses_even_the_featured_image() {
    let fetcher = MockFetcher::default().image("https://cdn.test/a.png", png(4, 4), "image/png");
    let calls = fetcher.calls();
    let mut s = settings(ImagePreference::Always);
    s.max_embedded_images = 0;
    let embedder = ImageEmbedder::with_fetcher(s, fetcher);

    let output = embedder
        .embed(r#"<img src="https://cdn.test/a.png">"#, Some("https://cdn.test/a.png"))
        .await;

    assert_eq!(output.images[0].embed_type, EmbedType::External);
    assert_eq!(output.images[0].skip_reason, Some(SkipReason::BudgetExhausted));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failures_do_not_consume_budget() {
    let fetcher = MockFetcher::default()
        .failing("https://cdn.test/a.png", FetchError::Timeout { ms: 5000 })
        .image("https://cdn.test/b.png", png(4, 4), "image/png")
        .image("https://cdn.test/c.png", png(4, 4), "image/png");
    let mut s = settings(ImagePreference::Always);
    s.max_embedded_images = 2;
    let embedder = ImageEmbedder::with_fetcher(s, fetcher);

    let output = embedder.embed(THREE_IMAGES, None).await;

    assert_eq!(output.images[0].embed_type, EmbedType::External);
    assert_eq!(output.images[1].embed_type, EmbedType::Base64);
    assert_eq!(output.images[2].embed_type, EmbedType::Base64);
}

#[tokio::test]
async fn oversized_data_url_falls_back_to_external() {
    // Undecodable, so it stays Original and base64 grows it past the ceiling.
    let huge = vec![0u8; 1_600_000];
    let fetcher = MockFetcher::default().image("https://cdn.test/huge.png", huge, "image/png");
    let embedder = ImageEmbedder::with_fetcher(settings(ImagePreference::Always), fetcher);

    let output = embedder
        .embed(r#"<img src="https://cdn.test/huge.png">"#, Some("https://cdn.test/huge.png"))
        .await;

    let img = &output.images[0];
    assert_eq!(img.embed_type, EmbedType::External);
    assert!(img.data_url.is_none());
    let err = img.error.as_ref().expect("overflow error");
    assert!(matches!(err, ImageError::OutputOverflow { .. }));
    assert!(err.to_string().contains("too large"));
}

// ── Invariants ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_output_per_detected_image_and_budget_holds() {
    let html = r#"
        <img src="https://cdn.test/1.png">
        <img src="https://cdn.test/2.png">
        <img src="https://cdn.test/1.png">
        <img src="data:image/png;base64,AAAA">
        <img src="https://cdn.test/3.png">
        <img src="https://cdn.test/4.png">
        <img src="https://cdn.test/5.png">"#;
    let fetcher = (1..=5).fold(MockFetcher::default(), |f, i| {
        f.image(&format!("https://cdn.test/{i}.png"), png(4, 4), "image/png")
    });

    for budget in [0usize, 1, 3, 10] {
        let mut s = settings(ImagePreference::Always);
        s.max_embedded_images = budget;
        let embedder = ImageEmbedder::with_fetcher(s, fetcher.clone());

        let output = embedder.embed(html, None).await;

        assert_eq!(output.images.len(), 5, "duplicates and data: URLs are not detected");
        assert_eq!(output.stats.detected, 5);
        let embedded = output.images.iter().filter(|i| i.embed_type == EmbedType::Base64).count();
        assert_eq!(embedded, budget.min(5));
        for img in &output.images {
            // Base64 entries always carry a data URL, external ones never do.
            assert_eq!(img.embed_type == EmbedType::Base64, img.data_url.is_some());
        }
    }
}

#[tokio::test]
async fn relative_sources_resolve_against_base_url() {
    let fetcher = MockFetcher::default().image("https://blog.test/media/a.png", png(4, 4), "image/png");
    let embedder = ImageEmbedder::with_fetcher(settings(ImagePreference::Always), fetcher)
        .base_url(url::Url::parse("https://blog.test/posts/hello").unwrap());

    let output = embedder.embed(r#"<img src="/media/a.png">"#, None).await;

    assert_eq!(output.images[0].embed_type, EmbedType::Base64);
    assert_eq!(output.images[0].original_url, "/media/a.png");
}
