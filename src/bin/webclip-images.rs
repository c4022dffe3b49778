//! CLI binary for webclip-images.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ImageHandlingSettings`, runs the embedder over an HTML file or URL, and
//! prints either the per-image report, JSON, or rewritten markdown.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use url::Url;
use webclip_images::pipeline::input::load_html;
use webclip_images::{
    rewrite_markdown, EmbedOutput, EmbedProgressCallback, EmbedType, ImageEmbedder,
    ImageHandlingSettings, ImagePreference, ProcessedImage, ProgressCallback,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a progress bar plus one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Embedding");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }
}

impl EmbedProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_images: usize) {
        self.bar.set_length(total_images as u64);
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_images} images"))
        ));
    }

    fn on_image_start(&self, _index: usize, _total: usize, url: &str) {
        self.bar.set_message(truncate(url, 60));
    }

    fn on_image_complete(&self, index: usize, total: usize, image: &ProcessedImage) {
        self.bar.println(format!("  {}", describe(index, total, image)));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_images: usize, embedded_count: usize) {
        self.bar.finish_and_clear();
        let elapsed = self
            .started
            .lock()
            .ok()
            .and_then(|s| *s)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        eprintln!(
            "{} {}/{} images inlined  {}",
            green("✔"),
            bold(&embedded_count.to_string()),
            total_images,
            dim(&format!("{elapsed}ms")),
        );
    }
}

/// One report line for an image outcome.
fn describe(index: usize, total: usize, image: &ProcessedImage) -> String {
    let time = image
        .processing_time_ms
        .map(|ms| dim(&format!("{ms:.0}ms")))
        .unwrap_or_default();
    let star = if image.is_featured { "★ " } else { "" };
    let url = truncate(&image.original_url, 60);

    match (&image.embed_type, &image.error, &image.skip_reason) {
        (EmbedType::Base64, _, _) => format!(
            "{} {:>3}/{:<3} {star}{url}  {}  {time}",
            green("✓"),
            index + 1,
            total,
            dim(&format!(
                "{:?}, {} chars",
                image.format,
                image.data_url.as_ref().map_or(0, String::len)
            )),
        ),
        (_, Some(err), _) => format!(
            "{} {:>3}/{:<3} {star}{url}  {}  {time}",
            red("✗"),
            index + 1,
            total,
            red(&truncate(&err.to_string(), 80)),
        ),
        (_, None, reason) => format!(
            "{} {:>3}/{:<3} {star}{url}  {}",
            dim("·"),
            index + 1,
            total,
            dim(&reason.map_or_else(|| "external".to_string(), |r| format!("{r:?}"))),
        ),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let head: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{head}\u{2026}")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Report what would be inlined for a saved article
  webclip-images article.html

  # Download a page and resolve relative image paths against it
  webclip-images https://example.com/blog/post

  # Inline everything (up to 5 images) and rewrite a converted note
  webclip-images article.html --preference always --max-images 5 --markdown note.md -o note.embedded.md

  # Structured output for scripting
  webclip-images article.html --featured https://example.com/hero.jpg --json > images.json

SETTINGS FILE:
  --settings reads the JSON the settings store writes, e.g.
  {"preference":"smart","sizeThresholdBytes":512000,"maxEmbeddedImages":20,"quality":85,"fetchTimeoutMs":5000}
  Flags given on the command line override values from the file.
"#;

/// Inline article images as data URLs under size, count and latency budgets.
#[derive(Parser, Debug)]
#[command(
    name = "webclip-images",
    version,
    about = "Inline article images as base64 data URLs under size, count and latency budgets",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local HTML file path or HTTP/HTTPS URL.
    input: String,

    /// Featured image URL (e.g. the page's og:image); processed first.
    #[arg(long, env = "WEBCLIP_FEATURED")]
    featured: Option<String>,

    /// Base URL for relative image paths (defaults to INPUT when it is a URL).
    #[arg(long, env = "WEBCLIP_BASE_URL")]
    base_url: Option<String>,

    /// JSON settings file (settings-store format).
    #[arg(long, env = "WEBCLIP_SETTINGS")]
    settings: Option<PathBuf>,

    /// Embedding preference: always, smart, never.
    #[arg(long, env = "WEBCLIP_PREFERENCE", value_enum)]
    preference: Option<PreferenceArg>,

    /// Smart mode: non-featured images above this many bytes stay external.
    #[arg(long, env = "WEBCLIP_SIZE_THRESHOLD")]
    size_threshold: Option<u64>,

    /// Maximum number of images inlined.
    #[arg(long, env = "WEBCLIP_MAX_IMAGES")]
    max_images: Option<usize>,

    /// JPEG re-encode quality (0–100).
    #[arg(long, env = "WEBCLIP_QUALITY",
          value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,

    /// Per-image fetch timeout in milliseconds.
    #[arg(long, env = "WEBCLIP_FETCH_TIMEOUT")]
    fetch_timeout: Option<u64>,

    /// Markdown file (converted from INPUT) to rewrite with inlined images.
    #[arg(long)]
    markdown: Option<PathBuf>,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "WEBCLIP_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON (EmbedOutput) instead of a report.
    #[arg(long, env = "WEBCLIP_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "WEBCLIP_NO_PROGRESS")]
    no_progress: bool,

    /// HTML download timeout in seconds (URL input only).
    #[arg(long, env = "WEBCLIP_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "WEBCLIP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "WEBCLIP_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PreferenceArg {
    Always,
    Smart,
    Never,
}

impl From<PreferenceArg> for ImagePreference {
    fn from(v: PreferenceArg) -> Self {
        match v {
            PreferenceArg::Always => ImagePreference::Always,
            PreferenceArg::Smart => ImagePreference::Smart,
            PreferenceArg::Never => ImagePreference::Never,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load input ───────────────────────────────────────────────────────
    let loaded = load_html(&cli.input, cli.download_timeout)
        .await
        .with_context(|| format!("Failed to load '{}'", cli.input))?;

    let settings = build_settings(&cli).await?;

    let base_url = match cli.base_url.as_deref() {
        Some(raw) => Some(Url::parse(raw).with_context(|| format!("Invalid --base-url '{raw}'"))?),
        None => loaded.base_url.clone(),
    };

    // ── Build embedder ───────────────────────────────────────────────────
    let mut embedder = ImageEmbedder::new(settings).context("Invalid image settings")?;
    if let Some(base) = base_url {
        embedder = embedder.base_url(base);
    }
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        embedder = embedder.progress_callback(cb);
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let output = embedder.embed(&loaded.html, cli.featured.as_deref()).await;

    let rendered = if let Some(ref md_path) = cli.markdown {
        let markdown = tokio::fs::read_to_string(md_path)
            .await
            .with_context(|| format!("Failed to read markdown from {:?}", md_path))?;
        rewrite_markdown(&markdown, &output.images)
    } else if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        report(&output)
    };

    if let Some(ref path) = cli.output {
        tokio::fs::write(path, &rendered)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        if !cli.quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !show_progress && !cli.json {
        eprintln!(
            "Inlined {}/{} images in {}ms ({} failed)",
            output.stats.embedded,
            output.stats.detected,
            output.stats.total_duration_ms,
            output.stats.failed
        );
    }

    Ok(())
}

/// Settings file (if any) overlaid with explicit flags.
async fn build_settings(cli: &Cli) -> Result<ImageHandlingSettings> {
    let base = if let Some(ref path) = cli.settings {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        ImageHandlingSettings::from_json(&json).context("Invalid settings file")?
    } else {
        ImageHandlingSettings::default()
    };

    ImageHandlingSettings::builder()
        .preference(cli.preference.map_or(base.preference, Into::into))
        .size_threshold_bytes(cli.size_threshold.unwrap_or(base.size_threshold_bytes))
        .max_embedded_images(cli.max_images.unwrap_or(base.max_embedded_images))
        .quality(cli.quality.unwrap_or(base.quality))
        .fetch_timeout_ms(cli.fetch_timeout.unwrap_or(base.fetch_timeout_ms))
        .build()
        .context("Invalid configuration")
}

/// Plain-text per-image report.
fn report(output: &EmbedOutput) -> String {
    let total = output.images.len();
    if total == 0 {
        return "No images found.".to_string();
    }
    output
        .images
        .iter()
        .enumerate()
        .map(|(i, img)| describe(i, total, img))
        .collect::<Vec<_>>()
        .join("\n")
}
