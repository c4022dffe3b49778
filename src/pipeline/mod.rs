//! Pipeline stages for image embedding.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the orchestrator in [`crate::embed`] only sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! detect ──▶ prioritize ──▶ policy ──▶ fetch ──▶ transcode ──▶ encode ──▶ policy (ceiling)
//! (scraper)   (featured)     (budget)   (reqwest)  (JPEG, 2s)   (base64)
//! ```
//!
//! 1. [`detect`]    : enumerate distinct `<img>` references; no I/O
//! 2. [`prioritize`]: move the featured image to the front
//! 3. [`policy`]    : decide before fetching; size checks after
//! 4. [`fetch`]     : the only stage with network I/O, hard timeout
//! 5. [`transcode`] : lossy re-encode on the blocking pool, soft deadline
//! 6. [`encode`]    : chunked base64 data URL
//!
//! [`rewrite`] and [`input`] sit outside the per-image loop: one substitutes
//! results into converted markdown, the other loads HTML for the CLI.

pub mod detect;
pub mod encode;
pub mod fetch;
pub mod input;
pub mod policy;
pub mod prioritize;
pub mod rewrite;
pub mod transcode;
