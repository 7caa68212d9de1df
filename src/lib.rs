//! # Viewport Compare Library
//!
//! Visual comparison of two rendered web pages, one viewport at a time.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `core`: Tiling planner and run aggregator (pure, synchronous)
//! - `capture`: Page session interface, settle policies and the headless Chrome backend
//! - `processing`: Per-tile capture and scoring pipeline
//! - `session`: High-level run orchestration, builder and cancellation
//! - `config`: Configuration management, validation and viewport profiles
//! - `report`: JSON and image export of a finished run
//!
//! Similarity scoring itself lives in the `vp-metric` crate.
//!
//! ## Features
//!
//! - **Full coverage**: tiles overlap by half a viewport and the last one sits
//!   flush with the end of the taller page
//! - **Best-effort scoring**: an undecodable capture leaves a tile unscored
//!   instead of failing the run
//! - **All-or-nothing runs**: a session failure aborts the run with the offset
//!   and cause, no partial report
//! - **Async/await**: built on Tokio; the two pages of a tile are driven concurrently
//!
//! ## Example
//!
//! ```rust,no_run
//! use viewport_compare::{CancelToken, config::CompareConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CompareConfig::new("example.com", "staging.example.com");
//! let output = viewport_compare::compare_urls(&config, CancelToken::new()).await?;
//! println!("average similarity: {:?}", output.summary.average_similarity);
//! # Ok(())
//! # }
//! ```

// Internal module imports
pub mod capture;
pub mod config;
pub mod core;
pub mod error;
pub mod processing;
pub mod report;
pub mod session;

/// Re-export error types for convenience
pub use error::{CompareError, CompareResult, HasRecoverySuggestion, HasSeverity, Retryable};

pub use capture::{FixedDelay, NoSettle, PageSession, Screenshot, SettlePolicy};
pub use config::{CompareConfig, ViewportKind, ViewportProfile};
pub use crate::core::{RunSummary, ViewportPlan, plan, summarize};
pub use processing::{MetricEngine, SsimEngine, TileResult};
pub use session::{CancelToken, ComparisonRun, RunOptions, RunOutput, run};

/// Re-export the metric crate
pub use vp_metric;

/// Open both URLs in headless Chrome and compare them with `config`.
///
/// Validates the configuration first, then launches the two browsers
/// concurrently. The browsers are shut down before this returns. `cancel`
/// stops the run before its next tile.
#[cfg(feature = "chrome")]
pub async fn compare_urls(config: &CompareConfig, cancel: CancelToken) -> anyhow::Result<RunOutput> {
    use anyhow::Context;
    use std::time::Duration;

    config.validate().map_err(anyhow::Error::msg)?;
    let options = config.to_run_options();
    let (url1, url2) = config.urls();
    let load_wait = Duration::from_millis(config.load_wait_ms);

    let (first, second) = futures_util::future::try_join(
        capture::ChromeSession::open(url1.as_str(), options.viewport, load_wait),
        capture::ChromeSession::open(url2.as_str(), options.viewport, load_wait),
    )
    .await
    .context("failed to open page sessions")?;

    let output = ComparisonRun::builder()
        .with_sessions(first, second)
        .with_options(&options)
        .with_cancel_token(cancel)
        .build()?
        .run()
        .await?;
    Ok(output)
}
