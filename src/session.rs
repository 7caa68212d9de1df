//! # Comparison Run Management
//!
//! High-level orchestration of one comparison: two page sessions in, a
//! [`RunSummary`] plus ordered [`TileResult`]s out. Provides a builder-pattern
//! API for configuring the run.
//!
//! ## Architecture
//!
//! 1. **ComparisonRunBuilder**: fluent configuration, validated in `build()`
//!    before any session is touched
//! 2. **ComparisonRun**: owns both sessions for its whole lifetime
//! 3. **CancelToken**: shared flag the caller flips to stop between tiles
//!
//! ## Run Sequence
//!
//! - Both pages are scrolled to the top and settled, then measured
//! - The tiling plan is computed once from the two heights
//! - The capture pipeline walks the plan
//! - The aggregator folds the tiles into a summary
//!
//! Both sessions are closed on every exit path. A failed or cancelled run
//! returns only the error; no partial tiles escape.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use vp_metric::MetricOptions;

use crate::capture::{FixedDelay, PageSession, SettlePolicy};
use crate::config::ViewportProfile;
use crate::core::summary::{RunSummary, summarize};
use crate::core::tiling::{ViewportPlan, plan};
use crate::error::{CompareError, CompareResult};
use crate::processing::pipeline::{
    CapturePipeline, DEFAULT_CAPTURE_TIMEOUT, MetricEngine, SsimEngine, TileResult, guarded,
};

/// Library-level run options, produced from `CompareConfig::to_run_options`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub viewport: ViewportProfile,
    pub settle_delay: Duration,
    pub capture_timeout: Duration,
    pub metric: MetricOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            viewport: ViewportProfile::default(),
            settle_delay: FixedDelay::default().0,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            metric: MetricOptions::default(),
        }
    }
}

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run stop before its next tile.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a finished run hands to the caller. The caller owns the image
/// buffers from here on.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub tiles: Vec<TileResult>,
    pub plan: ViewportPlan,
}

/// One comparison between two loaded pages.
pub struct ComparisonRun {
    first: Box<dyn PageSession>,
    second: Box<dyn PageSession>,
    viewport: ViewportProfile,
    pipeline: CapturePipeline,
}

impl ComparisonRun {
    /// Create a new comparison run using the builder pattern.
    pub fn builder() -> ComparisonRunBuilder {
        ComparisonRunBuilder::new()
    }

    /// Run the comparison to completion, closing both sessions afterwards.
    pub async fn run(mut self) -> CompareResult<RunOutput> {
        let result = self.execute().await;

        for (label, session) in [("first", &mut self.first), ("second", &mut self.second)] {
            if let Err(e) = session.close().await {
                log::warn!("failed to close {} page session: {:#}", label, e);
            }
        }

        match &result {
            Ok(output) => log::info!(
                "comparison finished: {} tile(s), {} difference region(s)",
                output.summary.total_tiles,
                output.summary.total_differences
            ),
            Err(e) => log::error!("comparison aborted: {}", e),
        }
        result
    }

    async fn execute(&mut self) -> CompareResult<RunOutput> {
        let first = self.first.as_mut();
        let second = self.second.as_mut();
        let timeout = self.pipeline.capture_timeout();

        // Normalize any scrolling done while the pages loaded.
        self.pipeline.align(0, first, second).await?;

        let (height1, height2) = futures_util::future::try_join(
            guarded(timeout, 0, "first", "measure height", first.current_height()),
            guarded(timeout, 0, "second", "measure height", second.current_height()),
        )
        .await?;

        let plan = plan(height1, height2, self.viewport.height)?.with_width(self.viewport.width)?;
        log::info!(
            "page heights {}px / {}px, {} tile(s) at {}x{} with {}px step",
            height1,
            height2,
            plan.len(),
            self.viewport.width,
            self.viewport.height,
            plan.scroll_step
        );

        let tiles = self.pipeline.capture_and_score(&plan, first, second).await?;
        let summary = summarize(&tiles, &plan, (height1, height2));
        Ok(RunOutput {
            summary,
            tiles,
            plan,
        })
    }
}

/// Builder for creating comparison runs with fluent API.
pub struct ComparisonRunBuilder {
    first: Option<Box<dyn PageSession>>,
    second: Option<Box<dyn PageSession>>,
    viewport: ViewportProfile,
    settle: Arc<dyn SettlePolicy>,
    engine: Option<Arc<dyn MetricEngine>>,
    metric: MetricOptions,
    capture_timeout: Duration,
    cancel: CancelToken,
}

impl Default for ComparisonRunBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonRunBuilder {
    /// Create a new run builder.
    pub fn new() -> Self {
        Self {
            first: None,
            second: None,
            viewport: ViewportProfile::default(),
            settle: Arc::new(FixedDelay::default()),
            engine: None,
            metric: MetricOptions::default(),
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }

    /// Set the two pages to compare. The run takes exclusive ownership.
    pub fn with_sessions<A, B>(mut self, first: A, second: B) -> Self
    where
        A: PageSession + 'static,
        B: PageSession + 'static,
    {
        self.first = Some(Box::new(first));
        self.second = Some(Box::new(second));
        self
    }

    /// Same as [`with_sessions`](Self::with_sessions) for already boxed sessions.
    pub fn with_boxed_sessions(
        mut self,
        first: Box<dyn PageSession>,
        second: Box<dyn PageSession>,
    ) -> Self {
        self.first = Some(first);
        self.second = Some(second);
        self
    }

    pub fn with_viewport(mut self, viewport: ViewportProfile) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_settle_policy<S: SettlePolicy + 'static>(mut self, settle: S) -> Self {
        self.settle = Arc::new(settle);
        self
    }

    pub fn with_shared_settle_policy(mut self, settle: Arc<dyn SettlePolicy>) -> Self {
        self.settle = settle;
        self
    }

    /// Options for the default SSIM engine. Ignored when a custom engine is set.
    pub fn with_metric_options(mut self, metric: MetricOptions) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_engine<E: MetricEngine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply viewport, settle delay, timeout and metric options in one go.
    pub fn with_options(self, options: &RunOptions) -> Self {
        self.with_viewport(options.viewport)
            .with_settle_policy(FixedDelay(options.settle_delay))
            .with_capture_timeout(options.capture_timeout)
            .with_metric_options(options.metric)
    }

    /// Build the run. Fails before any session work on bad dimensions or a
    /// missing session.
    pub fn build(self) -> CompareResult<ComparisonRun> {
        if self.viewport.width == 0 {
            return Err(CompareError::invalid_dimension("viewport_width", 0));
        }
        if self.viewport.height == 0 {
            return Err(CompareError::invalid_dimension("viewport_height", 0));
        }
        if self.capture_timeout.is_zero() {
            return Err(CompareError::config(
                "capture_timeout",
                "0",
                "must be greater than zero",
            ));
        }

        let first = self
            .first
            .ok_or_else(|| CompareError::config("sessions", "none", "no first page session"))?;
        let second = self
            .second
            .ok_or_else(|| CompareError::config("sessions", "none", "no second page session"))?;

        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(SsimEngine::new(self.metric)));
        let pipeline = CapturePipeline::new(engine)
            .with_settle(self.settle)
            .with_capture_timeout(self.capture_timeout)
            .with_cancel(self.cancel);

        Ok(ComparisonRun {
            first,
            second,
            viewport: self.viewport,
            pipeline,
        })
    }
}

/// Compare two loaded pages at `viewport` with the given settle policy and
/// default metric options.
pub async fn run(
    first: Box<dyn PageSession>,
    second: Box<dyn PageSession>,
    viewport: ViewportProfile,
    settle: Arc<dyn SettlePolicy>,
) -> CompareResult<RunOutput> {
    ComparisonRun::builder()
        .with_boxed_sessions(first, second)
        .with_viewport(viewport)
        .with_shared_settle_policy(settle)
        .build()?
        .run()
        .await
}
