//! # Capture Pipeline
//!
//! Walks a [`ViewportPlan`] tile by tile, drives both page sessions to each
//! offset, captures them and scores the pair.
//!
//! ## Per-Tile Sequence
//!
//! 1. **Cancel check**: a run is only ever aborted between tiles
//! 2. **Scroll**: both sessions scroll to the offset; both must finish before going on
//! 3. **Settle**: the configured [`SettlePolicy`] decides when the page is ready
//! 4. **Drift check**: sessions that report their scroll position are compared
//!    against where they should be; more than 10 px off is logged, not fatal
//! 5. **Capture**: both viewports are captured; both must finish before scoring
//! 6. **Score**: captures of different pixel size are downscaled to the common
//!    size, then handed to the [`MetricEngine`]
//!
//! Any scroll or capture failure, or a timeout, aborts the whole run with
//! `CaptureFailure`. Tiles produced so far are dropped with the error.
//! A capture that fails to decode is not a failure: its tile keeps an
//! undefined score.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use image::RgbaImage;
use vp_metric::{Comparison, MetricOptions, Rect};

use crate::capture::{NoSettle, PageSession, Screenshot, SettlePolicy};
use crate::core::tiling::ViewportPlan;
use crate::error::{CompareError, CompareResult};
use crate::session::CancelToken;

/// Largest tolerated gap between requested and reported scroll position.
pub const SCROLL_DRIFT_TOLERANCE: u32 = 10;

/// Default per-operation timeout.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);

/// Scored capture pair at one offset. Owns its image buffers.
#[derive(Debug, Clone)]
pub struct TileResult {
    /// 0-based position in the plan.
    pub index: usize,
    /// Scroll offset requested from both pages.
    pub offset: u32,
    /// Capture of the first page, downscaled to the common size when the pair differed.
    pub image1: Screenshot,
    pub image2: Screenshot,
    /// `None` when a capture could not be decoded.
    pub similarity_score: Option<f64>,
    pub difference_regions: Option<Vec<Rect>>,
    pub num_differences: usize,
}

/// Scores one pair of equally sized captures.
pub trait MetricEngine: Send + Sync {
    /// `None` when no score can be produced. Never aborts the tile.
    fn compare(&self, a: &RgbaImage, b: &RgbaImage) -> Option<Comparison>;
}

/// SSIM-based engine from `vp-metric`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SsimEngine {
    pub options: MetricOptions,
}

impl SsimEngine {
    pub fn new(options: MetricOptions) -> Self {
        Self { options }
    }
}

impl MetricEngine for SsimEngine {
    fn compare(&self, a: &RgbaImage, b: &RgbaImage) -> Option<Comparison> {
        match vp_metric::compare(a, b, &self.options) {
            Ok(comparison) => Some(comparison),
            Err(e) => {
                log::warn!("metric unavailable for tile: {}", e);
                None
            }
        }
    }
}

/// Tile loop over two page sessions.
pub struct CapturePipeline {
    engine: Arc<dyn MetricEngine>,
    settle: Arc<dyn SettlePolicy>,
    capture_timeout: Duration,
    cancel: CancelToken,
}

impl CapturePipeline {
    pub fn new(engine: Arc<dyn MetricEngine>) -> Self {
        Self {
            engine,
            settle: Arc::new(NoSettle),
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_settle(mut self, settle: Arc<dyn SettlePolicy>) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn capture_timeout(&self) -> Duration {
        self.capture_timeout
    }

    /// Bring both sessions to `offset` and let them settle.
    pub async fn align(
        &self,
        offset: u32,
        first: &mut dyn PageSession,
        second: &mut dyn PageSession,
    ) -> CompareResult<()> {
        let timeout = self.capture_timeout;
        futures_util::future::try_join(
            guarded(timeout, offset, "first", "scroll", first.scroll_to(offset)),
            guarded(timeout, offset, "second", "scroll", second.scroll_to(offset)),
        )
        .await?;
        self.settle.settle(offset).await;
        Ok(())
    }

    /// Capture and score every tile of `plan` in increasing offset order.
    pub async fn capture_and_score(
        &self,
        plan: &ViewportPlan,
        first: &mut dyn PageSession,
        second: &mut dyn PageSession,
    ) -> CompareResult<Vec<TileResult>> {
        let timeout = self.capture_timeout;
        let mut tiles = Vec::with_capacity(plan.len());

        for (index, &offset) in plan.offsets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::warn!("run cancelled before tile {} of {}", index + 1, plan.len());
                return Err(CompareError::cancelled(tiles.len()));
            }

            self.align(offset, first, second).await?;

            check_drift(plan, offset, plan.page_heights.0, "first", timeout, first).await?;
            check_drift(plan, offset, plan.page_heights.1, "second", timeout, second).await?;

            let (shot1, shot2) = futures_util::future::try_join(
                guarded(timeout, offset, "first", "capture", first.capture()),
                guarded(timeout, offset, "second", "capture", second.capture()),
            )
            .await?;

            let tile = score_tile(index, offset, shot1, shot2, self.engine.as_ref());
            match tile.similarity_score {
                Some(score) => log::info!(
                    "tile {}/{} at {}px: similarity {:.4}, {} difference region(s)",
                    index + 1,
                    plan.len(),
                    offset,
                    score,
                    tile.num_differences
                ),
                None => log::info!(
                    "tile {}/{} at {}px: similarity unavailable",
                    index + 1,
                    plan.len(),
                    offset
                ),
            }
            tiles.push(tile);
        }

        Ok(tiles)
    }
}

/// Run one session operation under the per-operation timeout, turning any
/// failure into a `CaptureFailure` at `offset`.
pub(crate) async fn guarded<T>(
    timeout: Duration,
    offset: u32,
    session: &'static str,
    operation: &'static str,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> CompareResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CompareError::capture_failure(offset, session, e).with_operation(operation)),
        Err(_) => Err(CompareError::capture_failure(
            offset,
            session,
            anyhow!("{} timed out after {}ms", operation, timeout.as_millis()),
        )
        .with_operation(operation)),
    }
}

async fn check_drift(
    plan: &ViewportPlan,
    offset: u32,
    page_height: u32,
    label: &'static str,
    timeout: Duration,
    session: &mut dyn PageSession,
) -> CompareResult<()> {
    let reported = guarded(timeout, offset, label, "scroll position", session.scroll_position()).await?;
    if let Some(actual) = reported {
        if drifted(plan, offset, page_height, actual) {
            log::warn!(
                "{} page is at {}px, expected {}px (requested {}px)",
                label,
                actual,
                plan.reachable_offset(offset, page_height),
                offset
            );
        }
    }
    Ok(())
}

/// True when a page reporting scroll position `actual` sits more than
/// [`SCROLL_DRIFT_TOLERANCE`] away from where `offset` can actually take it.
/// A page shorter than the offset is expected to rest at its bottom.
pub fn drifted(plan: &ViewportPlan, offset: u32, page_height: u32, actual: u32) -> bool {
    actual.abs_diff(plan.reachable_offset(offset, page_height)) > SCROLL_DRIFT_TOLERANCE
}

/// Decode, size-normalize and score one capture pair.
pub fn score_tile(
    index: usize,
    offset: u32,
    shot1: Screenshot,
    shot2: Screenshot,
    engine: &dyn MetricEngine,
) -> TileResult {
    let unscored = |image1, image2| TileResult {
        index,
        offset,
        image1,
        image2,
        similarity_score: None,
        difference_regions: None,
        num_differences: 0,
    };

    let (a, b) = match (shot1.to_image(), shot2.to_image()) {
        (Some(a), Some(b)) => (a, b),
        _ => return unscored(shot1, shot2),
    };
    let (a, b) = match vp_metric::resize::downscale_to_common(a, b) {
        Ok(pair) => pair,
        Err(e) => {
            log::warn!("tile {}: could not bring captures to a common size: {}", index, e);
            return unscored(shot1, shot2);
        }
    };

    let comparison = engine.compare(&a, &b);
    let image1 = Screenshot::Pixels(a);
    let image2 = Screenshot::Pixels(b);
    match comparison {
        Some(c) => TileResult {
            index,
            offset,
            image1,
            image2,
            similarity_score: Some(c.similarity),
            num_differences: c.num_differences(),
            difference_regions: Some(c.regions),
        },
        None => unscored(image1, image2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct NeverScores;

    impl MetricEngine for NeverScores {
        fn compare(&self, _: &RgbaImage, _: &RgbaImage) -> Option<Comparison> {
            None
        }
    }

    #[test]
    fn test_identical_pair_scores_one() {
        let img = RgbaImage::from_fn(64, 48, |x, y| Rgba([(x * 4) as u8, (y * 5) as u8, 0, 255]));
        let tile = score_tile(
            0,
            0,
            img.clone().into(),
            img.into(),
            &SsimEngine::default(),
        );
        assert_eq!(tile.similarity_score, Some(1.0));
        assert_eq!(tile.difference_regions, Some(vec![]));
        assert_eq!(tile.num_differences, 0);
    }

    #[test]
    fn test_mismatched_sizes_are_downscaled() {
        let a = RgbaImage::from_pixel(100, 80, Rgba([255, 255, 255, 255]));
        let b = RgbaImage::from_pixel(96, 84, Rgba([255, 255, 255, 255]));
        let tile = score_tile(3, 900, a.into(), b.into(), &SsimEngine::default());
        let (Screenshot::Pixels(a), Screenshot::Pixels(b)) = (&tile.image1, &tile.image2) else {
            panic!("expected decoded captures");
        };
        assert_eq!(a.dimensions(), (96, 80));
        assert_eq!(b.dimensions(), (96, 80));
        assert_eq!(tile.index, 3);
        assert_eq!(tile.offset, 900);
    }

    #[test]
    fn test_undecodable_capture_keeps_tile() {
        let good = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let tile = score_tile(
            1,
            300,
            Screenshot::Encoded(b"broken".to_vec()),
            good.into(),
            &SsimEngine::default(),
        );
        assert!(tile.similarity_score.is_none());
        assert!(tile.difference_regions.is_none());
        assert!(matches!(tile.image1, Screenshot::Encoded(_)));
    }

    #[test]
    fn test_short_page_at_its_bottom_has_not_drifted() {
        let plan = crate::core::tiling::plan(1000, 500, 200).unwrap();
        // 500 px page with a 200 px viewport stops at 300.
        assert!(!drifted(&plan, 800, 500, 300));
        assert!(!drifted(&plan, 400, 500, 305));
        assert!(drifted(&plan, 800, 500, 800));
    }

    #[test]
    fn test_drift_beyond_tolerance() {
        let plan = crate::core::tiling::plan(1000, 1000, 200).unwrap();
        assert!(!drifted(&plan, 300, 1000, 300));
        assert!(!drifted(&plan, 300, 1000, 310));
        assert!(!drifted(&plan, 300, 1000, 290));
        assert!(drifted(&plan, 300, 1000, 315));
        assert!(drifted(&plan, 300, 1000, 285));
    }

    #[test]
    fn test_engine_soft_failure() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let tile = score_tile(0, 0, img.clone().into(), img.into(), &NeverScores);
        assert!(tile.similarity_score.is_none());
        assert_eq!(tile.num_differences, 0);
    }
}
