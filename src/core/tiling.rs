//! # Viewport Tiling
//!
//! Splits a scrollable page into overlapping viewport-sized captures.
//!
//! ## Layout
//!
//! Tiles advance by half a viewport (`scroll_step = viewport_height / 2`), so
//! every pixel row away from the very top and bottom lands in the interior of
//! at least one capture. The first tile is always at offset 0. The last tile is
//! placed flush against the end of the taller page (`max_height - viewport_height`),
//! which is also where a browser stops scrolling, so no tile ever shows blank
//! space past the content.
//!
//! ```text
//! page (2000px), viewport 600px, step 300px
//!
//!   0 ──────── 600
//!        300 ──────── 900
//!              600 ──────── 1200
//!                    900 ──────── 1500
//!                         1200 ──────── 1800
//!                             1400 ──────── 2000   <- flush with content end
//! ```
//!
//! When the two pages differ in height the taller one drives the plan; the
//! shorter page simply stays at its bottom for the trailing offsets.

use serde::{Deserialize, Serialize};

use crate::error::{CompareError, CompareResult};

/// Immutable tiling of a page pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportPlan {
    /// Window width, when the plan was built for a concrete viewport profile.
    pub viewport_width: Option<u32>,
    pub viewport_height: u32,
    /// Distance between consecutive tiles. Zero only for a single-tile plan
    /// with a one-pixel viewport.
    pub scroll_step: u32,
    /// Strictly increasing, starts at 0.
    pub offsets: Vec<u32>,
    /// Measured heights of the first and second page.
    pub page_heights: (u32, u32),
    /// Taller of the two page heights.
    pub max_height: u32,
}

impl ViewportPlan {
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Bottom edge of the last tile's window.
    pub fn covered_height(&self) -> u32 {
        self.offsets
            .last()
            .map_or(0, |last| last + self.viewport_height)
    }

    /// Where a page of `page_height` actually ends up when asked to scroll to
    /// `offset`: browsers stop at the last full viewport.
    pub fn reachable_offset(&self, offset: u32, page_height: u32) -> u32 {
        offset.min(page_height.saturating_sub(self.viewport_height))
    }

    /// Attach the window width the plan will be captured at.
    pub fn with_width(mut self, viewport_width: u32) -> CompareResult<Self> {
        if viewport_width == 0 {
            return Err(CompareError::invalid_dimension("viewport_width", 0));
        }
        self.viewport_width = Some(viewport_width);
        Ok(self)
    }
}

/// Plan the scroll offsets for two pages of `height1` and `height2` pixels
/// viewed through a window `viewport_height` pixels tall.
///
/// # Errors
///
/// - `InvalidDimension` when any input is zero.
/// - `DegenerateViewport` when the page needs scrolling but the viewport is a
///   single pixel tall (half of it rounds to zero).
///
/// # Examples
///
/// ```rust
/// use viewport_compare::core::tiling::plan;
///
/// let p = plan(2000, 2000, 600).unwrap();
/// assert_eq!(p.offsets, vec![0, 300, 600, 900, 1200, 1400]);
/// assert_eq!(p.scroll_step, 300);
/// ```
pub fn plan(height1: u32, height2: u32, viewport_height: u32) -> CompareResult<ViewportPlan> {
    for (field, value) in [
        ("height1", height1),
        ("height2", height2),
        ("viewport_height", viewport_height),
    ] {
        if value == 0 {
            return Err(CompareError::invalid_dimension(field, value)
                .with_operation("plan")
                .with_recovery_suggestion("Check that both pages loaded and report a height"));
        }
    }

    let max_height = height1.max(height2);
    let scroll_step = viewport_height / 2;

    if max_height <= viewport_height {
        return Ok(ViewportPlan {
            viewport_width: None,
            viewport_height,
            scroll_step,
            offsets: vec![0],
            page_heights: (height1, height2),
            max_height,
        });
    }

    if scroll_step == 0 {
        return Err(CompareError::degenerate_viewport(viewport_height).with_operation("plan"));
    }

    let last = max_height - viewport_height;
    let num_tiles = last.div_ceil(scroll_step) + 1;
    let offsets = (0..num_tiles)
        .map(|i| (i * scroll_step).min(last))
        .collect::<Vec<_>>();

    log::debug!(
        "planned {} tile(s) over {}px (viewport {}px, step {}px)",
        offsets.len(),
        max_height,
        viewport_height,
        scroll_step
    );

    Ok(ViewportPlan {
        viewport_width: None,
        viewport_height,
        scroll_step,
        offsets,
        page_heights: (height1, height2),
        max_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tile_when_page_fits() {
        let p = plan(500, 500, 1000).unwrap();
        assert_eq!(p.offsets, vec![0]);
        assert_eq!(p.covered_height(), 1000);
    }

    #[test]
    fn test_last_tile_is_flush_with_content() {
        let p = plan(2000, 2000, 600).unwrap();
        assert_eq!(p.offsets, vec![0, 300, 600, 900, 1200, 1400]);
        assert_eq!(p.covered_height(), 2000);
    }

    #[test]
    fn test_exact_multiple_needs_no_clamp() {
        let p = plan(1800, 900, 600).unwrap();
        assert_eq!(p.offsets, vec![0, 300, 600, 900, 1200]);
    }

    #[test]
    fn test_taller_page_drives_plan() {
        let a = plan(700, 1300, 600).unwrap();
        let b = plan(1300, 700, 600).unwrap();
        assert_eq!(a.offsets, b.offsets);
        assert_eq!(a.max_height, 1300);
        assert_eq!(a.page_heights, (700, 1300));
        // The shorter page stays at its last full viewport.
        assert_eq!(a.reachable_offset(700, 700), 100);
        assert_eq!(a.reachable_offset(700, 1300), 700);
    }

    #[test]
    fn test_zero_inputs_rejected() {
        assert!(matches!(
            plan(0, 10, 10),
            Err(CompareError::InvalidDimension { .. })
        ));
        assert!(matches!(
            plan(10, 10, 0),
            Err(CompareError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn test_one_pixel_viewport() {
        assert!(matches!(
            plan(5, 5, 1),
            Err(CompareError::DegenerateViewport { .. })
        ));
        assert_eq!(plan(1, 1, 1).unwrap().offsets, vec![0]);
    }

    #[test]
    fn test_with_width() {
        let p = plan(100, 100, 100).unwrap().with_width(375).unwrap();
        assert_eq!(p.viewport_width, Some(375));
        assert!(plan(100, 100, 100).unwrap().with_width(0).is_err());
    }
}
