//! Fold per-tile results into one run summary.

use serde::{Deserialize, Serialize};

use crate::core::tiling::ViewportPlan;
use crate::processing::TileResult;

/// Overlap between consecutive tiles, in percent. Fixed by the half-viewport stride.
pub const OVERLAP_PERCENTAGE: u32 = 50;

/// Aggregate over every tile of one comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_tiles: usize,
    pub page_height1: u32,
    pub page_height2: u32,
    pub total_differences: usize,
    /// Mean over tiles with a defined score. `None` when no tile was scored.
    pub average_similarity: Option<f64>,
    /// `(width, height)`; width is 0 when the plan carries no width.
    pub viewport_dimensions: (u32, u32),
    pub scroll_step: u32,
    pub overlap_percentage: u32,
    pub scored_tiles: usize,
    pub tiles_with_differences: usize,
    /// Bottom edge of the last tile, 0 for an empty plan.
    pub covered_height: u32,
}

/// Reduce `tiles` to a [`RunSummary`]. Never fails.
pub fn summarize(tiles: &[TileResult], plan: &ViewportPlan, heights: (u32, u32)) -> RunSummary {
    let scores = tiles
        .iter()
        .filter_map(|t| t.similarity_score)
        .collect::<Vec<_>>();
    let average_similarity = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    RunSummary {
        total_tiles: tiles.len(),
        page_height1: heights.0,
        page_height2: heights.1,
        total_differences: tiles.iter().map(|t| t.num_differences).sum(),
        average_similarity,
        viewport_dimensions: (plan.viewport_width.unwrap_or(0), plan.viewport_height),
        scroll_step: plan.scroll_step,
        overlap_percentage: OVERLAP_PERCENTAGE,
        scored_tiles: scores.len(),
        tiles_with_differences: tiles.iter().filter(|t| t.num_differences > 0).count(),
        covered_height: plan.covered_height(),
    }
}
