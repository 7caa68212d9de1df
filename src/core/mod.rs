//! # Core Module
//!
//! Pure, synchronous building blocks of a comparison run: the tiling planner
//! that decides where to capture, and the aggregator that reduces tile results.

pub mod summary;
pub mod tiling;

pub use summary::{RunSummary, summarize};
pub use tiling::{ViewportPlan, plan};
