//! # Processing Module
//!
//! This module contains the per-tile capture and scoring pipeline.

pub mod pipeline;

// Re-export commonly used types for convenience
pub use pipeline::{CapturePipeline, MetricEngine, SsimEngine, TileResult, drifted, score_tile};
