//! # Configuration Module
//!
//! This module provides the configuration structure and validation for comparison
//! runs. It is the common interface between the command-line front end and the
//! core library.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `url1`, `url2` | `String` | non-empty | Pages to compare (`https://` added when no scheme) |
//! | `viewport` | `ViewportKind` | desktop/tablet/mobile | Device preset |
//! | `width`, `height` | `Option<u32>` | > 0 | Override the preset size |
//! | `settle_ms` | `u64` | 0-60000 | Wait after each scroll before capturing |
//! | `load_wait_ms` | `u64` | 0-120000 | Wait after navigation before measuring |
//! | `timeout_secs` | `u64` | 1-600 | Per scroll/capture timeout |
//! | `threshold` | `u8` | 0-255 | Dissimilarity cut-off (lower = more sensitive) |
//! | `min_area` | `u32` | any | Smallest difference region kept, in px² |
//! | `merge_distance` | `f64` | >= 0 | Centre distance under which regions merge |
//! | `output` | `String` | any path | Report directory |
//!
//! ## Examples
//!
//! ```rust
//! use viewport_compare::config::CompareConfig;
//!
//! let mut config = CompareConfig::default();
//! config.url1 = "example.com".to_string();
//! config.url2 = "https://staging.example.com".to_string();
//!
//! assert!(config.validate().is_ok());
//! let options = config.to_run_options();
//! assert_eq!(options.viewport.height, 1080);
//! ```

use std::time::Duration;

use vp_metric::MetricOptions;

use crate::config::viewport::{ViewportKind, ViewportProfile};
use crate::session::RunOptions;

/// Configuration for one comparison run.
///
/// Holds everything needed to open two page sessions and compare them tile by
/// tile. Converted to the library's [`RunOptions`] with [`CompareConfig::to_run_options`].
#[derive(Debug, Clone)]
pub struct CompareConfig {
    /// First page URL.
    pub url1: String,

    /// Second page URL.
    pub url2: String,

    /// Device preset for the browser window.
    pub viewport: ViewportKind,

    /// Window width override in CSS pixels.
    pub width: Option<u32>,

    /// Window height override in CSS pixels.
    ///
    /// Tiles advance by half of this value, so it must be at least 2 for any
    /// page taller than the window.
    pub height: Option<u32>,

    /// Settle delay after each scroll, in milliseconds.
    pub settle_ms: u64,

    /// Wait after navigation, in milliseconds, before the page height is measured.
    pub load_wait_ms: u64,

    /// Timeout for a single scroll or capture, in seconds.
    pub timeout_secs: u64,

    /// Dissimilarity threshold on the `[0, 255]` scale.
    pub threshold: u8,

    /// Minimum bounding-box area of a difference region.
    pub min_area: u32,

    /// Merge distance between region centres, in pixels.
    pub merge_distance: f64,

    /// Directory the report is written to.
    pub output: String,
}

impl Default for CompareConfig {
    /// Default values:
    /// - `viewport`: desktop (1920x1080)
    /// - `settle_ms`: 800
    /// - `load_wait_ms`: 3000
    /// - `timeout_secs`: 30
    /// - `threshold`: 30, `min_area`: 100, `merge_distance`: 50
    /// - `output`: "viewport-report"
    fn default() -> Self {
        Self {
            url1: String::new(),
            url2: String::new(),
            viewport: ViewportKind::Desktop,
            width: None,
            height: None,
            settle_ms: 800,
            load_wait_ms: 3000,
            timeout_secs: 30,
            threshold: 30,
            min_area: 100,
            merge_distance: 50.0,
            output: "viewport-report".to_string(),
        }
    }
}

impl CompareConfig {
    /// Creates a configuration for two URLs with every other field at its default.
    ///
    /// Time complexity: O(1).
    pub fn new(url1: impl Into<String>, url2: impl Into<String>) -> Self {
        Self {
            url1: url1.into(),
            url2: url2.into(),
            ..Self::default()
        }
    }

    /// Validates the configuration parameters.
    ///
    /// Only checks what can be known before a browser is opened. Page heights
    /// are validated later by the tiling planner.
    pub fn validate(&self) -> Result<(), String> {
        if self.url1.trim().is_empty() || self.url2.trim().is_empty() {
            return Err("Both URLs must be provided".to_string());
        }
        if self.width == Some(0) {
            return Err("Viewport width must be greater than 0".to_string());
        }
        match self.height {
            Some(0) => return Err("Viewport height must be greater than 0".to_string()),
            Some(1) => {
                return Err("Viewport height must be at least 2 to scroll in half steps".to_string());
            }
            _ => {}
        }
        if self.settle_ms > 60_000 {
            return Err("Settle delay must be at most 60000 ms".to_string());
        }
        if self.load_wait_ms > 120_000 {
            return Err("Load wait must be at most 120000 ms".to_string());
        }
        if !(1..=600).contains(&self.timeout_secs) {
            return Err("Timeout must be between 1 and 600 seconds".to_string());
        }
        if !self.merge_distance.is_finite() || self.merge_distance < 0.0 {
            return Err("Merge distance must be a non-negative number".to_string());
        }
        Ok(())
    }

    /// Viewport profile after applying the size overrides.
    pub fn viewport_profile(&self) -> ViewportProfile {
        let preset = ViewportProfile::preset(self.viewport);
        preset.with_size(
            self.width.unwrap_or(preset.width),
            self.height.unwrap_or(preset.height),
        )
    }

    pub fn metric_options(&self) -> MetricOptions {
        MetricOptions {
            threshold: self.threshold,
            min_area: self.min_area,
            merge_distance: self.merge_distance,
            ..MetricOptions::default()
        }
    }

    /// Both URLs with a scheme.
    pub fn urls(&self) -> (String, String) {
        (normalize_url(&self.url1), normalize_url(&self.url2))
    }

    /// Convert to RunOptions for use with the comparison library
    pub fn to_run_options(&self) -> RunOptions {
        RunOptions {
            viewport: self.viewport_profile(),
            settle_delay: Duration::from_millis(self.settle_ms),
            capture_timeout: Duration::from_secs(self.timeout_secs),
            metric: self.metric_options(),
        }
    }
}

/// Prefix `https://` when the URL has no scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}
