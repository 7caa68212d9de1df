// SPDX-License-Identifier: MIT
//! # vp-metric: Similarity Scoring for Paired Viewport Captures
//!
//! Pure, synchronous comparison of two rasters of the same page region.
//! Produces a structural-similarity score and a set of difference rectangles.
//!
//! ## Pipeline
//!
//! 1. **Luminance**: both images are reduced to a single channel
//! 2. **SSIM map**: per-pixel similarity over a sliding window ([`ssim`])
//! 3. **Regions**: dissimilarity → threshold → connected components → merge ([`regions`])
//!
//! Captures whose pixel sizes differ are first brought to a common size with
//! [`resize::downscale_to_common`]; nothing is ever upscaled.
//!
//! ## Usage Example
//!
//! ```rust
//! use image::{Rgba, RgbaImage};
//! use vp_metric::{compare, MetricOptions};
//!
//! let a = RgbaImage::from_pixel(320, 240, Rgba([255, 255, 255, 255]));
//! let b = a.clone();
//! let result = compare(&a, &b, &MetricOptions::default()).unwrap();
//! assert_eq!(result.similarity, 1.0);
//! assert!(result.regions.is_empty());
//! ```

pub mod regions;
pub mod resize;
pub mod ssim;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

pub use regions::Rect;

/// Tuning knobs for [`compare`]. Defaults match the report tool's behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricOptions {
    /// Dissimilarity cut-off on the `[0, 255]` scale. Lower is more sensitive.
    pub threshold: u8,
    /// Components with a smaller bounding-box area are treated as noise.
    pub min_area: u32,
    /// Regions whose centres are closer than this (pixels) are merged.
    pub merge_distance: f64,
    /// SSIM window side in pixels.
    pub window: u32,
}

impl Default for MetricOptions {
    fn default() -> Self {
        Self {
            threshold: 30,
            min_area: 100,
            merge_distance: 50.0,
            window: 7,
        }
    }
}

/// Result of comparing one pair of captures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Mean SSIM in `[0, 1]`.
    pub similarity: f64,
    /// Merged difference rectangles in the compared (common) coordinate space.
    pub regions: Vec<Rect>,
}

impl Comparison {
    pub fn num_differences(&self) -> usize {
        self.regions.len()
    }
}

#[derive(Debug)]
pub enum MetricError {
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },
    EmptyImage,
    InvalidWindow(u32),
}

impl std::fmt::Display for MetricError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricError::DimensionMismatch { left, right } => write!(
                f,
                "Image dimensions differ: {}x{} vs {}x{}",
                left.0, left.1, right.0, right.1
            ),
            MetricError::EmptyImage => write!(f, "Image has zero width or height"),
            MetricError::InvalidWindow(w) => write!(f, "SSIM window must be positive, got {}", w),
        }
    }
}

impl std::error::Error for MetricError {}

/// Compare two equally sized captures.
pub fn compare(
    a: &RgbaImage,
    b: &RgbaImage,
    options: &MetricOptions,
) -> Result<Comparison, MetricError> {
    let gray_a = image::imageops::grayscale(a);
    let gray_b = image::imageops::grayscale(b);

    let map = ssim::ssim_map(&gray_a, &gray_b, options.window)?;
    let dissimilarity = map.to_dissimilarity();
    let raw = regions::extract_regions(&dissimilarity, options.threshold, options.min_area);
    let merged = regions::merge_regions(&raw, options.merge_distance);

    Ok(Comparison {
        similarity: map.score(),
        regions: merged,
    })
}

/// Decode an encoded raster (PNG, JPEG, ...) into RGBA. `None` if it cannot be decoded.
pub fn decode(bytes: &[u8]) -> Option<RgbaImage> {
    match image::load_from_memory(bytes) {
        Ok(img) => Some(img.to_rgba8()),
        Err(e) => {
            log::warn!("capture could not be decoded: {}", e);
            None
        }
    }
}

/// Decode, size-normalize and compare two encoded captures.
///
/// Any failure (undecodable input, resize error) yields `None` rather than an
/// error: difference detection is best-effort.
pub fn compare_encoded(a: &[u8], b: &[u8], options: &MetricOptions) -> Option<Comparison> {
    let a = decode(a)?;
    let b = decode(b)?;
    let (a, b) = match resize::downscale_to_common(a, b) {
        Ok(pair) => pair,
        Err(e) => {
            log::warn!("could not normalize capture sizes: {}", e);
            return None;
        }
    };
    match compare(&a, &b, options) {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("comparison failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn page(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            // Stripes of "text" on white so the page isn't flat.
            if (y / 12) % 3 == 0 && x % 40 < 30 {
                Rgba([180, 180, 180, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    fn with_red_square(img: &RgbaImage, x0: u32, y0: u32, side: u32) -> RgbaImage {
        let mut out = img.clone();
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                out.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        out
    }

    fn png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn identical_capture_scores_one_with_no_regions() {
        let a = page(400, 300);
        let result = compare(&a, &a, &MetricOptions::default()).unwrap();
        assert_eq!(result.similarity, 1.0);
        assert!(result.regions.is_empty());
        assert_eq!(result.num_differences(), 0);
    }

    #[test]
    fn inserted_square_yields_one_covering_region() {
        let a = page(800, 600);
        let b = with_red_square(&a, 300, 200, 200);
        let result = compare(&a, &b, &MetricOptions::default()).unwrap();

        assert!(result.similarity < 1.0);
        assert_eq!(result.regions.len(), 1);
        let r = result.regions[0];
        let square = Rect::new(300, 200, 200, 200);
        assert!(r.contains(&square), "region {:?} misses the square", r);
        // SSIM windowing may bleed a few pixels past the edit.
        let margin = 10;
        assert!(r.x + margin >= square.x && r.y + margin >= square.y);
        assert!(r.right() <= square.right() + margin && r.bottom() <= square.bottom() + margin);
    }

    #[test]
    fn change_inside_a_changed_frame_is_one_region() {
        let a = RgbaImage::from_pixel(500, 500, Rgba([255, 255, 255, 255]));
        let mut b = a.clone();
        let black = Rgba([0, 0, 0, 255]);
        for y in 0..420 {
            for x in 0..420 {
                let ring = x < 10 || y < 10 || x >= 410 || y >= 410;
                let block = (320..360).contains(&x) && (320..360).contains(&y);
                if ring || block {
                    b.put_pixel(x, y, black);
                }
            }
        }

        let result = compare(&a, &b, &MetricOptions::default()).unwrap();
        for (i, r) in result.regions.iter().enumerate() {
            for other in &result.regions[i + 1..] {
                assert!(!r.intersects(other), "{:?} overlaps {:?}", r, other);
            }
        }
        assert_eq!(result.regions.len(), 1);
        assert!(result.regions[0].contains(&Rect::new(0, 0, 420, 420)));
    }

    #[test]
    fn undecodable_input_is_a_soft_failure() {
        let good = png(&page(64, 64));
        assert!(compare_encoded(b"not an image", &good, &MetricOptions::default()).is_none());
        assert!(compare_encoded(&good, &[], &MetricOptions::default()).is_none());
    }

    #[test]
    fn encoded_pairs_of_different_size_are_normalized() {
        let a = png(&page(200, 150));
        let b = png(&page(210, 150));
        let result = compare_encoded(&a, &b, &MetricOptions::default()).unwrap();
        assert!(result.similarity > 0.0 && result.similarity <= 1.0);
    }

    #[test]
    fn unequal_sizes_are_rejected_by_the_raw_compare() {
        let a = page(10, 10);
        let b = page(10, 12);
        assert!(matches!(
            compare(&a, &b, &MetricOptions::default()),
            Err(MetricError::DimensionMismatch { .. })
        ));
    }
}
