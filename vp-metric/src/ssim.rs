// SPDX-License-Identifier: MIT
//! # Structural Similarity Map
//!
//! Per-pixel SSIM between two single-channel images of equal size.
//!
//! Every pixel gets the SSIM of the `window × window` neighbourhood centred on
//! it. Neighbourhoods are clipped at the image border instead of padded, so
//! edge pixels are computed from fewer samples. Window statistics come from
//! summed-area tables, which keeps the map O(width × height) regardless of the
//! window size.
//!
//! ## Constants
//!
//! - `K1 = 0.01`, `K2 = 0.03`, dynamic range `L = 255`
//! - Sample (N-1) variance and covariance
//!
//! The scalar score is the mean of the map over the interior, i.e. with a
//! `window / 2` border trimmed away when the image is large enough.

use image::GrayImage;

use crate::MetricError;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DYNAMIC_RANGE: f64 = 255.0;

/// Per-pixel structural similarity values, row-major.
#[derive(Debug, Clone)]
pub struct SsimMap {
    width: u32,
    height: u32,
    window: u32,
    values: Vec<f64>,
}

impl SsimMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// SSIM at `(x, y)`. Panics if out of bounds.
    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.values[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mean SSIM over the interior of the map.
    ///
    /// Falls back to the full map when the image is not larger than the
    /// window in both directions.
    pub fn score(&self) -> f64 {
        let pad = self.window / 2;
        let (x0, x1, y0, y1) = if self.width > 2 * pad && self.height > 2 * pad {
            (pad, self.width - pad, pad, self.height - pad)
        } else {
            (0, self.width, 0, self.height)
        };

        let mut sum = 0.0;
        let mut count = 0usize;
        for y in y0..y1 {
            let row = (y as usize) * (self.width as usize);
            for x in x0..x1 {
                sum += self.values[row + x as usize];
                count += 1;
            }
        }
        if count == 0 {
            return 1.0;
        }
        (sum / count as f64).clamp(0.0, 1.0)
    }

    /// Dissimilarity scaled to `[0, 255]`: `clamp(1 - ssim, 0, 1) * 255`.
    pub fn to_dissimilarity(&self) -> GrayImage {
        let mut out = GrayImage::new(self.width, self.height);
        for (dst, &v) in out.iter_mut().zip(self.values.iter()) {
            *dst = ((1.0 - v).clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        out
    }
}

/// Summed-area table with a zero row and column in front.
struct Integral {
    stride: usize,
    data: Vec<u64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize) -> u64) -> Self {
        let stride = width + 1;
        let mut data = vec![0u64; stride * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0u64;
            for x in 0..width {
                row_sum += value(y * width + x);
                data[(y + 1) * stride + x + 1] = data[y * stride + x + 1] + row_sum;
            }
        }
        Self { stride, data }
    }

    /// Sum over `[x0, x1) × [y0, y1)`.
    #[inline]
    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let s = self.stride;
        self.data[y1 * s + x1] + self.data[y0 * s + x0]
            - self.data[y0 * s + x1]
            - self.data[y1 * s + x0]
    }
}

/// Compute the SSIM map of two equally sized grayscale images.
pub fn ssim_map(a: &GrayImage, b: &GrayImage, window: u32) -> Result<SsimMap, MetricError> {
    if a.dimensions() != b.dimensions() {
        return Err(MetricError::DimensionMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }
    let (width, height) = a.dimensions();
    if width == 0 || height == 0 {
        return Err(MetricError::EmptyImage);
    }
    if window == 0 {
        return Err(MetricError::InvalidWindow(window));
    }

    let (w, h) = (width as usize, height as usize);
    let pa = a.as_raw();
    let pb = b.as_raw();

    let sum_a = Integral::build(w, h, |i| pa[i] as u64);
    let sum_b = Integral::build(w, h, |i| pb[i] as u64);
    let sum_aa = Integral::build(w, h, |i| (pa[i] as u64) * (pa[i] as u64));
    let sum_bb = Integral::build(w, h, |i| (pb[i] as u64) * (pb[i] as u64));
    let sum_ab = Integral::build(w, h, |i| (pa[i] as u64) * (pb[i] as u64));

    let c1 = (K1 * DYNAMIC_RANGE).powi(2);
    let c2 = (K2 * DYNAMIC_RANGE).powi(2);
    let radius = (window / 2) as usize;

    let mut values = Vec::with_capacity(w * h);
    for y in 0..h {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius + 1).min(w);
            let n = ((x1 - x0) * (y1 - y0)) as f64;

            let sa = sum_a.sum(x0, y0, x1, y1) as f64;
            let sb = sum_b.sum(x0, y0, x1, y1) as f64;
            let saa = sum_aa.sum(x0, y0, x1, y1) as f64;
            let sbb = sum_bb.sum(x0, y0, x1, y1) as f64;
            let sab = sum_ab.sum(x0, y0, x1, y1) as f64;

            let mu_a = sa / n;
            let mu_b = sb / n;
            let (var_a, var_b, cov) = if n > 1.0 {
                (
                    (saa - sa * sa / n) / (n - 1.0),
                    (sbb - sb * sb / n) / (n - 1.0),
                    (sab - sa * sb / n) / (n - 1.0),
                )
            } else {
                (0.0, 0.0, 0.0)
            };

            let numerator = (2.0 * mu_a * mu_b + c1) * (2.0 * cov + c2);
            let denominator = (mu_a * mu_a + mu_b * mu_b + c1) * (var_a + var_b + c2);
            values.push(numerator / denominator);
        }
    }

    Ok(SsimMap {
        width,
        height,
        window,
        values,
    })
}
