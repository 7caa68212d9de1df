// SPDX-License-Identifier: MIT
//! # Difference Regions
//!
//! Turns a dissimilarity image into a small set of axis-aligned rectangles:
//!
//! 1. **Binarize**: pixels with dissimilarity above the threshold are "different"
//! 2. **Label**: 8-connected components of different pixels, one bounding box each
//! 3. **Filter**: boxes smaller than the minimum area are dropped as noise
//! 4. **Merge**: boxes whose centres are close, or that overlap, are folded
//!    into one enclosing box
//!
//! The merge is greedy and order-dependent; it repeats until a pass merges
//! nothing. The result has no two overlapping boxes, and feeding it back in
//! returns the same set.
//!
//! TODO: swap the O(n²) merge pass for a grid index if tiles start producing
//! hundreds of regions.

use std::collections::VecDeque;

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Rectangle in image pixel coordinates, `(x, y)` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.w) / 2.0,
            f64::from(self.y) + f64::from(self.h) / 2.0,
        )
    }

    /// Smallest rectangle enclosing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// True when the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    fn center_distance(&self, other: &Rect) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }
}

/// Mask of "different" pixels: 255 where `dissimilarity > threshold`, else 0.
pub fn binarize(dissimilarity: &GrayImage, threshold: u8) -> GrayImage {
    let mut mask = GrayImage::new(dissimilarity.width(), dissimilarity.height());
    for (dst, &v) in mask.iter_mut().zip(dissimilarity.iter()) {
        *dst = if v > threshold { 255 } else { 0 };
    }
    mask
}

/// Bounding boxes of the 8-connected components of non-zero mask pixels,
/// in raster order of each component's first pixel.
pub fn connected_components(mask: &GrayImage) -> Vec<Rect> {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let pixels = mask.as_raw();
    let mut visited = vec![false; w * h];
    let mut queue = VecDeque::new();
    let mut boxes = Vec::new();

    for start in 0..w * h {
        if pixels[start] == 0 || visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        let (mut min_x, mut min_y) = (start % w, start / w);
        let (mut max_x, mut max_y) = (min_x, min_y);

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % w, idx / w);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if pixels[n] != 0 && !visited[n] {
                        visited[n] = true;
                        queue.push_back(n);
                    }
                }
            }
        }

        boxes.push(Rect::new(
            min_x as u32,
            min_y as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        ));
    }

    boxes
}

/// Binarize, label and drop components whose bounding box is below `min_area`.
pub fn extract_regions(dissimilarity: &GrayImage, threshold: u8, min_area: u32) -> Vec<Rect> {
    let mask = binarize(dissimilarity, threshold);
    connected_components(&mask)
        .into_iter()
        .filter(|r| r.area() >= u64::from(min_area))
        .collect()
}

/// Merge rectangles whose centres are closer than `distance_threshold`, and
/// rectangles that overlap.
///
/// Each pass seeds from the first unmerged rectangle and absorbs every later
/// rectangle whose centre lies within the threshold of the seed's centre or
/// that intersects the box accumulated so far. Passes repeat until one
/// produces no merge, so no two output rectangles intersect.
pub fn merge_regions(regions: &[Rect], distance_threshold: f64) -> Vec<Rect> {
    let mut current = regions.to_vec();
    loop {
        let merged = merge_pass(&current, distance_threshold);
        if merged.len() == current.len() {
            return merged;
        }
        current = merged;
    }
}

fn merge_pass(regions: &[Rect], distance_threshold: f64) -> Vec<Rect> {
    let mut used = vec![false; regions.len()];
    let mut merged = Vec::with_capacity(regions.len());

    for i in 0..regions.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let seed = regions[i];
        let mut acc = seed;

        for j in (i + 1)..regions.len() {
            if used[j] {
                continue;
            }
            if seed.center_distance(&regions[j]) < distance_threshold
                || acc.intersects(&regions[j])
            {
                acc = acc.union(&regions[j]);
                used[j] = true;
            }
        }
        merged.push(acc);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_with(w: u32, h: u32, rects: &[Rect]) -> GrayImage {
        let mut m = GrayImage::new(w, h);
        for r in rects {
            for y in r.y..r.bottom() {
                for x in r.x..r.right() {
                    m.put_pixel(x, y, Luma([255]));
                }
            }
        }
        m
    }

    fn covered(original: &[Rect], merged: &[Rect]) -> bool {
        original
            .iter()
            .all(|o| merged.iter().any(|m| m.contains(o)))
    }

    #[test]
    fn binarize_is_strictly_above_threshold() {
        let mut d = GrayImage::new(3, 1);
        d.put_pixel(0, 0, Luma([30]));
        d.put_pixel(1, 0, Luma([31]));
        d.put_pixel(2, 0, Luma([0]));
        let m = binarize(&d, 30);
        assert_eq!(m.as_raw(), &vec![0, 255, 0]);
    }

    #[test]
    fn components_use_eight_connectivity() {
        let mut m = GrayImage::new(4, 4);
        m.put_pixel(0, 0, Luma([255]));
        m.put_pixel(1, 1, Luma([255]));
        m.put_pixel(3, 3, Luma([255]));
        let boxes = connected_components(&m);
        assert_eq!(boxes, vec![Rect::new(0, 0, 2, 2), Rect::new(3, 3, 1, 1)]);
    }

    #[test]
    fn small_components_are_noise() {
        let m = mask_with(100, 100, &[Rect::new(0, 0, 5, 5), Rect::new(50, 50, 10, 10)]);
        let regions = extract_regions(&m, 30, 100);
        assert_eq!(regions, vec![Rect::new(50, 50, 10, 10)]);
    }

    #[test]
    fn nearby_regions_merge_far_regions_do_not() {
        let input = vec![
            Rect::new(0, 0, 20, 20),
            Rect::new(30, 0, 20, 20),
            Rect::new(400, 400, 20, 20),
        ];
        let merged = merge_regions(&input, 50.0);
        assert_eq!(merged.len(), 2);
        assert!(covered(&input, &merged));
        assert!(merged.contains(&Rect::new(0, 0, 50, 20)));
    }

    #[test]
    fn merge_repeats_until_stable() {
        // The first pass leaves two boxes whose centres end up within range.
        let input = vec![
            Rect::new(0, 0, 10, 10),
            Rect::new(40, 0, 10, 10),
            Rect::new(65, 0, 10, 10),
        ];
        let merged = merge_regions(&input, 50.0);
        assert_eq!(merged, vec![Rect::new(0, 0, 75, 10)]);
    }

    #[test]
    fn merge_is_idempotent() {
        let input = vec![
            Rect::new(10, 10, 30, 30),
            Rect::new(60, 20, 10, 40),
            Rect::new(300, 40, 25, 25),
            Rect::new(330, 70, 15, 15),
            Rect::new(700, 500, 50, 10),
        ];
        let once = merge_regions(&input, 50.0);
        let twice = merge_regions(&once, 50.0);
        assert_eq!(once, twice);
        assert!(covered(&input, &once));
    }

    fn assert_disjoint(regions: &[Rect]) {
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                assert!(!a.intersects(b), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn nested_box_with_distant_centre_is_absorbed() {
        let frame = Rect::new(0, 0, 423, 423);
        let inner = Rect::new(317, 317, 46, 46);
        assert!(frame.intersects(&inner));
        assert_eq!(merge_regions(&[frame, inner], 50.0), vec![frame]);
        assert_eq!(merge_regions(&[inner, frame], 50.0), vec![frame]);
    }

    #[test]
    fn overlap_with_grown_union_is_merged() {
        // The third box misses the seed and only meets the grown union.
        let input = vec![
            Rect::new(0, 0, 200, 20),
            Rect::new(180, 0, 20, 200),
            Rect::new(150, 190, 40, 100),
            Rect::new(600, 600, 20, 20),
        ];
        let merged = merge_regions(&input, 10.0);
        assert_disjoint(&merged);
        assert!(covered(&input, &merged));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(!a.intersects(&Rect::new(10, 0, 10, 10)));
        assert!(!a.intersects(&Rect::new(0, 10, 10, 10)));
        assert!(a.intersects(&Rect::new(9, 9, 10, 10)));
    }

    #[test]
    fn empty_input_merges_to_empty() {
        assert!(merge_regions(&[], 50.0).is_empty());
    }
}
