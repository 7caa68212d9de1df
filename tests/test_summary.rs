//! Aggregator tests

use image::RgbaImage;
use viewport_compare::capture::Screenshot;
use viewport_compare::core::summary::summarize;
use viewport_compare::core::tiling::plan;
use viewport_compare::processing::TileResult;
use viewport_compare::vp_metric::Rect;

fn tile(index: usize, offset: u32, score: Option<f64>, regions: usize) -> TileResult {
    let rects = (0..regions as u32)
        .map(|i| Rect::new(i * 100, 0, 20, 20))
        .collect::<Vec<_>>();
    TileResult {
        index,
        offset,
        image1: Screenshot::Pixels(RgbaImage::new(1, 1)),
        image2: Screenshot::Pixels(RgbaImage::new(1, 1)),
        similarity_score: score,
        difference_regions: score.map(|_| rects),
        num_differences: if score.is_some() { regions } else { 0 },
    }
}

#[test]
fn empty_run_has_undefined_average() {
    let p = plan(500, 500, 1000).unwrap();
    let summary = summarize(&[], &p, (500, 500));
    assert_eq!(summary.total_tiles, 0);
    assert_eq!(summary.total_differences, 0);
    assert_eq!(summary.average_similarity, None);
    assert_eq!(summary.scored_tiles, 0);
}

#[test]
fn average_ignores_unscored_tiles() {
    let p = plan(2000, 1500, 600).unwrap().with_width(800).unwrap();
    let tiles = vec![
        tile(0, 0, Some(1.0), 0),
        tile(1, 300, None, 0),
        tile(2, 600, Some(0.5), 2),
        tile(3, 900, Some(0.75), 1),
    ];
    let summary = summarize(&tiles, &p, (2000, 1500));

    assert_eq!(summary.total_tiles, 4);
    assert_eq!(summary.scored_tiles, 3);
    assert_eq!(summary.average_similarity, Some(0.75));
    assert_eq!(summary.total_differences, 3);
    assert_eq!(summary.tiles_with_differences, 2);
    assert_eq!(summary.page_height1, 2000);
    assert_eq!(summary.page_height2, 1500);
}

#[test]
fn plan_geometry_is_copied_verbatim() {
    let p = plan(2000, 2000, 600).unwrap().with_width(1024).unwrap();
    let summary = summarize(&[], &p, (2000, 2000));
    assert_eq!(summary.viewport_dimensions, (1024, 600));
    assert_eq!(summary.scroll_step, 300);
    assert_eq!(summary.overlap_percentage, 50);
    assert_eq!(summary.covered_height, 2000);
}

#[test]
fn summary_serializes_undefined_average_as_null() {
    let p = plan(10, 10, 10).unwrap();
    let json = serde_json::to_value(summarize(&[], &p, (10, 10))).unwrap();
    assert!(json["average_similarity"].is_null());
    assert_eq!(json["total_tiles"], 0);
}
