//! # Report Export
//!
//! Writes a finished run to a directory:
//!
//! - `report.json`: summary, URLs and one entry per tile
//! - `tile_NNN_a.png`, `tile_NNN_b.png`: the two captures of each tile
//! - `tile_NNN_highlight.png`: both captures side by side with every
//!   difference region outlined in red, for tiles that have regions
//!
//! Layout of a multi-page document from these files is left to the caller.
//!
//! [`compare_image_files`] does the same for a single pair of image files
//! that were captured elsewhere: `comparison.json` plus `highlight.png`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::{ImageFormat, Rgba, RgbaImage};
use serde::Serialize;
use vp_metric::{MetricOptions, Rect};

use crate::capture::Screenshot;
use crate::core::summary::RunSummary;
use crate::error::{CompareError, CompareResult};
use crate::session::RunOutput;

/// Gap between the two halves of a highlight image.
pub const HIGHLIGHT_GAP: u32 = 20;
/// Outline thickness around each difference region.
pub const OUTLINE_THICKNESS: u32 = 3;

const OUTLINE: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    generated_at: u64,
    url1: &'a str,
    url2: &'a str,
    summary: &'a RunSummary,
    tiles: Vec<TileEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct TileEntry<'a> {
    viewport_number: usize,
    scroll_position: u32,
    ssim_score: Option<f64>,
    difference_regions: Option<&'a [Rect]>,
    num_differences: usize,
    image1: String,
    image2: String,
    highlight: Option<String>,
}

/// Write `output` into `dir`, creating it when missing. Returns the path of `report.json`.
pub fn write_report(dir: &Path, output: &RunOutput, urls: (&str, &str)) -> CompareResult<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| CompareError::io_at("create report directory", dir.display().to_string(), e))?;

    let mut tiles = Vec::with_capacity(output.tiles.len());
    for tile in &output.tiles {
        let stem = format!("tile_{:03}", tile.index);
        let image1 = format!("{}_a.png", stem);
        let image2 = format!("{}_b.png", stem);
        write_screenshot(&dir.join(&image1), &tile.image1)?;
        write_screenshot(&dir.join(&image2), &tile.image2)?;

        let highlight = match (&tile.difference_regions, &tile.image1, &tile.image2) {
            (Some(regions), Screenshot::Pixels(a), Screenshot::Pixels(b)) if !regions.is_empty() => {
                let name = format!("{}_highlight.png", stem);
                save_png(&dir.join(&name), &highlight_image(a, b, regions))?;
                Some(name)
            }
            _ => None,
        };

        tiles.push(TileEntry {
            viewport_number: tile.index + 1,
            scroll_position: tile.offset,
            ssim_score: tile.similarity_score,
            difference_regions: tile.difference_regions.as_deref(),
            num_differences: tile.num_differences,
            image1,
            image2,
            highlight,
        });
    }

    let document = ReportDocument {
        generated_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        url1: urls.0,
        url2: urls.1,
        summary: &output.summary,
        tiles,
    };

    let path = dir.join("report.json");
    let json = serde_json::to_string_pretty(&document)?;
    fs::write(&path, json)
        .map_err(|e| CompareError::io_at("write report", path.display().to_string(), e))?;
    log::info!(
        "report written to {} ({} tile(s))",
        path.display(),
        output.tiles.len()
    );
    Ok(path)
}

/// Both captures side by side on white, `HIGHLIGHT_GAP` pixels apart, with
/// every region outlined on both halves.
pub fn highlight_image(a: &RgbaImage, b: &RgbaImage, regions: &[Rect]) -> RgbaImage {
    let width = a.width() + HIGHLIGHT_GAP + b.width();
    let height = a.height().max(b.height());
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);

    let right = i64::from(a.width() + HIGHLIGHT_GAP);
    image::imageops::replace(&mut canvas, a, 0, 0);
    image::imageops::replace(&mut canvas, b, right, 0);

    for region in regions {
        outline(&mut canvas, 0, a.dimensions(), region);
        outline(&mut canvas, a.width() + HIGHLIGHT_GAP, b.dimensions(), region);
    }
    canvas
}

/// Draw a `OUTLINE_THICKNESS` border inside `region`, clipped to the half
/// starting at `x_offset` with size `bounds`.
fn outline(canvas: &mut RgbaImage, x_offset: u32, bounds: (u32, u32), region: &Rect) {
    let right = region.right().min(bounds.0);
    let bottom = region.bottom().min(bounds.1);
    for y in region.y..bottom {
        for x in region.x..right {
            let on_border = x < region.x + OUTLINE_THICKNESS
                || y < region.y + OUTLINE_THICKNESS
                || x + OUTLINE_THICKNESS >= region.right()
                || y + OUTLINE_THICKNESS >= region.bottom();
            if on_border {
                canvas.put_pixel(x_offset + x, y, OUTLINE);
            }
        }
    }
}

/// Outcome of comparing two standalone image files.
#[derive(Debug, Clone, Serialize)]
pub struct ImagePairReport {
    pub image1: String,
    pub image2: String,
    /// Size both images were compared at, after downscaling to the common size.
    pub compared_size: (u32, u32),
    pub similarity: f64,
    pub difference_regions: Vec<Rect>,
    pub num_differences: usize,
    pub highlight: Option<String>,
}

/// Compare two image files and write `comparison.json` (and `highlight.png`
/// when there are differences) into `dir`.
///
/// Unlike a page run, an image that cannot be read or decoded is an error.
pub fn compare_image_files(
    first: &Path,
    second: &Path,
    options: &MetricOptions,
    dir: &Path,
) -> CompareResult<(PathBuf, ImagePairReport)> {
    let a = load_image(first)?;
    let b = load_image(second)?;
    let (a, b) = vp_metric::resize::downscale_to_common(a, b)
        .map_err(|e| CompareError::external("fast_image_resize", e).with_operation("downscale"))?;
    let comparison = vp_metric::compare(&a, &b, options)
        .map_err(|e| CompareError::external("vp-metric", e).with_operation("compare"))?;

    fs::create_dir_all(dir)
        .map_err(|e| CompareError::io_at("create report directory", dir.display().to_string(), e))?;

    let highlight = if comparison.regions.is_empty() {
        None
    } else {
        let name = "highlight.png".to_string();
        save_png(&dir.join(&name), &highlight_image(&a, &b, &comparison.regions))?;
        Some(name)
    };

    let report = ImagePairReport {
        image1: first.display().to_string(),
        image2: second.display().to_string(),
        compared_size: a.dimensions(),
        similarity: comparison.similarity,
        num_differences: comparison.num_differences(),
        difference_regions: comparison.regions,
        highlight,
    };

    let path = dir.join("comparison.json");
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(&path, json)
        .map_err(|e| CompareError::io_at("write comparison", path.display().to_string(), e))?;
    log::info!(
        "{} vs {}: similarity {:.4}, {} difference region(s)",
        report.image1,
        report.image2,
        report.similarity,
        report.num_differences
    );
    Ok((path, report))
}

fn load_image(path: &Path) -> CompareResult<RgbaImage> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| CompareError::from(e).with_context(path.display().to_string()))
}

fn write_screenshot(path: &Path, shot: &Screenshot) -> CompareResult<()> {
    match shot {
        Screenshot::Pixels(image) => save_png(path, image),
        Screenshot::Encoded(bytes) => fs::write(path, bytes)
            .map_err(|e| CompareError::io_at("write capture", path.display().to_string(), e)),
    }
}

fn save_png(path: &Path, image: &RgbaImage) -> CompareResult<()> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| CompareError::from(e).with_context(path.display().to_string()))
}
