use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use viewport_compare::config::{CompareConfig, ViewportKind, ViewportProfile};
use viewport_compare::error::{CompareError, HasRecoverySuggestion, classify};
use viewport_compare::vp_metric::MetricOptions;
use viewport_compare::{CancelToken, report};

/// Compare two web pages viewport by viewport:
/// - tiles the taller page with 50% overlap
/// - scores each tile pair with SSIM and outlines the differing regions
/// - writes a JSON summary and per-tile images
#[derive(Parser, Debug)]
#[command(name = "vpcompare")]
#[command(about = "🔍 Compare two web pages viewport by viewport")]
#[command(long_about = "Load two URLs in headless Chrome, scroll through both in half-viewport steps,
and report the structural similarity and difference regions of every viewport.
Two existing screenshots can be compared the same way with `vpcompare images`.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load two URLs and compare them viewport by viewport
    Pages(PagesArgs),

    /// Compare two image files and outline their differences
    Images(ImagesArgs),
}

#[derive(Args, Debug)]
struct PagesArgs {
    /// First page
    #[arg(help = "First URL (https:// is added when no scheme is given)")]
    url1: String,

    /// Second page
    #[arg(help = "Second URL")]
    url2: String,

    /// Device preset
    #[arg(short, long, value_enum, default_value_t = ViewportKind::Desktop,
          help = "Viewport preset: desktop (1920x1080), tablet (768x1024), mobile (375x667)")]
    viewport: ViewportKind,

    /// Derive the desktop viewport from a screen size
    #[arg(long, value_name = "WIDTHxHEIGHT",
          help = "Screen size for the desktop preset; the viewport becomes full width and half height")]
    screen: Option<String>,

    /// Override the preset width
    #[arg(long)]
    width: Option<u32>,

    /// Override the preset height
    #[arg(long)]
    height: Option<u32>,

    /// Settle delay after each scroll
    #[arg(long, default_value_t = 800, help = "Milliseconds to wait after each scroll before capturing")]
    settle_ms: u64,

    /// Wait after page load
    #[arg(long, default_value_t = 3000, help = "Milliseconds to wait after navigation before measuring the page")]
    load_wait_ms: u64,

    /// Per-operation timeout
    #[arg(short, long, default_value_t = 30, help = "Seconds before a single scroll or capture is considered failed")]
    timeout: u64,

    #[command(flatten)]
    metric: MetricArgs,

    /// Report directory
    #[arg(short, long, default_value = "viewport-report")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ImagesArgs {
    /// First image (PNG, JPEG, ...)
    image1: PathBuf,

    /// Second image
    image2: PathBuf,

    #[command(flatten)]
    metric: MetricArgs,

    /// Output directory for comparison.json and highlight.png
    #[arg(short, long, default_value = "image-comparison")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct MetricArgs {
    /// Difference threshold
    #[arg(long, default_value_t = 30, help = "Dissimilarity threshold 0-255 (lower = more sensitive)")]
    threshold: u8,

    /// Minimum region area
    #[arg(long, default_value_t = 100, help = "Ignore difference regions smaller than this many px²")]
    min_area: u32,

    /// Region merge distance
    #[arg(long, default_value_t = 50.0, help = "Merge regions whose centres are closer than this (px)")]
    merge_distance: f64,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Pages(args) => compare_pages(args).await,
        Commands::Images(args) => compare_images(args),
    };

    if let Err(e) = result {
        let compare_error = e.downcast_ref::<CompareError>();
        match compare_error {
            Some(ce) => log::error!("[{}] {:#}", ce.category(), e),
            None => log::error!("{:#}", e),
        }
        if let Some(ce) = compare_error {
            if let Some(suggestion) = ce.recovery_suggestion() {
                eprintln!("hint: {}", suggestion);
            } else if classify::is_fatal(ce) {
                eprintln!("hint: check the command-line arguments; re-running will fail the same way");
            } else if classify::is_transient(ce) {
                eprintln!("hint: the browser side failed; re-running the comparison may succeed");
            }
        }
        std::process::exit(compare_error.map(classify::exit_code).unwrap_or(1));
    }
}

async fn compare_pages(args: PagesArgs) -> Result<()> {
    let mut config = CompareConfig::new(args.url1, args.url2);
    config.viewport = args.viewport;
    config.width = args.width;
    config.height = args.height;
    if let Some(screen) = args.screen.as_deref() {
        let (w, h) = parse_screen(screen)?;
        let profile = ViewportProfile::desktop_for_screen(w, h);
        config.viewport = profile.kind;
        config.width = config.width.or(Some(profile.width));
        config.height = config.height.or(Some(profile.height));
    }
    config.settle_ms = args.settle_ms;
    config.load_wait_ms = args.load_wait_ms;
    config.timeout_secs = args.timeout;
    config.threshold = args.metric.threshold;
    config.min_area = args.metric.min_area;
    config.merge_distance = args.metric.merge_distance;
    config.output = args.output.display().to_string();

    config.validate().map_err(anyhow::Error::msg)?;
    let (url1, url2) = config.urls();

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, stopping after the current tile");
            on_interrupt.cancel();
        }
    });

    let output = viewport_compare::compare_urls(&config, cancel).await?;
    let report_path = report::write_report(&args.output, &output, (&url1, &url2))
        .context("failed to write report")?;

    let summary = &output.summary;
    println!("Comparison complete:");
    println!("  {} vs {}", url1, url2);
    println!(
        "  Viewport: {}x{}, step {}px, {}% overlap",
        summary.viewport_dimensions.0,
        summary.viewport_dimensions.1,
        summary.scroll_step,
        summary.overlap_percentage
    );
    println!(
        "  Page heights: {}px / {}px",
        summary.page_height1, summary.page_height2
    );
    println!("  Tiles: {}", summary.total_tiles);
    println!("  Differences: {}", summary.total_differences);
    match summary.average_similarity {
        Some(avg) => println!("  Average similarity: {:.4}", avg),
        None => println!("  Average similarity: n/a"),
    }
    println!("  Report: {}", report_path.display());
    Ok(())
}

fn compare_images(args: ImagesArgs) -> Result<()> {
    let options = args.metric.options()?;
    let (path, result) =
        report::compare_image_files(&args.image1, &args.image2, &options, &args.output)?;

    println!("Comparison complete:");
    println!("  {} vs {}", result.image1, result.image2);
    println!(
        "  Compared at: {}x{}",
        result.compared_size.0, result.compared_size.1
    );
    println!("  Similarity: {:.4}", result.similarity);
    println!("  Differences: {}", result.num_differences);
    if let Some(highlight) = &result.highlight {
        println!("  Highlight: {}", args.output.join(highlight).display());
    }
    println!("  Report: {}", path.display());
    Ok(())
}

impl MetricArgs {
    fn options(&self) -> Result<MetricOptions> {
        if !self.merge_distance.is_finite() || self.merge_distance < 0.0 {
            anyhow::bail!("merge_distance must be a non-negative number");
        }
        Ok(MetricOptions {
            threshold: self.threshold,
            min_area: self.min_area,
            merge_distance: self.merge_distance,
            ..MetricOptions::default()
        })
    }
}

/// Parse "1920x1080" into `(1920, 1080)`
fn parse_screen(screen: &str) -> Result<(u32, u32)> {
    let (w, h) = screen
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow::anyhow!("Invalid screen size: {}. Use WIDTHxHEIGHT", screen))?;
    let w = w.trim().parse().with_context(|| format!("Invalid screen width: {}", w))?;
    let h = h.trim().parse().with_context(|| format!("Invalid screen height: {}", h))?;
    Ok((w, h))
}
