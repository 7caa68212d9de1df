//! # Capture Module
//!
//! The seam between a comparison run and whatever renders the pages.
//!
//! ## Architecture
//!
//! 1. **PageSession Trait**: one loaded page that can scroll, report its height
//!    and return a raster of the current viewport
//! 2. **Screenshot**: what a session hands back, either encoded bytes straight
//!    from a browser or already decoded pixels
//! 3. **SettlePolicy Trait**: how long to wait after a scroll before capturing
//! 4. **ChromeSession**: headless Chrome implementation (feature `chrome`)
//!
//! Sessions are exclusively owned by one run. They must survive any number of
//! scroll and capture cycles on the same loaded page.

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod settle;

use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;

#[cfg(feature = "chrome")]
pub use chrome::ChromeSession;
pub use settle::{FixedDelay, NoSettle, SettlePolicy};

/// One loaded page driven by a comparison run.
#[async_trait]
pub trait PageSession: Send {
    /// Scrolls the page so that `offset` is the top of the viewport.
    async fn scroll_to(&mut self, offset: u32) -> Result<()>;

    /// Returns the full scrollable height of the page in pixels.
    async fn current_height(&mut self) -> Result<u32>;

    /// Captures the current viewport.
    async fn capture(&mut self) -> Result<Screenshot>;

    /// Reports where the page is actually scrolled to, if the backend can tell.
    ///
    /// Used only to warn about scroll drift.
    async fn scroll_position(&mut self) -> Result<Option<u32>> {
        Ok(None)
    }

    /// Releases the page. Called exactly once when the run ends, whatever the outcome.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Raster returned by [`PageSession::capture`].
#[derive(Debug, Clone)]
pub enum Screenshot {
    /// Encoded image (PNG from a browser). May fail to decode.
    Encoded(Vec<u8>),
    /// Decoded pixels.
    Pixels(RgbaImage),
}

impl Screenshot {
    /// Decoded copy of the pixels, leaving the screenshot intact.
    pub fn to_image(&self) -> Option<RgbaImage> {
        match self {
            Screenshot::Encoded(bytes) => vp_metric::decode(bytes),
            Screenshot::Pixels(image) => Some(image.clone()),
        }
    }

    /// Decoded pixels, or `None` when the encoded bytes are not an image.
    pub fn into_image(self) -> Option<RgbaImage> {
        match self {
            Screenshot::Encoded(bytes) => vp_metric::decode(&bytes),
            Screenshot::Pixels(image) => Some(image),
        }
    }
}

impl From<RgbaImage> for Screenshot {
    fn from(image: RgbaImage) -> Self {
        Screenshot::Pixels(image)
    }
}
