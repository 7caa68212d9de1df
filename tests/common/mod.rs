//! Common test utilities and helpers for the viewport-compare tests
//!
//! This module provides mock page sessions over synthetic tall pages and
//! helpers to build those pages.

#![allow(dead_code)]

/// Mock page session for testing without a browser
pub mod mock_session {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use viewport_compare::capture::{PageSession, Screenshot};

    /// What a mock session was asked to do, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Scroll(u32),
        /// Capture taken at this (clamped) scroll position.
        Capture(u32),
        Closed,
    }

    /// Shared, cloneable event log. Survives the session being moved into a run.
    #[derive(Debug, Clone, Default)]
    pub struct EventLog(Arc<Mutex<Vec<Event>>>);

    impl EventLog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap().clone()
        }

        pub fn scrolls(&self) -> Vec<u32> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Scroll(o) => Some(o),
                    _ => None,
                })
                .collect()
        }

        pub fn captures(&self) -> Vec<u32> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Capture(p) => Some(p),
                    _ => None,
                })
                .collect()
        }

        pub fn closed(&self) -> bool {
            self.events().contains(&Event::Closed)
        }

        fn push(&self, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    /// Page session over an in-memory rendering of a full page.
    ///
    /// Scrolling clamps to the last full viewport the way a browser does.
    pub struct MockPage {
        page: RgbaImage,
        viewport_height: u32,
        position: u32,
        captures: usize,
        fail_capture_at: Option<usize>,
        fail_scroll_to: Option<u32>,
        capture_delay: Option<Duration>,
        capture_width: Option<u32>,
        undecodable: bool,
        report_position: bool,
        log: EventLog,
    }

    impl MockPage {
        /// Create a mock page; the viewport is as wide as the page.
        pub fn new(page: RgbaImage, viewport_height: u32) -> Self {
            Self {
                page,
                viewport_height,
                position: 0,
                captures: 0,
                fail_capture_at: None,
                fail_scroll_to: None,
                capture_delay: None,
                capture_width: None,
                undecodable: false,
                report_position: false,
                log: EventLog::new(),
            }
        }

        /// The `n`-th capture (0-based) fails.
        pub fn failing_capture_at(mut self, n: usize) -> Self {
            self.fail_capture_at = Some(n);
            self
        }

        /// Scrolling to `offset` fails.
        pub fn failing_scroll_to(mut self, offset: u32) -> Self {
            self.fail_scroll_to = Some(offset);
            self
        }

        pub fn with_capture_delay(mut self, delay: Duration) -> Self {
            self.capture_delay = Some(delay);
            self
        }

        /// Captures come back narrower than the page, as if the window rendered smaller.
        pub fn with_capture_width(mut self, width: u32) -> Self {
            self.capture_width = Some(width);
            self
        }

        /// Captures come back as bytes that are not an image.
        pub fn undecodable(mut self) -> Self {
            self.undecodable = true;
            self
        }

        pub fn reporting_position(mut self) -> Self {
            self.report_position = true;
            self
        }

        pub fn with_log(mut self, log: EventLog) -> Self {
            self.log = log;
            self
        }

        pub fn log(&self) -> EventLog {
            self.log.clone()
        }

        fn viewport(&self) -> RgbaImage {
            let width = self.capture_width.unwrap_or(self.page.width());
            RgbaImage::from_fn(width, self.viewport_height, |x, y| {
                self.page
                    .get_pixel_checked(x, self.position + y)
                    .copied()
                    .unwrap_or(Rgba([255, 255, 255, 255]))
            })
        }
    }

    #[async_trait]
    impl PageSession for MockPage {
        async fn scroll_to(&mut self, offset: u32) -> Result<()> {
            self.log.push(Event::Scroll(offset));
            if self.fail_scroll_to == Some(offset) {
                bail!("page crashed while scrolling to {}", offset);
            }
            self.position = offset.min(self.page.height().saturating_sub(self.viewport_height));
            Ok(())
        }

        async fn current_height(&mut self) -> Result<u32> {
            Ok(self.page.height())
        }

        async fn capture(&mut self) -> Result<Screenshot> {
            if let Some(delay) = self.capture_delay {
                tokio::time::sleep(delay).await;
            }
            let n = self.captures;
            self.captures += 1;
            if self.fail_capture_at == Some(n) {
                bail!("connection reset during capture {}", n);
            }
            self.log.push(Event::Capture(self.position));
            if self.undecodable {
                return Ok(Screenshot::Encoded(vec![0xde, 0xad, 0xbe, 0xef]));
            }
            Ok(Screenshot::Pixels(self.viewport()))
        }

        async fn scroll_position(&mut self) -> Result<Option<u32>> {
            Ok(self.report_position.then_some(self.position))
        }

        async fn close(&mut self) -> Result<()> {
            self.log.push(Event::Closed);
            Ok(())
        }
    }
}

/// Synthetic page builders
pub mod test_pages {
    use image::{Rgba, RgbaImage};

    pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    /// Standard page width for pipeline tests
    pub const PAGE_WIDTH: u32 = 200;

    /// White page with gray "text" lines, so no region of it is flat.
    pub fn tall_page(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (y / 12) % 3 == 0 && x % 40 < 30 {
                Rgba([180, 180, 180, 255])
            } else {
                WHITE
            }
        })
    }

    /// Copy of `page` with a filled block.
    pub fn with_block(page: &RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgba<u8>) -> RgbaImage {
        let mut out = page.clone();
        for y in y0..(y0 + h).min(page.height()) {
            for x in x0..(x0 + w).min(page.width()) {
                out.put_pixel(x, y, color);
            }
        }
        out
    }
}
