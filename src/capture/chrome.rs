//! # Headless Chrome Page Session
//!
//! Drives one headless Chrome instance per page through the DevTools protocol.
//! `headless_chrome` is a blocking client, so every browser call runs on
//! tokio's blocking pool and the async side only awaits the join handle.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};

use crate::capture::{PageSession, Screenshot};
use crate::config::ViewportProfile;
use crate::error::{CompareError, CompareResult};

const PAGE_HEIGHT_JS: &str = "Math.max(document.body.scrollHeight, document.documentElement.scrollHeight, document.body.offsetHeight, document.documentElement.offsetHeight)";
const SCROLL_POSITION_JS: &str = "window.pageYOffset || document.documentElement.scrollTop || 0";

/// One loaded page in its own headless browser.
pub struct ChromeSession {
    url: String,
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    /// Launches a browser sized to `profile`, loads `url` and waits `load_wait`.
    pub async fn open(
        url: impl Into<String>,
        profile: ViewportProfile,
        load_wait: Duration,
    ) -> CompareResult<Self> {
        let url = url.into();
        let target = url.clone();

        let (browser, tab) = tokio::task::spawn_blocking(move || launch(&target, profile))
            .await
            .map_err(|e| CompareError::session_init(url.clone(), e.to_string()))?
            .map_err(|e| {
                CompareError::session_init(url.clone(), format!("{:#}", e))
                    .with_recovery_suggestion("Check that Chrome or Chromium is installed and the URL is reachable")
            })?;

        log::info!(
            "loaded {} at {}x{} ({}), waiting {}ms",
            url,
            profile.width,
            profile.height,
            profile.kind,
            load_wait.as_millis()
        );
        tokio::time::sleep(load_wait).await;

        Ok(Self {
            url,
            browser: Some(browser),
            tab,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

async fn evaluate_number(tab: Arc<Tab>, script: &'static str) -> Result<f64> {
    tokio::task::spawn_blocking(move || {
        let result = tab.evaluate(script, false)?;
        result
            .value
            .and_then(|v| v.as_f64())
            .ok_or_else(|| anyhow!("script returned no number: {}", script))
    })
    .await
    .context("browser task panicked")?
}

fn launch(url: &str, profile: ViewportProfile) -> Result<(Browser, Arc<Tab>)> {
    let launch_opts = LaunchOptionsBuilder::default()
        .headless(true)
        .window_size(Some((profile.width, profile.height)))
        .idle_browser_timeout(Duration::from_secs(300))
        .args(vec![
            OsStr::new("--force-device-scale-factor=1"),
            OsStr::new("--hide-scrollbars"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-extensions"),
        ])
        .build()
        .map_err(|e| anyhow!("invalid launch options: {}", e))?;

    let browser = Browser::new(launch_opts)?;
    let tab = browser.new_tab()?;
    tab.set_user_agent(profile.user_agent(), None, None)?;
    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;
    Ok((browser, tab))
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn scroll_to(&mut self, offset: u32) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let script = format!(
            "window.scrollTo({{top: {}, left: 0, behavior: 'instant'}})",
            offset
        );
        tokio::task::spawn_blocking(move || tab.evaluate(&script, false).map(|_| ()))
            .await
            .context("browser task panicked")?
    }

    async fn current_height(&mut self) -> Result<u32> {
        let height = evaluate_number(Arc::clone(&self.tab), PAGE_HEIGHT_JS).await?;
        Ok(height.max(0.0).round() as u32)
    }

    async fn capture(&mut self) -> Result<Screenshot> {
        let tab = Arc::clone(&self.tab);
        let png = tokio::task::spawn_blocking(move || {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await
        .context("browser task panicked")??;
        Ok(Screenshot::Encoded(png))
    }

    async fn scroll_position(&mut self) -> Result<Option<u32>> {
        let position = evaluate_number(Arc::clone(&self.tab), SCROLL_POSITION_JS).await?;
        Ok(Some(position.max(0.0).round() as u32))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(browser) = self.browser.take() {
            log::debug!("closing browser for {}", self.url);
            // Dropping the browser terminates the Chrome process.
            tokio::task::spawn_blocking(move || drop(browser))
                .await
                .context("browser task panicked")?;
        }
        Ok(())
    }
}
