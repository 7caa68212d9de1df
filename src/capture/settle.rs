//! Wait policies applied after each scroll, before the capture.

use std::time::Duration;

use async_trait::async_trait;

/// Decides when a freshly scrolled page is ready to be captured.
#[async_trait]
pub trait SettlePolicy: Send + Sync {
    /// Returns once the page at `offset` is judged ready.
    async fn settle(&self, offset: u32);
}

/// Sleep for a fixed time. Gives lazy-loaded content and transitions a chance to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(Duration::from_millis(800))
    }
}

#[async_trait]
impl SettlePolicy for FixedDelay {
    async fn settle(&self, offset: u32) {
        log::trace!("settling {}ms at offset {}", self.0.as_millis(), offset);
        tokio::time::sleep(self.0).await;
    }
}

/// Capture immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSettle;

#[async_trait]
impl SettlePolicy for NoSettle {
    async fn settle(&self, _offset: u32) {}
}
