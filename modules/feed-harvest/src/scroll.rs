use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::page::FeedPage;

/// Viewport heights moved per scroll.
pub const SCROLL_VIEWPORT_FACTOR: f64 = 1.2;

/// Scrolls the feed and waits a fixed settle time for lazy content. Nothing
/// checks whether new content actually arrived.
#[derive(Debug, Clone)]
pub struct ScrollDriver {
    settle: Duration,
}

impl ScrollDriver {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    pub async fn advance<P>(&self, page: &P) -> Result<()>
    where
        P: FeedPage + ?Sized,
    {
        page.scroll_viewport(SCROLL_VIEWPORT_FACTOR).await?;
        debug!(settle_ms = self.settle.as_millis() as u64, "scroll: waiting for content");
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}
