// Collection loop: navigate, wait for the feed, extract once, then alternate
// scroll and extract for a fixed number of rounds, deduplicating as it goes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use crate::extractor::extract_posts;
use crate::page::{selectors, FeedPage};
use crate::post::PostRecord;
use crate::scroll::ScrollDriver;
use crate::session::SessionProvider;
use crate::store::PostStore;

const FEED_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct GroupHarvester<S> {
    sessions: Arc<S>,
    config: HarvestConfig,
}

impl<S: SessionProvider + 'static> GroupHarvester<S> {
    pub fn new(sessions: S, config: HarvestConfig) -> Self {
        Self {
            sessions: Arc::new(sessions),
            config,
        }
    }

    /// Harvest the unique posts of one group feed. The page is released
    /// before any error is returned, and also when this future is dropped
    /// or the run panics.
    pub async fn scrape_group(&self, group_url: &str) -> Result<Vec<PostRecord>> {
        let page = self.sessions.acquire().await?;
        let lease = Lease::new(Arc::clone(&self.sessions), page);

        let outcome = self.collect(lease.page(), group_url).await;
        lease.release().await;

        match &outcome {
            Ok(posts) => info!(group_url, posts = posts.len(), "Harvest complete"),
            Err(e) => debug!(group_url, error = %e, "harvest aborted"),
        }
        outcome
    }

    async fn collect(&self, page: &S::Page, group_url: &str) -> Result<Vec<PostRecord>> {
        info!(group_url, "Navigating to group");
        page.goto(group_url)
            .await
            .map_err(|e| HarvestError::Navigation {
                url: group_url.to_string(),
                message: format!("{e:#}"),
            })?;

        tokio::time::sleep(self.config.initial_load_delay).await;
        wait_for_feed(page, self.config.feed_ready_timeout).await?;

        let mut store = PostStore::new();
        self.extract_into(page, &mut store).await?;

        let scroller = ScrollDriver::new(self.config.scroll_delay);
        let rounds = self.config.scroll_count;
        for round in 1..=rounds {
            info!(round, rounds, "=== Scroll {round}/{rounds} ===");
            scroller.advance(page).await?;
            self.extract_into(page, &mut store).await?;
        }

        Ok(store.into_values())
    }

    async fn extract_into(&self, page: &S::Page, store: &mut PostStore) -> Result<()> {
        let batch = extract_posts(page).await?;
        let found = batch.len();
        let added = store.merge(batch);
        info!(
            found,
            added,
            total = store.len(),
            "Total unique posts collected: {}",
            store.len()
        );
        Ok(())
    }
}

/// A page on loan from its provider. `release` hands it back; if the lease is
/// dropped first, the release is spawned onto the runtime instead.
struct Lease<S: SessionProvider + 'static> {
    sessions: Arc<S>,
    page: Option<S::Page>,
}

impl<S: SessionProvider + 'static> Lease<S> {
    fn new(sessions: Arc<S>, page: S::Page) -> Self {
        Self {
            sessions,
            page: Some(page),
        }
    }

    fn page(&self) -> &S::Page {
        self.page.as_ref().expect("page is held until the lease is released")
    }

    async fn release(mut self) {
        if let Some(page) = self.page.take() {
            self.sessions.release(page).await;
        }
    }
}

impl<S: SessionProvider + 'static> Drop for Lease<S> {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("harvest interrupted, releasing page in the background");
                let sessions = Arc::clone(&self.sessions);
                handle.spawn(async move { sessions.release(page).await });
            }
            Err(_) => warn!("harvest interrupted outside a runtime, page not released"),
        }
    }
}

/// Poll until the feed container exists, giving up after `timeout`. A failed
/// check counts as "not yet": the document may still be loading or
/// redirecting.
async fn wait_for_feed<P>(page: &P, timeout: Duration) -> Result<()>
where
    P: FeedPage + ?Sized,
{
    let started = Instant::now();
    let mut last_error = None;
    loop {
        match page.has_element(selectors::FEED).await {
            Ok(true) => {
                debug!(waited_ms = started.elapsed().as_millis() as u64, "feed container ready");
                return Ok(());
            }
            Ok(false) => last_error = None,
            Err(e) => {
                debug!(error = %e, "feed check failed, retrying");
                last_error = Some(format!("{e:#}"));
            }
        }

        let waited = started.elapsed();
        if waited >= timeout {
            return Err(HarvestError::FeedNotFound {
                selector: selectors::FEED.to_string(),
                waited_ms: waited.as_millis() as u64,
                last_error,
            });
        }
        tokio::time::sleep(FEED_POLL_INTERVAL.min(timeout - waited)).await;
    }
}
