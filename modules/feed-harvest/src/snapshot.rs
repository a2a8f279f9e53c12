// Offline feed pages built from saved HTML. Each snapshot stands for the
// document as it looked after one scroll; scrolling moves to the next one.
// Static HTML cannot be clicked, so "See more" text stays truncated.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::error::HarvestError;
use crate::page::{selectors, DomQuerySource, FeedPage, RawCandidate};
use crate::session::SessionProvider;

static FEED: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::FEED));
static BUTTON: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::BUTTON));
static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| parse_selector(selectors::CONTENT_CONTAINER));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| parse_selector(selectors::DESCRIPTION));
static PREVIEW: LazyLock<Selector> =
    LazyLock::new(|| parse_selector(selectors::PREVIEW_MESSAGE));

fn parse_selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Read the feed children out of an HTML document, mirroring what the
/// in-page procedure reports. `None` when there is no feed container.
pub fn feed_candidates(html: &str) -> Option<Vec<RawCandidate>> {
    let document = Html::parse_document(html);
    let feed = document.select(&FEED).next()?;

    Some(
        feed.children()
            .filter_map(ElementRef::wrap)
            .map(candidate_from_element)
            .collect(),
    )
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

fn candidate_from_element(child: ElementRef<'_>) -> RawCandidate {
    RawCandidate {
        markup: child.select(&CONTAINER).next().map(|el| el.html()),
        description_text: child.select(&DESCRIPTION).next().map(text_of),
        preview_text: child.select(&PREVIEW).next().map(text_of),
        has_see_more: child
            .select(&BUTTON)
            .any(|b| text_of(b).trim() == selectors::SEE_MORE_LABEL),
        expansion_error: None,
    }
}

pub struct SnapshotPage {
    snapshots: Vec<String>,
    position: AtomicUsize,
}

impl SnapshotPage {
    pub fn new(snapshots: Vec<String>) -> Self {
        Self {
            snapshots,
            position: AtomicUsize::new(0),
        }
    }

    /// Index of the snapshot currently shown.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    fn current(&self) -> &str {
        self.snapshots
            .get(self.position())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[async_trait]
impl DomQuerySource for SnapshotPage {
    async fn feed_children(&self) -> Result<Option<Vec<RawCandidate>>> {
        Ok(feed_candidates(self.current()))
    }
}

#[async_trait]
impl FeedPage for SnapshotPage {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!(url, snapshots = self.snapshots.len(), "snapshot: replaying saved feed");
        self.position.store(0, Ordering::Relaxed);
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        let selector = Selector::parse(selector)
            .map_err(|e| anyhow::anyhow!("invalid selector {selector}: {e:?}"))?;
        Ok(Html::parse_document(self.current())
            .select(&selector)
            .next()
            .is_some())
    }

    /// Moves to the next snapshot; stays on the last one at the end.
    async fn scroll_viewport(&self, _factor: f64) -> Result<()> {
        let last = self.snapshots.len().saturating_sub(1);
        let next = (self.position() + 1).min(last);
        self.position.store(next, Ordering::Relaxed);
        Ok(())
    }
}

/// Session provider that replays saved HTML instead of attaching to a browser.
pub struct ReplaySessionProvider {
    snapshots: Vec<String>,
}

impl ReplaySessionProvider {
    pub fn new(snapshots: Vec<String>) -> Self {
        Self { snapshots }
    }

    pub fn from_files(paths: &[PathBuf]) -> Result<Self> {
        let snapshots = paths
            .iter()
            .map(|path| read_snapshot(path))
            .collect::<Result<Vec<_>>>()?;
        info!(files = snapshots.len(), "snapshot: loaded saved pages");
        Ok(Self::new(snapshots))
    }
}

fn read_snapshot(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))
}

#[async_trait]
impl SessionProvider for ReplaySessionProvider {
    type Page = SnapshotPage;

    async fn acquire(&self) -> crate::error::Result<SnapshotPage> {
        if self.snapshots.is_empty() {
            return Err(HarvestError::SessionInit("no snapshots to replay".into()));
        }
        Ok(SnapshotPage::new(self.snapshots.clone()))
    }

    async fn release(&self, page: SnapshotPage) {
        debug!(position = page.position(), "snapshot: session released");
    }
}
