//! In-process fakes for harvest integration tests.
//!
//! `ScriptedPage` plays back one feed state per pass; `RecordingSessions`
//! counts acquire/release so tests can check teardown on every exit path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use feed_harvest::{DomQuerySource, FeedPage, HarvestError, RawCandidate, SessionProvider};

// ---------------------------------------------------------------------------
// Candidate builders
// ---------------------------------------------------------------------------

pub fn composer() -> RawCandidate {
    RawCandidate {
        markup: Some(r#"<div class="x9f html-div">Write something...</div>"#.into()),
        description_text: Some("Write something...".into()),
        ..Default::default()
    }
}

pub fn post(text: &str) -> RawCandidate {
    RawCandidate {
        markup: Some(format!(r#"<div class="x1y2 html-div">{text}</div>"#)),
        description_text: Some(text.into()),
        ..Default::default()
    }
}

/// A suggested-group card: content container, but no message node.
pub fn suggestion_card() -> RawCandidate {
    RawCandidate {
        markup: Some(r#"<div class="x1y2 html-div"><a>Join group</a></div>"#.into()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Scripted page
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct PageLog {
    pub visited: Mutex<Vec<String>>,
    pub feed_checks: AtomicUsize,
    pub scrolls: Mutex<Vec<f64>>,
    pub extractions: AtomicUsize,
}

pub struct ScriptedPage {
    passes: Vec<Vec<RawCandidate>>,
    /// Presence checks that report "no feed" before it appears; `None` never mounts.
    feed_after_checks: Option<usize>,
    /// Presence checks that error out first, as during a redirect.
    failing_checks: usize,
    fail_extraction_at: Option<usize>,
    fail_navigation: bool,
    log: Arc<PageLog>,
}

impl ScriptedPage {
    pub fn new(passes: Vec<Vec<RawCandidate>>) -> Self {
        Self {
            passes,
            feed_after_checks: Some(0),
            failing_checks: 0,
            fail_extraction_at: None,
            fail_navigation: false,
            log: Arc::default(),
        }
    }

    pub fn feed_never_mounts(mut self) -> Self {
        self.feed_after_checks = None;
        self
    }

    pub fn feed_mounts_after(mut self, checks: usize) -> Self {
        self.feed_after_checks = Some(checks);
        self
    }

    pub fn feed_checks_fail(mut self, checks: usize) -> Self {
        self.failing_checks = checks;
        self
    }

    pub fn fail_extraction_at(mut self, pass: usize) -> Self {
        self.fail_extraction_at = Some(pass);
        self
    }

    pub fn fail_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn log(&self) -> Arc<PageLog> {
        self.log.clone()
    }
}

#[async_trait]
impl DomQuerySource for ScriptedPage {
    async fn feed_children(&self) -> Result<Option<Vec<RawCandidate>>> {
        let pass = self.log.extractions.fetch_add(1, Ordering::SeqCst);
        if self.fail_extraction_at == Some(pass) {
            bail!("Execution context was destroyed");
        }
        let scrolled = self.log.scrolls.lock().unwrap().len();
        let index = scrolled.min(self.passes.len().saturating_sub(1));
        Ok(self.passes.get(index).cloned())
    }
}

#[async_trait]
impl FeedPage for ScriptedPage {
    async fn goto(&self, url: &str) -> Result<()> {
        if self.fail_navigation {
            bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        self.log.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn has_element(&self, _selector: &str) -> Result<bool> {
        let checks = self.log.feed_checks.fetch_add(1, Ordering::SeqCst);
        if checks < self.failing_checks {
            bail!("Execution context was destroyed, most likely because of a navigation");
        }
        Ok(matches!(self.feed_after_checks, Some(after) if checks >= after))
    }

    async fn scroll_viewport(&self, factor: f64) -> Result<()> {
        self.log.scrolls.lock().unwrap().push(factor);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording session provider
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SessionCounts {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl SessionCounts {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

pub struct RecordingSessions {
    page: Mutex<Option<ScriptedPage>>,
    refuse: bool,
    counts: Arc<SessionCounts>,
}

impl RecordingSessions {
    pub fn new(page: ScriptedPage) -> Self {
        Self {
            page: Mutex::new(Some(page)),
            refuse: false,
            counts: Arc::default(),
        }
    }

    /// A provider whose browser cannot be reached.
    pub fn unreachable() -> Self {
        Self {
            page: Mutex::new(None),
            refuse: true,
            counts: Arc::default(),
        }
    }

    pub fn counts(&self) -> Arc<SessionCounts> {
        self.counts.clone()
    }
}

#[async_trait]
impl SessionProvider for RecordingSessions {
    type Page = ScriptedPage;

    async fn acquire(&self) -> feed_harvest::Result<ScriptedPage> {
        if self.refuse {
            return Err(HarvestError::SessionInit(
                "Network error: connection refused (localhost:9222)".into(),
            ));
        }
        self.counts.acquired.fetch_add(1, Ordering::SeqCst);
        self.page
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| HarvestError::SessionInit("page already handed out".into()))
    }

    async fn release(&self, _page: ScriptedPage) {
        self.counts.released.fetch_add(1, Ordering::SeqCst);
    }
}
