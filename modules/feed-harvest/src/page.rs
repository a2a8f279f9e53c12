// Capability boundary between the collection loop and a rendered page.
// The CDP session and the HTML snapshot replayer both implement it.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Host page structure the extractor relies on.
pub mod selectors {
    pub const FEED: &str = r#"div[role="feed"]"#;
    pub const BUTTON: &str = r#"div[role="button"]"#;
    pub const SEE_MORE_LABEL: &str = "See more";
    pub const CONTENT_CONTAINER: &str = r#"div[class*="html-div"]"#;
    pub const DESCRIPTION: &str = r#"span[data-ad-rendering-role="description"]"#;
    pub const PREVIEW_MESSAGE: &str = r#"div[data-ad-comet-preview="message"]"#;
}

/// What the page reports for one child of the feed container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCandidate {
    /// Outer HTML of the content container, if the child has one.
    #[serde(default)]
    pub markup: Option<String>,
    #[serde(default)]
    pub description_text: Option<String>,
    #[serde(default)]
    pub preview_text: Option<String>,
    #[serde(default)]
    pub has_see_more: bool,
    /// Set when clicking "See more" threw inside the page.
    #[serde(default)]
    pub expansion_error: Option<String>,
}

#[async_trait]
pub trait DomQuerySource: Send + Sync {
    /// Run the extraction procedure against the current document.
    /// `None` when the feed container is not mounted.
    async fn feed_children(&self) -> Result<Option<Vec<RawCandidate>>>;
}

#[async_trait]
pub trait FeedPage: DomQuerySource {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn has_element(&self, selector: &str) -> Result<bool>;

    /// Scroll down by `factor` viewport heights.
    async fn scroll_viewport(&self, factor: f64) -> Result<()>;
}
