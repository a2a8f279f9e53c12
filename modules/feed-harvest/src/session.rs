// Session lifecycle: hand the harvester a live page and take it back.
// `GroupHarvester::scrape_group` calls `release` exactly once per `acquire`,
// whether the run succeeded, failed or was dropped mid-way.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use cdp_client::{CdpClient, CdpPage};
use tracing::{info, warn};

use crate::error::{HarvestError, Result};
use crate::js;
use crate::page::{DomQuerySource, FeedPage, RawCandidate};

#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Page: FeedPage + 'static;

    async fn acquire(&self) -> Result<Self::Page>;

    /// Tear the page down. Failures are logged, not returned.
    async fn release(&self, page: Self::Page);
}

/// Attaches to a browser that is already running with remote debugging
/// enabled. Never launches or stops the browser itself.
pub struct CdpSessionProvider {
    endpoint: String,
}

impl CdpSessionProvider {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

pub struct CdpFeedPage {
    client: CdpClient,
    page: CdpPage,
}

#[async_trait]
impl SessionProvider for CdpSessionProvider {
    type Page = CdpFeedPage;

    async fn acquire(&self) -> Result<CdpFeedPage> {
        let client = CdpClient::connect(&self.endpoint)
            .await
            .map_err(|e| HarvestError::SessionInit(e.to_string()))?;

        let page = match client.open_page().await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = client.close().await {
                    warn!(error = %close_err, "session: failed to close browser connection");
                }
                return Err(HarvestError::SessionInit(e.to_string()));
            }
        };

        info!(endpoint = self.endpoint.as_str(), target = page.target_id(), "session: page opened");
        Ok(CdpFeedPage { client, page })
    }

    async fn release(&self, session: CdpFeedPage) {
        let CdpFeedPage { client, page } = session;

        if let Err(e) = page.close().await {
            warn!(error = %e, "session: failed to close page");
        }
        if let Err(e) = client.close().await {
            warn!(error = %e, "session: failed to close browser connection");
        }
        info!("session: released");
    }
}

#[async_trait]
impl DomQuerySource for CdpFeedPage {
    async fn feed_children(&self) -> AnyResult<Option<Vec<RawCandidate>>> {
        Ok(self
            .page
            .evaluate_as(js::EXTRACT_FEED_CHILDREN.as_str())
            .await?)
    }
}

#[async_trait]
impl FeedPage for CdpFeedPage {
    async fn goto(&self, url: &str) -> AnyResult<()> {
        self.page.navigate(url).await?;
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> AnyResult<bool> {
        Ok(self
            .page
            .evaluate_as(&js::element_present(selector))
            .await?)
    }

    async fn scroll_viewport(&self, factor: f64) -> AnyResult<()> {
        self.page.evaluate(&js::scroll_by_viewport(factor)).await?;
        Ok(())
    }
}
