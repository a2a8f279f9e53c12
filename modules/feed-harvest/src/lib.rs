//! Incremental harvesting of unique posts from a lazily-loaded group feed.
//!
//! A [`GroupHarvester`] borrows a page from a [`SessionProvider`], navigates
//! to the group, extracts the rendered posts, then scrolls and extracts again
//! a fixed number of times. Every batch is merged into a [`PostStore`] keyed
//! by a content fingerprint, so a post seen on several passes is kept once.

pub mod config;
pub mod error;
pub mod extractor;
pub mod harvester;
mod js;
pub mod page;
pub mod post;
pub mod scroll;
pub mod session;
pub mod snapshot;
pub mod store;

pub use config::{AppConfig, HarvestConfig, DEFAULT_CDP_ENDPOINT};
pub use error::{HarvestError, Result};
pub use extractor::{extract_posts, posts_from_candidates};
pub use harvester::GroupHarvester;
pub use page::{DomQuerySource, FeedPage, RawCandidate};
pub use post::{fingerprint, normalize_text, PostRecord, FINGERPRINT_CHARS};
pub use scroll::{ScrollDriver, SCROLL_VIEWPORT_FACTOR};
pub use session::{CdpFeedPage, CdpSessionProvider, SessionProvider};
pub use snapshot::{ReplaySessionProvider, SnapshotPage};
pub use store::PostStore;
