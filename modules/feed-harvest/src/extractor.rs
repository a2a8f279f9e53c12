// Content extractor: turns the feed children reported by the page into post
// records. Children without the expected structure are dropped silently.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::page::{DomQuerySource, RawCandidate};
use crate::post::PostRecord;

/// Extract the posts currently rendered in the feed. An unmounted feed yields
/// an empty batch. Posts already seen in earlier passes are returned again;
/// the store filters them.
pub async fn extract_posts<S>(source: &S) -> Result<Vec<PostRecord>>
where
    S: DomQuerySource + ?Sized,
{
    let Some(children) = source.feed_children().await? else {
        debug!("extract: feed container not mounted");
        return Ok(Vec::new());
    };

    Ok(posts_from_candidates(children, Utc::now()))
}

/// Skip the first feed child (composer row), then keep every candidate that
/// has a content container and non-blank message text.
pub fn posts_from_candidates(
    children: Vec<RawCandidate>,
    collected_at: DateTime<Utc>,
) -> Vec<PostRecord> {
    children
        .into_iter()
        .enumerate()
        .skip(1)
        .filter_map(|(position, candidate)| post_from_candidate(position, candidate, collected_at))
        .collect()
}

fn post_from_candidate(
    position: usize,
    candidate: RawCandidate,
    collected_at: DateTime<Utc>,
) -> Option<PostRecord> {
    match (candidate.has_see_more, candidate.expansion_error.as_deref()) {
        (_, Some(error)) => {
            warn!(position, error, "extract: failed to click \"See more\", using visible text")
        }
        (true, None) => debug!(position, "extract: expanded \"See more\""),
        (false, None) => {}
    }

    let Some(markup) = candidate.markup else {
        debug!(position, "extract: no content container, skipping");
        return None;
    };

    // The description node wins whenever it exists, even if empty.
    let text = candidate.description_text.or(candidate.preview_text);
    let post = text
        .as_deref()
        .and_then(|text| PostRecord::from_text(text, markup, collected_at));

    if post.is_none() {
        debug!(position, "extract: no message text, skipping");
    }
    post
}
