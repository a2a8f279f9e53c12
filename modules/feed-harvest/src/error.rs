/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Fatal harvest failures. Problems with a single feed item never surface
/// here; the extractor drops or logs them.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Failed to initialize browser session: {0}")]
    SessionInit(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error(
        "Feed container {selector} not found after {waited_ms}ms{}",
        last_check_suffix(.last_error)
    )]
    FeedNotFound {
        selector: String,
        waited_ms: u64,
        /// Error from the most recent presence check, if it failed.
        last_error: Option<String>,
    },

    #[error(transparent)]
    Page(#[from] anyhow::Error),
}

fn last_check_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last check failed: {e})"),
        None => String::new(),
    }
}
