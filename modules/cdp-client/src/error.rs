use thiserror::Error;

pub type Result<T> = std::result::Result<T, CdpError>;

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Command {method} timed out")]
    Timeout { method: String },

    #[error("Connection closed")]
    Closed,
}

impl From<reqwest::Error> for CdpError {
    fn from(err: reqwest::Error) -> Self {
        CdpError::Network(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(err.to_string())
    }
}

impl From<serde_json::Error> for CdpError {
    fn from(err: serde_json::Error) -> Self {
        CdpError::Decode(err.to_string())
    }
}
