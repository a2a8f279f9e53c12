use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_CDP_ENDPOINT: &str = "http://localhost:9222";

/// Knobs for one harvest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestConfig {
    /// Scroll-then-extract rounds after the initial pass.
    pub scroll_count: u32,
    pub scroll_delay: Duration,
    pub initial_load_delay: Duration,
    /// Upper bound on waiting for the feed container to mount.
    pub feed_ready_timeout: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            scroll_count: 5,
            scroll_delay: Duration::from_millis(3000),
            initial_load_delay: Duration::from_millis(5000),
            feed_ready_timeout: Duration::from_secs(30),
        }
    }
}

/// Process configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cdp_endpoint: String,
    pub harvest: HarvestConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys fall back to defaults; set but
    /// unparseable numbers are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = HarvestConfig::default();

        let millis = |key: &str, default: Duration| -> Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .with_context(|| format!("{key} must be a number of milliseconds, got {raw:?}")),
                None => Ok(default),
            }
        };

        let scroll_count = match lookup("SCROLL_COUNT") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("SCROLL_COUNT must be a non-negative integer, got {raw:?}"))?,
            None => defaults.scroll_count,
        };

        Ok(Self {
            cdp_endpoint: lookup("CDP_ENDPOINT")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CDP_ENDPOINT.to_string()),
            harvest: HarvestConfig {
                scroll_count,
                scroll_delay: millis("SCROLL_DELAY_MS", defaults.scroll_delay)?,
                initial_load_delay: millis("INITIAL_LOAD_DELAY_MS", defaults.initial_load_delay)?,
                feed_ready_timeout: millis("FEED_READY_TIMEOUT_MS", defaults.feed_ready_timeout)?,
            },
        })
    }

    pub fn log_settings(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  CDP_ENDPOINT: {}", self.cdp_endpoint);
        tracing::info!("  SCROLL_COUNT: {}", self.harvest.scroll_count);
        tracing::info!("  SCROLL_DELAY_MS: {}", self.harvest.scroll_delay.as_millis());
        tracing::info!(
            "  INITIAL_LOAD_DELAY_MS: {}",
            self.harvest.initial_load_delay.as_millis()
        );
        tracing::info!(
            "  FEED_READY_TIMEOUT_MS: {}",
            self.harvest.feed_ready_timeout.as_millis()
        );
    }
}
