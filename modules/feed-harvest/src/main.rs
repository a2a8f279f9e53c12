use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use feed_harvest::{
    AppConfig, CdpSessionProvider, GroupHarvester, PostRecord, ReplaySessionProvider,
};

const PREVIEW_CHARS: usize = 100;

/// Collect the unique posts of a group feed through a running Chrome.
///
/// Start Chrome with `--remote-debugging-port=9222` and sign in first; this
/// tool only attaches to it.
#[derive(Debug, Parser)]
#[command(name = "feed-harvest")]
struct Cli {
    /// Group feed URL to harvest.
    group_url: String,

    /// Scroll rounds after the initial pass [env: SCROLL_COUNT, default: 5]
    #[arg(long)]
    scroll_count: Option<u32>,

    /// Settle time after each scroll [env: SCROLL_DELAY_MS, default: 3000]
    #[arg(long)]
    scroll_delay_ms: Option<u64>,

    /// Settle time after navigation [env: INITIAL_LOAD_DELAY_MS, default: 5000]
    #[arg(long)]
    initial_load_delay_ms: Option<u64>,

    /// Longest wait for the feed to mount [env: FEED_READY_TIMEOUT_MS, default: 30000]
    #[arg(long)]
    feed_timeout_ms: Option<u64>,

    /// Remote debugging endpoint [env: CDP_ENDPOINT, default: http://localhost:9222]
    #[arg(long)]
    cdp_endpoint: Option<String>,

    /// Replay saved HTML snapshots (one per pass) instead of driving a browser.
    #[arg(long, num_args = 1..)]
    replay: Vec<PathBuf>,

    /// Print the collected posts as JSON.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(count) = self.scroll_count {
            config.harvest.scroll_count = count;
        }
        if let Some(ms) = self.scroll_delay_ms {
            config.harvest.scroll_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.initial_load_delay_ms {
            config.harvest.initial_load_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.feed_timeout_ms {
            config.harvest.feed_ready_timeout = Duration::from_millis(ms);
        }
        if let Some(ref endpoint) = self.cdp_endpoint {
            config.cdp_endpoint = endpoint.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so --json output stays clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("feed_harvest=info,cdp_client=info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Scraping failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env()?;
    cli.apply(&mut config);
    config.log_settings();

    let posts = if cli.replay.is_empty() {
        let sessions = CdpSessionProvider::new(&config.cdp_endpoint);
        GroupHarvester::new(sessions, config.harvest)
            .scrape_group(&cli.group_url)
            .await?
    } else {
        let sessions = ReplaySessionProvider::from_files(&cli.replay)?;
        GroupHarvester::new(sessions, config.harvest)
            .scrape_group(&cli.group_url)
            .await?
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
    } else {
        print_summary(&posts);
    }
    Ok(())
}

fn print_summary(posts: &[PostRecord]) {
    println!("Successfully scraped {} unique posts", posts.len());
    for post in posts {
        println!("\nPost ID: {}", post.fingerprint);
        println!("Content: {}...", post.preview(PREVIEW_CHARS));
        println!("Timestamp: {}", post.collected_at.to_rfc3339());
    }
}
