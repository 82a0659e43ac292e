//! Channel scraper CLI - main entry point
//!
//! Loads credentials, prepares the output layout, signs in once and scrapes
//! every configured channel in turn.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

use channel_scraper::config::load_dotenv;
use channel_scraper::{
    logging, metrics, prepare, run_all, session, Overrides, ScrapeOptions, SessionLock,
    TelegramSource,
};

#[derive(Parser)]
#[command(name = "channel_scraper")]
#[command(about = "Scrape recent messages and photos from Telegram channels", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file with channels and limits (defaults to ./config.yml if present)
    #[arg(short, long, env = "SCRAPER_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory for data/ and logs/
    #[arg(long, env = "SCRAPER_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Maximum messages fetched per channel
    #[arg(short, long)]
    limit: Option<usize>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    load_dotenv();

    let overrides = Overrides {
        config: cli.config,
        base_dir: cli.base_dir,
        limit: cli.limit,
    };
    let (config, layout) = match prepare(|key| std::env::var(key).ok(), &overrides) {
        Ok(prepared) => prepared,
        Err(err) if err.is_config() => {
            eprintln!("❌ {}", err);
            eprintln!("Set TELEGRAM_API_ID and TELEGRAM_API_HASH (or fix config.yml) and retry.");
            return Ok(ExitCode::from(2));
        }
        Err(err) => return Err(err.into()),
    };

    let _log_guard = logging::init(&layout)?;
    info!(
        date = %layout.run_date(),
        base = %config.base_dir.display(),
        channels = config.channels.len(),
        "starting run"
    );

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let _lock = SessionLock::acquire(config.lock_file())?;
    let client = session::start(&config).await?;

    let source = TelegramSource::new(&client);
    let summary = run_all(
        &source,
        &layout,
        &config.channels,
        ScrapeOptions::from(&config),
    )
    .await;

    client.disconnect().await;

    println!(
        "\nDone: {} saved, {} pending, {} failed ({} records)",
        summary.saved(),
        summary.pending(),
        summary.failed(),
        summary.total_records()
    );

    Ok(ExitCode::SUCCESS)
}
