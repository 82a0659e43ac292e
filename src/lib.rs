//! Telegram Channel Scraper Library
//!
//! This library provides tools to:
//! - Join a configured set of public Telegram channels
//! - Download recent message text to dated JSON files
//! - Save photo attachments to per-channel image directories
//! - Log per-channel failures without aborting the run

pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod scraper;
pub mod session;
pub mod source;
pub mod startup;
pub mod telegram;

// Re-export common types
pub use config::{ChannelDescriptor, Config, Credentials};
pub use error::{Error, Result};
pub use layout::OutputLayout;
pub use record::MessageRecord;
pub use scraper::{run_all, scrape_channel, ChannelOutcome, RunSummary, ScrapeOptions};
pub use session::{SessionLock, TelegramClient};
pub use source::{ChannelMessage, ChannelSource, JoinOutcome, MessageFeed, MessageMedia};
pub use startup::{prepare, Overrides};
pub use telegram::TelegramSource;
