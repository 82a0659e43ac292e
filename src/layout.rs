//! On-disk output layout
//!
//! ```text
//! <base>/data/raw/telegram_messages/<YYYY-MM-DD>/<channel>.json
//! <base>/data/raw/images/<channel>/<message_id>.jpg
//! <base>/logs/scraper.log
//! ```
//!
//! The run date is fixed when the layout is built, so every channel of one
//! run lands in the same dated directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;

use crate::error::Result;

pub const LOG_FILE_NAME: &str = "scraper.log";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\-.]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Turn a channel display name into a safe single path segment.
pub fn sanitize_segment(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name, "");
    let joined = WHITESPACE.replace_all(cleaned.trim(), "_");
    let trimmed = joined.trim_matches('.');
    let truncated: String = trimmed.chars().take(64).collect();
    if truncated.is_empty() {
        "unknown_channel".to_string()
    } else {
        truncated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    run_date: NaiveDate,
    messages_dir: PathBuf,
    images_dir: PathBuf,
    logs_dir: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `base` for the given run date.
    pub fn new(base: &Path, run_date: NaiveDate) -> Self {
        let raw = base.join("data").join("raw");
        Self {
            run_date,
            messages_dir: raw
                .join("telegram_messages")
                .join(run_date.format("%Y-%m-%d").to_string()),
            images_dir: raw.join("images"),
            logs_dir: base.join("logs"),
        }
    }

    /// Layout for today's UTC date.
    pub fn today(base: &Path) -> Self {
        Self::new(base, Utc::now().date_naive())
    }

    /// Create the message, image and log directories. Existing ones are fine.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.messages_dir)?;
        fs::create_dir_all(&self.images_dir)?;
        fs::create_dir_all(&self.logs_dir)?;
        Ok(())
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    pub fn messages_dir(&self) -> &Path {
        &self.messages_dir
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir.join(LOG_FILE_NAME)
    }

    /// `<messages_dir>/<channel>.json`
    pub fn channel_output(&self, channel: &str) -> PathBuf {
        self.messages_dir
            .join(format!("{}.json", sanitize_segment(channel)))
    }

    /// `<images_dir>/<channel>`
    pub fn channel_images_dir(&self, channel: &str) -> PathBuf {
        self.images_dir.join(sanitize_segment(channel))
    }

    /// `<images_dir>/<channel>/<message_id>.jpg`
    pub fn image_path(&self, channel: &str, message_id: i32) -> PathBuf {
        self.channel_images_dir(channel)
            .join(format!("{}.jpg", message_id))
    }
}
