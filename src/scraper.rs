//! Channel scraping: resolve, join, read recent messages, save photos and JSON.
//!
//! Each channel ends in a [`ChannelOutcome`]. Errors never cross channel
//! boundaries: a failed channel is logged and the run moves on.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::config::{ChannelDescriptor, Config, MESSAGE_LIMIT, PROGRESS_EVERY};
use crate::error::Result;
use crate::layout::OutputLayout;
use crate::metrics;
use crate::record::{write_records, MessageRecord};
use crate::source::{ChannelSource, JoinOutcome, MessageFeed};

/// Per-run knobs for the scraper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// Maximum messages fetched per channel, skipped ones included.
    pub message_limit: usize,
    /// Print a progress line every N kept records. Zero turns it off.
    pub progress_every: usize,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            message_limit: MESSAGE_LIMIT,
            progress_every: PROGRESS_EVERY,
        }
    }
}

impl ScrapeOptions {
    /// Whether a progress line is due after `kept` records.
    pub fn progress_due(&self, kept: usize) -> bool {
        self.progress_every > 0 && kept > 0 && kept % self.progress_every == 0
    }
}

impl From<&Config> for ScrapeOptions {
    fn from(config: &Config) -> Self {
        Self {
            message_limit: config.message_limit,
            progress_every: config.progress_every.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Saved {
        records: usize,
        photos: usize,
        path: PathBuf,
    },
    /// Join request awaits approval; nothing was written.
    JoinPending,
    Failed {
        reason: String,
    },
}

impl ChannelOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            ChannelOutcome::Saved { .. } => "saved",
            ChannelOutcome::JoinPending => "pending",
            ChannelOutcome::Failed { .. } => "failed",
        }
    }
}

/// Outcomes of one run, in channel order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(String, ChannelOutcome)>,
}

impl RunSummary {
    fn count(&self, status: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.status() == status)
            .count()
    }

    pub fn saved(&self) -> usize {
        self.count("saved")
    }

    pub fn pending(&self) -> usize {
        self.count("pending")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    pub fn total_records(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                ChannelOutcome::Saved { records, .. } => *records,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome(&self, channel: &str) -> Option<&ChannelOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, o)| o)
    }
}

/// Scrape every channel in order, one at a time.
pub async fn run_all<S: ChannelSource>(
    source: &S,
    layout: &OutputLayout,
    channels: &[ChannelDescriptor],
    options: ScrapeOptions,
) -> RunSummary {
    let mut summary = RunSummary::default();
    for channel in channels {
        let outcome = scrape_channel(source, layout, channel, options).await;
        summary.outcomes.push((channel.name.clone(), outcome));
    }
    summary
}

/// Scrape one channel. Any error is logged under the channel name and
/// returned as [`ChannelOutcome::Failed`].
pub async fn scrape_channel<S: ChannelSource>(
    source: &S,
    layout: &OutputLayout,
    channel: &ChannelDescriptor,
    options: ScrapeOptions,
) -> ChannelOutcome {
    println!("\n➡ Scraping: {}", channel.name);
    let started = Instant::now();

    let outcome = match try_scrape(source, layout, channel, options).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("{}: {}", channel.name, err);
            println!("❌ Error scraping {}: {}", channel.name, err);
            ChannelOutcome::Failed {
                reason: err.to_string(),
            }
        }
    };

    metrics::record_channel(&channel.name, &outcome, started.elapsed());
    outcome
}

async fn try_scrape<S: ChannelSource>(
    source: &S,
    layout: &OutputLayout,
    channel: &ChannelDescriptor,
    options: ScrapeOptions,
) -> Result<ChannelOutcome> {
    let handle = source.resolve(&channel.identifier).await?;
    debug!(channel = %channel.name, identifier = %channel.identifier, "resolved");

    let joined = source.join(&handle).await?;
    if !joined.can_read() {
        println!("⚠ Join request sent for {}, try again later", channel.name);
        info!(channel = %channel.name, "join request pending, skipping");
        return Ok(ChannelOutcome::JoinPending);
    }
    if joined == JoinOutcome::Joined {
        info!(channel = %channel.name, "joined channel");
    } else {
        debug!(channel = %channel.name, "already a member");
    }

    let mut feed = source.messages(&handle, options.message_limit);
    let mut records: Vec<MessageRecord> = Vec::new();
    let mut seen: HashSet<i32> = HashSet::new();
    let mut fetched = 0usize;
    let mut photos = 0usize;
    let mut images_dir_ready = false;

    while fetched < options.message_limit {
        let Some(message) = feed.next_message().await? else {
            break;
        };
        fetched += 1;

        if !message.has_content() || !seen.insert(message.id) {
            continue;
        }

        let mut record = MessageRecord::from_message(&channel.name, &message);

        if let Some(photo) = message.media.photo() {
            if !images_dir_ready {
                fs::create_dir_all(layout.channel_images_dir(&channel.name))?;
                images_dir_ready = true;
            }
            let path = layout.image_path(&channel.name, message.id);
            source.download_photo(photo, &path).await?;
            photos += 1;
            record = record.with_image(&path);
        }

        records.push(record);

        if options.progress_due(records.len()) {
            println!("  scraped {} messages...", records.len());
        }
    }

    let path = layout.channel_output(&channel.name);
    write_records(&path, &records)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    println!("✅ Saved {} messages → {}", records.len(), file_name);
    info!(
        channel = %channel.name,
        fetched,
        records = records.len(),
        photos,
        "channel saved"
    );

    Ok(ChannelOutcome::Saved {
        records: records.len(),
        photos,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::record::read_records;
    use crate::source::{ChannelMessage, MessageMedia};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::{HashMap, VecDeque};
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::tempdir;

    type Photo = Vec<u8>;

    #[derive(Default)]
    struct FakeChannel {
        join: Option<JoinOutcome>,
        messages: Vec<ChannelMessage<Photo>>,
        fail_at: Option<usize>,
    }

    #[derive(Default)]
    struct FakeSource {
        channels: HashMap<String, FakeChannel>,
        requested_limits: Mutex<Vec<usize>>,
        fail_downloads: bool,
    }

    struct FakeFeed {
        items: VecDeque<ChannelMessage<Photo>>,
        fail_at: Option<usize>,
        position: usize,
    }

    impl MessageFeed for FakeFeed {
        type Photo = Photo;

        async fn next_message(&mut self) -> Result<Option<ChannelMessage<Photo>>> {
            if self.fail_at == Some(self.position) {
                return Err(Error::TelegramError("connection reset".to_string()));
            }
            self.position += 1;
            Ok(self.items.pop_front())
        }
    }

    impl ChannelSource for FakeSource {
        type Channel = String;
        type Photo = Photo;
        type Messages = FakeFeed;

        async fn resolve(&self, identifier: &str) -> Result<String> {
            if self.channels.contains_key(identifier) {
                Ok(identifier.to_string())
            } else {
                Err(Error::ChannelNotFound(identifier.to_string()))
            }
        }

        async fn join(&self, channel: &String) -> Result<JoinOutcome> {
            self.channels[channel]
                .join
                .ok_or_else(|| Error::TelegramError("CHANNEL_PRIVATE".to_string()))
        }

        fn messages(&self, channel: &String, limit: usize) -> FakeFeed {
            self.requested_limits.lock().unwrap().push(limit);
            let fake = &self.channels[channel];
            FakeFeed {
                items: fake.messages.iter().cloned().collect(),
                fail_at: fake.fail_at,
                position: 0,
            }
        }

        async fn download_photo(&self, photo: &Photo, path: &Path) -> Result<()> {
            if self.fail_downloads {
                return Err(Error::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            std::fs::write(path, photo)?;
            Ok(())
        }
    }

    fn msg(id: i32, text: Option<&str>, media: MessageMedia<Photo>) -> ChannelMessage<Photo> {
        ChannelMessage {
            id,
            date: Some(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()),
            text: text.map(str::to_string),
            views: Some(id * 10),
            forwards: None,
            media,
        }
    }

    fn layout(base: &Path) -> OutputLayout {
        let layout = OutputLayout::new(base, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        layout.ensure().unwrap();
        layout
    }

    fn descriptor(name: &str) -> ChannelDescriptor {
        ChannelDescriptor::new(name, name)
    }

    #[tokio::test]
    async fn saves_text_and_photo_records() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());

        let mut source = FakeSource::default();
        source.channels.insert(
            "chemed".into(),
            FakeChannel {
                join: Some(JoinOutcome::AlreadyMember),
                messages: vec![
                    msg(5, Some("newest"), MessageMedia::None),
                    msg(4, None, MessageMedia::Photo(vec![0xFF, 0xD8])),
                    msg(3, Some("video post"), MessageMedia::Other),
                    msg(2, None, MessageMedia::None),
                    msg(1, Some("caption"), MessageMedia::Photo(vec![1, 2, 3])),
                ],
                fail_at: None,
            },
        );

        let outcome =
            scrape_channel(&source, &layout, &descriptor("chemed"), ScrapeOptions::default())
                .await;

        let path = layout.channel_output("chemed");
        assert_eq!(
            outcome,
            ChannelOutcome::Saved {
                records: 4,
                photos: 2,
                path: path.clone(),
            }
        );

        let records = read_records(&path).unwrap();
        let ids: Vec<i32> = records.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![5, 4, 3, 1]);

        let video = &records[2];
        assert!(video.has_media);
        assert!(video.image_path.is_none());

        let photo = &records[1];
        let photo_path = layout.image_path("chemed", 4);
        assert_eq!(
            photo.image_path.as_deref(),
            Some(photo_path.to_string_lossy().as_ref())
        );
        assert_eq!(std::fs::read(&photo_path).unwrap(), vec![0xFF, 0xD8]);
        assert!(layout.image_path("chemed", 1).exists());
    }

    #[tokio::test]
    async fn cap_counts_skipped_messages() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());

        let mut messages = Vec::new();
        for id in (1..=10).rev() {
            let text = if id % 2 == 0 { Some("post") } else { None };
            messages.push(msg(id, text, MessageMedia::None));
        }

        let mut source = FakeSource::default();
        source.channels.insert(
            "busy".into(),
            FakeChannel {
                join: Some(JoinOutcome::Joined),
                messages,
                fail_at: None,
            },
        );

        let options = ScrapeOptions {
            message_limit: 6,
            progress_every: 50,
        };
        let outcome = scrape_channel(&source, &layout, &descriptor("busy"), options).await;

        // 6 fetched (10..=5), of which the even ids carry text.
        assert!(matches!(outcome, ChannelOutcome::Saved { records: 3, .. }));
        assert_eq!(*source.requested_limits.lock().unwrap(), vec![6]);
        let ids: Vec<i32> = read_records(&layout.channel_output("busy"))
            .unwrap()
            .iter()
            .map(|r| r.message_id)
            .collect();
        assert_eq!(ids, vec![10, 8, 6]);
    }

    #[tokio::test]
    async fn duplicate_ids_are_kept_once() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());

        let mut source = FakeSource::default();
        source.channels.insert(
            "dup".into(),
            FakeChannel {
                join: Some(JoinOutcome::Joined),
                messages: vec![
                    msg(2, Some("a"), MessageMedia::None),
                    msg(2, Some("a"), MessageMedia::None),
                    msg(1, Some("b"), MessageMedia::None),
                ],
                fail_at: None,
            },
        );

        let outcome =
            scrape_channel(&source, &layout, &descriptor("dup"), ScrapeOptions::default()).await;
        assert!(matches!(outcome, ChannelOutcome::Saved { records: 2, .. }));
    }

    #[tokio::test]
    async fn join_pending_writes_nothing() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());

        let mut source = FakeSource::default();
        source.channels.insert(
            "private".into(),
            FakeChannel {
                join: Some(JoinOutcome::RequestPending),
                messages: vec![msg(1, Some("hidden"), MessageMedia::None)],
                fail_at: None,
            },
        );

        let outcome =
            scrape_channel(&source, &layout, &descriptor("private"), ScrapeOptions::default())
                .await;

        assert_eq!(outcome, ChannelOutcome::JoinPending);
        assert!(!layout.channel_output("private").exists());
        assert!(source.requested_limits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mid_iteration_failure_leaves_no_file() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());

        let mut source = FakeSource::default();
        source.channels.insert(
            "flaky".into(),
            FakeChannel {
                join: Some(JoinOutcome::Joined),
                messages: (1..=5)
                    .rev()
                    .map(|id| msg(id, Some("text"), MessageMedia::None))
                    .collect(),
                fail_at: Some(3),
            },
        );

        let outcome =
            scrape_channel(&source, &layout, &descriptor("flaky"), ScrapeOptions::default())
                .await;

        match outcome {
            ChannelOutcome::Failed { reason } => assert!(reason.contains("connection reset")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!layout.channel_output("flaky").exists());
    }

    #[tokio::test]
    async fn download_failure_fails_channel() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());

        let mut source = FakeSource {
            fail_downloads: true,
            ..Default::default()
        };
        source.channels.insert(
            "pics".into(),
            FakeChannel {
                join: Some(JoinOutcome::Joined),
                messages: vec![msg(1, None, MessageMedia::Photo(vec![1]))],
                fail_at: None,
            },
        );

        let outcome =
            scrape_channel(&source, &layout, &descriptor("pics"), ScrapeOptions::default()).await;
        assert!(matches!(outcome, ChannelOutcome::Failed { .. }));
        assert!(!layout.channel_output("pics").exists());
    }

    #[tokio::test]
    async fn run_all_continues_after_failures() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());

        let mut source = FakeSource::default();
        source.channels.insert(
            "locked".into(),
            FakeChannel {
                join: None,
                ..Default::default()
            },
        );
        source.channels.insert(
            "pending".into(),
            FakeChannel {
                join: Some(JoinOutcome::RequestPending),
                ..Default::default()
            },
        );
        source.channels.insert(
            "good".into(),
            FakeChannel {
                join: Some(JoinOutcome::Joined),
                messages: vec![msg(1, Some("hello"), MessageMedia::None)],
                fail_at: None,
            },
        );

        let channels = vec![
            descriptor("missing"),
            descriptor("locked"),
            descriptor("pending"),
            descriptor("good"),
        ];
        let summary = run_all(&source, &layout, &channels, ScrapeOptions::default()).await;

        assert_eq!(summary.outcomes.len(), 4);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.pending(), 1);
        assert_eq!(summary.saved(), 1);
        assert_eq!(summary.total_records(), 1);
        assert!(matches!(
            summary.outcome("missing"),
            Some(ChannelOutcome::Failed { reason }) if reason.contains("missing")
        ));
        assert!(layout.channel_output("good").exists());
    }

    #[test]
    fn progress_is_due_every_interval() {
        let options = ScrapeOptions::default();
        let due: Vec<usize> = (1..=120).filter(|&n| options.progress_due(n)).collect();
        assert_eq!(due, vec![50, 100]);

        let off = ScrapeOptions {
            message_limit: 300,
            progress_every: 0,
        };
        assert!((0..=300).all(|n| !off.progress_due(n)));
    }

    #[tokio::test]
    async fn zero_progress_interval_still_saves() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());

        let mut source = FakeSource::default();
        source.channels.insert(
            "quiet".into(),
            FakeChannel {
                join: Some(JoinOutcome::Joined),
                messages: (1..=60)
                    .rev()
                    .map(|id| msg(id, Some("text"), MessageMedia::None))
                    .collect(),
                fail_at: None,
            },
        );

        let options = ScrapeOptions {
            message_limit: 300,
            progress_every: 0,
        };
        let summary = run_all(&source, &layout, &[descriptor("quiet")], options).await;
        assert!(matches!(
            summary.outcome("quiet"),
            Some(ChannelOutcome::Saved { records: 60, .. })
        ));
    }

    #[test]
    fn options_follow_config() {
        let config = Config::with_defaults(crate::config::Credentials {
            api_id: 1,
            api_hash: "h".to_string(),
            phone: None,
        });
        let options = ScrapeOptions::from(&config);
        assert_eq!(options, ScrapeOptions::default());
        assert_eq!(options.message_limit, 300);
        assert_eq!(options.progress_every, 50);
    }
}
