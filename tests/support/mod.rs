//! In-memory channel backend shared by the integration tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use channel_scraper::{
    ChannelMessage, ChannelSource, Error, JoinOutcome, MessageFeed, MessageMedia, Result,
};
use chrono::{Duration, TimeZone, Utc};

pub type Photo = Vec<u8>;

pub enum JoinBehavior {
    Outcome(JoinOutcome),
    Fail(&'static str),
}

pub struct FakeChannel {
    pub join: JoinBehavior,
    pub messages: Vec<ChannelMessage<Photo>>,
}

#[derive(Default)]
pub struct FakeSource {
    pub channels: HashMap<String, FakeChannel>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_channel(mut self, identifier: &str, channel: FakeChannel) -> Self {
        self.channels.insert(identifier.to_string(), channel);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub struct FakeFeed {
    items: VecDeque<ChannelMessage<Photo>>,
}

impl MessageFeed for FakeFeed {
    type Photo = Photo;

    async fn next_message(&mut self) -> Result<Option<ChannelMessage<Photo>>> {
        Ok(self.items.pop_front())
    }
}

impl ChannelSource for FakeSource {
    type Channel = String;
    type Photo = Photo;
    type Messages = FakeFeed;

    async fn resolve(&self, identifier: &str) -> Result<String> {
        self.record(format!("resolve:{identifier}"));
        if self.channels.contains_key(identifier) {
            Ok(identifier.to_string())
        } else {
            Err(Error::ChannelNotFound(format!("@{identifier}")))
        }
    }

    async fn join(&self, channel: &String) -> Result<JoinOutcome> {
        self.record(format!("join:{channel}"));
        match &self.channels[channel].join {
            JoinBehavior::Outcome(outcome) => Ok(*outcome),
            JoinBehavior::Fail(rpc) => Err(Error::TelegramError(rpc.to_string())),
        }
    }

    fn messages(&self, channel: &String, limit: usize) -> FakeFeed {
        self.record(format!("messages:{channel}:{limit}"));
        FakeFeed {
            items: self.channels[channel]
                .messages
                .iter()
                .take(limit)
                .cloned()
                .collect(),
        }
    }

    async fn download_photo(&self, photo: &Photo, path: &Path) -> Result<()> {
        self.record(format!("download:{}", path.display()));
        std::fs::write(path, photo)?;
        Ok(())
    }
}

/// `count` messages, newest first, ids `count..=1`. `photo_every`-th ids carry a photo
/// (without caption), the rest are text only.
pub fn channel_history(count: i32, photo_every: i32) -> Vec<ChannelMessage<Photo>> {
    let base = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
    (1..=count)
        .rev()
        .map(|id| {
            let photo = photo_every > 0 && id % photo_every == 0;
            ChannelMessage {
                id,
                date: Some(base + Duration::minutes(id as i64)),
                text: (!photo).then(|| format!("post #{id}")),
                views: Some(100 + id),
                forwards: Some(id % 4),
                media: if photo {
                    MessageMedia::Photo(vec![0xFF, 0xD8, id as u8])
                } else {
                    MessageMedia::None
                },
            }
        })
        .collect()
}
