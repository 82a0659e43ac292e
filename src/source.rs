//! Abstraction over the channel backend.
//!
//! The scraper only talks to a [`ChannelSource`]; the Telegram client is one
//! implementation, tests use an in-memory one.

#![allow(async_fn_in_trait)]

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Result of asking to join a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    /// A join request was sent and awaits approval; history is not visible yet.
    RequestPending,
}

impl JoinOutcome {
    pub fn can_read(self) -> bool {
        !matches!(self, JoinOutcome::RequestPending)
    }
}

/// Attachment carried by a message. `P` is the backend's downloadable photo handle.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageMedia<P> {
    None,
    Photo(P),
    /// Video, document, poll, web page, ... Counts as media but is not downloaded.
    Other,
}

impl<P> MessageMedia<P> {
    pub fn is_present(&self) -> bool {
        !matches!(self, MessageMedia::None)
    }

    pub fn photo(&self) -> Option<&P> {
        match self {
            MessageMedia::Photo(p) => Some(p),
            _ => None,
        }
    }
}

/// One message as seen by the scraper.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage<P> {
    pub id: i32,
    pub date: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub views: Option<i32>,
    pub forwards: Option<i32>,
    pub media: MessageMedia<P>,
}

impl<P> ChannelMessage<P> {
    /// Messages with no text and no attachment (service messages etc.) carry nothing to keep.
    pub fn has_content(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty()) || self.media.is_present()
    }
}

/// Newest-first stream of a channel's messages.
pub trait MessageFeed {
    type Photo;

    async fn next_message(&mut self) -> Result<Option<ChannelMessage<Self::Photo>>>;
}

/// Backend able to resolve, join and read channels.
pub trait ChannelSource {
    type Channel;
    type Photo;
    type Messages: MessageFeed<Photo = Self::Photo>;

    async fn resolve(&self, identifier: &str) -> Result<Self::Channel>;

    async fn join(&self, channel: &Self::Channel) -> Result<JoinOutcome>;

    /// At most `limit` messages, newest first.
    fn messages(&self, channel: &Self::Channel, limit: usize) -> Self::Messages;

    async fn download_photo(&self, photo: &Self::Photo, path: &Path) -> Result<()>;
}
