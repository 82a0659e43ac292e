//! Telegram-backed [`ChannelSource`] built on grammers.

use std::path::Path;

use grammers_client::client::messages::MessageIter;
use grammers_client::types::peer::Peer;
use grammers_client::types::{Media, Message};
use grammers_client::Client;
use grammers_tl_types as tl;

use crate::error::{Error, Result};
use crate::source::{ChannelMessage, ChannelSource, JoinOutcome, MessageFeed, MessageMedia};

const ALREADY_PARTICIPANT: &str = "USER_ALREADY_PARTICIPANT";
const INVITE_REQUEST_SENT: &str = "INVITE_REQUEST_SENT";

/// Reduce `@name`, `t.me/name` or `https://t.me/name` to `name`.
pub fn normalize_handle(identifier: &str) -> &str {
    let trimmed = identifier.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_host = without_scheme
        .strip_prefix("t.me/")
        .or_else(|| without_scheme.strip_prefix("telegram.me/"))
        .unwrap_or(without_scheme);
    without_host
        .trim_start_matches('@')
        .trim_end_matches('/')
}

/// Input channel for a broadcast channel or megagroup peer.
fn peer_to_input_channel(peer: &Peer) -> Option<tl::enums::InputChannel> {
    match peer {
        Peer::Channel(channel) => Some(tl::enums::InputChannel::Channel(tl::types::InputChannel {
            channel_id: channel.raw.id,
            access_hash: channel.raw.access_hash.unwrap_or(0),
        })),
        Peer::Group(group) => match &group.raw {
            tl::enums::Chat::Channel(c) => {
                Some(tl::enums::InputChannel::Channel(tl::types::InputChannel {
                    channel_id: c.id,
                    access_hash: c.access_hash.unwrap_or(0),
                }))
            }
            _ => None,
        },
        Peer::User(_) => None,
    }
}

fn to_channel_message(message: &Message) -> ChannelMessage<Media> {
    let text = message.text();
    let media = match message.media() {
        None => MessageMedia::None,
        Some(photo @ Media::Photo(_)) => MessageMedia::Photo(photo),
        Some(_) => MessageMedia::Other,
    };

    ChannelMessage {
        id: message.id(),
        date: Some(message.date()),
        text: (!text.is_empty()).then(|| text.to_string()),
        views: message.view_count(),
        forwards: message.forward_count(),
        media,
    }
}

/// Channel source over a connected grammers client.
pub struct TelegramSource<'a> {
    client: &'a Client,
}

impl<'a> TelegramSource<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }
}

/// Newest-first message iterator capped at the requested limit.
pub struct TelegramFeed {
    iter: MessageIter,
}

impl MessageFeed for TelegramFeed {
    type Photo = Media;

    async fn next_message(&mut self) -> Result<Option<ChannelMessage<Media>>> {
        let message = self.iter.next().await?;
        Ok(message.as_ref().map(to_channel_message))
    }
}

impl ChannelSource for TelegramSource<'_> {
    type Channel = Peer;
    type Photo = Media;
    type Messages = TelegramFeed;

    async fn resolve(&self, identifier: &str) -> Result<Peer> {
        let handle = normalize_handle(identifier);
        if handle.is_empty() {
            return Err(Error::ChannelNotFound(identifier.to_string()));
        }

        self.client
            .resolve_username(handle)
            .await?
            .ok_or_else(|| Error::ChannelNotFound(format!("@{}", handle)))
    }

    async fn join(&self, channel: &Peer) -> Result<JoinOutcome> {
        let input = peer_to_input_channel(channel).ok_or_else(|| {
            Error::ChannelNotFound(format!(
                "{} is not a channel",
                channel.name().unwrap_or("peer")
            ))
        })?;

        let request = tl::functions::channels::JoinChannel { channel: input };
        match self.client.invoke(&request).await {
            Ok(_) => Ok(JoinOutcome::Joined),
            Err(err) if err.is(ALREADY_PARTICIPANT) => Ok(JoinOutcome::AlreadyMember),
            Err(err) if err.is(INVITE_REQUEST_SENT) => Ok(JoinOutcome::RequestPending),
            Err(err) => Err(err.into()),
        }
    }

    fn messages(&self, channel: &Peer, limit: usize) -> TelegramFeed {
        TelegramFeed {
            iter: self.client.iter_messages(channel).limit(limit),
        }
    }

    async fn download_photo(&self, photo: &Media, path: &Path) -> Result<()> {
        self.client.download_media(photo, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handle_strips_prefixes() {
        assert_eq!(normalize_handle("chemed"), "chemed");
        assert_eq!(normalize_handle("@chemed"), "chemed");
        assert_eq!(normalize_handle("t.me/chemed"), "chemed");
        assert_eq!(normalize_handle("https://t.me/tikvahpharma/"), "tikvahpharma");
        assert_eq!(normalize_handle("  lobelia4cosmetics "), "lobelia4cosmetics");
        assert_eq!(normalize_handle("@"), "");
    }

    #[tokio::test]
    #[ignore] // Requires Telegram connection
    async fn resolve_reference_channel() {
        use crate::config::Config;

        let config = Config::load_with(|key| std::env::var(key).ok(), None).expect("credentials");
        let client = crate::session::start(&config).await.expect("session");
        let source = TelegramSource::new(&client);
        assert!(source.resolve("chemed").await.is_ok());
        client.disconnect().await;
    }
}
