//! Message records and the per-channel JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::source::ChannelMessage;

/// Normalized form of one fetched message, as written to `<channel>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: i32,
    pub channel: String,
    /// ISO-8601 with offset, e.g. `2024-03-09T10:15:02+00:00`.
    pub date: Option<String>,
    pub text: Option<String>,
    pub views: Option<i32>,
    pub forwards: Option<i32>,
    pub has_media: bool,
    pub image_path: Option<String>,
}

impl MessageRecord {
    /// Build the record for `message`. `image_path` is filled in after a photo download.
    pub fn from_message<P>(channel: &str, message: &ChannelMessage<P>) -> Self {
        Self {
            message_id: message.id,
            channel: channel.to_string(),
            date: message.date.map(|d| d.to_rfc3339()),
            text: message.text.clone(),
            views: message.views,
            forwards: message.forwards,
            has_media: message.media.is_present(),
            image_path: None,
        }
    }

    pub fn with_image(mut self, path: &Path) -> Self {
        self.image_path = Some(path.to_string_lossy().to_string());
        self
    }
}

/// Write `records` as a pretty-printed JSON array, replacing any existing file.
///
/// The array goes to a sibling temp file first and is renamed into place, so a
/// failed write never leaves a truncated `<channel>.json` behind.
pub fn write_records(path: &Path, records: &[MessageRecord]) -> Result<()> {
    let mut body = serde_json::to_vec_pretty(records)?;
    body.push(b'\n');

    let tmp = tmp_path(path);
    fs::write(&tmp, &body)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

/// Read a channel file back (used by tests and tooling).
pub fn read_records(path: &Path) -> Result<Vec<MessageRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
