//! Configuration for the scraper
//!
//! Credentials come from the environment (a local `.env` is loaded first).
//! Channel list, limits and output root come from an optional `config.yml`;
//! without it the built-in reference channel set is used.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::layout::sanitize_segment;

/// Default constants (used when config.yml does not override them)
pub const SESSION_NAME: &str = "telegram_scraper";
pub const CONFIG_FILE: &str = "config.yml";
pub const MESSAGE_LIMIT: usize = 300;
pub const PROGRESS_EVERY: usize = 50;

pub const API_ID_VAR: &str = "TELEGRAM_API_ID";
pub const API_HASH_VAR: &str = "TELEGRAM_API_HASH";
pub const PHONE_VAR: &str = "TELEGRAM_PHONE";

/// Reference channel set: display name -> public handle.
pub const DEFAULT_CHANNELS: [(&str, &str); 3] = [
    ("chemed", "chemed"),
    ("lobelia4cosmetics", "lobelia4cosmetics"),
    ("tikvahpharma", "tikvahpharma"),
];

/// A channel to scrape: display name used for output paths, identifier used
/// to resolve it on Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub name: String,
    pub identifier: String,
}

impl ChannelDescriptor {
    pub fn new(name: &str, identifier: &str) -> Self {
        Self {
            name: name.to_string(),
            identifier: identifier.to_string(),
        }
    }
}

/// Telegram application credentials.
#[derive(Clone)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("phone", &self.phone)
            .finish()
    }
}

impl Credentials {
    /// Read credentials through an arbitrary lookup. Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_id = get(API_ID_VAR).ok_or(Error::MissingCredential(API_ID_VAR))?;
        let api_hash = get(API_HASH_VAR).ok_or(Error::MissingCredential(API_HASH_VAR))?;

        let api_id = raw_id
            .parse::<i32>()
            .map_err(|e| Error::InvalidCredential {
                name: API_ID_VAR,
                reason: e.to_string(),
            })?;
        if api_id <= 0 {
            return Err(Error::InvalidCredential {
                name: API_ID_VAR,
                reason: "must be a positive number".to_string(),
            });
        }

        Ok(Self {
            api_id,
            api_hash,
            phone: get(PHONE_VAR),
        })
    }
}

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    telegram: Option<TelegramSection>,
    limits: Option<LimitsSection>,
    channels: Option<serde_yaml::Mapping>,
    output: Option<OutputSection>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramSection {
    session_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitsSection {
    messages_per_channel: Option<usize>,
    progress_every: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputSection {
    base_dir: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub session_name: String,
    pub message_limit: usize,
    pub progress_every: usize,
    pub base_dir: PathBuf,
    pub channels: Vec<ChannelDescriptor>,
}

impl Config {
    /// Credentials through `lookup`, then `path` (or `config.yml` when `None`).
    ///
    /// Credentials are checked before anything else so a missing key stops
    /// the run before the filesystem or network is touched. An explicitly
    /// given config path must exist; the default one is optional.
    pub fn load_with<F>(lookup: F, path: Option<&Path>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::from_lookup(lookup)?;

        match path {
            Some(path) => Self::load_from_file(path, credentials),
            None if Path::new(CONFIG_FILE).exists() => {
                Self::load_from_file(CONFIG_FILE, credentials)
            }
            None => Ok(Self::with_defaults(credentials)),
        }
    }

    /// Built-in configuration: reference channels, 300 message cap.
    pub fn with_defaults(credentials: Credentials) -> Self {
        Self {
            credentials,
            session_name: SESSION_NAME.to_string(),
            message_limit: MESSAGE_LIMIT,
            progress_every: PROGRESS_EVERY,
            base_dir: PathBuf::from("."),
            channels: DEFAULT_CHANNELS
                .iter()
                .map(|(name, id)| ChannelDescriptor::new(name, id))
                .collect(),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P, credentials: Credentials) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content, credentials)
    }

    /// Parse configuration from YAML text, filling gaps with defaults.
    pub fn from_yaml_str(content: &str, credentials: Credentials) -> Result<Self> {
        let yaml: YamlConfig = if content.trim().is_empty() {
            YamlConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };

        let mut config = Self::with_defaults(credentials);

        if let Some(name) = yaml.telegram.and_then(|t| t.session_name) {
            config.session_name = resolve_env_string(&name);
        }

        let limits = yaml.limits.unwrap_or_default();
        if let Some(limit) = limits.messages_per_channel {
            config.message_limit = limit;
        }
        if let Some(every) = limits.progress_every {
            if every == 0 {
                return Err(Error::Config(
                    "limits.progress_every must be greater than zero".to_string(),
                ));
            }
            config.progress_every = every;
        }

        if let Some(dir) = yaml.output.and_then(|o| o.base_dir) {
            config.base_dir = PathBuf::from(resolve_env_string(&dir));
        }

        if let Some(mapping) = yaml.channels {
            config.channels = parse_channels(&mapping)?;
        }

        Ok(config)
    }

    /// Lock file guarding the session for the duration of a run.
    pub fn lock_file(&self) -> String {
        format!("{}.lock", self.session_name)
    }

    /// SQLite session file.
    pub fn session_file(&self) -> String {
        format!("{}.session", self.session_name)
    }
}

/// Load a local `.env` (or the parent directory's) into the environment.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_filename("../.env");
    }
}

/// `name: identifier` pairs in file order. A null identifier means "same as name".
fn parse_channels(mapping: &serde_yaml::Mapping) -> Result<Vec<ChannelDescriptor>> {
    let mut channels: Vec<ChannelDescriptor> = Vec::with_capacity(mapping.len());

    for (key, value) in mapping {
        let name = match key {
            serde_yaml::Value::String(s) => s.clone(),
            other => {
                return Err(Error::Config(format!(
                    "channel name must be a string, got {:?}",
                    other
                )))
            }
        };
        let identifier = match value {
            serde_yaml::Value::String(s) => resolve_env_string(s),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Null => name.clone(),
            other => {
                return Err(Error::Config(format!(
                    "channel '{}' identifier must be a string, got {:?}",
                    name, other
                )))
            }
        };

        if channels.iter().any(|c| c.name == name) {
            return Err(Error::Config(format!("duplicate channel '{}'", name)));
        }
        let segment = sanitize_segment(&name);
        if let Some(other) = channels.iter().find(|c| sanitize_segment(&c.name) == segment) {
            return Err(Error::Config(format!(
                "channels '{}' and '{}' would share the output name '{}'",
                other.name, name, segment
            )));
        }
        channels.push(ChannelDescriptor { name, identifier });
    }

    Ok(channels)
}

/// Resolve a value: if it looks like `${VAR}`, take VAR from the environment.
fn resolve_env_string(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        if let Ok(env_val) = std::env::var(var_name) {
            return env_val;
        }
    }
    value.to_string()
}
