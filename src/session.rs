//! Session management for the Telegram client
//!
//! Provides:
//! - File-based session locking so two runs never share a session at once
//! - Client creation over the SQLite session file
//! - Interactive sign-in when the session is not authorised yet
//! - A single, explicit disconnect

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::{Client, SignInError};
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Session lock guard that ensures exclusive access to the Telegram session.
pub struct SessionLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl SessionLock {
    /// Acquire an exclusive lock on `path`.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                eprintln!(
                    r#"
⚠️  The Telegram session is already in use by another process.

Running two scrapers on one session leads to conflicts; wait for the
other run to finish and try again.
"#
                );
                Err(Error::SessionLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = file.unlock();
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open (or create) the SQLite session file.
pub fn open_session(path: &str) -> Result<Arc<SqliteSession>> {
    let session = SqliteSession::open(path)
        .map_err(|e| Error::SessionNotFound(format!("Failed to open session {}: {}", path, e)))?;
    Ok(Arc::new(session))
}

/// Connected client plus the sender pool that drives it.
pub struct TelegramClient {
    pub client: Client,
    handle: SenderPoolHandle,
    runner: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramClient {
    /// Connect over `session` with the configured application id.
    pub async fn connect(session: Arc<SqliteSession>, config: &Config) -> Result<Self> {
        let pool = SenderPool::new(session, config.credentials.api_id);
        let client = Client::new(&pool);

        let SenderPool { runner, handle, .. } = pool;

        let runner = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(Self {
            client,
            handle,
            runner: Some(runner),
        })
    }

    /// Make sure the session is authorised, signing in interactively if not.
    pub async fn ensure_authorized(&self, config: &Config) -> Result<()> {
        if self.client.is_authorized().await? {
            return Ok(());
        }

        println!("🔐 Session is not authorised yet, signing in...");
        let phone = match &config.credentials.phone {
            Some(phone) => phone.clone(),
            None => prompt("Phone number (international format): ")?,
        };
        if phone.is_empty() {
            return Err(Error::AuthorizationRequired);
        }

        let token = self
            .client
            .request_login_code(&phone, &config.credentials.api_hash)
            .await
            .map_err(|e| Error::TelegramError(format!("Failed to request code: {}", e)))?;

        let code = prompt("Code from Telegram: ")?;

        let user = match self.client.sign_in(&token, &code).await {
            Ok(user) => user,
            Err(SignInError::PasswordRequired(password_token)) => {
                let hint = password_token.hint().unwrap_or("none").to_string();
                let password = prompt(&format!("2FA password (hint: {}): ", hint))?;
                self.client
                    .check_password(password_token, password.trim())
                    .await
                    .map_err(|e| Error::TelegramError(format!("Failed to sign in: {}", e)))?
            }
            Err(e) => return Err(Error::TelegramError(format!("Failed to sign in: {}", e))),
        };

        info!(user = %user.full_name(), "signed in");
        println!("✅ Signed in as {}", user.full_name());
        Ok(())
    }

    /// Close the connection and wait for the sender pool to stop.
    pub async fn disconnect(mut self) {
        self.handle.quit();
        if let Some(runner) = self.runner.take() {
            if let Err(err) = runner.await {
                warn!("Sender pool stopped abnormally: {}", err);
            }
        }
        info!("disconnected");
    }
}

// Implement Deref to allow using TelegramClient as &Client
impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Open the configured session, connect and sign in if needed.
pub async fn start(config: &Config) -> Result<TelegramClient> {
    let session = open_session(&config.session_file())?;
    let client = TelegramClient::connect(session, config).await?;
    client.ensure_authorized(config).await?;
    Ok(client)
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
