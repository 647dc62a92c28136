//! Operator notification side-channel.
//!
//! A public submission is committed to the Pending Queue first; a notification
//! is attempted afterwards and its failure is reported on its own. Nothing in
//! this module can undo a submission.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::{Config, NotifyChannel};
use crate::error::{Error, Result};
use crate::record::{Field, Record};

/// A message addressed to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// When the message was composed.
    pub sent_at: DateTime<Utc>,
}

impl Notification {
    /// Compose the "new request" message for a submitted record.
    #[must_use]
    pub fn for_submission(to: impl Into<String>, record: &Record) -> Self {
        let body = Field::ALL
            .iter()
            .map(|f| format!("{}: {}", f.column(), record.get(*f)))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            to: to.into(),
            subject: format!("New assistive device request: {}", record.name),
            body,
            sent_at: Utc::now(),
        }
    }
}

/// A channel that delivers operator notifications.
#[async_trait]
pub trait Notifier: fmt::Debug + Send + Sync {
    /// Name of this channel (for logging and error messages).
    fn name(&self) -> &'static str;

    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Notification`] if delivery fails.
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Appends each notification as a JSON line to an outbox file.
///
/// A mail relay or operator script picks messages up from the outbox.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    /// Create a notifier writing to `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the outbox path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line).await?;
        file.flush().await
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    fn name(&self) -> &'static str {
        "outbox"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let mut line = serde_json::to_vec(notification)?;
        line.push(b'\n');
        self.append(&line)
            .await
            .map_err(|e| Error::notification(self.name(), format!("{}: {e}", self.path.display())))?;

        info!(to = %notification.to, outbox = %self.path.display(), "Operator notified");
        Ok(())
    }
}

/// Writes each notification to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            "{}",
            notification.body.replace('\n', "; ")
        );
        Ok(())
    }
}

/// Drops every notification; used when notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        debug!(subject = %notification.subject, "Notifications disabled, dropping message");
        Ok(())
    }
}

/// Build the notifier selected by the `notify` configuration section.
#[must_use]
pub fn notifier_from_config(config: &Config) -> Box<dyn Notifier> {
    if !config.notify.enabled {
        return Box::new(DisabledNotifier);
    }
    match config.notify.channel {
        NotifyChannel::Outbox => Box::new(OutboxNotifier::new(config.outbox_path())),
        NotifyChannel::Log => Box::new(LogNotifier),
    }
}
