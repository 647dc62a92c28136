//! Error types for pwdregistry.
//!
//! This module defines all error types used throughout the pwdregistry crate,
//! providing detailed context for debugging and user-facing error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pwdregistry operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Workflow Errors ===
    /// One or more required fields were blank, or a field was out of range.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// The record targeted by a delete or lookup does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of what was looked up.
        what: String,
    },

    /// A pending entry reference no longer matches the current queue.
    #[error("stale pending reference: {message}")]
    StaleEntry {
        /// Description of the mismatch.
        message: String,
    },

    /// The supplied admin secret was rejected.
    #[error("admin authentication failed")]
    Unauthorized,

    // === Storage Errors ===
    /// Reading or writing a store file failed.
    #[error("failed to persist {path}: {source}")]
    Persistence {
        /// Path of the file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A CSV file could not be parsed or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An uploaded file does not carry the expected columns.
    #[error("uploaded file has incorrect columns: expected [{expected}], found [{found}]")]
    UploadSchema {
        /// The expected column list.
        expected: String,
        /// The column list actually present.
        found: String,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Notification Errors ===
    /// The operator notification could not be delivered.
    #[error("notification via '{channel}' failed: {message}")]
    Notification {
        /// Name of the notification channel.
        channel: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for pwdregistry operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a new stale-entry error.
    #[must_use]
    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleEntry {
            message: message.into(),
        }
    }

    /// Create a persistence error for the given path.
    #[must_use]
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Create a notification error.
    #[must_use]
    pub fn notification(channel: &'static str, message: impl Into<String>) -> Self {
        Self::Notification {
            channel,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error is a not-found condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error reports a stale pending reference.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleEntry { .. })
    }

    /// Check if this error reports a file the process could not write.
    ///
    /// Permission problems usually mean the file is open in a spreadsheet
    /// program that holds an exclusive lock on it.
    #[must_use]
    pub fn is_locked_file(&self) -> bool {
        match self {
            Self::Persistence { source, .. } | Self::Io(source) => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}
