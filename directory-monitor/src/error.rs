//! Error types for the directory monitor.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur in the directory monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The directory cannot be opened or watched.
    ///
    /// Fatal to `start`; the monitor stays stopped.
    #[error("cannot watch directory {}: {reason}", .path.display())]
    DirectoryAccess { path: PathBuf, reason: String },

    /// A single candidate file could not be turned into a metadata record.
    ///
    /// The entry is left out of the snapshot and enumeration continues.
    #[error("cannot read metadata for {}: {reason}", .path.display())]
    EntryMetadata { path: PathBuf, reason: String },

    /// Listing the watched directory failed as a whole.
    #[error("failed to read contents of {}: {source}", .path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The task driving the monitor is gone.
    #[error("channel error: monitor task has shut down")]
    ChannelClosed,
}

impl MonitorError {
    pub(crate) fn access(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DirectoryAccess {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn entry(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::EntryMetadata {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error concerns one entry rather than the whole directory.
    pub fn is_entry_error(&self) -> bool {
        matches!(self, Self::EntryMetadata { .. })
    }

    /// Whether the error means the directory itself could not be read.
    pub fn is_directory_read_error(&self) -> bool {
        matches!(self, Self::DirectoryRead { .. })
    }
}
