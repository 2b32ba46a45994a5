//! Configuration types for directory monitoring.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Default debounce quiet interval.
pub const DEFAULT_QUIET_INTERVAL_MS: u64 = 500;

/// Longest quiet interval accepted by [`MonitorConfig::validate`].
pub const MAX_QUIET_INTERVAL_MS: u64 = 60_000;

/// Configuration for a monitored directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Path to the directory.
    pub directory: PathBuf,

    /// Kind of file reported in snapshots.
    #[serde(default)]
    pub file_kind: FileKind,

    /// Quiet period required before a burst of writes is evaluated.
    #[serde(default = "default_quiet_interval_ms")]
    pub quiet_interval_ms: u64,

    /// Whether to create the directory when it does not exist yet.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

fn default_quiet_interval_ms() -> u64 {
    DEFAULT_QUIET_INTERVAL_MS
}

fn default_create_if_missing() -> bool {
    true
}

impl MonitorConfig {
    /// Create a new monitor config.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            file_kind: FileKind::default(),
            quiet_interval_ms: DEFAULT_QUIET_INTERVAL_MS,
            create_if_missing: true,
        }
    }

    /// Set the file kind.
    pub fn with_file_kind(mut self, kind: FileKind) -> Self {
        self.file_kind = kind;
        self
    }

    /// Set the quiet interval.
    pub fn with_quiet_interval(mut self, interval: Duration) -> Self {
        self.quiet_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Fail instead of creating a missing directory.
    pub fn require_existing(mut self) -> Self {
        self.create_if_missing = false;
        self
    }

    /// The debounce quiet interval.
    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.quiet_interval_ms)
    }

    /// Check the configuration for values the monitor cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(MonitorError::Config(
                "directory path must not be empty".to_string(),
            ));
        }
        if self.quiet_interval_ms > MAX_QUIET_INTERVAL_MS {
            return Err(MonitorError::Config(format!(
                "quiet_interval_ms must be at most {MAX_QUIET_INTERVAL_MS}, got {}",
                self.quiet_interval_ms
            )));
        }
        Ok(())
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Kind of file a monitor reports, identified by its extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Keyhole Markup Language.
    #[default]
    Kml,

    /// Zipped KML.
    Kmz,

    /// GPS Exchange Format.
    Gpx,
}

impl FileKind {
    /// All supported kinds.
    pub const ALL: [FileKind; 3] = [FileKind::Kml, FileKind::Kmz, FileKind::Gpx];

    /// File extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Kml => "kml",
            Self::Kmz => "kmz",
            Self::Gpx => "gpx",
        }
    }

    /// Whether `path` carries this kind's extension.
    ///
    /// The comparison is exact: `Track.GPX` is not a `gpx` file.
    pub fn matches(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension())
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FileKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| MonitorError::Config(format!("unsupported file kind: {s}")))
    }
}
