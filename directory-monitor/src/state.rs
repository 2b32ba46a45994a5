//! Activation state of a monitor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a monitor is observing its directory.
///
/// ```text
/// Stopped ──start──► Started ──pause──► Paused
///    ▲                 │  ▲               │
///    └──────stop───────┘  └────resume─────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// Not observing; the next evaluation will be an initial gathering.
    #[default]
    Stopped,

    /// Observing and evaluating.
    Started,

    /// Source suspended; gathering state is kept.
    Paused,
}

impl ActivationState {
    /// Check if the monitor is started.
    pub fn is_started(self) -> bool {
        self == Self::Started
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Started => "started",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}
