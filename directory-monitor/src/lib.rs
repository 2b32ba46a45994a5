//! # Directory Monitor
//!
//! This crate watches a single local directory for bookmark and track
//! files and reports its contents to a delegate once the directory has
//! settled.
//!
//! ## Features
//!
//! - **Debounced Evaluation**: Bursts of writes produce one snapshot
//! - **Gathering vs Update**: The first snapshot after a start is reported
//!   separately from later ones
//! - **Pause/Resume**: Suspend observation without losing gathering state
//! - **Per-entry Errors**: One unreadable file never hides the others
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Monitor                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EventSource ──► Debouncer ──► SnapshotEvaluator ──► Delegate  │
//! │       ▲              │                │                         │
//! │       │              ▼                ▼                         │
//! │  ActivationState  deadline       ContentReader                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookmarks_directory_monitor::{ChannelDelegate, LocalDirectoryMonitor, MonitorConfig, MonitorHandle};
//!
//! let (delegate, mut events) = ChannelDelegate::new();
//! let mut monitor = LocalDirectoryMonitor::new(MonitorConfig::new("~/bookmarks"))?;
//! monitor.set_delegate(&delegate);
//!
//! let handle = MonitorHandle::spawn(monitor);
//! handle.start().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod config;
pub mod contents;
pub mod debounce;
pub mod delegate;
pub mod driver;
pub mod error;
pub mod evaluator;
pub mod monitor;
pub mod source;
pub mod state;

pub use config::{FileKind, MonitorConfig};
pub use contents::{ContentReader, FileRecord, LocalFileSystem, Snapshot};
pub use debounce::{DebounceState, Debouncer, SignalOutcome};
pub use delegate::{ChannelDelegate, DelegateRef, MonitorDelegate, MonitorEvent};
pub use driver::MonitorHandle;
pub use error::{MonitorError, Result};
pub use evaluator::{Delivery, Evaluation, SnapshotEvaluator};
pub use monitor::{DirectoryMonitor, LocalDirectoryMonitor};
pub use source::{EventSource, NotifySourceFactory, SignalSender, SourceFactory, SourceGuard};
pub use state::ActivationState;
