//! Write-event sources.
//!
//! A source delivers a unit signal whenever the watched directory is
//! written to. Sources do not tolerate redundant suspend/resume calls, so
//! the monitor only talks to them through [`SourceGuard`].

use std::path::{Path, PathBuf};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use crate::error::{MonitorError, Result};

/// Capacity of the write-signal channel.
pub const SIGNAL_CHANNEL_CAPACITY: usize = 64;

/// Sending half of the write-signal channel.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::Sender<()>,
}

impl SignalSender {
    /// Create a signal channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Report a directory write.
    ///
    /// Never blocks. A full channel already holds a signal that will
    /// trigger an evaluation, so the extra one is dropped.
    pub fn notify(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => trace!("Write signal after monitor shut down"),
        }
    }
}

/// A cancellable source of directory write events.
pub trait EventSource: Send {
    /// Begin delivering events. Called once, right after creation.
    fn activate(&mut self) -> Result<()>;

    /// Stop delivering events until resumed.
    fn suspend(&mut self);

    /// Deliver events again after a suspension.
    fn resume(&mut self) -> Result<()>;

    /// Release the underlying resources. No events follow.
    fn cancel(&mut self);
}

/// Creates event sources for a directory.
pub trait SourceFactory: Send {
    /// Open a source for `directory` that reports writes to `signals`.
    fn open(&self, directory: &Path, signals: SignalSender) -> Result<Box<dyn EventSource>>;
}

/// An activated source plus the suspended/resumed flag pair that keeps
/// suspend and resume calls from being repeated.
pub struct SourceGuard {
    source: Box<dyn EventSource>,
    suspended: bool,
    resumed: bool,
    cancelled: bool,
}

impl SourceGuard {
    /// Activate `source` and take ownership of it.
    pub fn activate(mut source: Box<dyn EventSource>) -> Result<Self> {
        source.activate()?;
        Ok(Self {
            source,
            suspended: false,
            resumed: true,
            cancelled: false,
        })
    }

    /// Suspend the source unless it is already suspended.
    ///
    /// Returns whether the source was actually suspended.
    pub fn suspend(&mut self) -> bool {
        if self.suspended || self.cancelled {
            return false;
        }
        debug!("Suspending event source");
        self.source.suspend();
        self.suspended = true;
        self.resumed = false;
        true
    }

    /// Resume the source unless it is already running.
    ///
    /// Returns whether the source was actually resumed. On failure the
    /// flags are left untouched.
    pub fn resume(&mut self) -> Result<bool> {
        if self.resumed || self.cancelled {
            return Ok(false);
        }
        debug!("Resuming event source");
        self.source.resume()?;
        self.resumed = true;
        self.suspended = false;
        Ok(true)
    }

    /// Check if the source is suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Cancel the source. Later calls are no-ops.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            debug!("Cancelling event source");
            self.source.cancel();
            self.cancelled = true;
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for SourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceGuard")
            .field("suspended", &self.suspended)
            .field("resumed", &self.resumed)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

/// Whether a notify event counts as a directory write.
fn is_write_event(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

/// Event source backed by the platform's recommended `notify` watcher.
pub struct NotifySource {
    watcher: RecommendedWatcher,
    directory: PathBuf,
    watching: bool,
}

impl NotifySource {
    fn watch(&mut self) -> Result<()> {
        self.watcher
            .watch(&self.directory, RecursiveMode::NonRecursive)
            .map_err(|e| MonitorError::access(&self.directory, e))?;
        self.watching = true;
        Ok(())
    }

    fn unwatch(&mut self) {
        if !self.watching {
            return;
        }
        self.watching = false;
        // A removed directory has already dropped its watch.
        if let Err(e) = self.watcher.unwatch(&self.directory) {
            debug!("Unwatch {} failed: {e}", self.directory.display());
        }
    }
}

impl EventSource for NotifySource {
    fn activate(&mut self) -> Result<()> {
        self.watch()
    }

    fn suspend(&mut self) {
        self.unwatch();
    }

    fn resume(&mut self) -> Result<()> {
        self.watch()
    }

    fn cancel(&mut self) {
        self.unwatch();
    }
}

/// Opens [`NotifySource`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySourceFactory;

impl SourceFactory for NotifySourceFactory {
    fn open(&self, directory: &Path, signals: SignalSender) -> Result<Box<dyn EventSource>> {
        if !directory.is_dir() {
            return Err(MonitorError::access(directory, "not a directory"));
        }

        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) if is_write_event(&event.kind) => signals.notify(),
                Ok(_) => {}
                Err(e) => warn!("Watch error: {e}"),
            },
        )
        .map_err(|e| MonitorError::access(directory, e))?;

        Ok(Box::new(NotifySource {
            watcher,
            directory: directory.to_path_buf(),
            watching: false,
        }))
    }
}
