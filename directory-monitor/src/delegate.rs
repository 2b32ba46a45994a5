//! Delegate callbacks.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::trace;

use crate::contents::Snapshot;
use crate::error::MonitorError;

/// Receives the results of monitor evaluations.
///
/// All callbacks for one monitor are made from a single task, one at a
/// time, in the order the evaluations were triggered.
pub trait MonitorDelegate: Send + Sync {
    /// First snapshot since the monitor was started.
    fn did_finish_gathering(&self, contents: Snapshot);

    /// Any later snapshot.
    fn did_update(&self, contents: Snapshot);

    /// A non-fatal error from an evaluation.
    fn did_receive_error(&self, error: MonitorError);
}

/// Non-owning reference to a delegate.
///
/// Callbacks are dropped once the delegate is gone.
#[derive(Clone, Default)]
pub struct DelegateRef {
    inner: Option<Weak<dyn MonitorDelegate>>,
}

impl DelegateRef {
    /// Reference `delegate` without keeping it alive.
    pub fn new<D: MonitorDelegate + 'static>(delegate: &Arc<D>) -> Self {
        let weak: Weak<D> = Arc::downgrade(delegate);
        let weak: Weak<dyn MonitorDelegate> = weak;
        Self { inner: Some(weak) }
    }

    /// A reference that never delivers.
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if the delegate is still alive.
    pub fn is_alive(&self) -> bool {
        self.inner.as_ref().is_some_and(|w| w.strong_count() > 0)
    }

    pub(crate) fn with(&self, f: impl FnOnce(&dyn MonitorDelegate)) {
        match self.inner.as_ref().and_then(Weak::upgrade) {
            Some(delegate) => f(delegate.as_ref()),
            None => trace!("No delegate, dropping callback"),
        }
    }
}

impl std::fmt::Debug for DelegateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// A delegate callback as a value.
#[derive(Debug)]
pub enum MonitorEvent {
    /// See [`MonitorDelegate::did_finish_gathering`].
    GatheringFinished(Snapshot),

    /// See [`MonitorDelegate::did_update`].
    Updated(Snapshot),

    /// See [`MonitorDelegate::did_receive_error`].
    Error(MonitorError),
}

impl MonitorEvent {
    /// The snapshot carried by this event, if any.
    pub fn contents(&self) -> Option<&Snapshot> {
        match self {
            Self::GatheringFinished(contents) | Self::Updated(contents) => Some(contents),
            Self::Error(_) => None,
        }
    }
}

/// Delegate that forwards every callback to a channel.
#[derive(Debug)]
pub struct ChannelDelegate {
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl ChannelDelegate {
    /// Create the delegate and the receiving end of its channel.
    ///
    /// The caller must keep the returned `Arc` alive for as long as it
    /// wants events.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn send(&self, event: MonitorEvent) {
        if self.tx.send(event).is_err() {
            trace!("Monitor event receiver dropped");
        }
    }
}

impl MonitorDelegate for ChannelDelegate {
    fn did_finish_gathering(&self, contents: Snapshot) {
        self.send(MonitorEvent::GatheringFinished(contents));
    }

    fn did_update(&self, contents: Snapshot) {
        self.send(MonitorEvent::Updated(contents));
    }

    fn did_receive_error(&self, error: MonitorError) {
        self.send(MonitorEvent::Error(error));
    }
}
