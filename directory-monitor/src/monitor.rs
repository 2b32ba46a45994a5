//! The local directory monitor.
//!
//! [`LocalDirectoryMonitor`] is a plain state machine: it never spawns,
//! sleeps or locks. Whoever owns it must feed it write signals and wake it
//! at [`LocalDirectoryMonitor::next_deadline`], always from the same task.
//! [`crate::driver::MonitorHandle`] does exactly that on tokio.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::MonitorConfig;
use crate::contents::{ContentReader, LocalFileSystem};
use crate::debounce::{DebounceState, Debouncer, SignalOutcome};
use crate::delegate::{DelegateRef, MonitorDelegate};
use crate::error::{MonitorError, Result};
use crate::evaluator::{Delivery, SnapshotEvaluator};
use crate::source::{
    NotifySourceFactory, SIGNAL_CHANNEL_CAPACITY, SignalSender, SourceFactory, SourceGuard,
};
use crate::state::ActivationState;

/// Lifecycle operations shared by directory monitors.
pub trait DirectoryMonitor {
    /// Current activation state.
    fn state(&self) -> ActivationState;

    /// Start observing. Returns the watched directory.
    ///
    /// A no-op while already started.
    fn start(&mut self) -> Result<PathBuf>;

    /// Stop observing and forget the initial snapshot.
    fn stop(&mut self);

    /// Stop observing but keep the initial snapshot.
    fn pause(&mut self);

    /// Observe again after `pause` or `stop`.
    fn resume(&mut self);
}

/// Watches one directory and reports its contents to a delegate.
///
/// The event source is created on the first successful start and kept
/// until the monitor is dropped, which cancels it.
pub struct LocalDirectoryMonitor {
    directory: PathBuf,
    state: ActivationState,
    debouncer: Debouncer,
    source: Option<SourceGuard>,
    factory: Box<dyn SourceFactory>,
    evaluator: SnapshotEvaluator,
    delegate: DelegateRef,
    signals: SignalSender,
    signal_rx: Option<mpsc::Receiver<()>>,
}

impl LocalDirectoryMonitor {
    /// Create a monitor, creating the directory if the config allows it.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let directory = config.directory.clone();
        ensure_directory(&directory, config.create_if_missing)?;

        let (signals, signal_rx) = SignalSender::channel(SIGNAL_CHANNEL_CAPACITY);
        Ok(Self {
            evaluator: SnapshotEvaluator::new(
                directory.clone(),
                config.file_kind,
                Box::new(LocalFileSystem),
            ),
            directory,
            state: ActivationState::Stopped,
            debouncer: Debouncer::new(config.quiet_interval()),
            source: None,
            factory: Box::new(NotifySourceFactory),
            delegate: DelegateRef::none(),
            signals,
            signal_rx: Some(signal_rx),
        })
    }

    /// Use a different event source factory.
    pub fn with_source_factory(mut self, factory: impl SourceFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Use a different content reader.
    pub fn with_content_reader(mut self, reader: impl ContentReader + 'static) -> Self {
        let kind = self.evaluator.kind();
        self.evaluator = SnapshotEvaluator::new(self.directory.clone(), kind, Box::new(reader));
        self
    }

    /// Set the delegate. The monitor does not keep it alive.
    pub fn set_delegate<D: MonitorDelegate + 'static>(&mut self, delegate: &Arc<D>) {
        self.delegate = DelegateRef::new(delegate);
    }

    /// The watched directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Current debounce state.
    pub fn debounce_state(&self) -> DebounceState {
        self.debouncer.state()
    }

    /// Whether the initial snapshot has been delivered since the last start.
    pub fn has_gathered(&self) -> bool {
        self.evaluator.has_gathered()
    }

    /// When [`Self::handle_deadline`] should next be called.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Take the receiving end of the write-signal channel.
    ///
    /// Each received signal should be passed to
    /// [`Self::handle_write_signal`].
    pub fn take_signal_receiver(&mut self) -> Option<mpsc::Receiver<()>> {
        self.signal_rx.take()
    }

    /// Start, scheduling the first evaluation at `now`.
    pub fn start_at(&mut self, now: Instant) -> Result<PathBuf> {
        if self.state.is_started() {
            return Ok(self.directory.clone());
        }

        if let Some(source) = self.source.as_mut() {
            if let Err(e) = source.resume() {
                warn!("Monitor: failed to reactivate source: {e}");
                self.debouncer.reset();
                self.evaluator.reset();
                self.state = ActivationState::Stopped;
                return Err(e);
            }
        } else {
            let source = self
                .factory
                .open(&self.directory, self.signals.clone())
                .and_then(SourceGuard::activate);
            match source {
                Ok(source) => self.source = Some(source),
                Err(e) => {
                    warn!("Monitor: cannot watch {}: {e}", self.directory.display());
                    return Err(e);
                }
            }
        }

        self.debouncer.schedule_immediate(now);
        self.state = ActivationState::Started;
        info!("Monitor: started on {}", self.directory.display());
        Ok(self.directory.clone())
    }

    /// Feed one write signal received at `now`.
    pub fn handle_write_signal(&mut self, now: Instant) -> SignalOutcome {
        if !self.state.is_started() {
            trace!("Monitor: write signal while {}, dropped", self.state);
            return SignalOutcome::Dropped;
        }
        let outcome = self.debouncer.signal(now);
        trace!("Monitor: write signal {outcome:?}");
        outcome
    }

    /// Fire the debounce deadline if it is due at `now`.
    ///
    /// Returns how the evaluation was delivered, or `None` when nothing
    /// was evaluated.
    pub fn handle_deadline(&mut self, now: Instant) -> Option<Delivery> {
        if !self.debouncer.fire(now) {
            return None;
        }
        if !self.state.is_started() {
            debug!("Monitor: deadline fired while {}, skipping evaluation", self.state);
            return None;
        }
        Some(self.evaluator.evaluate(&self.delegate))
    }
}

impl DirectoryMonitor for LocalDirectoryMonitor {
    fn state(&self) -> ActivationState {
        self.state
    }

    fn start(&mut self) -> Result<PathBuf> {
        self.start_at(Instant::now())
    }

    fn stop(&mut self) {
        if !self.state.is_started() {
            return;
        }
        info!("Monitor: stop");
        if let Some(source) = self.source.as_mut() {
            source.suspend();
        }
        self.evaluator.reset();
        self.debouncer.reset();
        self.state = ActivationState::Stopped;
    }

    fn pause(&mut self) {
        if !self.state.is_started() {
            return;
        }
        info!("Monitor: pause");
        if let Some(source) = self.source.as_mut() {
            source.suspend();
        }
        self.state = ActivationState::Paused;
    }

    fn resume(&mut self) {
        if self.state.is_started() {
            return;
        }
        let Some(source) = self.source.as_mut() else {
            debug!("Monitor: resume before first start ignored");
            return;
        };
        if let Err(e) = source.resume() {
            warn!("Monitor: resume failed: {e}");
            self.delegate.with(|d| d.did_receive_error(e));
            return;
        }
        info!("Monitor: resume");
        self.debouncer.arm();
        self.state = ActivationState::Started;
    }
}

impl std::fmt::Debug for LocalDirectoryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDirectoryMonitor")
            .field("directory", &self.directory)
            .field("state", &self.state)
            .field("debounce", &self.debouncer.state())
            .field("source", &self.source)
            .field("delegate", &self.delegate)
            .finish()
    }
}

fn ensure_directory(directory: &Path, create: bool) -> Result<()> {
    if directory.is_dir() {
        return Ok(());
    }
    if directory.exists() {
        return Err(MonitorError::access(directory, "not a directory"));
    }
    if !create {
        return Err(MonitorError::access(directory, "directory does not exist"));
    }
    debug!("Creating directory {}", directory.display());
    std::fs::create_dir_all(directory).map_err(|e| MonitorError::access(directory, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::{ChannelDelegate, MonitorEvent};
    use crate::source::testing::FakeFactory;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    const QUIET: Duration = Duration::from_millis(500);

    struct Fixture {
        _temp_dir: TempDir,
        dir: PathBuf,
        factory: FakeFactory,
        monitor: LocalDirectoryMonitor,
        _delegate: Arc<ChannelDelegate>,
        events: UnboundedReceiver<MonitorEvent>,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("bookmarks");
        let factory = FakeFactory::default();
        let mut monitor = LocalDirectoryMonitor::new(MonitorConfig::new(&dir))
            .unwrap()
            .with_source_factory(factory.clone());
        let (delegate, events) = ChannelDelegate::new();
        monitor.set_delegate(&delegate);
        Fixture {
            _temp_dir: temp_dir,
            dir,
            factory,
            monitor,
            _delegate: delegate,
            events,
        }
    }

    fn next_event(events: &mut UnboundedReceiver<MonitorEvent>) -> MonitorEvent {
        events.try_recv().expect("expected a delegate callback")
    }

    #[test]
    fn test_new_creates_missing_directory() {
        let f = fixture();
        assert!(f.dir.is_dir());
        assert_eq!(f.monitor.state(), ActivationState::Stopped);
        assert_eq!(f.monitor.debounce_state(), DebounceState::Idle);
    }

    #[test]
    fn test_new_requires_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = MonitorConfig::new(temp_dir.path().join("missing")).require_existing();

        let result = LocalDirectoryMonitor::new(config);
        assert!(matches!(result, Err(MonitorError::DirectoryAccess { .. })));
    }

    #[test]
    fn test_start_gathers_immediately() {
        let mut f = fixture();
        let now = Instant::now();

        assert_eq!(f.monitor.start_at(now).unwrap(), f.dir);
        assert_eq!(f.monitor.state(), ActivationState::Started);
        assert_eq!(f.monitor.next_deadline(), Some(now));

        assert_eq!(f.monitor.handle_deadline(now), Some(Delivery::Gathering));
        assert_eq!(f.monitor.debounce_state(), DebounceState::Armed);
        match next_event(&mut f.events) {
            MonitorEvent::GatheringFinished(contents) => assert!(contents.is_empty()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_start_twice_opens_one_source() {
        let mut f = fixture();
        let now = Instant::now();
        f.monitor.start_at(now).unwrap();
        f.monitor.start_at(now).unwrap();

        let log = f.factory.log();
        assert_eq!(log.opened, 1);
        assert_eq!(log.activated, 1);
    }

    #[test]
    fn test_start_failure_stays_stopped() {
        let mut f = fixture();
        f.factory.fail_open(true);

        let err = f.monitor.start_at(Instant::now()).unwrap_err();
        assert!(matches!(err, MonitorError::DirectoryAccess { .. }));
        assert_eq!(f.monitor.state(), ActivationState::Stopped);
        assert_eq!(f.monitor.next_deadline(), None);

        f.factory.fail_open(false);
        f.monitor.start_at(Instant::now()).unwrap();
        assert_eq!(f.monitor.state(), ActivationState::Started);
    }

    #[test]
    fn test_restart_reuses_source_and_gathers_again() {
        let mut f = fixture();
        let now = Instant::now();
        f.monitor.start_at(now).unwrap();
        f.monitor.handle_deadline(now);
        next_event(&mut f.events);

        f.monitor.stop();
        assert!(!f.monitor.has_gathered());
        assert_eq!(f.monitor.debounce_state(), DebounceState::Idle);

        let later = now + Duration::from_secs(1);
        f.monitor.start_at(later).unwrap();
        assert_eq!(f.monitor.handle_deadline(later), Some(Delivery::Gathering));
        assert!(matches!(
            next_event(&mut f.events),
            MonitorEvent::GatheringFinished(_)
        ));

        let log = f.factory.log();
        assert_eq!(log.opened, 1);
        assert_eq!(log.suspended, 1);
        assert_eq!(log.resumed, 1);
    }

    #[test]
    fn test_restart_with_failed_resume_stays_stopped() {
        let mut f = fixture();
        let now = Instant::now();
        f.monitor.start_at(now).unwrap();
        f.monitor.pause();

        f.factory.fail_resume(true);
        assert!(f.monitor.start_at(now).is_err());
        assert_eq!(f.monitor.state(), ActivationState::Stopped);
        assert_eq!(f.monitor.debounce_state(), DebounceState::Idle);
    }

    #[test]
    fn test_burst_of_signals_evaluates_once() {
        let mut f = fixture();
        let start = Instant::now();
        f.monitor.start_at(start).unwrap();
        f.monitor.handle_deadline(start);
        next_event(&mut f.events);

        fs::write(f.dir.join("Home.kml"), "<kml/>").unwrap();
        let mut last = start;
        for i in 1..=20 {
            last = start + Duration::from_millis(i * 50);
            f.monitor.handle_write_signal(last);
            assert_eq!(f.monitor.handle_deadline(last), None);
        }
        assert_eq!(f.monitor.next_deadline(), Some(last + QUIET));

        assert_eq!(f.monitor.handle_deadline(last + QUIET / 2), None);
        assert_eq!(
            f.monitor.handle_deadline(last + QUIET),
            Some(Delivery::Update)
        );
        match next_event(&mut f.events) {
            MonitorEvent::Updated(contents) => assert_eq!(contents.file_names(), vec!["Home.kml"]),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(f.events.try_recv().is_err());
    }

    #[test]
    fn test_deadline_after_stop_is_silent() {
        let mut f = fixture();
        let now = Instant::now();
        f.monitor.start_at(now).unwrap();
        f.monitor.stop();

        assert_eq!(f.monitor.handle_deadline(now + QUIET), None);
        assert_eq!(f.monitor.debounce_state(), DebounceState::Idle);
        assert!(f.events.try_recv().is_err());
    }

    #[test]
    fn test_deadline_while_paused_is_dropped() {
        let mut f = fixture();
        let now = Instant::now();
        f.monitor.start_at(now).unwrap();
        f.monitor.handle_deadline(now);
        next_event(&mut f.events);

        f.monitor.handle_write_signal(now);
        f.monitor.pause();
        assert_eq!(f.monitor.handle_write_signal(now), SignalOutcome::Dropped);
        assert_eq!(f.monitor.handle_deadline(now + QUIET), None);
        assert_eq!(f.monitor.debounce_state(), DebounceState::Armed);
        assert!(f.events.try_recv().is_err());

        f.monitor.resume();
        assert_eq!(f.monitor.state(), ActivationState::Started);
        assert_eq!(f.monitor.next_deadline(), None);
        assert!(f.monitor.has_gathered());
    }

    #[test]
    fn test_resume_after_stop_rearms() {
        let mut f = fixture();
        let now = Instant::now();
        f.monitor.start_at(now).unwrap();
        f.monitor.stop();
        f.monitor.resume();

        assert_eq!(f.monitor.state(), ActivationState::Started);
        assert_eq!(f.monitor.debounce_state(), DebounceState::Armed);
        assert_eq!(
            f.monitor.handle_write_signal(now),
            SignalOutcome::Scheduled
        );
        assert_eq!(
            f.monitor.handle_deadline(now + QUIET),
            Some(Delivery::Gathering)
        );
    }

    #[test]
    fn test_resume_failure_is_reported() {
        let mut f = fixture();
        f.monitor.start_at(Instant::now()).unwrap();
        f.monitor.pause();

        f.factory.fail_resume(true);
        f.monitor.resume();
        assert_eq!(f.monitor.state(), ActivationState::Paused);
        assert!(matches!(
            next_event(&mut f.events),
            MonitorEvent::Error(MonitorError::DirectoryAccess { .. })
        ));
    }

    #[test]
    fn test_resume_without_source_is_ignored() {
        let mut f = fixture();
        f.monitor.resume();
        assert_eq!(f.monitor.state(), ActivationState::Stopped);
        assert_eq!(f.factory.log().opened, 0);
    }

    #[test]
    fn test_drop_cancels_source() {
        let mut f = fixture();
        f.monitor.start_at(Instant::now()).unwrap();
        let factory = f.factory.clone();

        drop(f);
        assert_eq!(factory.log().cancelled, 1);
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Start,
        Stop,
        Pause,
        Resume,
    }

    /// Expected state after `op`, given whether a source exists yet.
    fn expected(state: ActivationState, op: Op, has_source: bool) -> ActivationState {
        use ActivationState::*;
        match (state, op) {
            (Stopped | Paused, Op::Start) => Started,
            (Started, Op::Stop) => Stopped,
            (Started, Op::Pause) => Paused,
            (Stopped | Paused, Op::Resume) if has_source => Started,
            (state, _) => state,
        }
    }

    #[test]
    fn test_every_short_operation_sequence_follows_transition_table() {
        const OPS: [Op; 4] = [Op::Start, Op::Stop, Op::Pause, Op::Resume];
        const LEN: u32 = 5;

        for n in 0..OPS.len().pow(LEN) {
            let mut f = fixture();
            let mut model = ActivationState::Stopped;
            let mut has_source = false;
            let mut code = n;
            let mut ops = Vec::new();

            for _ in 0..LEN {
                let op = OPS[code % OPS.len()];
                code /= OPS.len();
                ops.push(op);

                model = expected(model, op, has_source);
                match op {
                    Op::Start => {
                        f.monitor.start_at(Instant::now()).unwrap();
                        has_source = true;
                    }
                    Op::Stop => f.monitor.stop(),
                    Op::Pause => f.monitor.pause(),
                    Op::Resume => f.monitor.resume(),
                }

                assert_eq!(f.monitor.state(), model, "after {ops:?}");
                let log = f.factory.log();
                assert!(log.opened <= 1, "second source after {ops:?}");
                assert!(
                    log.suspended == log.resumed || log.suspended == log.resumed + 1,
                    "unbalanced suspend/resume after {ops:?}: {log:?}"
                );
            }
        }
    }
}
