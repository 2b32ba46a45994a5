//! Runs a monitor on its own tokio task.
//!
//! The task owns the [`LocalDirectoryMonitor`] and is the only place its
//! state changes: API commands, write signals and the debounce deadline are
//! all handled from one `select!` loop, so delegate callbacks are never
//! concurrent.

use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::error::{MonitorError, Result};
use crate::monitor::{DirectoryMonitor, LocalDirectoryMonitor};
use crate::state::ActivationState;

enum Command {
    Start(oneshot::Sender<Result<PathBuf>>),
    Stop(oneshot::Sender<()>),
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
}

/// Handle to a monitor running on a tokio task.
///
/// Dropping the handle shuts the task down and cancels the event source.
#[derive(Debug)]
pub struct MonitorHandle {
    directory: PathBuf,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ActivationState>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Move `monitor` onto a new task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(mut monitor: LocalDirectoryMonitor) -> Self {
        let directory = monitor.directory().to_path_buf();
        let (commands, command_rx) = mpsc::channel(16);
        let (state_tx, state) = watch::channel(monitor.state());
        let signals = monitor.take_signal_receiver();

        let task = tokio::spawn(run(monitor, command_rx, signals, state_tx));

        Self {
            directory,
            commands,
            state,
            task,
        }
    }

    /// The watched directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Current activation state.
    pub fn state(&self) -> ActivationState {
        *self.state.borrow()
    }

    /// Start the monitor. Returns the watched directory.
    pub async fn start(&self) -> Result<PathBuf> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Start(tx)).await?;
        rx.await.map_err(|_| MonitorError::ChannelClosed)?
    }

    /// Stop the monitor.
    pub async fn stop(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stop(tx)).await?;
        rx.await.map_err(|_| MonitorError::ChannelClosed)
    }

    /// Pause the monitor.
    pub async fn pause(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Pause(tx)).await?;
        rx.await.map_err(|_| MonitorError::ChannelClosed)
    }

    /// Resume the monitor.
    pub async fn resume(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Resume(tx)).await?;
        rx.await.map_err(|_| MonitorError::ChannelClosed)
    }

    /// Shut the task down and wait for it to finish.
    pub async fn shutdown(self) -> Result<()> {
        let Self { commands, task, .. } = self;
        drop(commands);
        task.await.map_err(|_| MonitorError::ChannelClosed)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MonitorError::ChannelClosed)
    }
}

async fn run(
    mut monitor: LocalDirectoryMonitor,
    mut commands: mpsc::Receiver<Command>,
    mut signals: Option<mpsc::Receiver<()>>,
    state: watch::Sender<ActivationState>,
) {
    debug!("Monitor task running for {}", monitor.directory().display());

    loop {
        let deadline = monitor.next_deadline();
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    Command::Start(reply) => {
                        let _ = reply.send(monitor.start());
                    }
                    Command::Stop(reply) => {
                        monitor.stop();
                        let _ = reply.send(());
                    }
                    Command::Pause(reply) => {
                        monitor.pause();
                        let _ = reply.send(());
                    }
                    Command::Resume(reply) => {
                        monitor.resume();
                        let _ = reply.send(());
                    }
                }
                state.send_replace(monitor.state());
            }
            Some(()) = recv_signal(&mut signals) => {
                monitor.handle_write_signal(Instant::now());
            }
            () = wait_until(deadline) => {
                monitor.handle_deadline(Instant::now());
            }
        }
    }

    info!("Monitor task for {} shut down", monitor.directory().display());
}

async fn recv_signal(signals: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match signals {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
