//! Snapshot evaluation.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::FileKind;
use crate::contents::{ContentReader, Snapshot};
use crate::delegate::DelegateRef;
use crate::error::{MonitorError, Result};

/// Which delegate channel an evaluation was delivered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// `did_finish_gathering`.
    Gathering,

    /// `did_update`.
    Update,

    /// The directory could not be read; only an error was delivered.
    Failed,
}

/// Outcome of reading a directory once.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// Records that were built successfully.
    pub snapshot: Snapshot,

    /// Entries left out of the snapshot.
    pub entry_errors: Vec<MonitorError>,
}

/// Enumerates the watched directory and reports what it finds.
pub struct SnapshotEvaluator {
    directory: PathBuf,
    kind: FileKind,
    reader: Box<dyn ContentReader>,
    gathered: bool,
}

impl SnapshotEvaluator {
    /// Create an evaluator.
    pub fn new(directory: impl Into<PathBuf>, kind: FileKind, reader: Box<dyn ContentReader>) -> Self {
        Self {
            directory: directory.into(),
            kind,
            reader,
            gathered: false,
        }
    }

    /// The evaluated directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The reported file kind.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Whether the initial snapshot has been delivered.
    pub fn has_gathered(&self) -> bool {
        self.gathered
    }

    /// Forget the initial snapshot; the next one is a gathering again.
    pub fn reset(&mut self) {
        self.gathered = false;
    }

    /// Read the directory without delivering anything.
    ///
    /// Fails only when the directory itself cannot be listed.
    pub fn collect(&self) -> Result<Evaluation> {
        let paths = self
            .reader
            .list(&self.directory, self.kind)
            .map_err(|source| MonitorError::DirectoryRead {
                path: self.directory.clone(),
                source,
            })?;

        let mut evaluation = Evaluation::default();
        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match self.reader.record(&path) {
                Ok(record) => records.push(record),
                Err(e) => evaluation.entry_errors.push(e),
            }
        }
        evaluation.snapshot = Snapshot::new(records);
        Ok(evaluation)
    }

    /// Read the directory and deliver the result to `delegate`.
    pub fn evaluate(&mut self, delegate: &DelegateRef) -> Delivery {
        let evaluation = match self.collect() {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!("Evaluation of {} failed: {e}", self.directory.display());
                delegate.with(|d| d.did_receive_error(e));
                return Delivery::Failed;
            }
        };

        for error in evaluation.entry_errors {
            debug!("Skipping entry: {error}");
            delegate.with(|d| d.did_receive_error(error));
        }

        let contents = evaluation.snapshot;
        debug!("Evaluated {} ({} files)", self.directory.display(), contents.len());
        if self.gathered {
            delegate.with(|d| d.did_update(contents));
            Delivery::Update
        } else {
            self.gathered = true;
            delegate.with(|d| d.did_finish_gathering(contents));
            Delivery::Gathering
        }
    }
}

impl std::fmt::Debug for SnapshotEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotEvaluator")
            .field("directory", &self.directory)
            .field("kind", &self.kind)
            .field("gathered", &self.gathered)
            .finish()
    }
}
