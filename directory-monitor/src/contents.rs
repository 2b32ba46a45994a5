//! Directory contents: listing entries and building per-file records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::FileKind;
use crate::error::{MonitorError, Result};

/// Metadata record for one file in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name, including the extension.
    pub file_name: String,

    /// Full path to the file.
    pub path: PathBuf,

    /// File size in bytes.
    pub size: u64,

    /// When the file was last modified.
    pub last_modified: DateTime<Utc>,
}

impl FileRecord {
    /// Build a record for the file at `path`.
    ///
    /// Fails for non-UTF-8 names, unreadable metadata (including dangling
    /// symlinks) and anything that is not a regular file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| MonitorError::entry(path, "file name is not valid UTF-8"))?
            .to_string();

        let metadata = path.metadata().map_err(|e| MonitorError::entry(path, e))?;
        if !metadata.is_file() {
            return Err(MonitorError::entry(path, "not a regular file"));
        }
        let modified = metadata.modified().map_err(|e| MonitorError::entry(path, e))?;

        Ok(Self {
            file_name,
            path: path.to_path_buf(),
            size: metadata.len(),
            last_modified: DateTime::<Utc>::from(modified),
        })
    }
}

/// The qualifying files of a directory at one evaluation.
///
/// Order follows the lister; use [`Snapshot::sorted_by_name`] when it
/// matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<FileRecord>,
}

impl Snapshot {
    /// Create a snapshot from records.
    pub fn new(records: Vec<FileRecord>) -> Self {
        Self { records }
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, FileRecord> {
        self.records.iter()
    }

    /// Find a record by file name.
    pub fn get(&self, file_name: &str) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.file_name == file_name)
    }

    /// File names, in snapshot order.
    pub fn file_names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.file_name.as_str()).collect()
    }

    /// The same snapshot ordered by file name.
    pub fn sorted_by_name(mut self) -> Self {
        self.records.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        self
    }
}

impl IntoIterator for Snapshot {
    type Item = FileRecord;
    type IntoIter = std::vec::IntoIter<FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a FileRecord;
    type IntoIter = std::slice::Iter<'a, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<FileRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Lists candidate entries and turns them into records.
pub trait ContentReader: Send {
    /// Paths of the non-hidden direct children of `directory` with
    /// `kind`'s extension.
    fn list(&self, directory: &Path, kind: FileKind) -> std::io::Result<Vec<PathBuf>>;

    /// Build the record for one listed entry.
    fn record(&self, path: &Path) -> Result<FileRecord>;
}

/// [`ContentReader`] over the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

impl ContentReader for LocalFileSystem {
    fn list(&self, directory: &Path, kind: FileKind) -> std::io::Result<Vec<PathBuf>> {
        let walker = WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry?;
            if is_hidden(entry.file_name()) || !kind.matches(entry.path()) {
                continue;
            }
            paths.push(entry.into_path());
        }
        Ok(paths)
    }

    fn record(&self, path: &Path) -> Result<FileRecord> {
        FileRecord::from_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_filters_kind_and_hidden() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("b.kml"), "<kml/>").unwrap();
        fs::write(dir.join("a.kml"), "<kml/>").unwrap();
        fs::write(dir.join(".hidden.kml"), "<kml/>").unwrap();
        fs::write(dir.join("track.gpx"), "<gpx/>").unwrap();
        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/deep.kml"), "<kml/>").unwrap();

        let paths = LocalFileSystem.list(dir, FileKind::Kml).unwrap();
        assert_eq!(paths, vec![dir.join("a.kml"), dir.join("b.kml")]);

        let paths = LocalFileSystem.list(dir, FileKind::Gpx).unwrap();
        assert_eq!(paths, vec![dir.join("track.gpx")]);
    }

    #[test]
    fn test_list_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = LocalFileSystem.list(&temp_dir.path().join("gone"), FileKind::Kml);
        assert!(result.is_err());
    }

    #[test]
    fn test_record_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Home.kml");
        fs::write(&path, "12345").unwrap();

        let record = FileRecord::from_path(&path).unwrap();
        assert_eq!(record.file_name, "Home.kml");
        assert_eq!(record.path, path);
        assert_eq!(record.size, 5);
    }

    #[test]
    fn test_record_rejects_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("folder.kml");
        fs::create_dir(&path).unwrap();

        let err = FileRecord::from_path(&path).unwrap_err();
        assert!(err.is_entry_error());
    }

    #[test]
    fn test_snapshot_sorting_and_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let mut records = Vec::new();
        for name in ["c.kml", "a.kml", "b.kml"] {
            let path = temp_dir.path().join(name);
            fs::write(&path, "").unwrap();
            records.push(FileRecord::from_path(&path).unwrap());
        }

        let snapshot = Snapshot::new(records).sorted_by_name();
        assert_eq!(snapshot.file_names(), vec!["a.kml", "b.kml", "c.kml"]);
        assert_eq!(snapshot.get("b.kml").map(|r| r.size), Some(0));
        assert!(snapshot.get("d.kml").is_none());
    }
}
