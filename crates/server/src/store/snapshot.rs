//! Snapshot file codec.
//!
//! The snapshot is a single pretty-printed JSON document holding the whole
//! store: `{ "hasStarted": bool, "users": [...], "products": [...] }`.
//! It is read completely on load and rewritten completely on every mutation.
//!
//! Each write lands in its own uniquely named temp file next to the target,
//! which is synced and then renamed over it. An interrupted write leaves the
//! previous snapshot intact, and concurrent writers never share a temp file.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use stockroom_core::Snapshot;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors reading or writing the snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot file does not exist.
    #[error("snapshot file {} does not exist", .0.display())]
    Missing(PathBuf),

    /// The snapshot file could not be read.
    #[error("failed to read snapshot {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The snapshot file is not a valid snapshot document.
    #[error("snapshot {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    /// The snapshot file could not be written.
    #[error("failed to write snapshot {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Refused to overwrite an existing snapshot.
    #[error("snapshot file {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// An ID in the snapshot is at the top of its range, so no further
    /// records could be numbered.
    #[error("snapshot id {0} leaves no room for new records")]
    IdOverflow(String),

    /// The blocking write task did not complete.
    #[error("snapshot write task failed: {0}")]
    Task(String),
}

/// Handle on the snapshot file backing a store.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Create a handle for the snapshot at `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the snapshot file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and parse the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Missing` if the file is absent,
    /// `SnapshotError::Read` on I/O failure and `SnapshotError::Corrupt` if
    /// the content does not parse.
    pub fn load(&self) -> Result<Snapshot, SnapshotError> {
        let data = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SnapshotError::Missing(self.path.clone())
            } else {
                SnapshotError::Read {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&data).map_err(|source| SnapshotError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Encode and durably write the snapshot, replacing the previous file.
    ///
    /// This blocks the calling thread; async callers use [`Self::persist`].
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Encode` or `SnapshotError::Write`.
    pub fn write(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let data = serde_json::to_string_pretty(snapshot).map_err(SnapshotError::Encode)?;

        let write_err = |source| SnapshotError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(write_err)?;

        let mut temp = self.temp_file(dir).map_err(write_err)?;
        temp.write_all(data.as_bytes()).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;

        temp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    /// Write the snapshot on the blocking pool.
    ///
    /// The write runs to completion even if the returned future is dropped.
    ///
    /// # Errors
    ///
    /// Returns the underlying write error, or `SnapshotError::Task` if the
    /// blocking task panicked.
    pub async fn persist(&self, snapshot: Snapshot) -> Result<(), SnapshotError> {
        let file = self.clone();
        tokio::task::spawn_blocking(move || file.write(&snapshot))
            .await
            .map_err(|e| SnapshotError::Task(e.to_string()))?
    }

    /// Write an empty, not-yet-bootstrapped snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::AlreadyExists` if a snapshot is present and
    /// `overwrite` is false, or the underlying write error.
    pub fn create_empty(&self, overwrite: bool) -> Result<(), SnapshotError> {
        if self.exists() && !overwrite {
            return Err(SnapshotError::AlreadyExists(self.path.clone()));
        }
        self.write(&Snapshot::default())
    }

    fn temp_file(&self, dir: &Path) -> io::Result<NamedTempFile> {
        let mut prefix = OsString::from(".");
        prefix.push(self.path.file_name().unwrap_or_else(|| "snapshot".as_ref()));
        prefix.push(".");

        tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(dir)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use stockroom_core::{Product, ProductId, User, UserId, Username};

    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            has_started: true,
            users: vec![User {
                id: UserId::new(1),
                username: Username::parse("alice").unwrap(),
                password: "hash".to_string(),
                name: "Alice".to_string(),
            }],
            products: vec![
                Product {
                    id: ProductId::from("1"),
                    name: "Desk".to_string(),
                    description: Some("Oak".to_string()),
                    price: Decimal::new(12_950, 2),
                    quantity: 3,
                },
                Product {
                    id: ProductId::from("2"),
                    name: "Chair".to_string(),
                    description: None,
                    price: Decimal::new(40, 0),
                    quantity: 0,
                },
            ],
        }
    }

    #[test]
    fn test_write_then_load_reproduces_state() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("catalog.json"));

        file.write(&sample()).unwrap();
        let loaded = file.load().unwrap();

        assert_eq!(loaded, sample());
        assert_eq!(loaded.products[0].id.as_str(), "1");
        assert_eq!(loaded.products[1].id.as_str(), "2");
    }

    #[test]
    fn test_written_file_is_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("catalog.json"));
        file.write(&sample()).unwrap();

        let text = fs::read_to_string(file.path()).unwrap();
        assert!(text.starts_with("{\n  \"hasStarted\": true"));
        assert!(text.contains("\"_id\": \"1\""));

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["catalog.json".to_string()]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nope.json"));
        assert!(matches!(file.load(), Err(SnapshotError::Missing(_))));
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("catalog.json"));
        file.write(&sample()).unwrap();

        let text = fs::read_to_string(file.path()).unwrap();
        fs::write(file.path(), &text[..text.len() / 2]).unwrap();

        assert!(matches!(file.load(), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn test_stale_temp_file_does_not_affect_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("catalog.json"));
        file.write(&sample()).unwrap();

        // A crash between create and rename leaves a partial temp file behind.
        fs::write(dir.path().join(".catalog.json.a1b2c3.tmp"), "{\"hasStarted\": fal").unwrap();

        assert_eq!(file.load().unwrap(), sample());
    }

    #[test]
    fn test_create_empty_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("data").join("catalog.json"));

        file.create_empty(false).unwrap();
        assert_eq!(file.load().unwrap(), Snapshot::default());

        assert!(matches!(
            file.create_empty(false),
            Err(SnapshotError::AlreadyExists(_))
        ));
        file.write(&sample()).unwrap();
        file.create_empty(true).unwrap();
        assert_eq!(file.load().unwrap(), Snapshot::default());
    }

    #[test]
    fn test_concurrent_writers_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("catalog.json"));
        file.write(&Snapshot::default()).unwrap();

        let candidates: Vec<Snapshot> = (0..16)
            .map(|n| {
                let mut snapshot = sample();
                snapshot.products.truncate(n % 3);
                snapshot
            })
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .iter()
                .map(|snapshot| scope.spawn(|| file.write(snapshot)))
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap();
            }
        });

        // Last write wins, and it is one of the complete documents.
        let loaded = file.load().unwrap();
        assert!(candidates.contains(&loaded));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_persist_on_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("catalog.json"));
        file.persist(sample()).await.unwrap();
        assert_eq!(file.load().unwrap(), sample());
    }
}
