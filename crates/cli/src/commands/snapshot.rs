//! Snapshot file commands.
//!
//! These operate on the file directly and must not run against a snapshot
//! that a live server is writing.

use std::path::Path;

use stockroom_core::Snapshot;
use stockroom_server::store::{CatalogStore, SnapshotError, SnapshotFile, StoreError};
use thiserror::Error;

/// Errors that can occur during snapshot commands.
#[derive(Debug, Error)]
pub enum SnapshotCommandError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Record counts reported by `show` and `verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub has_started: bool,
    pub users: usize,
    pub products: usize,
}

impl From<&Snapshot> for Summary {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            has_started: snapshot.has_started,
            users: snapshot.users.len(),
            products: snapshot.products.len(),
        }
    }
}

/// Create an empty snapshot file.
///
/// # Errors
///
/// Fails if a snapshot exists and `force` is not set, or on write failure.
pub fn init(path: &Path, force: bool) -> Result<(), SnapshotCommandError> {
    let file = SnapshotFile::new(path);
    CatalogStore::create_empty(&file, force)?;
    tracing::info!("Created empty snapshot at {}", path.display());
    Ok(())
}

/// Print the bootstrap flag and record counts.
///
/// # Errors
///
/// Fails if the snapshot is missing or corrupt.
pub fn show(path: &Path) -> Result<Summary, SnapshotCommandError> {
    let snapshot = SnapshotFile::new(path).load()?;
    let summary = Summary::from(&snapshot);

    tracing::info!(
        "{}: hasStarted={} users={} products={}",
        path.display(),
        summary.has_started,
        summary.users,
        summary.products
    );
    Ok(summary)
}

/// Check that the snapshot loads, as the server does at start.
///
/// # Errors
///
/// Fails if the snapshot is missing or corrupt.
pub fn verify(path: &Path) -> Result<Summary, SnapshotCommandError> {
    let snapshot = SnapshotFile::new(path).load()?;
    tracing::info!("{} is a valid snapshot", path.display());
    Ok(Summary::from(&snapshot))
}

/// Clear products and the bootstrap flag, keeping users.
///
/// # Errors
///
/// Fails if the snapshot cannot be loaded or written.
pub fn empty(path: &Path) -> Result<(), SnapshotCommandError> {
    let file = SnapshotFile::new(path);
    let mut snapshot = file.load()?;
    let removed = snapshot.empty_catalog();
    file.write(&snapshot)?;

    tracing::info!("Removed {removed} products; catalog will re-seed on next start");
    Ok(())
}
