//! Captures and archives running configurations.
//!
//! Backups are flat blobs named `<hostname>-<timestamp>` under a single backup root. There is no
//! index or manifest; the naming convention is the whole contract.

use crate::error::{HostError, StorageError};
use crate::executor::Executor;
use crate::transport::Session;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;
use tracing::{info, warn};

/// The command that dumps a device's configuration.
pub const SHOW_RUNNING_CONFIG: &str = "show running-config";

/// A write-once blob store for configuration backups.
pub trait Storage: Send + Sync + 'static {
    /// Stores `blob` under `key`. Never overwrites an existing blob.
    fn put(&self, key: &str, blob: &str) -> Result<(), StorageError>;
}

/// Stores each backup as `<root>/<key>.txt`.
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Creates a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStorage { root: root.into() }
    }

    /// Returns the path a blob stored under `key` would occupy.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.txt"))
    }
}

impl Storage for FsStorage {
    fn put(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        guard_against_directory_traversal(key)?;

        let io_error = |source| StorageError::Io {
            key: key.to_owned(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io_error)?;

        // `create_new` makes the store write-once: an existing backup is never clobbered.
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_for(key))
            .map_err(io_error)?;
        file.write_all(blob.as_bytes()).map_err(io_error)?;
        file.sync_all().map_err(io_error)
    }
}

// Host names come from device output, so they must not be able to steer writes outside the root.
fn guard_against_directory_traversal(key: &str) -> Result<(), StorageError> {
    if key.trim().is_empty()
        || key.contains(['/', '\\', '\0'])
        || key.contains("..")
        || key.starts_with('.')
    {
        return Err(StorageError::InvalidKey(key.to_owned()));
    }
    Ok(())
}

/// Returns the storage key for a device's backup within a cohort.
pub fn backup_key(hostname: &str, timestamp: &str) -> String {
    format!("{hostname}-{timestamp}")
}

/// A configuration captured from one device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// The storage key, `<hostname>-<timestamp>`.
    pub key: String,

    /// The full configuration text.
    pub text: String,

    /// Whether the text reached storage.
    pub stored: bool,
}

/// Captures running configurations and hands them to a [Storage].
#[derive(Debug)]
pub struct Snapshotter<S> {
    storage: Arc<S>,
}

impl<S> Clone for Snapshotter<S> {
    fn clone(&self) -> Self {
        Snapshotter {
            storage: self.storage.clone(),
        }
    }
}

impl<S: Storage> Snapshotter<S> {
    pub fn new(storage: S) -> Self {
        Snapshotter {
            storage: Arc::new(storage),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Captures the configuration of the device behind `session` and archives it.
    ///
    /// Archiving is best effort: a storage failure is logged, and the captured text is returned
    /// regardless, with [Snapshot::stored] set to `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration could not be captured.
    pub async fn snapshot<T: Session>(
        &self,
        executor: &Executor,
        session: &mut T,
        hostname: &str,
        timestamp: &str,
    ) -> Result<Snapshot, HostError> {
        let text = executor
            .execute(session, SHOW_RUNNING_CONFIG)
            .await
            .into_text(SHOW_RUNNING_CONFIG)?;
        let key = backup_key(hostname, timestamp);

        let storage = self.storage.clone();
        let (task_key, blob) = (key.clone(), text.clone());
        let outcome = task::spawn_blocking(move || storage.put(&task_key, &blob))
            .await
            .unwrap_or_else(|error| {
                Err(StorageError::Interrupted {
                    key: key.clone(),
                    reason: error.to_string(),
                })
            });

        let stored = match outcome {
            Ok(()) => {
                info!(host = hostname, key = %key, "configuration backed up");
                true
            }
            Err(error) => {
                warn!(host = hostname, %error, "backup failed; continuing with captured configuration");
                false
            }
        };

        Ok(Snapshot { key, text, stored })
    }
}
