// # File Cursor Store
//
// File-based implementation of CursorStore with crash recovery.
//
// ## Purpose
//
// Keeps the resume cursor across daemon restarts so a restart only replays
// the batch that was in flight.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "maxid": 4211,
//   "updated": "2025-01-09T12:00:00Z"
// }
// ```
//
// Files that only carry `maxid` load fine.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::cursor_store::CursorStore;

/// File-based cursor store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use ipam2dns_core::state::FileCursorStore;
/// use ipam2dns_core::traits::CursorStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileCursorStore::new("state.json").await?;
///
///     store.save(4211).await?;
///     assert_eq!(store.load().await?, 4211);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileCursorStore {
    path: PathBuf,
    state: Arc<RwLock<CursorState>>,
}

/// Internal state for the file-based store
#[derive(Debug)]
struct CursorState {
    cursor: u64,
    updated: Option<chrono::DateTime<chrono::Utc>>,
    dirty: bool,
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    maxid: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<chrono::DateTime<chrono::Utc>>,
}

/// Why a state file could not be loaded
enum LoadError {
    /// The file exists but does not parse
    Corrupt(Error),
    /// The file could not be read
    Io(Error),
}

impl FileCursorStore {
    /// Create or load a file cursor store
    ///
    /// This will:
    /// 1. Try to load existing state file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start at cursor 0
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let loaded = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(CursorState {
                cursor: loaded.as_ref().map(|s| s.maxid).unwrap_or(0),
                updated: loaded.and_then(|s| s.updated),
                dirty: false,
            })),
        })
    }

    /// Load state from file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main state file
    /// 2. If it does not parse, try loading backup
    /// 3. If backup also fails, start at cursor 0
    async fn load_state_with_recovery(path: &Path) -> Result<Option<StateFileFormat>, Error> {
        let err = match Self::load_state(path).await {
            Ok(state) => {
                tracing::debug!(
                    "Loaded cursor {} from {}",
                    state.as_ref().map(|s| s.maxid).unwrap_or(0),
                    path.display()
                );
                return Ok(state);
            }
            Err(LoadError::Io(e)) => return Err(e),
            Err(LoadError::Corrupt(e)) => e,
        };

        tracing::warn!(
            "State file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting from cursor 0.");
            return Ok(None);
        }

        match Self::load_state(&backup_path).await {
            Ok(state) => {
                tracing::info!(
                    "Recovered cursor {} from backup",
                    state.as_ref().map(|s| s.maxid).unwrap_or(0)
                );

                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!("Failed to restore state file from backup: {}", restore_err);
                }

                Ok(state)
            }
            Err(LoadError::Corrupt(e)) | Err(LoadError::Io(e)) => {
                tracing::error!("Backup also unusable: {}. Starting from cursor 0.", e);
                Ok(None)
            }
        }
    }

    /// Load state from file, `None` when the file does not exist
    async fn load_state(path: &Path) -> Result<Option<StateFileFormat>, LoadError> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| LoadError::Io(io_failure("read", path, e)))?;

        serde_json::from_str(&content).map(Some).map_err(|e| {
            LoadError::Corrupt(Error::cursor_store(format!(
                "Failed to parse state file {}: {}",
                path.display(),
                e
            )))
        })
    }

    /// Write the cursor through a temp file and rename it into place
    ///
    /// The previous file is copied to `.backup` first so a torn write can be
    /// recovered on the next start.
    async fn write_state(&self) -> Result<(), Error> {
        let mut state_guard = self.state.write().await;

        let json = serde_json::to_vec_pretty(&StateFileFormat {
            maxid: state_guard.cursor,
            updated: state_guard.updated,
        })?;

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| io_failure("create", &temp_path, e))?;
        file.write_all(&json)
            .await
            .map_err(|e| io_failure("write", &temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| io_failure("sync", &temp_path, e))?;
        drop(file);

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to back up {}: {}", self.path.display(), e);
        }

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| io_failure("replace", &self.path, e))?;

        state_guard.dirty = false;
        tracing::trace!("Cursor {} written to {}", state_guard.cursor, self.path.display());
        Ok(())
    }

    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path)
            .await
            .map_err(|e| io_failure("restore", path, e))?;
        tracing::info!("Restored {} from backup", path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Time of the last cursor change, if known
    pub async fn last_updated(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.state.read().await.updated
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<u64, Error> {
        Ok(self.state.read().await.cursor)
    }

    async fn save(&self, cursor: u64) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            if state_guard.cursor == cursor {
                return Ok(());
            }
            state_guard.cursor = cursor;
            state_guard.updated = Some(chrono::Utc::now());
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write_state().await
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}

fn io_failure(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::cursor_store(format!("Failed to {} {}: {}", action, path.display(), e))
}
