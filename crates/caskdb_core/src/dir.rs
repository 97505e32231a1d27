//! Data directory management.
//!
//! The on-disk layout is a single file inside a caller-provided directory:
//!
//! ```text
//! <data_dir>/
//! └─ current-data          # the active segment
//! ```
//!
//! During rotation a transient `current-data.bak` exists. A crash between
//! the rename and the cleanup leaves that backup behind; since it holds the
//! full pre-rotation data while `current-data` is at best a partial
//! compaction, open restores the backup before recovery runs.

use crate::error::CoreResult;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File names within the data directory.
const ACTIVE_SEGMENT_FILE: &str = "current-data";
const BACKUP_SEGMENT_FILE: &str = "current-data.bak";

/// Paths into the data directory holding the active segment.
///
/// The directory itself must already exist; only the segment file is created
/// on demand.
#[derive(Debug, Clone)]
pub(crate) struct DataDir {
    path: PathBuf,
}

impl DataDir {
    /// Opens a data directory, healing an interrupted rotation if one is
    /// found.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the path does not exist or is not a
    /// directory, or if restoring a stale rotation backup fails.
    pub fn open(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("data directory does not exist: {}", path.display()),
            )
            .into());
        }
        if !path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )
            .into());
        }

        let dir = Self {
            path: path.to_path_buf(),
        };
        dir.restore_stale_backup()?;
        Ok(dir)
    }

    /// Returns the path to the active segment file.
    pub fn active_path(&self) -> PathBuf {
        self.path.join(ACTIVE_SEGMENT_FILE)
    }

    /// Returns the path to the transient rotation backup.
    pub fn backup_path(&self) -> PathBuf {
        self.path.join(BACKUP_SEGMENT_FILE)
    }

    /// Renames a leftover rotation backup over the active segment.
    ///
    /// The backup holds every record the store had accepted before the
    /// interrupted rotation began, so restoring it can only recover data,
    /// never lose it. Any partially compacted active segment is replaced.
    fn restore_stale_backup(&self) -> CoreResult<()> {
        let backup = self.backup_path();
        if !backup.exists() {
            return Ok(());
        }

        warn!(
            backup = %backup.display(),
            "restoring segment backup left behind by an interrupted rotation"
        );
        fs::rename(&backup, self.active_path())?;
        Ok(())
    }
}
