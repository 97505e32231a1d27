//! Segment rotation and compaction.
//!
//! When an append would push the active segment past the configured limit,
//! the writer rotates: the active file is renamed to `current-data.bak`, a
//! fresh active segment is built from the backup with one record per
//! distinct key (latest occurrence wins), and the store's shared state is
//! swapped to the new `(segment, index)` pair in one step. The backup is
//! then removed.
//!
//! ## Failure Handling
//!
//! Any failure after the rename renames the backup back over the active
//! path and surfaces a rotation error; the in-memory state was never
//! touched, so the store keeps serving reads and later writes. If even the
//! rename-back fails the store is declared unrecoverable and the writer
//! refuses all further writes.
//!
//! The active handle is never closed before the swap. Readers hold their
//! own clone of the backend and keep reading the renamed file until the
//! swap lands, so there is no window without an active segment.

use crate::dir::DataDir;
use crate::error::{CoreError, CoreResult};
use crate::index::KeyDir;
use crate::segment::record::Record;
use crate::segment::scan::RecordScanner;
use crate::store::{shared_backend, Shared};
use caskdb_storage::{FileBackend, StorageBackend};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use tracing::{error, info, warn};

/// A failed rotation, flagging whether the previous segment was restored.
#[derive(Debug)]
pub(crate) struct RotationFailure {
    /// The error to surface to the caller whose write triggered rotation.
    pub error: CoreError,
    /// True when the backup could not be renamed back; the store must then
    /// refuse further writes.
    pub unrecoverable: bool,
}

/// Rotates the active segment, compacting it to one record per key.
///
/// On success the store's shared `(active, index)` pair has been swapped
/// and the new end offset is returned for the writer to adopt.
pub(crate) fn rotate(dir: &DataDir, shared: &RwLock<Shared>) -> Result<u64, RotationFailure> {
    let active_path = dir.active_path();
    let backup_path = dir.backup_path();

    fs::rename(&active_path, &backup_path).map_err(|err| RotationFailure {
        error: err.into(),
        unrecoverable: false,
    })?;

    match rebuild_compacted(dir) {
        Ok((backend, keydir, end_offset)) => {
            let distinct_keys = keydir.len();
            {
                let mut state = shared.write();
                state.active = shared_backend(backend);
                state.index = keydir;
            }
            if let Err(err) = fs::remove_file(&backup_path) {
                warn!(error = %err, "failed to remove rotation backup");
            }
            info!(distinct_keys, bytes = end_offset, "segment rotated and compacted");
            Ok(end_offset)
        }
        Err(err) => match fs::rename(&backup_path, &active_path) {
            Ok(()) => Err(RotationFailure {
                error: CoreError::rotation(format!("{err}; previous segment restored")),
                unrecoverable: false,
            }),
            Err(restore_err) => {
                error!(
                    error = %err,
                    restore_error = %restore_err,
                    "rotation failed and the backup could not be restored"
                );
                Err(RotationFailure {
                    error: CoreError::rotation(format!(
                        "{err}; restoring the previous segment also failed: {restore_err}"
                    )),
                    unrecoverable: true,
                })
            }
        },
    }
}

/// Builds a fresh active segment from the rotation backup.
///
/// Scans the backup front-to-back keeping the last record per key, then
/// appends the survivors to a new segment at the active path. Iteration is
/// in map order; since only one record per key is emitted the ordering is
/// unobservable through the index.
fn rebuild_compacted(dir: &DataDir) -> CoreResult<(FileBackend, KeyDir, u64)> {
    let mut fresh = FileBackend::open(&dir.active_path())?;
    let backup = FileBackend::open(&dir.backup_path())?;

    let mut latest: HashMap<String, Record> = HashMap::new();
    for item in RecordScanner::new(&backup)? {
        let (_, record) = item?;
        latest.insert(record.key().to_string(), record);
    }

    let mut keydir = KeyDir::new();
    let mut end_offset = 0u64;
    for (key, record) in latest {
        let encoded = record.encode();
        let offset = fresh.append(&encoded)?;
        keydir.insert(key, offset);
        end_offset = offset + encoded.len() as u64;
    }
    fresh.flush()?;

    Ok((fresh, keydir, end_offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::scan::read_record_at;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_segment(dir: &DataDir, records: &[Record]) -> (Arc<RwLock<Shared>>, u64) {
        let mut backend = FileBackend::open(&dir.active_path()).unwrap();
        let mut keydir = KeyDir::new();
        let mut offset = 0u64;
        for record in records {
            let encoded = record.encode();
            let at = backend.append(&encoded).unwrap();
            keydir.insert(record.key().to_string(), at);
            offset = at + encoded.len() as u64;
        }
        let shared = Arc::new(RwLock::new(Shared {
            active: shared_backend(backend),
            index: keydir,
        }));
        (shared, offset)
    }

    #[test]
    fn rotation_collapses_duplicate_keys() {
        let temp = tempdir().unwrap();
        let dir = DataDir::open(temp.path()).unwrap();

        let records = [
            Record::string("a", "1"),
            Record::string("b", "2"),
            Record::string("a", "3"),
            Record::int64("c", 4),
            Record::string("a", "5"),
        ];
        let (shared, _) = write_segment(&dir, &records);

        let end_offset = rotate(&dir, &shared).unwrap();

        // One record per distinct key survives, the backup is gone, and the
        // new index points every key at its latest value.
        assert!(!dir.backup_path().exists());
        let state = shared.read();
        assert_eq!(state.index.len(), 3);

        let backend = state.active.read();
        assert_eq!(backend.size().unwrap(), end_offset);

        let a = read_record_at(&**backend, state.index.get("a").unwrap()).unwrap();
        assert_eq!(a.value(), b"5");
        let c = read_record_at(&**backend, state.index.get("c").unwrap()).unwrap();
        assert_eq!(c.value(), 4i64.to_le_bytes().as_slice());
    }

    #[test]
    fn rotation_preserves_total_bytes_of_distinct_keys() {
        let temp = tempdir().unwrap();
        let dir = DataDir::open(temp.path()).unwrap();

        let records = [
            Record::string("k", "old"),
            Record::string("k", "newer"),
            Record::string("k", "newest"),
        ];
        let (shared, before) = write_segment(&dir, &records);

        let after = rotate(&dir, &shared).unwrap();

        assert!(after < before);
        assert_eq!(after, Record::string("k", "newest").encoded_len() as u64);
    }

    #[test]
    fn corrupt_backup_aborts_and_restores() {
        let temp = tempdir().unwrap();
        let dir = DataDir::open(temp.path()).unwrap();

        let records = [Record::string("a", "1")];
        let (shared, offset) = write_segment(&dir, &records);

        // Tack a partial record onto the segment before rotating.
        {
            let state = shared.read();
            state.active.write().append(&[0x30, 0, 0, 0, 1, 2]).unwrap();
        }

        let failure = rotate(&dir, &shared).err().unwrap();
        assert!(matches!(failure.error, CoreError::Rotation { .. }));
        assert!(!failure.unrecoverable);

        // The previous segment is back in place, partial tail included.
        assert!(!dir.backup_path().exists());
        let restored = std::fs::read(dir.active_path()).unwrap();
        assert_eq!(restored.len() as u64, offset + 6);
    }
}
