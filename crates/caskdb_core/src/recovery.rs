//! Startup recovery: rebuilding the key directory from the active segment.

use crate::error::CoreResult;
use crate::index::KeyDir;
use crate::segment::scan::RecordScanner;
use caskdb_storage::StorageBackend;
use tracing::debug;

/// Walks the segment front-to-back and rebuilds the key directory.
///
/// Each decoded record points its key at the record's offset, so later
/// writes naturally shadow earlier ones, exactly as replaying the original
/// write sequence would. Returns the directory together with the end
/// offset, where the next append belongs.
///
/// # Errors
///
/// Returns `CorruptSegment` if the segment ends in a partial record; the
/// store must refuse to open in that case.
pub(crate) fn rebuild_index(backend: &dyn StorageBackend) -> CoreResult<(KeyDir, u64)> {
    let mut keydir = KeyDir::new();
    let mut records = 0usize;

    let mut scanner = RecordScanner::new(backend)?;
    for item in scanner.by_ref() {
        let (offset, record) = item?;
        keydir.insert(record.key().to_string(), offset);
        records += 1;
    }
    let end_offset = scanner.position();

    debug!(
        records,
        distinct_keys = keydir.len(),
        end_offset,
        "segment recovery complete"
    );
    Ok((keydir, end_offset))
}
