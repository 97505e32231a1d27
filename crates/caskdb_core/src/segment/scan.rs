//! Streaming record scans over a segment.
//!
//! [`RecordScanner`] walks a segment front-to-back, one record at a time,
//! without loading the whole file into memory. It distinguishes a clean end
//! of segment (EOF exactly at a record boundary) from a trailing partial
//! record, which is corruption: the size field is authoritative, so a frame
//! that extends past the end of the segment means a write was cut short.

use crate::error::{CoreError, CoreResult};
use crate::segment::record::{Record, MIN_FRAME_SIZE};
use caskdb_storage::StorageBackend;

/// Size of the leading frame length field.
const LENGTH_FIELD_SIZE: u64 = 4;

/// A streaming iterator over the records of a segment.
///
/// Yields `(offset, record)` pairs in append order. Iteration ends cleanly
/// at EOF on a record boundary; a partial trailing record yields a
/// `CorruptSegment` error and stops the scan.
pub(crate) struct RecordScanner<'a> {
    backend: &'a dyn StorageBackend,
    size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> RecordScanner<'a> {
    /// Creates a scanner positioned at the start of the segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        let size = backend.size()?;
        Ok(Self {
            backend,
            size,
            offset: 0,
            finished: false,
        })
    }

    /// Returns the current scan position.
    ///
    /// After the scanner is exhausted without error this equals the segment
    /// size: the offset at which the next record would be appended.
    pub fn position(&self) -> u64 {
        self.offset
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, Record)>> {
        if self.offset == self.size {
            return Ok(None);
        }

        let remaining = self.size - self.offset;
        if remaining < LENGTH_FIELD_SIZE {
            return Err(CoreError::corrupt_segment(format!(
                "truncated length prefix at offset {}",
                self.offset
            )));
        }

        let len_bytes = self.backend.read_at(self.offset, LENGTH_FIELD_SIZE as usize)?;
        let total = u64::from(u32::from_le_bytes([
            len_bytes[0],
            len_bytes[1],
            len_bytes[2],
            len_bytes[3],
        ]));

        if total < MIN_FRAME_SIZE as u64 {
            return Err(CoreError::corrupt_segment(format!(
                "frame size {total} below minimum at offset {}",
                self.offset
            )));
        }
        if total > remaining {
            return Err(CoreError::corrupt_segment(format!(
                "record at offset {} extends past end of segment",
                self.offset
            )));
        }

        let data = self.backend.read_at(self.offset, total as usize)?;
        let record = Record::decode(&data)?;

        let start = self.offset;
        self.offset += total;
        Ok(Some((start, record)))
    }
}

impl Iterator for RecordScanner<'_> {
    type Item = CoreResult<(u64, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Reads and decodes the single record starting at `offset`.
///
/// # Errors
///
/// Returns `CorruptSegment` if the offset does not frame a whole record
/// within the segment, plus any decode error.
pub(crate) fn read_record_at(backend: &dyn StorageBackend, offset: u64) -> CoreResult<Record> {
    let size = backend.size()?;

    if offset + LENGTH_FIELD_SIZE > size {
        return Err(CoreError::corrupt_segment(format!(
            "offset {offset} is beyond the segment"
        )));
    }

    let len_bytes = backend.read_at(offset, LENGTH_FIELD_SIZE as usize)?;
    let total = u64::from(u32::from_le_bytes([
        len_bytes[0],
        len_bytes[1],
        len_bytes[2],
        len_bytes[3],
    ]));

    if total < MIN_FRAME_SIZE as u64 || offset + total > size {
        return Err(CoreError::corrupt_segment(format!(
            "record at offset {offset} extends past end of segment"
        )));
    }

    let data = backend.read_at(offset, total as usize)?;
    Record::decode(&data)
}
