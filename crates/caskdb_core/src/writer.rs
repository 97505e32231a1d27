//! The single-writer serializer.
//!
//! All writes funnel through one dedicated thread fed by a channel. Any
//! number of callers submit requests; the thread applies them strictly in
//! arrival order, checking the segment size limit (and rotating if needed)
//! before each append. This gives every write a total order without the
//! callers ever sharing the append handle.

use crate::dir::DataDir;
use crate::error::{CoreError, CoreResult};
use crate::rotation;
use crate::segment::record::Record;
use crate::store::Shared;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// One queued write, answered over its private reply channel.
pub(crate) struct WriteRequest {
    /// The record to append.
    pub record: Record,
    /// Where the outcome is sent once the write is serialized.
    pub reply: Sender<CoreResult<()>>,
}

/// Spawns the writer thread.
///
/// The thread runs until every request sender is dropped, draining any
/// buffered requests before exiting, so a closing store never abandons an
/// accepted write.
pub(crate) fn spawn(
    dir: DataDir,
    shared: Arc<RwLock<Shared>>,
    segment_size_limit: u64,
    start_offset: u64,
) -> CoreResult<(Sender<WriteRequest>, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel();
    let writer = Writer {
        dir,
        shared,
        limit: segment_size_limit,
        offset: start_offset,
        poisoned: false,
    };
    let handle = thread::Builder::new()
        .name("caskdb-writer".to_string())
        .spawn(move || writer.run(rx))?;
    Ok((tx, handle))
}

struct Writer {
    dir: DataDir,
    shared: Arc<RwLock<Shared>>,
    /// Segment size limit in bytes; 0 disables rotation.
    limit: u64,
    /// End offset of the active segment; the next append lands here.
    offset: u64,
    /// Set when a rotation could not be rolled back.
    poisoned: bool,
}

impl Writer {
    fn run(mut self, requests: Receiver<WriteRequest>) {
        while let Ok(request) = requests.recv() {
            let result = self.append(&request.record);
            // The submitter may have given up waiting; that is its business.
            let _ = request.reply.send(result);
        }
    }

    fn append(&mut self, record: &Record) -> CoreResult<()> {
        if self.poisoned {
            return Err(CoreError::rotation(
                "a previous rotation could not be rolled back; the store refuses further writes",
            ));
        }

        let encoded = record.encode();

        if self.limit > 0 && self.offset + encoded.len() as u64 > self.limit {
            match rotation::rotate(&self.dir, &self.shared) {
                Ok(end_offset) => self.offset = end_offset,
                Err(failure) => {
                    self.poisoned = failure.unrecoverable;
                    return Err(failure.error);
                }
            }
        }

        let active = {
            let state = self.shared.read();
            Arc::clone(&state.active)
        };
        let offset = active.write().append(&encoded)?;

        {
            let mut state = self.shared.write();
            state.index.insert(record.key().to_string(), offset);
        }

        self.offset = offset + encoded.len() as u64;
        Ok(())
    }
}
