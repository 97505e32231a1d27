//! The store facade.

use crate::config::Config;
use crate::dir::DataDir;
use crate::error::{CoreError, CoreResult};
use crate::index::KeyDir;
use crate::recovery;
use crate::segment::record::{Record, ValueType};
use crate::segment::scan;
use crate::writer::{self, WriteRequest};
use caskdb_storage::{FileBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::debug;

/// The active segment backend, shared between the writer and readers.
pub(crate) type SharedBackend = Arc<RwLock<Box<dyn StorageBackend>>>;

/// Wraps a backend for shared ownership across the writer and readers.
pub(crate) fn shared_backend(backend: impl StorageBackend + 'static) -> SharedBackend {
    Arc::new(RwLock::new(Box::new(backend)))
}

/// State swapped atomically by rotation and observed by readers.
///
/// Readers take the lock shared, grab the index offset and a clone of the
/// active backend, and release it before doing I/O - so a racing rotation
/// either hands them the complete old pair or the complete new pair.
pub(crate) struct Shared {
    /// The active segment.
    pub active: SharedBackend,
    /// Key directory over the active segment.
    pub index: KeyDir,
}

/// An embedded, append-only, log-structured key-value store.
///
/// All operations take `&self` and are safe to call from any thread. Writes
/// are serialized through a single writer thread; reads run in parallel
/// with each other and with in-flight writes.
///
/// # Example
///
/// ```no_run
/// use caskdb_core::Store;
///
/// # fn main() -> caskdb_core::CoreResult<()> {
/// let store = Store::open("/var/lib/caskdb")?;
/// store.put("k1", "v1")?;
/// assert_eq!(store.get("k1")?, "v1");
/// store.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Store {
    shared: Arc<RwLock<Shared>>,
    /// Write submission channel; taken by `close`.
    requests: Mutex<Option<Sender<WriteRequest>>>,
    /// Writer thread handle; joined by `close`.
    writer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Store {
    /// Opens a store in the given directory with rotation disabled.
    ///
    /// The directory must already exist; the active segment file is created
    /// if absent. Recovery always runs, rebuilding the index from the
    /// segment.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory or segment cannot be opened and
    /// `CorruptSegment` if the segment ends in a partial record.
    pub fn open(dir: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(dir, Config::default())
    }

    /// Opens a store that rotates the segment when a write would push it
    /// past `limit` bytes. `limit = 0` disables rotation.
    ///
    /// # Errors
    ///
    /// As [`Store::open`].
    pub fn open_with_segment_limit(dir: impl AsRef<Path>, limit: u64) -> CoreResult<Self> {
        Self::open_with_config(dir, Config::new().segment_size_limit(limit))
    }

    /// Opens a store with explicit configuration.
    ///
    /// # Errors
    ///
    /// As [`Store::open`].
    pub fn open_with_config(dir: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let dir = DataDir::open(dir.as_ref())?;
        let backend = FileBackend::open(&dir.active_path())?;

        let (index, end_offset) = recovery::rebuild_index(&backend)?;
        debug!(
            path = %dir.active_path().display(),
            records = index.len(),
            end_offset,
            "store opened"
        );

        let shared = Arc::new(RwLock::new(Shared {
            active: shared_backend(backend),
            index,
        }));

        let (requests, handle) = writer::spawn(
            dir,
            Arc::clone(&shared),
            config.segment_size_limit,
            end_offset,
        )?;

        Ok(Self {
            shared,
            requests: Mutex::new(Some(requests)),
            writer: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    /// Stores a string value under `key`.
    ///
    /// Returns once the record is appended and indexed. Durability is at OS
    /// flush granularity; no fsync is issued.
    ///
    /// # Errors
    ///
    /// `EmptyKey` for an empty key, `Io` on write failure, `Rotation` if a
    /// triggered rotation fails, `Closed` after [`Store::close`].
    pub fn put(&self, key: &str, value: &str) -> CoreResult<()> {
        self.submit(Record::string(key, value))
    }

    /// Stores a 64-bit signed integer under `key`.
    ///
    /// # Errors
    ///
    /// As [`Store::put`].
    pub fn put_int64(&self, key: &str, value: i64) -> CoreResult<()> {
        self.submit(Record::int64(key, value))
    }

    /// Returns the latest string value for `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is absent, `TypeMismatch` if the latest record
    /// is not string-typed, `Io` on read failure, `Closed` after close.
    pub fn get(&self, key: &str) -> CoreResult<String> {
        let record = self.read_record(key)?;
        match record.value_type() {
            ValueType::String => String::from_utf8(record.into_value())
                .map_err(|_| CoreError::corrupt_segment("string value is not valid UTF-8")),
            actual => Err(CoreError::TypeMismatch {
                expected: ValueType::String,
                actual,
            }),
        }
    }

    /// Returns the latest int64 value for `key`.
    ///
    /// # Errors
    ///
    /// As [`Store::get`], with the mismatch check reversed.
    pub fn get_int64(&self, key: &str) -> CoreResult<i64> {
        let record = self.read_record(key)?;
        match record.value_type() {
            ValueType::Int64 => {
                let bytes: [u8; 8] = record
                    .value()
                    .try_into()
                    .map_err(|_| CoreError::corrupt_segment("int64 value is not 8 bytes"))?;
                Ok(i64::from_le_bytes(bytes))
            }
            actual => Err(CoreError::TypeMismatch {
                expected: ValueType::Int64,
                actual,
            }),
        }
    }

    /// Returns the byte length of the active segment.
    ///
    /// # Errors
    ///
    /// `Closed` after close; `Io` if the size cannot be determined.
    pub fn size(&self) -> CoreResult<u64> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Closed);
        }
        let active = {
            let state = self.shared.read();
            Arc::clone(&state.active)
        };
        let size = active.read().size()?;
        Ok(size)
    }

    /// Closes the store.
    ///
    /// New submissions are refused immediately; writes already accepted are
    /// drained before the writer thread exits. Idempotent, and also run
    /// best-effort on drop.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` keeps the signature stable.
    pub fn close(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Dropping the sender disconnects the channel; the writer drains
        // buffered requests and exits.
        self.requests.lock().take();
        if let Some(handle) = self.writer.lock().take() {
            let _ = handle.join();
        }
        debug!("store closed");
        Ok(())
    }

    fn submit(&self, record: Record) -> CoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Closed);
        }
        if record.key().is_empty() {
            return Err(CoreError::EmptyKey);
        }

        let sender = match &*self.requests.lock() {
            Some(sender) => sender.clone(),
            None => return Err(CoreError::Closed),
        };

        let (reply, outcome) = std::sync::mpsc::channel();
        sender
            .send(WriteRequest { record, reply })
            .map_err(|_| CoreError::Closed)?;

        // A disconnect here means the writer thread died before answering.
        outcome.recv().map_err(|_| CoreError::Closed)?
    }

    fn read_record(&self, key: &str) -> CoreResult<Record> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Closed);
        }

        let (active, offset) = {
            let state = self.shared.read();
            let offset = state.index.get(key).ok_or_else(|| CoreError::not_found(key))?;
            (Arc::clone(&state.active), offset)
        };

        let backend = active.read();
        scan::read_record_at(&**backend, offset)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
