//! # CaskDB Storage
//!
//! Byte-store backends for CaskDB segment files.
//!
//! This crate provides the lowest-level storage abstraction for CaskDB.
//! Backends are **opaque byte stores**: they support positional reads,
//! appends, and flushes, and know nothing about record framing, indexes,
//! or rotation. The core crate owns all format interpretation.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - persistent storage over OS file APIs
//! - [`InMemoryBackend`] - for tests and ephemeral segments
//!
//! ## Example
//!
//! ```rust
//! use caskdb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
