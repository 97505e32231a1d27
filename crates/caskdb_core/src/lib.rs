//! # CaskDB Core
//!
//! An embedded, append-only, log-structured key-value store with:
//! - Typed values (UTF-8 strings and 64-bit signed integers)
//! - An in-memory hash index over a single active segment file
//! - Crash recovery by scanning the segment front-to-back on open
//! - Size-triggered segment rotation with latest-wins compaction
//! - Single-writer/multi-reader concurrency
//!
//! ## Example
//!
//! ```no_run
//! use caskdb_core::Store;
//!
//! # fn main() -> caskdb_core::CoreResult<()> {
//! let store = Store::open("/var/lib/caskdb")?;
//! store.put("greeting", "hello")?;
//! store.put_int64("answer", 42)?;
//!
//! assert_eq!(store.get("greeting")?, "hello");
//! assert_eq!(store.get_int64("answer")?, 42);
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## On-Disk Layout
//!
//! The data directory holds exactly one file, `current-data`, to which all
//! records are appended. During rotation a transient `current-data.bak`
//! exists; a crash mid-rotation is healed on the next open.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod segment;
pub mod store;

mod dir;
mod index;
mod recovery;
mod rotation;
mod writer;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use segment::record::{Record, ValueType};
pub use store::Store;
