//! Store configuration.

/// Configuration for opening a store.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Maximum size of the active segment in bytes before a write triggers
    /// rotation and compaction. `0` disables rotation entirely and the
    /// segment grows without bound.
    pub segment_size_limit: u64,
}

impl Config {
    /// Creates a new configuration with default values (rotation disabled).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the segment size limit that triggers rotation.
    #[must_use]
    pub const fn segment_size_limit(mut self, limit: u64) -> Self {
        self.segment_size_limit = limit;
        self
    }
}
