//! Engine configuration.
//!
//! Configuration structs are built with `typed-builder` and can be embedded
//! in application config files through serde.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use typed_builder::TypedBuilder;

/// Configuration for file-based engines (Sled, Redb).
///
/// # Examples
///
/// ```
/// use isodb::config::FileConfig;
///
/// let config = FileConfig::builder()
///     .path("/data/store.db")
///     .cache_size_mb(512)
///     .build();
/// assert!(config.create_if_missing);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
pub struct FileConfig {
    /// Path to the database file or directory
    #[builder(setter(into))]
    pub path: PathBuf,

    /// Cache size in megabytes
    #[builder(default = 256)]
    pub cache_size_mb: usize,

    /// Whether to create the database if it doesn't exist
    #[builder(default = true)]
    pub create_if_missing: bool,

    /// Whether to delete existing data before opening
    #[builder(default = false)]
    pub truncate: bool,

    /// Flush to disk after every commit (Sled)
    #[builder(default = true)]
    pub use_fsync: bool,
}

impl FileConfig {
    /// Create a basic configuration with just a path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            cache_size_mb: 256,
            create_if_missing: true,
            truncate: false,
            use_fsync: true,
        }
    }

    pub(crate) fn cache_bytes(&self) -> usize {
        self.cache_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Configuration for the in-memory engine.
///
/// Turning a capability off makes the engine advertise it as missing, so
/// the table layer falls back to its own emulation.
///
/// ```
/// use isodb::config::MemoryConfig;
///
/// let config = MemoryConfig::builder().native_reverse(false).build();
/// assert!(config.exclusive_bounds);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
pub struct MemoryConfig {
    #[builder(default = true)]
    pub exclusive_bounds: bool,

    #[builder(default = true)]
    pub native_reverse: bool,

    #[builder(default = true)]
    pub concurrent_readers: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            exclusive_bounds: true,
            native_reverse: true,
            concurrent_readers: true,
        }
    }
}
