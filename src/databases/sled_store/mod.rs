//! Sled storage engine.
//!
//! Each namespace is a sled `Tree`. Sled has no multi-operation
//! transactions that can be read from while they are being built, so a
//! write transaction buffers its changes in an overlay (see
//! [`transaction`]) and applies every touched tree in one atomic
//! multi-tree transaction on commit.
//!
//! ## Usage
//!
//! ```no_run
//! use isodb::config::FileConfig;
//! use isodb::databases::sled_store::SledStore;
//!
//! let store = SledStore::new(FileConfig::new("./data/my_store"))?;
//! # Ok::<(), isodb::error::IsoDbError>(())
//! ```

use crate::backend::{EngineCapabilities, StorageEngine};
use crate::codec::KeyKind;
use crate::config::FileConfig;
use crate::error::IsoDbResult;
use log::debug;
use std::time::Instant;

pub mod transaction;

pub use transaction::SledTransaction;

/// Sled-based storage engine.
#[derive(Clone)]
pub struct SledStore {
    /// Sled's Db type uses Arc internally, so cloning is cheap
    pub(crate) db: sled::Db,

    /// Flush after every commit
    pub(crate) sync_commits: bool,
}

impl SledStore {
    /// Create or open a sled store.
    ///
    /// ## Errors
    ///
    /// Fails when the directory is missing and `create_if_missing` is off,
    /// or when sled cannot open it.
    pub fn new(config: FileConfig) -> IsoDbResult<Self> {
        let start = Instant::now();
        debug!("SledStore: Opening database at {}", config.path.display());

        if config.truncate && config.path.exists() {
            std::fs::remove_dir_all(&config.path)?;
        }
        if !config.create_if_missing && !config.path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no sled database at {}", config.path.display()),
            )
            .into());
        }
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_bytes() as u64)
            .open()?;

        debug!("SledStore: Opened in {:?}", start.elapsed());
        Ok(SledStore {
            db,
            sync_commits: config.use_fsync,
        })
    }

    /// Create a temporary sled store that is removed when dropped.
    pub fn temporary() -> IsoDbResult<Self> {
        let start = Instant::now();
        debug!("SledStore: Creating temporary database");

        let db = sled::Config::new().temporary(true).open()?;

        debug!("SledStore: Created temporary in {:?}", start.elapsed());
        Ok(SledStore {
            db,
            sync_commits: false,
        })
    }

    /// Get a reference to the underlying sled database
    pub fn sled_database(&self) -> &sled::Db {
        &self.db
    }

    /// Get the size of the database on disk in bytes
    pub fn size_on_disk(&self) -> IsoDbResult<u64> {
        Ok(self.db.size_on_disk()?)
    }
}

impl StorageEngine for SledStore {
    type Txn = SledTransaction;

    const NAME: &'static str = "isodb-sled";

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            exclusive_bounds: true,
            native_reverse: true,
            concurrent_readers: true,
        }
    }

    fn open_namespace(&self, name: &str, ordering: KeyKind) -> IsoDbResult<()> {
        self.db.open_tree(name)?;
        debug!("SledStore: Opened tree {} ({})", name, ordering);
        Ok(())
    }

    fn begin_read(&self) -> IsoDbResult<SledTransaction> {
        Ok(SledTransaction::read(self.db.clone()))
    }

    fn begin_write(&self) -> IsoDbResult<SledTransaction> {
        Ok(SledTransaction::write(self.db.clone(), self.sync_commits))
    }

    fn flush(&self) -> IsoDbResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn close(self) -> IsoDbResult<()> {
        let start = Instant::now();
        self.db.flush()?;
        debug!("SledStore: Closed in {:?}", start.elapsed());
        Ok(())
    }
}
