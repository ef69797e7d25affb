//! Redb storage engine.
//!
//! Each namespace is a redb table of raw byte keys and values. Redb already
//! provides snapshot reads alongside a single writer, so transactions map
//! one to one onto redb transactions.

use crate::backend::{EngineCapabilities, StorageEngine};
use crate::codec::KeyKind;
use crate::config::FileConfig;
use crate::error::IsoDbResult;
use log::debug;
use redb::{ReadableDatabase, TableDefinition};
use std::time::Instant;

pub mod transaction;

pub use transaction::RedbTransaction;

pub(crate) fn table_definition(namespace: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(namespace)
}

/// Redb-based storage engine.
pub struct RedbStore {
    pub(crate) db: redb::Database,
}

impl RedbStore {
    /// Create or open a redb database file.
    pub fn new(config: FileConfig) -> IsoDbResult<Self> {
        let start = Instant::now();
        debug!("RedbStore: Opening database at {}", config.path.display());

        if config.truncate && config.path.exists() {
            std::fs::remove_file(&config.path)?;
        }
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut builder = redb::Database::builder();
        builder.set_cache_size(config.cache_bytes());
        let db = if config.create_if_missing {
            builder.create(&config.path)?
        } else {
            builder.open(&config.path)?
        };

        debug!("RedbStore: Opened in {:?}", start.elapsed());
        Ok(RedbStore { db })
    }

    /// Create a database that lives only in memory.
    pub fn temporary() -> IsoDbResult<Self> {
        let db = redb::Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())?;
        debug!("RedbStore: Created in-memory database");
        Ok(RedbStore { db })
    }

    /// Get a reference to the underlying redb database
    pub fn redb_database(&self) -> &redb::Database {
        &self.db
    }
}

impl StorageEngine for RedbStore {
    type Txn = RedbTransaction;

    const NAME: &'static str = "isodb-redb";

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            exclusive_bounds: true,
            native_reverse: true,
            concurrent_readers: true,
        }
    }

    fn open_namespace(&self, name: &str, ordering: KeyKind) -> IsoDbResult<()> {
        let txn = self.db.begin_write()?;
        txn.open_table(table_definition(name))?;
        txn.commit()?;
        debug!("RedbStore: Opened table {} ({})", name, ordering);
        Ok(())
    }

    fn begin_read(&self) -> IsoDbResult<RedbTransaction> {
        Ok(RedbTransaction::Read(self.db.begin_read()?))
    }

    fn begin_write(&self) -> IsoDbResult<RedbTransaction> {
        Ok(RedbTransaction::Write(self.db.begin_write()?))
    }
}
