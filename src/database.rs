//! The database handle.
//!
//! A [`Database`] owns a storage engine, its schema, the admission queue
//! and the slot of the transaction currently admitted. All mutation goes
//! through [`Database::transact`]: transactions submitted to one handle run
//! strictly one after another in submission order, and a `transact` issued
//! from inside a running transaction on the same thread joins it.
//!
//! ```
//! use isodb::codec::AutoKey;
//! use isodb::databases::memory_store::MemoryStore;
//! use isodb::schema::{DbDef, TableDef};
//! use isodb::open_db;
//!
//! let db = open_db(MemoryStore::new(), DbDef::new().table(TableDef::<AutoKey, String>::new("notes")))?;
//! let key = db.transact(|tx| tx.table::<AutoKey, String>("notes")?.add(&"hello".to_string()))?;
//! let note = db.transact_readonly(|tx| tx.table::<AutoKey, String>("notes")?.get(key))?;
//! assert_eq!(note.as_deref(), Some("hello"));
//! # Ok::<(), isodb::error::IsoDbError>(())
//! ```

use crate::admission::{Admission, AdmissionQueue};
use crate::backend::{EngineTransaction, StorageEngine};
use crate::error::{IsoDbError, IsoDbResult};
use crate::schema::DbDef;
use crate::transaction::{ActiveGuard, ReadTransaction, Transaction, TxnRef, TxnSlot};
use log::{debug, warn};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::path::Path;
use std::time::Instant;

/// Opens a database on `engine`, creating every namespace the schema
/// declares.
pub fn open_db<E: StorageEngine>(engine: E, schema: DbDef) -> IsoDbResult<Database<E>> {
    Database::open(engine, schema)
}

/// Deletes the database file or directory at `path`. A missing path is not
/// an error.
pub fn delete_db(path: impl AsRef<Path>) -> IsoDbResult<()> {
    let path = path.as_ref();
    let result = match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            debug!("Database: Deleted {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub struct Database<E: StorageEngine> {
    engine: E,
    schema: DbDef,
    queue: AdmissionQueue,
    active: TxnSlot<E::Txn>,
}

impl<E: StorageEngine> Database<E> {
    pub fn open(engine: E, schema: DbDef) -> IsoDbResult<Self> {
        let start = Instant::now();
        schema.validate()?;
        let namespaces = schema.namespaces();
        debug!(
            "Database: Opening {} namespaces on {}",
            namespaces.len(),
            E::NAME
        );
        for (name, ordering) in &namespaces {
            engine.open_namespace(name, *ordering)?;
        }
        debug!("Database: Opened in {:?}", start.elapsed());
        Ok(Self {
            engine,
            schema,
            queue: AdmissionQueue::new(),
            active: ReentrantMutex::new(RefCell::new(None)),
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn schema(&self) -> &DbDef {
        &self.schema
    }

    /// Runs `f` in a read-write transaction.
    ///
    /// Outside a transaction, the call waits for its turn, commits when `f`
    /// returns `Ok` and rolls back when it returns `Err` or panics. Inside a
    /// transaction on the same thread, `f` joins it and the outermost call
    /// decides the outcome.
    ///
    /// ## Errors
    ///
    /// Whatever `f` returns, engine errors from begin or commit, and
    /// `IsoDbError::ReadOnly` when joining a read-only transaction.
    pub fn transact<T, F>(&self, f: F) -> IsoDbResult<T>
    where
        F: FnOnce(&Transaction<'_, E>) -> IsoDbResult<T>,
    {
        let caps = self.engine.capabilities();
        match self.queue.admit() {
            Admission::Joined => {
                let read_only = {
                    let guard = self.active.lock();
                    let active = guard.borrow();
                    match active.as_ref() {
                        Some(active) => active.read_only,
                        None => return Err(IsoDbError::TransactionClosed),
                    }
                };
                if read_only {
                    return Err(IsoDbError::ReadOnly);
                }
                f(&Transaction::new(TxnRef::Active(&self.active), caps, &self.schema))
            }
            Admission::Admitted(_turn) => {
                let start = Instant::now();
                let active = ActiveGuard::install(&self.active, self.engine.begin_write()?, false);
                let result = f(&Transaction::new(TxnRef::Active(&self.active), caps, &self.schema));
                match result {
                    Ok(value) => {
                        active.commit()?;
                        debug!("Database: Transaction committed in {:?}", start.elapsed());
                        Ok(value)
                    }
                    Err(e) => {
                        if let Err(rollback) = active.rollback() {
                            warn!("Database: Rollback failed: {}", rollback);
                        }
                        debug!("Database: Transaction rolled back: {}", e);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Runs `f` in a read-only transaction.
    ///
    /// On engines with concurrent readers this does not wait for queued
    /// writers. Called from inside a transaction on the same thread, it
    /// joins that transaction and sees its uncommitted writes.
    pub fn transact_readonly<T, F>(&self, f: F) -> IsoDbResult<T>
    where
        F: FnOnce(&ReadTransaction<'_, E>) -> IsoDbResult<T>,
    {
        let caps = self.engine.capabilities();
        if self.queue.held_by_current_thread() {
            return f(&ReadTransaction::new(TxnRef::Active(&self.active), caps, &self.schema));
        }

        if caps.concurrent_readers {
            let txn = self.engine.begin_read()?;
            let result = f(&ReadTransaction::new(TxnRef::Owned(&txn), caps, &self.schema));
            txn.rollback()?;
            return result;
        }

        match self.queue.admit() {
            Admission::Joined => {
                f(&ReadTransaction::new(TxnRef::Active(&self.active), caps, &self.schema))
            }
            Admission::Admitted(_turn) => {
                let active = ActiveGuard::install(&self.active, self.engine.begin_write()?, true);
                let result = f(&ReadTransaction::new(TxnRef::Active(&self.active), caps, &self.schema));
                active.rollback()?;
                result
            }
        }
    }

    /// Forces committed data to durable storage.
    pub fn flush(&self) -> IsoDbResult<()> {
        self.engine.flush()
    }

    /// Closes the engine.
    pub fn close(self) -> IsoDbResult<()> {
        debug!("Database: Closing {}", E::NAME);
        let Database { engine, .. } = self;
        engine.close()
    }
}
