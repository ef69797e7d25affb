//! Transaction handles.
//!
//! A write transaction opened by [`Database::transact`](crate::Database::transact)
//! lives in the database's active slot for as long as the outermost closure
//! runs. Every view (`Table`, `Index`, `ObjectStore`) reaches the engine
//! transaction through a [`TxnRef`], so nested `transact` calls and scan
//! visitors on the same thread operate on the very same transaction. A view
//! used after its transaction has finished fails with
//! `IsoDbError::TransactionClosed`.

use crate::backend::{EngineCapabilities, EngineTransaction, StorageEngine};
use crate::codec::{Encodable, TableKey};
use crate::error::{IsoDbError, IsoDbResult};
use crate::object_store::{ObjectStore, ReadObjectStore};
use crate::schema::DbDef;
use crate::table::{ReadTable, Table};
use log::warn;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;

pub(crate) struct ActiveTxn<T> {
    pub(crate) txn: T,
    /// Installed by `transact_readonly`; nested writers are refused
    pub(crate) read_only: bool,
}

/// The database's slot for the transaction currently admitted.
pub(crate) type TxnSlot<T> = ReentrantMutex<RefCell<Option<ActiveTxn<T>>>>;

/// How a view reaches its engine transaction.
pub(crate) enum TxnRef<'t, E: StorageEngine> {
    Active(&'t TxnSlot<E::Txn>),
    Owned(&'t E::Txn),
}

impl<E: StorageEngine> Clone for TxnRef<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: StorageEngine> Copy for TxnRef<'_, E> {}

impl<E: StorageEngine> TxnRef<'_, E> {
    pub(crate) fn with<R>(&self, f: impl FnOnce(&E::Txn) -> IsoDbResult<R>) -> IsoDbResult<R> {
        match self {
            TxnRef::Owned(txn) => f(txn),
            TxnRef::Active(slot) => {
                let guard = slot.lock();
                let active = guard.borrow();
                match active.as_ref() {
                    Some(active) => f(&active.txn),
                    None => Err(IsoDbError::TransactionClosed),
                }
            }
        }
    }
}

/// Everything a view needs to talk to the engine.
pub(crate) struct TxnContext<'t, E: StorageEngine> {
    pub(crate) txn: TxnRef<'t, E>,
    pub(crate) caps: EngineCapabilities,
}

impl<E: StorageEngine> Clone for TxnContext<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: StorageEngine> Copy for TxnContext<'_, E> {}

/// Owns the installed transaction until it is committed or rolled back.
/// Dropping it without either, e.g. while unwinding, rolls back.
pub(crate) struct ActiveGuard<'s, T: EngineTransaction> {
    slot: &'s TxnSlot<T>,
}

impl<'s, T: EngineTransaction> ActiveGuard<'s, T> {
    pub(crate) fn install(slot: &'s TxnSlot<T>, txn: T, read_only: bool) -> Self {
        let guard = slot.lock();
        *guard.borrow_mut() = Some(ActiveTxn { txn, read_only });
        Self { slot }
    }

    fn take(&self) -> IsoDbResult<T> {
        let guard = self.slot.lock();
        let taken = guard.borrow_mut().take();
        taken.map(|active| active.txn).ok_or(IsoDbError::TransactionClosed)
    }

    pub(crate) fn commit(self) -> IsoDbResult<()> {
        self.take()?.commit()
    }

    pub(crate) fn rollback(self) -> IsoDbResult<()> {
        self.take()?.rollback()
    }
}

impl<T: EngineTransaction> Drop for ActiveGuard<'_, T> {
    fn drop(&mut self) {
        let guard = self.slot.lock();
        let taken = match guard.try_borrow_mut() {
            Ok(mut active) => active.take(),
            Err(_) => None,
        };
        if let Some(active) = taken {
            warn!("Transaction dropped while active, rolling back");
            if let Err(e) = active.txn.rollback() {
                warn!("Rollback failed: {}", e);
            }
        }
    }
}

/// A read-write transaction.
///
/// Obtained through [`Database::transact`](crate::Database::transact).
pub struct Transaction<'db, E: StorageEngine> {
    ctx: TxnContext<'db, E>,
    schema: &'db DbDef,
}

impl<'db, E: StorageEngine> Transaction<'db, E> {
    pub(crate) fn new(txn: TxnRef<'db, E>, caps: EngineCapabilities, schema: &'db DbDef) -> Self {
        Self {
            ctx: TxnContext { txn, caps },
            schema,
        }
    }

    /// Opens a declared table.
    ///
    /// ## Errors
    ///
    /// `SchemaError::UnknownTable` for an undeclared name and
    /// `SchemaError::TypeMismatch` when `K` or `V` differ from the
    /// declaration.
    pub fn table<K: TableKey, V: Encodable>(&self, name: &str) -> IsoDbResult<Table<'_, E, K, V>> {
        let def = self.schema.table_def::<K, V>(name)?;
        Ok(Table::new(ReadTable::new(self.ctx, def)))
    }

    /// Opens a declared object store.
    pub fn objects(&self, name: &str) -> IsoDbResult<ObjectStore<'_, E>> {
        let def = self.schema.object_def(name)?;
        Ok(ObjectStore::new(ReadObjectStore::new(self.ctx, def)))
    }

    pub fn schema(&self) -> &DbDef {
        self.schema
    }
}

/// A read-only transaction.
///
/// Obtained through
/// [`Database::transact_readonly`](crate::Database::transact_readonly).
pub struct ReadTransaction<'db, E: StorageEngine> {
    ctx: TxnContext<'db, E>,
    schema: &'db DbDef,
}

impl<'db, E: StorageEngine> ReadTransaction<'db, E> {
    pub(crate) fn new(txn: TxnRef<'db, E>, caps: EngineCapabilities, schema: &'db DbDef) -> Self {
        Self {
            ctx: TxnContext { txn, caps },
            schema,
        }
    }

    pub fn table<K: TableKey, V: Encodable>(
        &self,
        name: &str,
    ) -> IsoDbResult<ReadTable<'_, E, K, V>> {
        let def = self.schema.table_def::<K, V>(name)?;
        Ok(ReadTable::new(self.ctx, def))
    }

    pub fn objects(&self, name: &str) -> IsoDbResult<ReadObjectStore<'_, E>> {
        let def = self.schema.object_def(name)?;
        Ok(ReadObjectStore::new(self.ctx, def))
    }

    pub fn schema(&self) -> &DbDef {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databases::memory_store::MemoryStore;

    #[test]
    fn test_guard_drop_rolls_back() {
        let store = MemoryStore::new();
        let slot: TxnSlot<_> = ReentrantMutex::new(RefCell::new(None));
        {
            let _guard = ActiveGuard::install(&slot, store.begin_write().unwrap(), false);
            let txn = TxnRef::<MemoryStore>::Active(&slot);
            txn.with(|t| t.put("t", b"k", b"v")).unwrap();
        }
        assert!(slot.lock().borrow().is_none());
        assert_eq!(store.begin_read().unwrap().get("t", b"k").unwrap(), None);
    }

    #[test]
    fn test_closed_slot_reports_transaction_closed() {
        let store = MemoryStore::new();
        let slot: TxnSlot<_> = ReentrantMutex::new(RefCell::new(None));
        let guard = ActiveGuard::install(&slot, store.begin_write().unwrap(), false);
        let txn = TxnRef::<MemoryStore>::Active(&slot);
        guard.commit().unwrap();
        assert!(matches!(
            txn.with(|t| t.get("t", b"k")),
            Err(IsoDbError::TransactionClosed)
        ));
    }

    #[test]
    fn test_nested_access_through_slot() {
        let store = MemoryStore::new();
        let slot: TxnSlot<_> = ReentrantMutex::new(RefCell::new(None));
        let guard = ActiveGuard::install(&slot, store.begin_write().unwrap(), false);
        let txn = TxnRef::<MemoryStore>::Active(&slot);
        txn.with(|outer| {
            outer.put("t", b"a", b"1")?;
            txn.with(|inner| inner.get("t", b"a"))
        })
        .map(|v| assert_eq!(v, Some(b"1".to_vec())))
        .unwrap();
        guard.commit().unwrap();
        assert_eq!(store.len("t"), 1);
    }
}
