//! Object stores: named singleton slots.
//!
//! Every object store lives in its own `object#name` namespace, one row per
//! slot keyed by the terminated encoding of the slot name. Slots are
//! declared with their value type in the [`ObjectDef`]; reading or writing
//! an undeclared slot, or using the wrong type, is a schema error.

use crate::backend::{EngineTransaction, StorageEngine};
use crate::codec::{terminated, Encodable};
use crate::error::IsoDbResult;
use crate::schema::{object_namespace, ObjectDef};
use crate::transaction::TxnContext;
use std::ops::Deref;
use std::sync::Arc;

pub struct ReadObjectStore<'t, E: StorageEngine> {
    ctx: TxnContext<'t, E>,
    def: Arc<ObjectDef>,
    namespace: String,
}

impl<'t, E: StorageEngine> ReadObjectStore<'t, E> {
    pub(crate) fn new(ctx: TxnContext<'t, E>, def: Arc<ObjectDef>) -> Self {
        Self {
            namespace: object_namespace(def.name()),
            ctx,
            def,
        }
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn get<V: Encodable>(&self, slot: &str) -> IsoDbResult<Option<V>> {
        self.def.check_slot::<V>(slot)?;
        let key = terminated::encode(slot.as_bytes());
        self.ctx
            .txn
            .with(|txn| txn.get(&self.namespace, &key))?
            .map(|bytes| V::decode(&bytes))
            .transpose()
    }
}

pub struct ObjectStore<'t, E: StorageEngine> {
    read: ReadObjectStore<'t, E>,
}

impl<'t, E: StorageEngine> Deref for ObjectStore<'t, E> {
    type Target = ReadObjectStore<'t, E>;

    fn deref(&self) -> &Self::Target {
        &self.read
    }
}

impl<'t, E: StorageEngine> ObjectStore<'t, E> {
    pub(crate) fn new(read: ReadObjectStore<'t, E>) -> Self {
        Self { read }
    }

    pub fn set<V: Encodable>(&self, slot: &str, value: &V) -> IsoDbResult<()> {
        self.def.check_slot::<V>(slot)?;
        let key = terminated::encode(slot.as_bytes());
        let value = value.encode()?;
        self.ctx
            .txn
            .with(|txn| txn.put(&self.namespace, &key, &value))
    }

    /// Empties a slot. Returns whether it held a value.
    pub fn remove(&self, slot: &str) -> IsoDbResult<bool> {
        self.def.check_declared(slot)?;
        let key = terminated::encode(slot.as_bytes());
        self.ctx.txn.with(|txn| txn.delete(&self.namespace, &key))
    }
}
