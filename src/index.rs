//! Secondary indexes.
//!
//! An index namespace maps the encoded index key of a row to the encoded
//! key of its source row. Reads through an index resolve each entry in the
//! source table, so an index behaves like the source table reordered by the
//! index key, with `fkey` carrying the source key. Deleting through an
//! index deletes the source row, which in turn cleans up every index.

use crate::backend::{EngineTransaction, ScanControl, StorageEngine};
use crate::codec::{Encodable, TableKey};
use crate::error::IsoDbResult;
use crate::range::KeyRange;
use crate::schema::index_namespace;
use crate::table::{scan_namespace, Cursor, Entry, ReadTable, Table};
use log::warn;
use std::marker::PhantomData;
use std::ops::Deref;

/// Read access to an index with key `IK` over a table keyed by `K`.
pub struct ReadIndex<'t, E: StorageEngine, IK, K, V> {
    source: ReadTable<'t, E, K, V>,
    name: String,
    namespace: String,
    _key: PhantomData<fn() -> IK>,
}

impl<'t, E, IK, K, V> ReadIndex<'t, E, IK, K, V>
where
    E: StorageEngine,
    IK: TableKey,
    K: TableKey,
    V: Encodable,
{
    pub(crate) fn new(source: ReadTable<'t, E, K, V>, name: &str) -> IsoDbResult<Self> {
        source.index_def(name)?.check_key_type::<IK>(source.name())?;
        Ok(Self {
            namespace: index_namespace(source.name(), name),
            name: name.to_string(),
            source,
            _key: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the source table.
    pub fn table_name(&self) -> &str {
        self.source.name()
    }

    fn source_key(&self, index_key: &IK) -> IsoDbResult<Option<Vec<u8>>> {
        let index_key = index_key.encode()?;
        self.source
            .ctx
            .txn
            .with(|txn| txn.get(&self.namespace, &index_key))
    }

    /// Walks index entries in index order, resolving each one in the
    /// source table. Entries whose source row is gone are skipped and do
    /// not count towards the limit.
    fn scan_resolved<F>(&self, range: &KeyRange<IK>, mut visit: F) -> IsoDbResult<()>
    where
        F: FnMut(&[u8], &[u8], &[u8]) -> IsoDbResult<ScanControl>,
    {
        let mut native = range.to_native()?;
        let limit = native.limit.take();
        let mut resolved = 0u32;
        scan_namespace::<E, IK, _>(&self.source.ctx, &self.namespace, &native, |ik, fk| {
            let Some(value) = self.source.get_raw(fk)? else {
                warn!(
                    "Index {}: entry points at missing row in {}, skipping",
                    self.namespace,
                    self.source.name()
                );
                return Ok(ScanControl::Continue);
            };
            resolved += 1;
            let control = visit(ik, fk, &value)?;
            if limit.is_some_and(|n| resolved >= n) {
                return Ok(ScanControl::Stop);
            }
            Ok(control)
        })
    }

    /// The source row currently indexed under `index_key`.
    pub fn get(&self, index_key: impl Into<IK>) -> IsoDbResult<Option<V>> {
        let Some(source_key) = self.source_key(&index_key.into())? else {
            return Ok(None);
        };
        match self.source.get_raw(&source_key)? {
            Some(value) => Ok(Some(V::decode(&value)?)),
            None => {
                warn!("Index {}: entry points at missing row", self.namespace);
                Ok(None)
            }
        }
    }

    /// The source key currently indexed under `index_key`.
    pub fn get_source_key(&self, index_key: impl Into<IK>) -> IsoDbResult<Option<K>> {
        self.source_key(&index_key.into())?
            .map(|bytes| K::decode(&bytes))
            .transpose()
    }

    /// Index keys in the range. Source rows are not read.
    pub fn get_keys(&self, range: &KeyRange<IK>) -> IsoDbResult<Vec<IK>> {
        let native = range.to_native()?;
        let mut keys = Vec::new();
        scan_namespace::<E, IK, _>(&self.source.ctx, &self.namespace, &native, |ik, _| {
            keys.push(IK::decode(ik)?);
            Ok(ScanControl::Continue)
        })?;
        Ok(keys)
    }

    pub fn get_values(&self, range: &KeyRange<IK>) -> IsoDbResult<Vec<V>> {
        let mut values = Vec::new();
        self.scan_resolved(range, |_, _, value| {
            values.push(V::decode(value)?);
            Ok(ScanControl::Continue)
        })?;
        Ok(values)
    }

    pub fn get_entries(&self, range: &KeyRange<IK>) -> IsoDbResult<Vec<Entry<IK, V, K>>> {
        let mut entries = Vec::new();
        self.scan_resolved(range, |ik, fk, value| {
            entries.push(Entry {
                key: IK::decode(ik)?,
                value: V::decode(value)?,
                fkey: K::decode(fk)?,
            });
            Ok(ScanControl::Continue)
        })?;
        Ok(entries)
    }

    /// Visits source rows in index order; `cursor.fkey` is the source key.
    pub fn iterate<F>(&self, range: &KeyRange<IK>, mut visit: F) -> IsoDbResult<()>
    where
        F: FnMut(&mut Cursor<IK, V, K>) -> IsoDbResult<()>,
    {
        self.scan_resolved(range, |ik, fk, value| {
            let mut cursor = Cursor::new(IK::decode(ik)?, V::decode(value)?, K::decode(fk)?);
            visit(&mut cursor)?;
            Ok(cursor.control())
        })
    }

    /// Number of source rows reachable through the range. Entries pointing
    /// at missing rows are not counted.
    pub fn count(&self, range: &KeyRange<IK>) -> IsoDbResult<u64> {
        let mut count = 0;
        self.scan_resolved(range, |_, _, _| {
            count += 1;
            Ok(ScanControl::Continue)
        })?;
        Ok(count)
    }
}

/// Read-write access to an index. Writes go to the source table.
pub struct Index<'t, E: StorageEngine, IK, K, V> {
    read: ReadIndex<'t, E, IK, K, V>,
}

impl<'t, E: StorageEngine, IK, K, V> Deref for Index<'t, E, IK, K, V> {
    type Target = ReadIndex<'t, E, IK, K, V>;

    fn deref(&self) -> &Self::Target {
        &self.read
    }
}

impl<'t, E, IK, K, V> Index<'t, E, IK, K, V>
where
    E: StorageEngine,
    IK: TableKey,
    K: TableKey,
    V: Encodable,
{
    pub(crate) fn new(read: ReadIndex<'t, E, IK, K, V>) -> Self {
        Self { read }
    }

    fn source_table(&self) -> Table<'t, E, K, V> {
        Table::new(self.read.source.clone())
    }

    /// Removes the source row indexed under `index_key`. Returns whether a
    /// row was removed.
    pub fn remove(&self, index_key: impl Into<IK>) -> IsoDbResult<bool> {
        let Some(encoded) = self.read.source_key(&index_key.into())? else {
            return Ok(false);
        };
        let key = K::decode(&encoded)?;
        self.source_table().remove_encoded(&key, &encoded)
    }

    /// Removes the source rows of every index entry in the range.
    pub fn remove_range(&self, range: &KeyRange<IK>) -> IsoDbResult<()> {
        let mut source_keys = Vec::new();
        self.read.scan_resolved(range, |_, fk, _| {
            source_keys.push(fk.to_vec());
            Ok(ScanControl::Continue)
        })?;
        let table = self.source_table();
        for encoded in source_keys {
            let key = K::decode(&encoded)?;
            table.remove_encoded(&key, &encoded)?;
        }
        Ok(())
    }
}
