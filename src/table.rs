//! Typed tables.
//!
//! A [`ReadTable`] encodes keys, translates ranges and decodes rows on top
//! of one engine namespace. A [`Table`] adds the write path, which keeps
//! every declared index in step with the rows it derives from.
//!
//! Range reads work the same on every engine. When an engine lacks
//! exclusive bounds, the range is widened to inclusive bounds and rows
//! outside the original range are filtered out here; when it cannot walk
//! backwards, rows are collected forwards and replayed in reverse. The
//! `limit` is always counted here rather than by the engine.

use crate::backend::{EngineTransaction, ScanControl, StorageEngine};
use crate::codec::{terminated, type_label, Encodable, KeyKind, TableKey};
use crate::error::{IsoDbError, IsoDbResult, SchemaError};
use crate::index::{Index, ReadIndex};
use crate::range::{Direction, KeyRange, NativeRange};
use crate::schema::{index_namespace, IndexDef, TableDef, META_NAMESPACE};
use crate::transaction::TxnContext;
use log::trace;
use std::ops::Deref;
use std::sync::Arc;

/// The row handed to an `iterate` visitor.
///
/// `fkey` carries the source table key when iterating an index and is `()`
/// for plain tables.
#[derive(Debug)]
pub struct Cursor<K, V, F = ()> {
    pub key: K,
    pub value: V,
    pub fkey: F,
    stopped: bool,
}

impl<K, V, F> Cursor<K, V, F> {
    pub(crate) fn new(key: K, value: V, fkey: F) -> Self {
        Self {
            key,
            value,
            fkey,
            stopped: false,
        }
    }

    /// Ends the iteration after the current row.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn control(&self) -> ScanControl {
        if self.stopped {
            ScanControl::Stop
        } else {
            ScanControl::Continue
        }
    }
}

/// A decoded row returned by `get_entries`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<K, V, F = ()> {
    pub key: K,
    pub value: V,
    pub fkey: F,
}

/// Scans `namespace` over `range`, emulating what the engine lacks.
///
/// `K` is the key type stored in the namespace; it decides how exclusive
/// bounds are made inclusive.
pub(crate) fn scan_namespace<E, K, F>(
    ctx: &TxnContext<'_, E>,
    namespace: &str,
    range: &NativeRange,
    mut visit: F,
) -> IsoDbResult<()>
where
    E: StorageEngine,
    K: TableKey,
    F: FnMut(&[u8], &[u8]) -> IsoDbResult<ScanControl>,
{
    if range.is_empty() || range.limit == Some(0) {
        return Ok(());
    }

    let needs_filter =
        !ctx.caps.exclusive_bounds && (range.lower_exclusive || range.upper_exclusive);
    let mut engine_range = if needs_filter {
        range.clone().into_inclusive::<K>()
    } else {
        range.clone()
    };
    engine_range.limit = None;
    if engine_range.is_empty() {
        return Ok(());
    }

    let limit = range.limit.map(|n| n as usize);
    let mut visited = 0usize;
    let mut emit = |key: &[u8], value: &[u8]| -> IsoDbResult<ScanControl> {
        if needs_filter && !range.contains(key) {
            return Ok(ScanControl::Continue);
        }
        visited += 1;
        let control = visit(key, value)?;
        if limit.is_some_and(|n| visited >= n) {
            return Ok(ScanControl::Stop);
        }
        Ok(control)
    };

    if range.direction == Direction::Reverse && !ctx.caps.native_reverse {
        engine_range.direction = Direction::Forward;
        let mut rows = Vec::new();
        ctx.txn.with(|txn| {
            txn.scan(namespace, &engine_range, &mut |key, value| {
                rows.push((key.to_vec(), value.to_vec()));
                Ok(ScanControl::Continue)
            })
        })?;
        for (key, value) in rows.iter().rev() {
            if emit(key.as_slice(), value.as_slice())? == ScanControl::Stop {
                break;
            }
        }
        return Ok(());
    }

    ctx.txn
        .with(|txn| txn.scan(namespace, &engine_range, &mut emit))
}

/// Read access to a table.
pub struct ReadTable<'t, E: StorageEngine, K, V> {
    pub(crate) ctx: TxnContext<'t, E>,
    pub(crate) def: Arc<TableDef<K, V>>,
}

impl<E: StorageEngine, K, V> Clone for ReadTable<'_, E, K, V> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx,
            def: Arc::clone(&self.def),
        }
    }
}

impl<'t, E: StorageEngine, K: TableKey, V: Encodable> ReadTable<'t, E, K, V> {
    pub(crate) fn new(ctx: TxnContext<'t, E>, def: Arc<TableDef<K, V>>) -> Self {
        Self { ctx, def }
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub(crate) fn get_raw(&self, key: &[u8]) -> IsoDbResult<Option<Vec<u8>>> {
        self.ctx.txn.with(|txn| txn.get(self.name(), key))
    }

    pub(crate) fn scan_raw<F>(&self, range: &KeyRange<K>, visit: F) -> IsoDbResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> IsoDbResult<ScanControl>,
    {
        let native = range.to_native()?;
        scan_namespace::<E, K, _>(&self.ctx, self.name(), &native, visit)
    }

    /// Looks up one row. A missing row is `Ok(None)`.
    pub fn get(&self, key: impl Into<K>) -> IsoDbResult<Option<V>> {
        let key = key.into().encode()?;
        self.get_raw(&key)?.map(|bytes| V::decode(&bytes)).transpose()
    }

    pub fn contains(&self, key: impl Into<K>) -> IsoDbResult<bool> {
        let key = key.into().encode()?;
        Ok(self.get_raw(&key)?.is_some())
    }

    pub fn get_keys(&self, range: &KeyRange<K>) -> IsoDbResult<Vec<K>> {
        let mut keys = Vec::new();
        self.scan_raw(range, |key, _| {
            keys.push(K::decode(key)?);
            Ok(ScanControl::Continue)
        })?;
        Ok(keys)
    }

    pub fn get_values(&self, range: &KeyRange<K>) -> IsoDbResult<Vec<V>> {
        let mut values = Vec::new();
        self.scan_raw(range, |_, value| {
            values.push(V::decode(value)?);
            Ok(ScanControl::Continue)
        })?;
        Ok(values)
    }

    pub fn get_entries(&self, range: &KeyRange<K>) -> IsoDbResult<Vec<Entry<K, V>>> {
        let mut entries = Vec::new();
        self.scan_raw(range, |key, value| {
            entries.push(Entry {
                key: K::decode(key)?,
                value: V::decode(value)?,
                fkey: (),
            });
            Ok(ScanControl::Continue)
        })?;
        Ok(entries)
    }

    /// Visits every row of the range in order, decoding each one as it is
    /// reached.
    ///
    /// The visitor may read or write through the same transaction,
    /// including the table being iterated.
    pub fn iterate<F>(&self, range: &KeyRange<K>, mut visit: F) -> IsoDbResult<()>
    where
        F: FnMut(&mut Cursor<K, V>) -> IsoDbResult<()>,
    {
        self.scan_raw(range, |key, value| {
            let mut cursor = Cursor::new(K::decode(key)?, V::decode(value)?, ());
            visit(&mut cursor)?;
            Ok(cursor.control())
        })
    }

    pub fn count(&self, range: &KeyRange<K>) -> IsoDbResult<u64> {
        let mut count = 0;
        self.scan_raw(range, |_, _| {
            count += 1;
            Ok(ScanControl::Continue)
        })?;
        Ok(count)
    }

    /// The largest key in the table.
    pub fn get_last_key(&self) -> IsoDbResult<Option<K>> {
        let range = KeyRange::builder().reverse(true).limit(1).build();
        Ok(self.get_keys(&range)?.pop())
    }

    /// Read access to a declared index whose keys are `IK`.
    pub fn index<IK: TableKey>(&self, name: &str) -> IsoDbResult<ReadIndex<'t, E, IK, K, V>> {
        ReadIndex::new(self.clone(), name)
    }

    pub(crate) fn index_def(&self, name: &str) -> IsoDbResult<&IndexDef<K, V>> {
        self.def.index(name)
    }
}

/// Read-write access to a table.
///
/// Dereferences to [`ReadTable`] for the read operations.
pub struct Table<'t, E: StorageEngine, K, V> {
    read: ReadTable<'t, E, K, V>,
}

impl<'t, E: StorageEngine, K, V> Deref for Table<'t, E, K, V> {
    type Target = ReadTable<'t, E, K, V>;

    fn deref(&self) -> &Self::Target {
        &self.read
    }
}

impl<'t, E: StorageEngine, K: TableKey, V: Encodable> Table<'t, E, K, V> {
    pub(crate) fn new(read: ReadTable<'t, E, K, V>) -> Self {
        Self { read }
    }

    fn with_txn<R>(&self, f: impl FnOnce(&E::Txn) -> IsoDbResult<R>) -> IsoDbResult<R> {
        self.read.ctx.txn.with(f)
    }

    /// Writes a row, replacing any previous value under the same key.
    ///
    /// Index entries derived from the previous value are removed when the
    /// new value maps to a different index key.
    pub fn set(&self, key: impl Into<K>, value: &V) -> IsoDbResult<()> {
        let key = key.into();
        let encoded_key = key.encode()?;
        let encoded_value = value.encode()?;
        let indexes = self.def.indexes();

        let previous = if indexes.is_empty() {
            None
        } else {
            self.get_raw(&encoded_key)?
                .map(|bytes| V::decode(&bytes))
                .transpose()?
        };

        for index in indexes {
            let namespace = index_namespace(self.name(), index.name());
            let index_key = index.map(&key, value)?;
            if let Some(previous) = &previous {
                if let Some(stale) = index.map(&key, previous)? {
                    if index_key.as_ref() != Some(&stale) {
                        self.unlink(&namespace, &stale, &encoded_key)?;
                    }
                }
            }
            if let Some(index_key) = index_key {
                trace!("Table {}: index {} -> {:?}", self.name(), namespace, key);
                self.with_txn(|txn| txn.put(&namespace, &index_key, &encoded_key))?;
            }
        }

        if K::KIND == KeyKind::Auto {
            self.observe_sequence(&key)?;
        }
        self.with_txn(|txn| txn.put(self.name(), &encoded_key, &encoded_value))
    }

    /// Stores `value` under the next `AutoKey` and returns that key.
    ///
    /// Keys start at 1 and are never handed out twice, even after the rows
    /// holding them were removed.
    ///
    /// ## Errors
    ///
    /// `SchemaError::NotAutoKey` unless the table is keyed by `AutoKey`,
    /// `IsoDbError::KeySpaceExhausted` once the counter reaches `u32::MAX`.
    pub fn add(&self, value: &V) -> IsoDbResult<K> {
        let not_auto = || SchemaError::NotAutoKey {
            table: self.name().to_string(),
            key_type: type_label::<K>(),
        };
        if K::KIND != KeyKind::Auto {
            return Err(not_auto().into());
        }

        let high_water = self.high_water()?;
        let last = self
            .get_last_key()?
            .and_then(|key| key.sequence())
            .unwrap_or(0);
        let next = high_water
            .max(last)
            .checked_add(1)
            .ok_or_else(|| IsoDbError::KeySpaceExhausted(self.name().to_string()))?;
        let key = K::from_sequence(next).ok_or_else(not_auto)?;

        self.set(key.clone(), value)?;
        Ok(key)
    }

    fn high_water(&self) -> IsoDbResult<u32> {
        let meta_key = terminated::encode(self.name().as_bytes());
        match self.with_txn(|txn| txn.get(META_NAMESPACE, &meta_key))? {
            Some(bytes) => Ok(u32::from_be_bytes(bytes.as_slice().try_into().map_err(|_| {
                IsoDbError::Codec(format!("corrupt key counter for table {}", self.name()))
            })?)),
            None => Ok(0),
        }
    }

    /// Raises the `AutoKey` counter to `key` so a removed row's key is not
    /// handed out again by `add`.
    fn observe_sequence(&self, key: &K) -> IsoDbResult<()> {
        let Some(seq) = key.sequence() else {
            return Ok(());
        };
        if seq <= self.high_water()? {
            return Ok(());
        }
        let meta_key = terminated::encode(self.name().as_bytes());
        self.with_txn(|txn| txn.put(META_NAMESPACE, &meta_key, &seq.to_be_bytes()))
    }

    /// Deletes a row and its index entries. Returns whether the row existed.
    pub fn remove(&self, key: impl Into<K>) -> IsoDbResult<bool> {
        let key = key.into();
        let encoded_key = key.encode()?;
        self.remove_encoded(&key, &encoded_key)
    }

    pub(crate) fn remove_encoded(&self, key: &K, encoded_key: &[u8]) -> IsoDbResult<bool> {
        let indexes = self.def.indexes();
        if indexes.is_empty() {
            return self.with_txn(|txn| txn.delete(self.name(), encoded_key));
        }

        // index keys derive from the old value, so it is read before the delete
        let Some(previous) = self.get_raw(encoded_key)? else {
            return Ok(false);
        };
        let previous = V::decode(&previous)?;
        for index in indexes {
            if let Some(index_key) = index.map(key, &previous)? {
                let namespace = index_namespace(self.name(), index.name());
                self.unlink(&namespace, &index_key, encoded_key)?;
            }
        }
        self.with_txn(|txn| txn.delete(self.name(), encoded_key))
    }

    /// Drops an index entry if it still points at `source_key`.
    fn unlink(&self, namespace: &str, index_key: &[u8], source_key: &[u8]) -> IsoDbResult<()> {
        self.with_txn(|txn| {
            if txn.get(namespace, index_key)?.as_deref() == Some(source_key) {
                trace!("Table {}: unlink {}", self.name(), namespace);
                txn.delete(namespace, index_key)?;
            }
            Ok(())
        })
    }

    /// Deletes every row in the range together with its index entries.
    ///
    /// A range with no bounds, prefix or limit clears the table and all of
    /// its indexes at once.
    pub fn remove_range(&self, range: &KeyRange<K>) -> IsoDbResult<()> {
        if range.is_unbounded() {
            return self.clear();
        }

        let native = range.to_native()?;
        if self.def.indexes().is_empty()
            && native.limit.is_none()
            && self.ctx.caps.exclusive_bounds
        {
            if native.is_empty() {
                return Ok(());
            }
            let removed = self.with_txn(|txn| txn.delete_range(self.name(), &native))?;
            trace!("Table {}: removed {} rows", self.name(), removed);
            return Ok(());
        }

        let mut keys = Vec::new();
        self.scan_raw(range, |key, _| {
            keys.push(key.to_vec());
            Ok(ScanControl::Continue)
        })?;
        for encoded_key in keys {
            let key = K::decode(&encoded_key)?;
            self.remove_encoded(&key, &encoded_key)?;
        }
        Ok(())
    }

    /// Removes every row and index entry. The `AutoKey` counter is kept.
    pub fn clear(&self) -> IsoDbResult<()> {
        self.with_txn(|txn| {
            txn.clear(self.name())?;
            for namespace in self.def.index_namespaces() {
                txn.clear(&namespace)?;
            }
            Ok(())
        })
    }

    /// Read-write access to a declared index whose keys are `IK`.
    pub fn index<IK: TableKey>(&self, name: &str) -> IsoDbResult<Index<'t, E, IK, K, V>> {
        Ok(Index::new(ReadIndex::new(self.read.clone(), name)?))
    }
}
