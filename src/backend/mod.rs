//! Storage engine abstraction.
//!
//! These traits are the whole contract between the table layer and a
//! storage engine: ordered byte namespaces with point get/put/delete,
//! bounded scans in either direction, and a transaction boundary. The
//! engine never sees typed keys, indexes or object stores.
//!
//! Engine transactions take `&self` for every operation so that a scan
//! visitor can read and write through the same transaction while the scan
//! is in progress.

use crate::codec::KeyKind;
use crate::error::IsoDbResult;
use crate::range::{bounds_empty, Direction, NativeRange};
use std::ops::Bound;

/// Whether a scan should keep going after the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// Row visitor handed to [`EngineTransaction::scan`].
pub type ScanVisitor<'a> = dyn FnMut(&[u8], &[u8]) -> IsoDbResult<ScanControl> + 'a;

/// Features an engine provides natively. The table layer emulates any that
/// are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCapabilities {
    /// Range scans honour exclusive bounds.
    pub exclusive_bounds: bool,
    /// Range scans can walk backwards.
    pub native_reverse: bool,
    /// Read transactions are isolated from, and can run alongside, a writer.
    pub concurrent_readers: bool,
}

impl Default for EngineCapabilities {
    fn default() -> Self {
        Self {
            exclusive_bounds: true,
            native_reverse: true,
            concurrent_readers: true,
        }
    }
}

/// A storage engine holding named, ordered byte namespaces.
pub trait StorageEngine: Send + Sync + 'static {
    type Txn: EngineTransaction;

    /// Engine name, e.g. `"isodb-redb"`.
    const NAME: &'static str;

    fn capabilities(&self) -> EngineCapabilities;

    /// Creates the namespace if it does not exist yet.
    fn open_namespace(&self, name: &str, ordering: KeyKind) -> IsoDbResult<()>;

    fn begin_read(&self) -> IsoDbResult<Self::Txn>;

    fn begin_write(&self) -> IsoDbResult<Self::Txn>;

    /// Forces committed data to durable storage.
    fn flush(&self) -> IsoDbResult<()> {
        Ok(())
    }

    fn close(self) -> IsoDbResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// A read or write transaction on a [`StorageEngine`].
///
/// Writes on a read transaction fail with `IsoDbError::ReadOnly`. Scans are
/// never called with an empty or inverted range, and the caller enforces
/// `NativeRange::limit` itself.
pub trait EngineTransaction: Send {
    fn is_read_only(&self) -> bool;

    fn get(&self, namespace: &str, key: &[u8]) -> IsoDbResult<Option<Vec<u8>>>;

    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> IsoDbResult<()>;

    /// Returns whether the key existed.
    fn delete(&self, namespace: &str, key: &[u8]) -> IsoDbResult<bool>;

    /// Deletes every key in the range and returns how many were removed.
    fn delete_range(&self, namespace: &str, range: &NativeRange) -> IsoDbResult<u64> {
        let mut keys = Vec::new();
        self.scan(namespace, range, &mut |key, _| {
            keys.push(key.to_vec());
            Ok(ScanControl::Continue)
        })?;
        let mut removed = 0;
        for key in keys {
            if self.delete(namespace, &key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Removes every key of the namespace.
    fn clear(&self, namespace: &str) -> IsoDbResult<()>;

    fn scan(
        &self,
        namespace: &str,
        range: &NativeRange,
        visit: &mut ScanVisitor<'_>,
    ) -> IsoDbResult<()>;

    fn commit(self) -> IsoDbResult<()>;

    fn rollback(self) -> IsoDbResult<()>;
}

/// Rows fetched per step by [`batched_scan`].
pub(crate) const SCAN_BATCH: usize = 256;

/// A batch of owned rows, in scan order.
pub(crate) type Rows = Vec<(Vec<u8>, Vec<u8>)>;

/// Drives a scan by fetching bounded batches and re-seeking past the last
/// row of each one.
///
/// No engine borrow is held while the visitor runs, so the visitor may
/// write to the namespace being scanned.
pub(crate) fn batched_scan<F>(
    range: &NativeRange,
    mut fetch: F,
    visit: &mut ScanVisitor<'_>,
) -> IsoDbResult<()>
where
    F: FnMut(Bound<&[u8]>, Bound<&[u8]>, Direction, usize) -> IsoDbResult<Rows>,
{
    let (lower, upper) = range.bounds();
    let mut lower = owned(lower);
    let mut upper = owned(upper);
    loop {
        if bounds_empty(borrowed(&lower), borrowed(&upper)) {
            return Ok(());
        }
        let rows = fetch(borrowed(&lower), borrowed(&upper), range.direction, SCAN_BATCH)?;
        let exhausted = rows.len() < SCAN_BATCH;
        let mut last = None;
        for (key, value) in rows {
            if visit(&key, &value)? == ScanControl::Stop {
                return Ok(());
            }
            last = Some(key);
        }
        match last {
            Some(key) if !exhausted => match range.direction {
                Direction::Forward => lower = Bound::Excluded(key),
                Direction::Reverse => upper = Bound::Excluded(key),
            },
            _ => return Ok(()),
        }
    }
}

fn owned(bound: Bound<&[u8]>) -> Bound<Vec<u8>> {
    match bound {
        Bound::Included(b) => Bound::Included(b.to_vec()),
        Bound::Excluded(b) => Bound::Excluded(b.to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn borrowed(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(b) => Bound::Included(b.as_slice()),
        Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Collects up to `limit` rows from an iterator that already walks in the
/// requested direction.
pub(crate) fn take_rows<I, E>(rows: I, limit: usize) -> Result<Rows, E>
where
    I: Iterator<Item = Result<(Vec<u8>, Vec<u8>), E>>,
{
    rows.take(limit).collect()
}
