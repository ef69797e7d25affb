//! Transactions for the sled engine.
//!
//! Reads go straight to the trees. A write transaction keeps its changes in
//! a per-namespace overlay that every read of the same transaction consults
//! first; nothing reaches sled until commit, which applies one batch per
//! touched tree inside a single multi-tree sled transaction.

use crate::backend::{batched_scan, EngineTransaction, Rows, ScanVisitor};
use crate::error::{IsoDbError, IsoDbResult};
use crate::range::{Direction, NativeRange};
use log::{debug, trace};
use sled::transaction::{TransactionError, TransactionResult};
use sled::{IVec, Transactional};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Instant;

/// Uncommitted changes to one namespace.
#[derive(Default)]
struct PendingNamespace {
    /// Every committed key is gone unless rewritten in `writes`
    cleared: bool,
    /// `None` marks a deletion
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

enum Mode {
    Read,
    Write { sync: bool },
}

pub struct SledTransaction {
    db: sled::Db,
    mode: Mode,
    pending: RefCell<BTreeMap<String, PendingNamespace>>,
}

impl SledTransaction {
    pub(crate) fn read(db: sled::Db) -> Self {
        Self {
            db,
            mode: Mode::Read,
            pending: RefCell::default(),
        }
    }

    pub(crate) fn write(db: sled::Db, sync: bool) -> Self {
        Self {
            db,
            mode: Mode::Write { sync },
            pending: RefCell::default(),
        }
    }

    fn writable(&self) -> IsoDbResult<()> {
        match self.mode {
            Mode::Read => Err(IsoDbError::ReadOnly),
            Mode::Write { .. } => Ok(()),
        }
    }

    fn fetch(
        &self,
        namespace: &str,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        direction: Direction,
        limit: usize,
    ) -> IsoDbResult<Rows> {
        let tree = self.db.open_tree(namespace)?;
        let pending = self.pending.borrow();
        let overlay = pending.get(namespace);

        let committed: Box<dyn Iterator<Item = sled::Result<(IVec, IVec)>> + '_> =
            match (overlay.is_some_and(|ns| ns.cleared), direction) {
                (true, _) => Box::new(std::iter::empty()),
                (false, Direction::Forward) => Box::new(tree.range::<&[u8], _>((lower, upper))),
                (false, Direction::Reverse) => {
                    Box::new(tree.range::<&[u8], _>((lower, upper)).rev())
                }
            };
        let writes: Box<dyn Iterator<Item = (&Vec<u8>, &Option<Vec<u8>>)> + '_> =
            match (overlay, direction) {
                (None, _) => Box::new(std::iter::empty()),
                (Some(ns), Direction::Forward) => {
                    Box::new(ns.writes.range::<[u8], _>((lower, upper)))
                }
                (Some(ns), Direction::Reverse) => {
                    Box::new(ns.writes.range::<[u8], _>((lower, upper)).rev())
                }
            };
        merge_rows(committed, writes, direction, limit)
    }
}

fn next_committed(
    rows: &mut dyn Iterator<Item = sled::Result<(IVec, IVec)>>,
) -> IsoDbResult<Option<(Vec<u8>, Vec<u8>)>> {
    match rows.next() {
        Some(row) => {
            let (key, value) = row?;
            Ok(Some((key.to_vec(), value.to_vec())))
        }
        None => Ok(None),
    }
}

/// Merges committed rows with overlay writes, both already walking in
/// `direction`. On equal keys the overlay wins.
fn merge_rows<'a>(
    mut committed: Box<dyn Iterator<Item = sled::Result<(IVec, IVec)>> + '_>,
    mut writes: Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Option<Vec<u8>>)> + 'a>,
    direction: Direction,
    limit: usize,
) -> IsoDbResult<Rows> {
    let first = |a: &[u8], b: &[u8]| match direction {
        Direction::Forward => a < b,
        Direction::Reverse => a > b,
    };

    let mut rows = Vec::new();
    let mut committed_head = next_committed(&mut committed)?;
    let mut write_head = writes.next();
    while rows.len() < limit {
        match (committed_head.take(), write_head) {
            (None, None) => break,
            (Some(row), None) => {
                rows.push(row);
                committed_head = next_committed(&mut committed)?;
            }
            (None, Some((key, value))) => {
                if let Some(value) = value {
                    rows.push((key.clone(), value.clone()));
                }
                write_head = writes.next();
            }
            (Some(row), Some((key, value))) => {
                if row.0 == *key {
                    if let Some(value) = value {
                        rows.push((key.clone(), value.clone()));
                    }
                    committed_head = next_committed(&mut committed)?;
                    write_head = writes.next();
                } else if first(&row.0, key) {
                    rows.push(row);
                    committed_head = next_committed(&mut committed)?;
                } else {
                    if let Some(value) = value {
                        rows.push((key.clone(), value.clone()));
                    }
                    committed_head = Some(row);
                    write_head = writes.next();
                }
            }
        }
    }
    Ok(rows)
}

impl EngineTransaction for SledTransaction {
    fn is_read_only(&self) -> bool {
        matches!(self.mode, Mode::Read)
    }

    fn get(&self, namespace: &str, key: &[u8]) -> IsoDbResult<Option<Vec<u8>>> {
        if let Some(ns) = self.pending.borrow().get(namespace) {
            if let Some(write) = ns.writes.get(key) {
                return Ok(write.clone());
            }
            if ns.cleared {
                return Ok(None);
            }
        }
        let tree = self.db.open_tree(namespace)?;
        Ok(tree.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> IsoDbResult<()> {
        self.writable()?;
        self.pending
            .borrow_mut()
            .entry(namespace.to_string())
            .or_default()
            .writes
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> IsoDbResult<bool> {
        self.writable()?;
        let existed = self.get(namespace, key)?.is_some();
        self.pending
            .borrow_mut()
            .entry(namespace.to_string())
            .or_default()
            .writes
            .insert(key.to_vec(), None);
        Ok(existed)
    }

    fn clear(&self, namespace: &str) -> IsoDbResult<()> {
        self.writable()?;
        let mut pending = self.pending.borrow_mut();
        let ns = pending.entry(namespace.to_string()).or_default();
        ns.cleared = true;
        ns.writes.clear();
        Ok(())
    }

    fn scan(
        &self,
        namespace: &str,
        range: &NativeRange,
        visit: &mut ScanVisitor<'_>,
    ) -> IsoDbResult<()> {
        batched_scan(
            range,
            |lower, upper, direction, limit| self.fetch(namespace, lower, upper, direction, limit),
            visit,
        )
    }

    fn commit(self) -> IsoDbResult<()> {
        let Mode::Write { sync } = self.mode else {
            return Ok(());
        };
        let start = Instant::now();
        let pending = self.pending.into_inner();
        if pending.is_empty() {
            return Ok(());
        }

        let mut trees = Vec::with_capacity(pending.len());
        let mut batches = Vec::with_capacity(pending.len());
        for (name, ns) in pending {
            let tree = self.db.open_tree(&name)?;
            let mut batch = sled::Batch::default();
            if ns.cleared {
                for key in tree.iter().keys() {
                    let key = key?;
                    if !ns.writes.contains_key(&key[..]) {
                        batch.remove(key);
                    }
                }
            }
            let mut writes = 0usize;
            for (key, value) in ns.writes {
                match value {
                    Some(value) => batch.insert(key, value),
                    None => batch.remove(key),
                }
                writes += 1;
            }
            trace!("SledTransaction: {} writes to {} (cleared: {})", writes, name, ns.cleared);
            trees.push(tree);
            batches.push(batch);
        }

        let result: TransactionResult<(), ()> = trees.as_slice().transaction(|tx_trees| {
            for (tree, batch) in tx_trees.iter().zip(&batches) {
                tree.apply_batch(batch)?;
            }
            Ok(())
        });
        match result {
            Ok(()) => {}
            Err(TransactionError::Storage(e)) => return Err(e.into()),
            // the closure never aborts
            Err(TransactionError::Abort(())) => return Err(IsoDbError::TransactionClosed),
        }

        if sync {
            self.db.flush()?;
        }
        debug!("SledTransaction: Committed in {:?}", start.elapsed());
        Ok(())
    }

    fn rollback(self) -> IsoDbResult<()> {
        if !self.pending.borrow().is_empty() {
            debug!("SledTransaction: Rolled back");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ScanControl, StorageEngine};
    use crate::codec::KeyKind;
    use crate::databases::sled_store::SledStore;

    fn collect(txn: &SledTransaction, range: &NativeRange) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        txn.scan("t", range, &mut |k, v| {
            out.push((k.to_vec(), v.to_vec()));
            Ok(ScanControl::Continue)
        })
        .unwrap();
        out
    }

    fn seeded() -> SledStore {
        let store = SledStore::temporary().unwrap();
        store.open_namespace("t", KeyKind::Binary).unwrap();
        let txn = store.begin_write().unwrap();
        for i in [1u8, 3, 5, 7] {
            txn.put("t", &[i], &[i]).unwrap();
        }
        txn.commit().unwrap();
        store
    }

    #[test]
    fn test_overlay_merges_with_committed_rows() {
        let store = seeded();
        let txn = store.begin_write().unwrap();
        txn.put("t", &[2], b"new").unwrap();
        txn.put("t", &[3], b"replaced").unwrap();
        assert!(txn.delete("t", &[5]).unwrap());
        assert!(!txn.delete("t", &[6]).unwrap());

        let rows = collect(&txn, &NativeRange::full());
        let keys: Vec<u8> = rows.iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![1, 2, 3, 7]);
        assert_eq!(rows[2].1, b"replaced".to_vec());

        let reverse = NativeRange {
            direction: Direction::Reverse,
            ..NativeRange::full()
        };
        let keys: Vec<u8> = collect(&txn, &reverse).iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![7, 3, 2, 1]);

        // nothing is visible outside the transaction until commit
        let reader = store.begin_read().unwrap();
        assert_eq!(reader.get("t", &[2]).unwrap(), None);
        txn.commit().unwrap();
        assert_eq!(reader.get("t", &[2]).unwrap(), Some(b"new".to_vec()));
        assert_eq!(reader.get("t", &[5]).unwrap(), None);
    }

    #[test]
    fn test_clear_then_write() {
        let store = seeded();
        let txn = store.begin_write().unwrap();
        txn.clear("t").unwrap();
        txn.put("t", &[9], &[9]).unwrap();
        assert_eq!(txn.get("t", &[1]).unwrap(), None);
        assert_eq!(collect(&txn, &NativeRange::full()).len(), 1);
        txn.commit().unwrap();

        let reader = store.begin_read().unwrap();
        assert_eq!(collect(&reader, &NativeRange::full()), vec![(vec![9], vec![9])]);
    }

    #[test]
    fn test_rollback_leaves_trees_untouched() {
        let store = seeded();
        let txn = store.begin_write().unwrap();
        txn.clear("t").unwrap();
        txn.rollback().unwrap();
        assert_eq!(collect(&store.begin_read().unwrap(), &NativeRange::full()).len(), 4);
    }

    #[test]
    fn test_read_transaction_rejects_writes() {
        let store = seeded();
        let reader = store.begin_read().unwrap();
        assert!(matches!(reader.put("t", &[0], &[0]), Err(IsoDbError::ReadOnly)));
        assert!(matches!(reader.clear("t"), Err(IsoDbError::ReadOnly)));
    }
}
