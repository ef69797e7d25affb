//! In-memory storage engine.
//!
//! Namespaces are ordered maps shared behind `Arc`. Read transactions hold
//! a snapshot of the committed maps; a write transaction copies a namespace
//! the first time it writes to it and publishes its copies on commit. The
//! engine does not serialize writers itself: two overlapping write
//! transactions would each publish their own view, which is why the
//! database admits one writer at a time.

use crate::backend::{
    batched_scan, take_rows, EngineCapabilities, EngineTransaction, Rows, ScanVisitor,
    StorageEngine,
};
use crate::codec::KeyKind;
use crate::config::MemoryConfig;
use crate::error::{IsoDbError, IsoDbResult};
use crate::range::{Direction, NativeRange};
use log::debug;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

type Namespace = BTreeMap<Vec<u8>, Vec<u8>>;
type Namespaces = BTreeMap<String, Arc<Namespace>>;

/// Volatile engine for tests and caches.
#[derive(Clone, Default)]
pub struct MemoryStore {
    committed: Arc<RwLock<Arc<Namespaces>>>,
    config: MemoryConfig,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        debug!("MemoryStore: Created with {:?}", config);
        Self {
            committed: Arc::default(),
            config,
        }
    }

    /// Number of rows committed to a namespace.
    pub fn len(&self, namespace: &str) -> usize {
        self.committed
            .read()
            .get(namespace)
            .map_or(0, |ns| ns.len())
    }
}

impl StorageEngine for MemoryStore {
    type Txn = MemoryTransaction;

    const NAME: &'static str = "isodb-memory";

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            exclusive_bounds: self.config.exclusive_bounds,
            native_reverse: self.config.native_reverse,
            concurrent_readers: self.config.concurrent_readers,
        }
    }

    fn open_namespace(&self, name: &str, ordering: KeyKind) -> IsoDbResult<()> {
        let mut committed = self.committed.write();
        Arc::make_mut(&mut *committed)
            .entry(name.to_string())
            .or_default();
        debug!("MemoryStore: Opened namespace {} ({})", name, ordering);
        Ok(())
    }

    fn begin_read(&self) -> IsoDbResult<MemoryTransaction> {
        Ok(MemoryTransaction::Read(Arc::clone(&*self.committed.read())))
    }

    fn begin_write(&self) -> IsoDbResult<MemoryTransaction> {
        let snapshot = Arc::clone(&*self.committed.read());
        Ok(MemoryTransaction::Write {
            committed: Arc::clone(&self.committed),
            working: RefCell::new((*snapshot).clone()),
        })
    }
}

pub enum MemoryTransaction {
    Read(Arc<Namespaces>),
    Write {
        committed: Arc<RwLock<Arc<Namespaces>>>,
        working: RefCell<Namespaces>,
    },
}

impl MemoryTransaction {
    fn with_namespace<R>(&self, namespace: &str, f: impl FnOnce(Option<&Namespace>) -> R) -> R {
        match self {
            MemoryTransaction::Read(snapshot) => f(snapshot.get(namespace).map(|ns| &**ns)),
            MemoryTransaction::Write { working, .. } => {
                let working = working.borrow();
                f(working.get(namespace).map(|ns| &**ns))
            }
        }
    }

    fn with_namespace_mut<R>(
        &self,
        namespace: &str,
        f: impl FnOnce(&mut Namespace) -> R,
    ) -> IsoDbResult<R> {
        match self {
            MemoryTransaction::Read(_) => Err(IsoDbError::ReadOnly),
            MemoryTransaction::Write { working, .. } => {
                let mut working = working.borrow_mut();
                let ns = working.entry(namespace.to_string()).or_default();
                Ok(f(Arc::make_mut(ns)))
            }
        }
    }
}

fn fetch_rows(
    ns: Option<&Namespace>,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    direction: Direction,
    limit: usize,
) -> IsoDbResult<Rows> {
    let Some(ns) = ns else {
        return Ok(Vec::new());
    };
    let rows = ns
        .range::<[u8], _>((lower, upper))
        .map(|(k, v)| Ok((k.clone(), v.clone())));
    match direction {
        Direction::Forward => take_rows(rows, limit),
        Direction::Reverse => take_rows(rows.rev(), limit),
    }
}

impl EngineTransaction for MemoryTransaction {
    fn is_read_only(&self) -> bool {
        matches!(self, MemoryTransaction::Read(_))
    }

    fn get(&self, namespace: &str, key: &[u8]) -> IsoDbResult<Option<Vec<u8>>> {
        Ok(self.with_namespace(namespace, |ns| ns.and_then(|ns| ns.get(key).cloned())))
    }

    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> IsoDbResult<()> {
        self.with_namespace_mut(namespace, |ns| {
            ns.insert(key.to_vec(), value.to_vec());
        })
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> IsoDbResult<bool> {
        self.with_namespace_mut(namespace, |ns| ns.remove(key).is_some())
    }

    fn clear(&self, namespace: &str) -> IsoDbResult<()> {
        self.with_namespace_mut(namespace, |ns| ns.clear())
    }

    fn scan(
        &self,
        namespace: &str,
        range: &NativeRange,
        visit: &mut ScanVisitor<'_>,
    ) -> IsoDbResult<()> {
        batched_scan(
            range,
            |lower, upper, direction, limit| {
                self.with_namespace(namespace, |ns| fetch_rows(ns, lower, upper, direction, limit))
            },
            visit,
        )
    }

    fn commit(self) -> IsoDbResult<()> {
        if let MemoryTransaction::Write { committed, working } = self {
            *committed.write() = Arc::new(working.into_inner());
        }
        Ok(())
    }

    fn rollback(self) -> IsoDbResult<()> {
        Ok(())
    }
}
