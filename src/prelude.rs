//! Prelude module for convenient imports.
//!
//! ```rust
//! use isodb::prelude::*;
//! ```

pub use crate::backend::{EngineCapabilities, EngineTransaction, StorageEngine};
pub use crate::codec::{
    AnyValue, AutoKey, BinaryKey, Bincode, Encodable, KeyKind, StringKey, TableKey, Uint32Key,
};
pub use crate::config::{FileConfig, MemoryConfig};
pub use crate::database::{delete_db, open_db, Database};
pub use crate::databases::memory_store::MemoryStore;
pub use crate::error::{IsoDbError, IsoDbResult, SchemaError};
pub use crate::index::{Index, ReadIndex};
pub use crate::object_store::{ObjectStore, ReadObjectStore};
pub use crate::range::{Direction, KeyRange};
pub use crate::schema::{DbDef, IndexDef, ObjectDef, TableDef};
pub use crate::table::{Cursor, Entry, ReadTable, Table};
pub use crate::transaction::{ReadTransaction, Transaction};

#[cfg(feature = "redb")]
pub use crate::databases::redb_store::RedbStore;
#[cfg(feature = "sled")]
pub use crate::databases::sled_store::SledStore;
