// Common test utilities and helpers

#![allow(dead_code)]

use isodb::prelude::*;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
pub struct User {
    pub name: String,
    pub email: Option<String>,
    pub age: u32,
}

pub type UserRow = Bincode<User>;

pub fn user(name: &str, email: Option<&str>, age: u32) -> UserRow {
    Bincode(User {
        name: name.to_string(),
        email: email.map(str::to_string),
        age,
    })
}

/// Schema shared by every integration suite:
/// - `numbers`: `Uint32Key -> String`
/// - `words`: `StringKey -> String`
/// - `blobs`: `BinaryKey -> Vec<u8>`
/// - `users`: `AutoKey -> User`, indexed by email (optional) and by age
/// - `auth`: object store with a `secret` and an `owner` slot
pub fn schema() -> DbDef {
    let users = TableDef::<AutoKey, UserRow>::new("users")
        .with_index(IndexDef::new("by_email", |_key, row: &UserRow| {
            row.0.email.as_deref().map(StringKey::from)
        }))
        .with_index(IndexDef::new("by_age", |_key, row: &UserRow| {
            Some(Uint32Key(row.0.age))
        }));

    DbDef::new()
        .table(TableDef::<Uint32Key, String>::new("numbers"))
        .table(TableDef::<StringKey, String>::new("words"))
        .table(TableDef::<BinaryKey, Vec<u8>>::new("blobs"))
        .table(users)
        .object(
            ObjectDef::new("auth")
                .slot::<Vec<u8>>("secret")
                .slot::<String>("owner"),
        )
}

/// A database plus the scratch directory backing it, if any.
pub struct Harness<E: StorageEngine> {
    pub db: Database<E>,
    pub dir: Option<TempDir>,
}

pub fn memory() -> Harness<MemoryStore> {
    Harness {
        db: open_db(MemoryStore::new(), schema()).unwrap(),
        dir: None,
    }
}

/// Memory engine advertising no optional capability, so every emulation
/// path of the table layer runs.
pub fn memory_emulated() -> Harness<MemoryStore> {
    let config = MemoryConfig::builder()
        .exclusive_bounds(false)
        .native_reverse(false)
        .concurrent_readers(false)
        .build();
    Harness {
        db: open_db(MemoryStore::with_config(config), schema()).unwrap(),
        dir: None,
    }
}

pub fn file_config(dir: &TempDir, name: &str) -> FileConfig {
    FileConfig::builder()
        .path(dir.path().join(name))
        .cache_size_mb(16)
        .use_fsync(false)
        .build()
}

#[cfg(feature = "sled")]
pub fn sled() -> Harness<SledStore> {
    let dir = TempDir::new().unwrap();
    let store = SledStore::new(file_config(&dir, "sled")).unwrap();
    Harness {
        db: open_db(store, schema()).unwrap(),
        dir: Some(dir),
    }
}

#[cfg(feature = "redb")]
pub fn redb() -> Harness<RedbStore> {
    let dir = TempDir::new().unwrap();
    let store = RedbStore::new(file_config(&dir, "store.redb")).unwrap();
    Harness {
        db: open_db(store, schema()).unwrap(),
        dir: Some(dir),
    }
}

/// Runs each listed `fn(&Database<E>)` against every engine.
macro_rules! for_each_engine {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[test_log::test]
                fn $name() {
                    let harness = crate::common::memory();
                    super::$name(&harness.db);
                }
            )*
        }

        mod memory_emulated {
            $(
                #[test_log::test]
                fn $name() {
                    let harness = crate::common::memory_emulated();
                    super::$name(&harness.db);
                }
            )*
        }

        #[cfg(feature = "sled")]
        mod sled {
            $(
                #[test_log::test]
                fn $name() {
                    let harness = crate::common::sled();
                    super::$name(&harness.db);
                }
            )*
        }

        #[cfg(feature = "redb")]
        mod redb {
            $(
                #[test_log::test]
                fn $name() {
                    let harness = crate::common::redb();
                    super::$name(&harness.db);
                }
            )*
        }
    };
}

#[allow(unused_imports)]
pub(crate) use for_each_engine;
