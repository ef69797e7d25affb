//! # isodb
//!
//! Typed, transactional key/value tables over interchangeable ordered
//! byte stores.
//!
//! ## Features
//!
//! - **Typed keys and values**: keys encode so that byte order matches
//!   domain order, values go through bincode
//! - **Range and prefix queries**: inclusive or exclusive bounds, reverse
//!   iteration and limits behave the same on every engine
//! - **Secondary indexes**: maintained in the same transaction as the rows
//!   they derive from
//! - **Object stores**: named singleton slots for configuration and secrets
//! - **Serialized transactions**: one logical writer per database handle,
//!   in submission order, with nested calls joining the running transaction
//! - **Engines**: in-memory, sled (`sled` feature) and redb (`redb` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use isodb::prelude::*;
//!
//! let users = TableDef::<AutoKey, AnyValue>::new("users").with_index(IndexDef::new(
//!     "by_email",
//!     |_key, user: &AnyValue| user.get("email").and_then(AnyValue::as_str).map(StringKey::from),
//! ));
//! let db = open_db(MemoryStore::new(), DbDef::new().table(users))?;
//!
//! let alice = AnyValue::Map(
//!     [("email".to_string(), AnyValue::from("alice@example.com"))].into_iter().collect(),
//! );
//! let id = db.transact(|tx| tx.table::<AutoKey, AnyValue>("users")?.add(&alice))?;
//! assert_eq!(id, AutoKey(1));
//!
//! let found = db.transact_readonly(|tx| {
//!     tx.table::<AutoKey, AnyValue>("users")?
//!         .index::<StringKey>("by_email")?
//!         .get("alice@example.com")
//! })?;
//! assert_eq!(found, Some(alice));
//! # Ok::<(), IsoDbError>(())
//! ```

pub mod admission;
pub mod backend;
pub mod codec;
pub mod config;
pub mod database;
pub mod databases;
pub mod error;
pub mod index;
pub mod object_store;
pub mod prelude;
pub mod range;
pub mod schema;
pub mod table;
pub mod transaction;

pub use database::{delete_db, open_db, Database};
pub use error::{IsoDbError, IsoDbResult};
