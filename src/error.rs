//! Error types for isodb operations.
//!
//! Every fallible API returns `IsoDbResult<T>`, an alias for
//! `Result<T, IsoDbError>`. A missing row is never an error: lookups return
//! `Ok(None)`.
//!
//! # Error Handling Example
//!
//! ```
//! use isodb::error::{IsoDbError, IsoDbResult, SchemaError};
//!
//! fn check(result: IsoDbResult<()>) {
//!     match result {
//!         Ok(()) => {}
//!         Err(IsoDbError::Schema(SchemaError::UnknownTable(name))) => {
//!             eprintln!("no table called {name}");
//!         }
//!         Err(e) => eprintln!("storage failure: {e}"),
//!     }
//! }
//! # check(Ok(()));
//! ```

use thiserror::Error;

/// Result type alias for isodb operations.
pub type IsoDbResult<T> = Result<T, IsoDbError>;

/// The main error type for isodb operations.
///
/// Schema and unsupported-operation errors are programmer errors and are
/// raised before anything touches the engine. Engine errors are wrapped
/// transparently and abort the transaction they occur in.
#[derive(Error, Debug)]
pub enum IsoDbError {
    /// The schema rejected the operation (unknown name, wrong type, ...)
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The operation is not available for this key type or engine
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A range was specified with conflicting options
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// A write was attempted through a read-only transaction
    #[error("Transaction is read-only")]
    ReadOnly,

    /// A view was used after its transaction finished
    #[error("Transaction is no longer active")]
    TransactionClosed,

    /// The `AutoKey` counter of a table cannot advance any further
    #[error("Key space exhausted for table {0}")]
    KeySpaceExhausted(String),

    /// Stored key bytes could not be decoded into the declared key type
    #[error("Codec error: {0}")]
    Codec(String),

    /// Wraps errors from the redb database
    #[cfg(feature = "redb")]
    #[error(transparent)]
    RedbError(#[from] RedbError),

    /// Wraps errors from the sled database
    #[cfg(feature = "sled")]
    #[error(transparent)]
    SledError(#[from] sled::Error),

    /// Wraps deserialization errors from bincode
    #[error(transparent)]
    DecodeError(#[from] bincode::error::DecodeError),

    /// Wraps serialization errors from bincode
    #[error(transparent)]
    EncodeError(#[from] bincode::error::EncodeError),

    /// I/O error from database file management
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Schema violations, reported synchronously and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown index {index} on table {table}")]
    UnknownIndex { table: String, index: String },

    #[error("Unknown object store: {0}")]
    UnknownObjectStore(String),

    /// Write or read of a slot the object store does not declare
    #[error("Object store {store} has no slot named {slot}")]
    UndeclaredSlot { store: String, slot: String },

    /// The requested key or value type differs from the declared one
    #[error("Type mismatch on {target}: declared {declared}, requested {requested}")]
    TypeMismatch {
        target: String,
        declared: &'static str,
        requested: &'static str,
    },

    /// `add` on a table whose key type is not `AutoKey`
    #[error("Table {table} has key type {key_type}; add requires AutoKey")]
    NotAutoKey { table: String, key_type: &'static str },

    #[error("Invalid name {0:?}: names must be non-empty and must not contain '#'")]
    InvalidName(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),
}

/// Errors that can occur when interacting with the redb database.
#[cfg(feature = "redb")]
#[derive(Error, Debug)]
pub enum RedbError {
    /// Errors from database creation or opening
    #[error(transparent)]
    DatabaseError(#[from] redb::DatabaseError),

    /// Errors from transaction operations
    #[error(transparent)]
    TransactionError(#[from] redb::TransactionError),

    /// Errors from table operations
    #[error(transparent)]
    TableError(#[from] redb::TableError),

    /// Errors from committing transactions
    #[error(transparent)]
    CommitError(#[from] redb::CommitError),

    /// Errors from storage operations
    #[error(transparent)]
    StorageError(#[from] redb::StorageError),
}

#[cfg(feature = "redb")]
macro_rules! impl_from_redb {
    ($($err:ty => $variant:ident),*) => {
        $(
            impl From<$err> for IsoDbError {
                fn from(err: $err) -> Self {
                    IsoDbError::RedbError(RedbError::$variant(err))
                }
            }
        )*
    };
}

#[cfg(feature = "redb")]
impl_from_redb!(
    redb::DatabaseError => DatabaseError,
    redb::TransactionError => TransactionError,
    redb::TableError => TableError,
    redb::CommitError => CommitError,
    redb::StorageError => StorageError
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_converts() {
        let err: IsoDbError = SchemaError::UnknownTable("users".into()).into();
        assert!(matches!(err, IsoDbError::Schema(SchemaError::UnknownTable(ref t)) if t == "users"));
        assert_eq!(err.to_string(), "Unknown table: users");
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = SchemaError::TypeMismatch {
            target: "users".into(),
            declared: "AutoKey",
            requested: "StringKey",
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch on users: declared AutoKey, requested StringKey"
        );
    }
}
