//! Typed key/value encoding.
//!
//! Every stored key and value goes through [`Encodable`]. Keys additionally
//! implement [`TableKey`], whose encodings must sort bytewise in the same
//! order as the keys themselves: range scans, prefix scans and `AutoKey`
//! assignment all rely on it.
//!
//! ```
//! use isodb::codec::{AutoKey, Encodable, StringKey};
//!
//! assert_eq!(AutoKey(1).encode().unwrap(), vec![0, 0, 0, 1]);
//! assert!(StringKey::from("a").encode().unwrap() < StringKey::from("aa").encode().unwrap());
//! ```

use crate::error::{IsoDbError, IsoDbResult};
use std::fmt::Debug;

pub mod bytes;
pub mod keys;
pub mod terminated;
pub mod values;

pub use keys::{AutoKey, BinaryKey, StringKey, Uint32Key};
pub use values::{AnyValue, Bincode};

/// A type that can be written to and read back from the store.
///
/// Decoding always produces a fresh value.
pub trait Encodable: Sized + Send + Sync + 'static {
    fn encode(&self) -> IsoDbResult<Vec<u8>>;

    fn decode(bytes: &[u8]) -> IsoDbResult<Self>;
}

/// The family a key type belongs to, reported to engines when a namespace
/// is opened.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::IntoStaticStr,
)]
pub enum KeyKind {
    Auto,
    Uint32,
    String,
    Binary,
    Custom,
}

/// A key type usable as the primary key of a table or the key of an index.
///
/// The byte order of `encode` must match the domain order of the key.
///
/// `successor` and `predecessor` name the adjacent inclusive bound of an
/// encoded key, or return `None` when no exact one exists. The defaults are
/// exact for terminated encodings, whose last byte is always `0x00`, and
/// give up on anything else. Fixed-width numeric keys override them with
/// integer arithmetic.
pub trait TableKey: Encodable + Clone + Debug {
    const KIND: KeyKind;

    /// Encoding shared by every key that starts with `self`.
    fn encode_prefix(&self) -> IsoDbResult<Vec<u8>> {
        Err(IsoDbError::Unsupported(format!(
            "prefix queries on {}",
            std::any::type_name::<Self>()
        )))
    }

    /// Smallest encoded key strictly greater than `encoded`.
    fn successor(encoded: &[u8]) -> Option<Vec<u8>> {
        match encoded.last() {
            Some(0) => bytes::lex_increment(encoded),
            _ => None,
        }
    }

    /// Largest bound admitting every key strictly smaller than `encoded`.
    fn predecessor(encoded: &[u8]) -> Option<Vec<u8>> {
        match encoded.last() {
            Some(0) => bytes::lex_decrement(encoded),
            _ => None,
        }
    }

    /// Builds the key assigned by `add` for sequence number `seq`.
    fn from_sequence(_seq: u32) -> Option<Self> {
        None
    }

    /// The sequence number carried by an auto-assigned key.
    fn sequence(&self) -> Option<u32> {
        None
    }
}

pub(crate) fn type_label<T: ?Sized>() -> &'static str {
    std::any::type_name::<T>()
}
