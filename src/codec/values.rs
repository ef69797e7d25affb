//! Value encodings.
//!
//! Values are encoded with bincode's standard configuration. Any
//! `bincode::Encode + Decode` type can be stored by wrapping it in
//! [`Bincode`]; [`AnyValue`] covers dynamically-shaped data.

use super::Encodable;
use crate::error::IsoDbResult;
use bincode::{Decode, Encode};
use derive_more::{From, TryInto};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialize a value to bytes using bincode
#[inline]
pub(crate) fn serialize_value<V: Encode>(value: &V) -> IsoDbResult<Vec<u8>> {
    Ok(bincode::encode_to_vec(value, bincode::config::standard())?)
}

/// Deserialize a value from bytes using bincode
#[inline]
pub(crate) fn deserialize_value<V: Decode<()>>(bytes: &[u8]) -> IsoDbResult<V> {
    let (value, _len) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(value)
}

/// Stores any bincode-serializable type as a table or object-store value.
///
/// ```
/// use isodb::codec::{Bincode, Encodable};
///
/// #[derive(Debug, PartialEq, bincode::Encode, bincode::Decode)]
/// struct Point { x: i32, y: i32 }
///
/// let bytes = Bincode(Point { x: 1, y: 2 }).encode().unwrap();
/// assert_eq!(Bincode::<Point>::decode(&bytes).unwrap().0, Point { x: 1, y: 2 });
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bincode<T>(pub T);

impl<T> Encodable for Bincode<T>
where
    T: Encode + Decode<()> + Send + Sync + 'static,
{
    fn encode(&self) -> IsoDbResult<Vec<u8>> {
        serialize_value(&self.0)
    }

    fn decode(bytes: &[u8]) -> IsoDbResult<Self> {
        deserialize_value(bytes).map(Bincode)
    }
}

impl<T> From<T> for Bincode<T> {
    fn from(value: T) -> Self {
        Bincode(value)
    }
}

/// A dynamically-shaped value for schemaless rows.
#[derive(
    Debug, Clone, PartialEq, Default, Encode, Decode, Serialize, Deserialize, From, TryInto,
)]
pub enum AnyValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<AnyValue>),
    Map(BTreeMap<String, AnyValue>),
}

impl From<&str> for AnyValue {
    fn from(value: &str) -> Self {
        AnyValue::String(value.to_string())
    }
}

impl AnyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AnyValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Looks up a field of a `Map` value.
    pub fn get(&self, field: &str) -> Option<&AnyValue> {
        match self {
            AnyValue::Map(map) => map.get(field),
            _ => None,
        }
    }
}

impl Encodable for AnyValue {
    fn encode(&self) -> IsoDbResult<Vec<u8>> {
        serialize_value(self)
    }

    fn decode(bytes: &[u8]) -> IsoDbResult<Self> {
        deserialize_value(bytes)
    }
}

macro_rules! impl_bincode_value {
    ($($ty:ty),*) => {
        $(
            impl Encodable for $ty {
                fn encode(&self) -> IsoDbResult<Vec<u8>> {
                    serialize_value(self)
                }

                fn decode(bytes: &[u8]) -> IsoDbResult<Self> {
                    deserialize_value(bytes)
                }
            }
        )*
    };
}

impl_bincode_value!(String, Vec<u8>, bool, u32, u64, i64, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_value_nested_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), AnyValue::from("alice"));
        map.insert("age".to_string(), AnyValue::Int(31));
        map.insert(
            "tags".to_string(),
            AnyValue::Array(vec![AnyValue::Bool(true), AnyValue::Null, AnyValue::Float(0.5)]),
        );
        let value = AnyValue::Map(map);

        let decoded = <AnyValue as Encodable>::decode(&Encodable::encode(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.get("name").and_then(AnyValue::as_str), Some("alice"));
        assert_eq!(decoded.get("age").and_then(AnyValue::as_int), Some(31));
    }

    #[test]
    fn test_any_value_conversions() {
        let v: AnyValue = 5i64.into();
        let n: i64 = v.clone().try_into().unwrap();
        assert_eq!(n, 5);
        let s: Result<String, _> = v.try_into();
        assert!(s.is_err());
    }

    #[test]
    fn test_primitive_values() {
        let text = Encodable::encode(&"hi".to_string()).unwrap();
        assert_eq!(<String as Encodable>::decode(&text).unwrap(), "hi");
        let number = Encodable::encode(&42u64).unwrap();
        assert_eq!(<u64 as Encodable>::decode(&number).unwrap(), 42);
        let flag = Encodable::encode(&true).unwrap();
        assert!(<bool as Encodable>::decode(&flag).unwrap());
    }
}
