//! Built-in key types.
//!
//! Numeric keys encode as 4-byte big-endian integers. String and binary
//! keys use the terminated encoding from [`super::terminated`].

use super::{terminated, Encodable, KeyKind, TableKey};
use crate::error::{IsoDbError, IsoDbResult};
use derive_more::{From, Into};

/// A key assigned by the table on `add`. The first key is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct AutoKey(pub u32);

/// A user-assigned unsigned 32-bit key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct Uint32Key(pub u32);

/// A UTF-8 string key ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct StringKey(pub String);

/// A raw byte-string key ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct BinaryKey(pub Vec<u8>);

impl From<&str> for StringKey {
    fn from(value: &str) -> Self {
        StringKey(value.to_string())
    }
}

impl From<&[u8]> for BinaryKey {
    fn from(value: &[u8]) -> Self {
        BinaryKey(value.to_vec())
    }
}

fn decode_u32(bytes: &[u8]) -> IsoDbResult<u32> {
    let raw: [u8; 4] = bytes.try_into().map_err(|_| {
        IsoDbError::Codec(format!("expected 4 key bytes, found {}", bytes.len()))
    })?;
    Ok(u32::from_be_bytes(raw))
}

fn step_u32(encoded: &[u8], up: bool) -> Option<Vec<u8>> {
    let n = decode_u32(encoded).ok()?;
    let next = if up { n.checked_add(1)? } else { n.checked_sub(1)? };
    Some(next.to_be_bytes().to_vec())
}

macro_rules! impl_u32_key {
    ($ty:ident, $kind:expr) => {
        impl Encodable for $ty {
            fn encode(&self) -> IsoDbResult<Vec<u8>> {
                Ok(self.0.to_be_bytes().to_vec())
            }

            fn decode(bytes: &[u8]) -> IsoDbResult<Self> {
                decode_u32(bytes).map($ty)
            }
        }

        impl TableKey for $ty {
            const KIND: KeyKind = $kind;

            fn successor(encoded: &[u8]) -> Option<Vec<u8>> {
                step_u32(encoded, true)
            }

            fn predecessor(encoded: &[u8]) -> Option<Vec<u8>> {
                step_u32(encoded, false)
            }

            fn from_sequence(seq: u32) -> Option<Self> {
                ($kind == KeyKind::Auto).then_some($ty(seq))
            }

            fn sequence(&self) -> Option<u32> {
                ($kind == KeyKind::Auto).then_some(self.0)
            }
        }
    };
}

impl_u32_key!(AutoKey, KeyKind::Auto);
impl_u32_key!(Uint32Key, KeyKind::Uint32);

impl Encodable for StringKey {
    fn encode(&self) -> IsoDbResult<Vec<u8>> {
        Ok(terminated::encode(self.0.as_bytes()))
    }

    fn decode(bytes: &[u8]) -> IsoDbResult<Self> {
        let raw = terminated::decode(bytes)?;
        String::from_utf8(raw)
            .map(StringKey)
            .map_err(|e| IsoDbError::Codec(format!("string key is not UTF-8: {e}")))
    }
}

impl TableKey for StringKey {
    const KIND: KeyKind = KeyKind::String;

    fn encode_prefix(&self) -> IsoDbResult<Vec<u8>> {
        let mut buf = Vec::new();
        terminated::escape_into(self.0.as_bytes(), &mut buf);
        Ok(buf)
    }
}

impl Encodable for BinaryKey {
    fn encode(&self) -> IsoDbResult<Vec<u8>> {
        Ok(terminated::encode(&self.0))
    }

    fn decode(bytes: &[u8]) -> IsoDbResult<Self> {
        terminated::decode(bytes).map(BinaryKey)
    }
}

impl TableKey for BinaryKey {
    const KIND: KeyKind = KeyKind::Binary;

    fn encode_prefix(&self) -> IsoDbResult<Vec<u8>> {
        let mut buf = Vec::new();
        terminated::escape_into(&self.0, &mut buf);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_numeric_keys_are_big_endian() {
        assert_eq!(AutoKey(1).encode().unwrap(), vec![0, 0, 0, 1]);
        assert_eq!(Uint32Key(0x0102_0304).encode().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(Uint32Key::decode(&[0, 0, 1, 0]).unwrap(), Uint32Key(256));
        assert!(Uint32Key::decode(&[0, 1]).is_err());
    }

    #[test]
    fn test_bare_primitives_convert() {
        let auto: AutoKey = 7.into();
        let text: StringKey = "abc".into();
        let bin: BinaryKey = (&b"xy"[..]).into();
        assert_eq!(auto, AutoKey(7));
        assert_eq!(text, StringKey("abc".to_string()));
        assert_eq!(bin, BinaryKey(b"xy".to_vec()));
        assert_eq!(u32::from(auto), 7);
    }

    #[test]
    fn test_string_key_order() {
        let a = StringKey::from("a").encode().unwrap();
        let aa = StringKey::from("aa").encode().unwrap();
        let ab = StringKey::from("ab").encode().unwrap();
        let a_nul = StringKey::from("a\0").encode().unwrap();
        assert!(a < a_nul);
        assert!(a_nul < aa);
        assert!(aa < ab);
    }

    #[test]
    fn test_numeric_successor_uses_arithmetic() {
        assert_eq!(Uint32Key::successor(&[0, 0, 0, 0xFF]), Some(vec![0, 0, 1, 0]));
        assert_eq!(Uint32Key::predecessor(&[0, 0, 1, 0]), Some(vec![0, 0, 0, 0xFF]));
        assert_eq!(Uint32Key::successor(&u32::MAX.to_be_bytes()), None);
        assert_eq!(Uint32Key::predecessor(&[0, 0, 0, 0]), None);
    }

    #[test]
    fn test_only_auto_key_has_sequence() {
        assert_eq!(AutoKey::from_sequence(3), Some(AutoKey(3)));
        assert_eq!(AutoKey(3).sequence(), Some(3));
        assert_eq!(Uint32Key::from_sequence(3), None);
        assert!(Uint32Key(1).encode_prefix().is_err());
    }

    proptest! {
        #[test]
        fn should_order_u32_keys(a: u32, b: u32) {
            let ea = Uint32Key(a).encode().unwrap();
            let eb = Uint32Key(b).encode().unwrap();
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }

        #[test]
        fn should_order_string_keys(a: String, b: String) {
            let ea = StringKey(a.clone()).encode().unwrap();
            let eb = StringKey(b.clone()).encode().unwrap();
            prop_assert_eq!(a.as_bytes().cmp(b.as_bytes()), ea.cmp(&eb));
            prop_assert_eq!(StringKey::decode(&ea).unwrap(), StringKey(a));
        }

        #[test]
        fn should_decrement_terminated_key_exactly(a: Vec<u8>, b: Vec<u8>) {
            // The predecessor of a terminated key is an inclusive upper bound
            // admitting every smaller key and nothing else.
            let ea = BinaryKey(a.clone()).encode().unwrap();
            let eb = BinaryKey(b.clone()).encode().unwrap();
            let bound = BinaryKey::predecessor(&ea).unwrap();
            prop_assert_eq!(eb <= bound, b < a);
        }
    }
}
