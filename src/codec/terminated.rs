//! Order-preserving terminated encoding for variable-length keys.
//!
//! Bytes are escaped and the sequence is closed with `0x00`:
//!
//! - `0x00` → `0x01 0x01`
//! - `0x01` → `0x01 0x02`
//! - all other bytes unchanged
//!
//! Since `0x00` never appears inside an escaped body, no encoded key is a
//! byte-prefix of another, and shorter keys sort before their extensions
//! (`"a" < "a\0" < "aa"`).

use crate::error::{IsoDbError, IsoDbResult};

const TERMINATOR_BYTE: u8 = 0x00;
const ESCAPE_BYTE: u8 = 0x01;

/// Appends the escaped form of `data` without the terminator.
///
/// This is the prefix encoding: every key whose raw bytes start with `data`
/// has an encoding that starts with this output.
pub fn escape_into(data: &[u8], buf: &mut Vec<u8>) {
    buf.reserve(data.len());
    for &byte in data {
        match byte {
            TERMINATOR_BYTE => buf.extend_from_slice(&[ESCAPE_BYTE, 0x01]),
            ESCAPE_BYTE => buf.extend_from_slice(&[ESCAPE_BYTE, 0x02]),
            _ => buf.push(byte),
        }
    }
}

/// Escapes `data` and appends the terminator.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 1);
    escape_into(data, &mut buf);
    buf.push(TERMINATOR_BYTE);
    buf
}

/// Decodes a complete terminated sequence.
///
/// The input must contain exactly one encoded key: trailing bytes after the
/// terminator are rejected.
pub fn decode(encoded: &[u8]) -> IsoDbResult<Vec<u8>> {
    let mut result = Vec::with_capacity(encoded.len());
    let mut i = 0;
    while i < encoded.len() {
        match encoded[i] {
            TERMINATOR_BYTE => {
                if i + 1 != encoded.len() {
                    return Err(IsoDbError::Codec(format!(
                        "{} trailing bytes after terminator",
                        encoded.len() - i - 1
                    )));
                }
                return Ok(result);
            }
            ESCAPE_BYTE => {
                match encoded.get(i + 1) {
                    Some(0x01) => result.push(TERMINATOR_BYTE),
                    Some(0x02) => result.push(ESCAPE_BYTE),
                    Some(other) => {
                        return Err(IsoDbError::Codec(format!(
                            "invalid escape sequence: 0x01 0x{other:02x}"
                        )));
                    }
                    None => {
                        return Err(IsoDbError::Codec(
                            "truncated escape sequence".to_string(),
                        ));
                    }
                }
                i += 2;
            }
            byte => {
                result.push(byte);
                i += 1;
            }
        }
    }
    Err(IsoDbError::Codec(
        "missing 0x00 terminator".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escapes_reserved_bytes() {
        assert_eq!(encode(&[0x61, 0x00, 0x01]), vec![0x61, 0x01, 0x01, 0x01, 0x02, 0x00]);
        assert_eq!(encode(&[]), vec![0x00]);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(decode(&[0x61]).is_err());
        assert!(decode(&[0x01, 0x07, 0x00]).is_err());
        assert!(decode(&[0x61, 0x00, 0x62]).is_err());
    }

    proptest! {
        #[test]
        fn should_roundtrip_any_bytes(data: Vec<u8>) {
            prop_assert_eq!(decode(&encode(&data)).unwrap(), data);
        }

        #[test]
        fn should_preserve_ordering(a: Vec<u8>, b: Vec<u8>) {
            prop_assert_eq!(a.cmp(&b), encode(&a).cmp(&encode(&b)));
        }

        #[test]
        fn should_keep_escaped_prefix(prefix: Vec<u8>, suffix: Vec<u8>) {
            let mut full = prefix.clone();
            full.extend(&suffix);
            let mut escaped = Vec::new();
            escape_into(&prefix, &mut escaped);
            prop_assert!(encode(&full).starts_with(&escaped));
        }
    }
}
