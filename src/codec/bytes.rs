//! Byte-level successor/predecessor helpers used by the range translator.

/// Computes the lexicographic successor of a byte sequence.
///
/// Trailing `0xFF` bytes are dropped and the last remaining byte is bumped by
/// one, so the result sorts after every sequence that has `data` as a prefix.
/// Returns `None` when no such sequence exists (empty or all `0xFF`).
pub fn lex_increment(data: &[u8]) -> Option<Vec<u8>> {
    let mut result = data.to_vec();
    while let Some(last) = result.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(result);
        }
        result.pop();
    }
    None
}

/// Computes the lexicographic predecessor used for exclusive upper bounds.
///
/// A trailing `0x00` byte is dropped, otherwise the last byte is decremented.
/// Exact for terminated encodings, whose final byte is always `0x00`.
/// Returns `None` for the empty sequence, which has no predecessor.
pub fn lex_decrement(data: &[u8]) -> Option<Vec<u8>> {
    let mut result = data.to_vec();
    let last = result.last_mut()?;
    if *last == 0 {
        result.pop();
    } else {
        *last -= 1;
    }
    Some(result)
}
