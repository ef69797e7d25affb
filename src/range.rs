//! Range and prefix translation.
//!
//! A [`KeyRange`] is what application code asks for: optional typed `start`
//! and `end` keys with their own exclusivity flags, a direction, a limit, or
//! a `prefix`. [`KeyRange::to_native`] turns it into a [`NativeRange`] over
//! encoded bytes, which is the only thing storage engines see.
//!
//! With `reverse`, iteration begins at `start` and walks down towards `end`,
//! so `start` supplies the upper bound. Each side keeps its exclusivity flag
//! when the bounds are swapped.
//!
//! ```
//! use isodb::codec::Uint32Key;
//! use isodb::range::KeyRange;
//!
//! // keys 5, 4, 3, 2, 1 in that order
//! let range = KeyRange::<Uint32Key>::builder()
//!     .start(6u32)
//!     .start_exclusive(true)
//!     .reverse(true)
//!     .limit(5)
//!     .build();
//! let native = range.to_native().unwrap();
//! assert_eq!(native.upper, Some(vec![0, 0, 0, 6]));
//! assert!(native.upper_exclusive);
//! assert_eq!(native.lower, None);
//! ```

use crate::codec::{bytes::lex_increment, TableKey};
use crate::error::{IsoDbError, IsoDbResult};
use std::ops::Bound;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// A user-level range over typed keys.
///
/// `prefix` cannot be combined with `start` or `end`. A `limit` of zero
/// means unbounded.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(doc)]
pub struct KeyRange<K> {
    #[builder(default, setter(strip_option, into))]
    pub start: Option<K>,

    #[builder(default, setter(strip_option, into))]
    pub end: Option<K>,

    #[builder(default = false)]
    pub start_exclusive: bool,

    #[builder(default = false)]
    pub end_exclusive: bool,

    #[builder(default = false)]
    pub reverse: bool,

    #[builder(default, setter(strip_option))]
    pub limit: Option<u32>,

    #[builder(default, setter(strip_option, into))]
    pub prefix: Option<K>,
}

impl<K> Default for KeyRange<K> {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            start_exclusive: false,
            end_exclusive: false,
            reverse: false,
            limit: None,
            prefix: None,
        }
    }
}

impl<K> KeyRange<K> {
    /// Every key, in ascending order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Every key starting with `prefix`.
    pub fn with_prefix(prefix: impl Into<K>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// True when the range selects every row with no limit.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none()
            && self.end.is_none()
            && self.prefix.is_none()
            && self.effective_limit().is_none()
    }

    pub fn effective_limit(&self) -> Option<u32> {
        self.limit.filter(|&n| n > 0)
    }
}

impl<K: TableKey> KeyRange<K> {
    /// Translates the range into encoded engine bounds.
    pub fn to_native(&self) -> IsoDbResult<NativeRange> {
        let direction = if self.reverse {
            Direction::Reverse
        } else {
            Direction::Forward
        };
        let limit = self.effective_limit();

        if let Some(prefix) = &self.prefix {
            if self.start.is_some() || self.end.is_some() {
                return Err(IsoDbError::InvalidRange(
                    "prefix cannot be combined with start or end".to_string(),
                ));
            }
            let lower = prefix.encode_prefix()?;
            let upper = lex_increment(&lower);
            return Ok(NativeRange {
                lower: Some(lower),
                lower_exclusive: false,
                upper,
                upper_exclusive: true,
                direction,
                limit,
            });
        }

        let start = match &self.start {
            Some(key) => Some((key.encode()?, self.start_exclusive)),
            None => None,
        };
        let end = match &self.end {
            Some(key) => Some((key.encode()?, self.end_exclusive)),
            None => None,
        };
        let (low, high) = match direction {
            Direction::Forward => (start, end),
            Direction::Reverse => (end, start),
        };
        let (lower, lower_exclusive) = split(low);
        let (upper, upper_exclusive) = split(high);

        Ok(NativeRange {
            lower,
            lower_exclusive,
            upper,
            upper_exclusive,
            direction,
            limit,
        })
    }
}

fn split(side: Option<(Vec<u8>, bool)>) -> (Option<Vec<u8>>, bool) {
    match side {
        Some((bytes, exclusive)) => (Some(bytes), exclusive),
        None => (None, false),
    }
}

/// A range over encoded keys, always expressed with `lower <= upper`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeRange {
    pub lower: Option<Vec<u8>>,
    pub lower_exclusive: bool,
    pub upper: Option<Vec<u8>>,
    pub upper_exclusive: bool,
    pub direction: Direction,
    pub limit: Option<u32>,
}

impl NativeRange {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        (
            to_bound(self.lower.as_deref(), self.lower_exclusive),
            to_bound(self.upper.as_deref(), self.upper_exclusive),
        )
    }

    /// True when no key can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        let (lower, upper) = self.bounds();
        bounds_empty(lower, upper)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let (lower, upper) = self.bounds();
        let above = match lower {
            Bound::Included(l) => key >= l,
            Bound::Excluded(l) => key > l,
            Bound::Unbounded => true,
        };
        let below = match upper {
            Bound::Included(u) => key <= u,
            Bound::Excluded(u) => key < u,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Rewrites exclusive bounds as inclusive ones for engines that only
    /// accept inclusive bounds.
    ///
    /// A bound is moved to its exact neighbour when the key type can name
    /// one. Otherwise it is kept and made inclusive, which widens the range
    /// by that single boundary point; callers filter rows through the
    /// original range's [`contains`](Self::contains).
    pub fn into_inclusive<K: TableKey>(mut self) -> Self {
        if self.lower_exclusive {
            if let Some(next) = self.lower.as_deref().and_then(K::successor) {
                self.lower = Some(next);
            }
            self.lower_exclusive = false;
        }
        if self.upper_exclusive {
            if let Some(prev) = self.upper.as_deref().and_then(K::predecessor) {
                self.upper = Some(prev);
            }
            self.upper_exclusive = false;
        }
        self
    }
}

fn to_bound(bytes: Option<&[u8]>, exclusive: bool) -> Bound<&[u8]> {
    match bytes {
        Some(b) if exclusive => Bound::Excluded(b),
        Some(b) => Bound::Included(b),
        None => Bound::Unbounded,
    }
}

/// Empty-range check shared by the core and the engine scan loops.
///
/// Ordered maps panic on inverted bounds, so every scan is filtered here
/// first.
pub fn bounds_empty(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}
