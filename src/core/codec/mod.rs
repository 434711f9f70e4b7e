//! Typed, order-preserving byte codecs.
//!
//! Every [`Encoding<T>`] implementation is a pure function pair: bytes
//! written by `write` round-trip through `read`, and the byte-wise
//! lexicographic order of two written values matches `compare`. The key
//! layout (`core::keys`) relies on this to build range-scannable index
//! keys directly out of encoded field values.

mod bytes;
mod null_safe;
mod numeric;
mod reference;
mod string;

pub use bytes::BytesEncoding;
pub use null_safe::NullSafeEncoding;
pub use numeric::{BoolEncoding, I64Encoding, U64Encoding};
pub use reference::ReferenceEncoding;
pub use string::StringEncoding;

use crate::core::error::GraphResult;
use std::cmp::Ordering;

/// A typed, order-preserving byte encoding.
///
/// `T: Send + Sync` keeps instances shareable across the index/codec
/// machinery without extra synchronization.
pub trait Encoding<T>: Send + Sync {
    /// Appends the encoded form of `value` to `out`.
    fn write(&self, value: &T, out: &mut Vec<u8>);

    /// Decodes a value from the front of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::error::GraphError::Encoding`] if `bytes`
    /// does not hold a well-formed encoded value at its start.
    fn read(&self, bytes: &[u8]) -> GraphResult<T>;

    /// Returns the number of bytes the encoded form at the start of
    /// `bytes` occupies, without fully decoding it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::error::GraphError::Encoding`] if `bytes`
    /// does not hold a well-formed encoded value at its start.
    fn skip(&self, bytes: &[u8]) -> GraphResult<usize>;

    /// Orders two values consistently with the lexicographic byte order
    /// of their encoded forms.
    fn compare(&self, a: &T, b: &T) -> Ordering;

    /// The value used when a field holds no explicit value.
    fn default_value(&self) -> T;

    /// The encoded form of [`Self::default_value`].
    fn default_value_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&self.default_value(), &mut out);
        out
    }

    /// Writes `value` and returns the encoded bytes directly.
    fn encode(&self, value: &T) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(value, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip_and_order<T, E>(enc: &E, values: &[T])
    where
        T: Clone + std::fmt::Debug + PartialEq,
        E: Encoding<T>,
    {
        for v in values {
            let bytes = enc.encode(v);
            let decoded = enc.read(&bytes).unwrap();
            assert_eq!(&decoded, v, "round trip failed for {v:?}");
            assert_eq!(enc.skip(&bytes).unwrap(), bytes.len());
        }
        for w in values.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            let order = enc.compare(a, b);
            let lex = enc.encode(a).cmp(&enc.encode(b));
            assert_eq!(order, lex, "ordering mismatch for {a:?} vs {b:?}");
        }
    }

    #[test]
    fn bool_encoding_contract() {
        assert_round_trip_and_order(&BoolEncoding, &[false, true]);
    }

    #[test]
    fn u64_encoding_contract() {
        assert_round_trip_and_order(&U64Encoding, &[0u64, 1, 255, 256, u64::MAX]);
    }

    #[test]
    fn i64_encoding_contract() {
        assert_round_trip_and_order(&I64Encoding, &[i64::MIN, -1, 0, 1, i64::MAX]);
    }

    #[test]
    fn string_encoding_contract() {
        assert_round_trip_and_order(
            &StringEncoding,
            &["".to_string(), "Alice".to_string(), "Bob".to_string(), "a\0b".to_string()],
        );
    }
}
