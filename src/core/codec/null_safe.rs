//! Generic null-capable wrapper for otherwise non-nullable encodings.
//!
//! Reserving the `0xFF` sentinel byte and shifting a naturally-`0xFF`-
//! leading inner encoding out of the way is unambiguous to *write* but
//! not reliably unambiguous to *read back* for an arbitrary inner
//! encoding without extra length bookkeeping. This implementation
//! instead prepends an explicit one-byte presence tag (`0x00` = null,
//! `0x01` = present): it keeps the same ordering guarantee (null always
//! sorts first) and round-trips exactly, at the cost of one extra byte
//! versus the sentinel-shift scheme.

use crate::core::codec::Encoding;
use crate::core::error::{GraphError, GraphResult};
use std::cmp::Ordering;
use std::marker::PhantomData;

const NULL_TAG: u8 = 0x00;
const PRESENT_TAG: u8 = 0x01;

/// Wraps `E: Encoding<T>` as an `Encoding<Option<T>>`.
pub struct NullSafeEncoding<T, E: Encoding<T>> {
    inner: E,
    _marker: PhantomData<T>,
}

impl<T, E: Encoding<T>> NullSafeEncoding<T, E> {
    /// Wraps `inner` to support an explicit null value.
    #[must_use]
    pub const fn new(inner: E) -> Self {
        Self { inner, _marker: PhantomData }
    }
}

impl<T, E: Encoding<T>> Encoding<Option<T>> for NullSafeEncoding<T, E> {
    fn write(&self, value: &Option<T>, out: &mut Vec<u8>) {
        match value {
            None => out.push(NULL_TAG),
            Some(v) => {
                out.push(PRESENT_TAG);
                self.inner.write(v, out);
            }
        }
    }

    fn read(&self, bytes: &[u8]) -> GraphResult<Option<T>> {
        match bytes.first() {
            Some(&NULL_TAG) => Ok(None),
            Some(&PRESENT_TAG) => Ok(Some(self.inner.read(&bytes[1..])?)),
            _ => Err(GraphError::Encoding("invalid null-safe tag byte".to_string())),
        }
    }

    fn skip(&self, bytes: &[u8]) -> GraphResult<usize> {
        match bytes.first() {
            Some(&NULL_TAG) => Ok(1),
            Some(&PRESENT_TAG) => Ok(1 + self.inner.skip(&bytes[1..])?),
            _ => Err(GraphError::Encoding("invalid null-safe tag byte".to_string())),
        }
    }

    fn compare(&self, a: &Option<T>, b: &Option<T>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => self.inner.compare(x, y),
        }
    }

    fn default_value(&self) -> Option<T> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::U64Encoding;

    #[test]
    fn null_sorts_before_every_value() {
        let enc = NullSafeEncoding::new(U64Encoding);
        assert_eq!(enc.compare(&None, &Some(0)), Ordering::Less);
        assert_eq!(enc.compare(&Some(5), &Some(6)), Ordering::Less);
    }

    #[test]
    fn round_trips_both_variants() {
        let enc = NullSafeEncoding::new(U64Encoding);
        for v in [None, Some(0u64), Some(42)] {
            let bytes = enc.encode(&v);
            assert_eq!(enc.read(&bytes).unwrap(), v);
            assert_eq!(enc.skip(&bytes).unwrap(), bytes.len());
        }
    }
}
