//! Fixed-width, order-preserving numeric and boolean encodings.

use crate::core::codec::Encoding;
use crate::core::error::{GraphError, GraphResult};
use std::cmp::Ordering;

/// Encodes `bool` as a single byte, `false` (`0x00`) sorting before
/// `true` (`0x01`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolEncoding;

impl Encoding<bool> for BoolEncoding {
    fn write(&self, value: &bool, out: &mut Vec<u8>) {
        out.push(u8::from(*value));
    }

    fn read(&self, bytes: &[u8]) -> GraphResult<bool> {
        match bytes.first() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(GraphError::Encoding("invalid bool encoding".to_string())),
        }
    }

    fn skip(&self, bytes: &[u8]) -> GraphResult<usize> {
        if bytes.is_empty() {
            return Err(GraphError::Encoding("truncated bool encoding".to_string()));
        }
        Ok(1)
    }

    fn compare(&self, a: &bool, b: &bool) -> Ordering {
        a.cmp(b)
    }

    fn default_value(&self) -> bool {
        false
    }
}

/// Encodes `u64` as 8 big-endian bytes. Fixed-width big-endian is
/// inherently order-preserving for unsigned integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct U64Encoding;

impl Encoding<u64> for U64Encoding {
    fn write(&self, value: &u64, out: &mut Vec<u8>) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn read(&self, bytes: &[u8]) -> GraphResult<u64> {
        let arr: [u8; 8] = bytes
            .get(..8)
            .ok_or_else(|| GraphError::Encoding("truncated u64 encoding".to_string()))?
            .try_into()
            .map_err(|_| GraphError::Encoding("truncated u64 encoding".to_string()))?;
        Ok(u64::from_be_bytes(arr))
    }

    fn skip(&self, bytes: &[u8]) -> GraphResult<usize> {
        if bytes.len() < 8 {
            return Err(GraphError::Encoding("truncated u64 encoding".to_string()));
        }
        Ok(8)
    }

    fn compare(&self, a: &u64, b: &u64) -> Ordering {
        a.cmp(b)
    }

    fn default_value(&self) -> u64 {
        0
    }
}

/// Encodes `i64` as 8 big-endian bytes with the sign bit flipped, so
/// the resulting byte order matches signed numeric order.
#[derive(Debug, Clone, Copy, Default)]
pub struct I64Encoding;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

impl Encoding<i64> for I64Encoding {
    fn write(&self, value: &i64, out: &mut Vec<u8>) {
        let flipped = (*value as u64) ^ SIGN_BIT;
        out.extend_from_slice(&flipped.to_be_bytes());
    }

    fn read(&self, bytes: &[u8]) -> GraphResult<i64> {
        let arr: [u8; 8] = bytes
            .get(..8)
            .ok_or_else(|| GraphError::Encoding("truncated i64 encoding".to_string()))?
            .try_into()
            .map_err(|_| GraphError::Encoding("truncated i64 encoding".to_string()))?;
        let flipped = u64::from_be_bytes(arr) ^ SIGN_BIT;
        Ok(flipped as i64)
    }

    fn skip(&self, bytes: &[u8]) -> GraphResult<usize> {
        if bytes.len() < 8 {
            return Err(GraphError::Encoding("truncated i64 encoding".to_string()));
        }
        Ok(8)
    }

    fn compare(&self, a: &i64, b: &i64) -> Ordering {
        a.cmp(b)
    }

    fn default_value(&self) -> i64 {
        0
    }
}
