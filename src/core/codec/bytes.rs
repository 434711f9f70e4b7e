//! Order-preserving, prefix-free byte-string encoding.
//!
//! Uses the same escape/terminator scheme as [`super::StringEncoding`]
//! so a `Vec<u8>` field can sit inside a composite-index key alongside
//! other fields without ambiguity.

use crate::core::codec::Encoding;
use crate::core::error::{GraphError, GraphResult};
use std::cmp::Ordering;

const ESCAPE: u8 = 0x01;
const TERMINATOR: u8 = 0x00;

/// Encodes `Vec<u8>` as an escaped, terminated byte sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesEncoding;

impl BytesEncoding {
    fn terminator_index(bytes: &[u8]) -> GraphResult<usize> {
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == TERMINATOR {
                match bytes.get(i + 1) {
                    Some(&ESCAPE) => i += 2,
                    Some(&TERMINATOR) => return Ok(i),
                    _ => return Err(GraphError::Encoding("malformed bytes encoding".to_string())),
                }
            } else {
                i += 1;
            }
        }
        Err(GraphError::Encoding("unterminated bytes encoding".to_string()))
    }
}

impl Encoding<Vec<u8>> for BytesEncoding {
    fn write(&self, value: &Vec<u8>, out: &mut Vec<u8>) {
        for byte in value {
            if *byte == TERMINATOR {
                out.push(TERMINATOR);
                out.push(ESCAPE);
            } else {
                out.push(*byte);
            }
        }
        out.push(TERMINATOR);
        out.push(TERMINATOR);
    }

    fn read(&self, bytes: &[u8]) -> GraphResult<Vec<u8>> {
        let term = Self::terminator_index(bytes)?;
        let mut raw = Vec::with_capacity(term);
        let mut i = 0;
        while i < term {
            if bytes[i] == TERMINATOR {
                raw.push(TERMINATOR);
                i += 2;
            } else {
                raw.push(bytes[i]);
                i += 1;
            }
        }
        Ok(raw)
    }

    fn skip(&self, bytes: &[u8]) -> GraphResult<usize> {
        Ok(Self::terminator_index(bytes)? + 2)
    }

    fn compare(&self, a: &Vec<u8>, b: &Vec<u8>) -> Ordering {
        a.cmp(b)
    }

    fn default_value(&self) -> Vec<u8> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_embedded_zero() {
        let enc = BytesEncoding;
        let value = vec![1, 0, 2, 0, 0, 3];
        let bytes = enc.encode(&value);
        assert_eq!(enc.read(&bytes).unwrap(), value);
        assert_eq!(enc.skip(&bytes).unwrap(), bytes.len());
    }
}
