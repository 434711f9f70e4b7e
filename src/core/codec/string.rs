//! Order-preserving, prefix-free `String` encoding.
//!
//! A length-prefixed string is not order-preserving ("ab" would sort
//! before "b" only if lengths happened to agree); instead every literal
//! `0x00` byte is escaped to `0x00 0x01` and the string is terminated by
//! `0x00 0x00`. Since a terminator can never appear as a prefix of an
//! escape sequence (second byte `0x00` vs `0x01`), this is unambiguous
//! to parse, and lexicographic order on the escaped form matches string
//! order because escaping only ever inserts bytes after an `0x00`,
//! which already sorts below every other byte.

use crate::core::codec::Encoding;
use crate::core::error::{GraphError, GraphResult};
use std::cmp::Ordering;

const ESCAPE: u8 = 0x01;
const TERMINATOR: u8 = 0x00;

/// Encodes `String` as an escaped, NUL-terminated byte sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringEncoding;

impl StringEncoding {
    fn terminator_index(bytes: &[u8]) -> GraphResult<usize> {
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == TERMINATOR {
                match bytes.get(i + 1) {
                    Some(&ESCAPE) => i += 2,
                    Some(&TERMINATOR) => return Ok(i),
                    _ => {
                        return Err(GraphError::Encoding(
                            "malformed string encoding: bad escape".to_string(),
                        ))
                    }
                }
            } else {
                i += 1;
            }
        }
        Err(GraphError::Encoding("unterminated string encoding".to_string()))
    }
}

impl Encoding<String> for StringEncoding {
    fn write(&self, value: &String, out: &mut Vec<u8>) {
        for byte in value.as_bytes() {
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

    fn read(&self, bytes: &[u8]) -> GraphResult<String> {
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
        String::from_utf8(raw).map_err(|e| GraphError::Encoding(e.to_string()))
    }

    fn skip(&self, bytes: &[u8]) -> GraphResult<usize> {
        Ok(Self::terminator_index(bytes)? + 2)
    }

    fn compare(&self, a: &String, b: &String) -> Ordering {
        a.cmp(b)
    }

    fn default_value(&self) -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_embedded_nul() {
        let enc = StringEncoding;
        let value = "a\0b".to_string();
        let bytes = enc.encode(&value);
        assert_eq!(enc.read(&bytes).unwrap(), value);
    }

    #[test]
    fn concatenated_strings_stay_parseable() {
        let enc = StringEncoding;
        let mut buf = Vec::new();
        enc.write(&"Alice".to_string(), &mut buf);
        enc.write(&"Bob".to_string(), &mut buf);
        let first_len = enc.skip(&buf).unwrap();
        assert_eq!(enc.read(&buf[..first_len]).unwrap(), "Alice");
        assert_eq!(enc.read(&buf[first_len..]).unwrap(), "Bob");
    }
}
