//! Order-preserving unsigned varint used for every storage-id and
//! schema-index component of a key.
//!
//! The leading byte encodes the number of trailing value bytes
//! (`0x20 + (n - 1)`, `n` in `1..=8`), so shorter encodings always sort
//! before longer ones and, within one length, big-endian value bytes
//! preserve numeric order. The floor of `0x20` keeps every encoded
//! value's leading byte above the low marker bytes `core::keys` reserves
//! for meta-data prefixes.

use crate::core::error::{GraphError, GraphResult};

const LENGTH_BASE: u8 = 0x20;

/// Appends the order-preserving encoding of `value` to `out`.
pub fn encode_uint(value: u64, out: &mut Vec<u8>) {
    let n = if value == 0 { 1 } else { 8 - (value.leading_zeros() as usize / 8) };
    out.push(LENGTH_BASE + (n as u8 - 1));
    let be = value.to_be_bytes();
    out.extend_from_slice(&be[8 - n..]);
}

/// Returns the encoded bytes of `value` directly.
#[must_use]
pub fn encode_uint_vec(value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    encode_uint(value, &mut out);
    out
}

/// Decodes a value from the start of `bytes`, returning the value and
/// the number of bytes consumed.
///
/// # Errors
///
/// Returns [`GraphError::Encoding`] if `bytes` does not start with a
/// well-formed encoding.
pub fn decode_uint(bytes: &[u8]) -> GraphResult<(u64, usize)> {
    let marker = *bytes
        .first()
        .ok_or_else(|| GraphError::Encoding("empty varint".to_string()))?;
    if marker < LENGTH_BASE || marker > LENGTH_BASE + 7 {
        return Err(GraphError::Encoding(format!("invalid varint marker byte {marker:#x}")));
    }
    let n = (marker - LENGTH_BASE) as usize + 1;
    let value_bytes = bytes
        .get(1..1 + n)
        .ok_or_else(|| GraphError::Encoding("truncated varint".to_string()))?;
    let mut be = [0u8; 8];
    be[8 - n..].copy_from_slice(value_bytes);
    Ok((u64::from_be_bytes(be), 1 + n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        for v in [0u64, 1, 127, 128, 65535, 65536, u64::MAX] {
            let bytes = encode_uint_vec(v);
            let (decoded, consumed) = decode_uint(&bytes).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn preserves_numeric_order() {
        let values = [0u64, 1, 2, 127, 128, 255, 256, 65535, 65536, u64::MAX];
        for w in values.windows(2) {
            let a = encode_uint_vec(w[0]);
            let b = encode_uint_vec(w[1]);
            assert!(a < b, "{:?} should sort before {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn leading_byte_stays_above_meta_marker_range() {
        for v in [0u64, 1, u64::MAX] {
            let bytes = encode_uint_vec(v);
            assert!(bytes[0] >= LENGTH_BASE);
        }
    }
}
