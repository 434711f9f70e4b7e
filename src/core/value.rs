//! Bridges the declarative [`FieldKind`] model to concrete byte
//! encodings, using `serde_json::Value` as the dynamic value type
//! callers exchange with a transaction — the same representation
//! `SchemaChangeListener` payloads already use.

use crate::core::codec::{
    BoolEncoding, BytesEncoding, Encoding, I64Encoding, ReferenceEncoding, StringEncoding,
    U64Encoding,
};
use crate::core::error::{GraphError, GraphResult};
use crate::core::ids::ObjId;
use crate::core::schema::model::SimpleKind;
use serde_json::Value as JsonValue;

/// Encodes a JSON scalar as the byte representation for `kind`.
///
/// # Errors
///
/// Returns [`GraphError::IllegalArgument`] if `value`'s JSON shape
/// doesn't match `kind`.
pub fn encode_simple(kind: SimpleKind, value: &JsonValue) -> GraphResult<Vec<u8>> {
    match kind {
        SimpleKind::Bool => {
            let b = value.as_bool().ok_or_else(|| mismatch(kind, value))?;
            Ok(BoolEncoding.encode(&b))
        }
        SimpleKind::U64 => {
            let n = value.as_u64().ok_or_else(|| mismatch(kind, value))?;
            Ok(U64Encoding.encode(&n))
        }
        SimpleKind::I64 => {
            let n = value.as_i64().ok_or_else(|| mismatch(kind, value))?;
            Ok(I64Encoding.encode(&n))
        }
        SimpleKind::String => {
            let s = value.as_str().ok_or_else(|| mismatch(kind, value))?;
            Ok(StringEncoding.encode(&s.to_string()))
        }
        SimpleKind::Bytes => {
            let bytes = value
                .as_array()
                .ok_or_else(|| mismatch(kind, value))?
                .iter()
                .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| mismatch(kind, value))?;
            Ok(BytesEncoding.encode(&bytes))
        }
    }
}

/// Decodes `kind`'s byte representation back to JSON.
///
/// # Errors
///
/// Propagates any decoding failure from the underlying encoding.
pub fn decode_simple(kind: SimpleKind, bytes: &[u8]) -> GraphResult<JsonValue> {
    match kind {
        SimpleKind::Bool => Ok(JsonValue::Bool(BoolEncoding.read(bytes)?)),
        SimpleKind::U64 => Ok(JsonValue::from(U64Encoding.read(bytes)?)),
        SimpleKind::I64 => Ok(JsonValue::from(I64Encoding.read(bytes)?)),
        SimpleKind::String => Ok(JsonValue::String(StringEncoding.read(bytes)?)),
        SimpleKind::Bytes => {
            let raw = BytesEncoding.read(bytes)?;
            Ok(JsonValue::Array(raw.into_iter().map(JsonValue::from).collect()))
        }
    }
}

/// The encoded default-value bytes for `kind`, as written when a field
/// is reset or newly introduced.
#[must_use]
pub fn default_simple_bytes(kind: SimpleKind) -> Vec<u8> {
    match kind {
        SimpleKind::Bool => BoolEncoding.default_value_bytes(),
        SimpleKind::U64 => U64Encoding.default_value_bytes(),
        SimpleKind::I64 => I64Encoding.default_value_bytes(),
        SimpleKind::String => StringEncoding.default_value_bytes(),
        SimpleKind::Bytes => BytesEncoding.default_value_bytes(),
    }
}

fn mismatch(kind: SimpleKind, value: &JsonValue) -> GraphError {
    GraphError::IllegalArgument(format!("value {value} does not match field kind {kind:?}"))
}

/// Encodes a reference value (`null` or an `ObjId` hex string) using the
/// field's allow-list.
///
/// # Errors
///
/// Returns [`GraphError::IllegalArgument`] if `value` is neither `null`
/// nor a valid `ObjId` hex string, or [`GraphError::InvalidReference`]
/// if the target's storage id is not on the allow-list.
pub fn encode_reference(
    encoding: &ReferenceEncoding,
    value: &JsonValue,
) -> GraphResult<Vec<u8>> {
    let target = parse_reference(value)?;
    let mut out = Vec::new();
    let checked = match target {
        None => None,
        Some(obj_id) => {
            let storage_id = crate::core::keys::varint::decode_uint(obj_id.as_bytes())?.0;
            Some((obj_id, storage_id))
        }
    };
    encoding.write_checked(checked, &mut out)?;
    Ok(out)
}

fn parse_reference(value: &JsonValue) -> GraphResult<Option<ObjId>> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(hex) => Ok(Some(parse_obj_id_hex(hex)?)),
        other => Err(GraphError::IllegalArgument(format!("not a reference value: {other}"))),
    }
}

fn parse_obj_id_hex(hex: &str) -> GraphResult<ObjId> {
    if hex.len() != 16 {
        return Err(GraphError::IllegalArgument(format!("'{hex}' is not a 16-digit ObjId hex string")));
    }
    let mut bytes = [0u8; 8];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| GraphError::IllegalArgument(format!("'{hex}' is not valid hex")))?;
    }
    Ok(ObjId::from_bytes(bytes))
}

/// Decodes a reference's byte representation back to JSON (`null` or a
/// hex `ObjId` string).
///
/// # Errors
///
/// Propagates any decoding failure from the underlying encoding.
pub fn decode_reference(encoding: &ReferenceEncoding, bytes: &[u8]) -> GraphResult<JsonValue> {
    let decoded = encoding.read(bytes)?;
    Ok(match decoded {
        Some(obj_id) => JsonValue::String(obj_id.to_hex()),
        None => JsonValue::Null,
    })
}

/// The `NullSafeEncoding`-free default bytes a null reference encodes
/// to, for use as a complex field's default.
#[must_use]
pub fn default_reference_bytes() -> Vec<u8> {
    ReferenceEncoding::unrestricted().encode(&None)
}
