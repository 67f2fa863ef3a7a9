//! In-place single-field access on raw buffers.
//!
//! Tooling that tweaks one parameter (rename an instrument, retarget one
//! modulator) does not need a full decode/encode round trip. These
//! functions read or patch exactly one field's bytes, leaving every other
//! byte untouched. Nibble writes read-modify-write the shared byte, so the
//! other half survives.

use crate::bits;
use crate::codec::{Codec, CodecError};
use crate::schema::{FieldKind, NibblePos};
use crate::strings;
use crate::validate;
use crate::value::Value;

/// Read one field of `block` from `buf` at `base`, exactly as a full decode
/// would. An enum code with no registered name comes back as
/// [`Value::UnresolvedEnum`]; a buffer ending inside the field is an error
/// here (there is no record to carry the issue).
pub fn read_field(
    codec: &Codec,
    block: &str,
    field: &str,
    buf: &[u8],
    base: usize,
) -> Result<Value, CodecError> {
    let (desc, width) = lookup(codec, block, field)?;
    let start = base + desc.offset;
    let slice = buf.get(start..start + width).ok_or_else(|| CodecError::BufferTooShort {
        field: field.to_string(),
        offset: start,
        need: width,
        have: buf.len().saturating_sub(start),
    })?;
    Ok(match &desc.kind {
        FieldKind::Uint { width } => Value::Uint(codec.read_uint(slice, *width)),
        FieldKind::Nibble { position } => {
            let (high, low) = bits::split_byte(slice[0]);
            Value::Uint(match position {
                NibblePos::High => high,
                NibblePos::Low => low,
            } as u64)
        }
        FieldKind::Str { .. } => Value::Str(strings::decode_fixed(slice)),
        FieldKind::Enum { registry } => {
            let raw = slice[0] as u64;
            match codec.registry().resolve(registry, raw) {
                Ok(name) => Value::Sym(name.to_string()),
                Err(_) => Value::UnresolvedEnum(raw),
            }
        }
        FieldKind::Bytes { .. } => Value::Bytes(slice.to_vec()),
        FieldKind::Block { schema } => Value::Record(codec.decode(schema, buf, start)?),
    })
}

/// Patch one field of `block` in `buf` at `base`.
///
/// The value is validated against the field first (same checks as a full
/// encode) and the write is refused with the findings when it does not fit.
/// For a nibble field only the addressed half of the byte changes; for a
/// sub-block field the whole nested record is encoded into its slot.
pub fn write_field(
    codec: &Codec,
    block: &str,
    field: &str,
    buf: &mut [u8],
    base: usize,
    value: &Value,
) -> Result<(), CodecError> {
    let (desc, width) = lookup(codec, block, field)?;
    let start = base + desc.offset;
    if start + width > buf.len() {
        return Err(CodecError::BufferTooShort {
            field: field.to_string(),
            offset: start,
            need: width,
            have: buf.len().saturating_sub(start),
        });
    }
    let report = validate::check_single(codec.schemas(), codec.registry(), &desc.kind, field, value);
    if !report.is_valid() {
        return Err(CodecError::Refused(report));
    }
    match &desc.kind {
        FieldKind::Uint { width } => {
            let v = value.as_u64().unwrap_or(0);
            codec.write_uint(&mut buf[start..start + width], *width, v);
        }
        FieldKind::Nibble { position } => {
            let v = value.as_u64().unwrap_or(0) as u8;
            buf[start] = match position {
                NibblePos::High => bits::set_bits(buf[start], v, 4, 4),
                NibblePos::Low => bits::set_bits(buf[start], v, 0, 4),
            };
        }
        FieldKind::Str { length } => {
            let s = value.as_str().unwrap_or("");
            buf[start..start + length].copy_from_slice(&strings::encode_fixed(s, *length));
        }
        FieldKind::Enum { registry } => {
            let raw = match value {
                Value::Sym(sym) => codec.registry().reverse(registry, sym).map_err(|_| {
                    CodecError::UnknownSymbol {
                        field: field.to_string(),
                        registry: registry.clone(),
                        symbol: sym.clone(),
                    }
                })?,
                Value::Uint(raw) => *raw,
                other => {
                    return Err(CodecError::WrongKind {
                        field: field.to_string(),
                        expected: "enum symbol or integer",
                        found: other.kind_name(),
                    });
                }
            };
            buf[start] = raw as u8;
        }
        FieldKind::Bytes { length } => {
            let b = value.as_bytes().unwrap_or(&[]);
            buf[start..start + length].copy_from_slice(b);
        }
        FieldKind::Block { schema } => {
            let sub = value.as_record().ok_or(CodecError::WrongKind {
                field: field.to_string(),
                expected: "record",
                found: value.kind_name(),
            })?;
            codec.encode_into(schema, sub, buf, start)?;
        }
    }
    Ok(())
}

fn lookup<'a>(
    codec: &'a Codec,
    block: &str,
    field: &str,
) -> Result<(&'a crate::schema::FieldDescriptor, usize), CodecError> {
    let schema = codec
        .schemas()
        .get(block)
        .ok_or_else(|| CodecError::UnknownBlock(block.to_string()))?;
    let desc = schema
        .field(field)
        .ok_or_else(|| CodecError::UnknownField(format!("{}.{}", block, field)))?;
    let width = codec
        .schemas()
        .width_of(&desc.kind)
        .ok_or_else(|| CodecError::UnknownBlock(block.to_string()))?;
    Ok((desc, width))
}
