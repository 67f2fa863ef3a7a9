//! Schema-driven decode/encode for fixed-layout blocks.
//!
//! Decode reads each field at `base + offset` with the width its kind
//! implies; one undecodable field (unknown enum code, truncated buffer)
//! becomes a field issue on the record and the rest of the block still
//! decodes. Encode is the opposite policy: the record is validated in full
//! first and either every byte is written or nothing is.
//!
//! Nested blocks compose by offset addition: a parent field of kind
//! `Block { schema }` decodes the referenced schema at
//! `base + field.offset`, recursively. Recursion depth is bounded by the
//! schema DAG ([`SchemaSet::resolve`](crate::schema::SchemaSet::resolve)
//! rejects cycles), in practice two or three levels.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

use crate::bits;
use crate::record::DecodedRecord;
use crate::registry::EnumRegistry;
use crate::schema::{BlockSchema, FieldKind, NibblePos, SchemaSet};
use crate::strings;
use crate::validate::{self, ValidationResult};
use crate::value::Value;

/// Multi-byte integer convention. The tracker format is little-endian;
/// `Big` stays available for firmware revisions that flip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("unknown block: {0}")]
    UnknownBlock(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("{field}: buffer too short (need {need} byte(s) at {offset:#x}, have {have})")]
    BufferTooShort { field: String, offset: usize, need: usize, have: usize },
    #[error("{field}: raw value {raw:#04x} has no name in enum registry {registry}")]
    UnresolvedEnum { field: String, registry: String, raw: u64 },
    #[error("{field}: symbol {symbol:?} is not registered in {registry}")]
    UnknownSymbol { field: String, registry: String, symbol: String },
    #[error("{field}: missing required field (no value and no default)")]
    MissingRequiredField { field: String },
    #[error("{field}: expected {expected}, found {found}")]
    WrongKind { field: String, expected: &'static str, found: &'static str },
    #[error("encode refused: {0}")]
    Refused(ValidationResult),
}

/// Stateless codec over one resolved schema set and enum registry. Holds no
/// per-call state; safe to share across threads.
#[derive(Debug, Clone)]
pub struct Codec {
    pub endianness: Endianness,
    schemas: SchemaSet,
    registry: EnumRegistry,
}

impl Codec {
    pub fn new(schemas: SchemaSet, registry: EnumRegistry, endianness: Endianness) -> Self {
        Codec { endianness, schemas, registry }
    }

    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    pub fn registry(&self) -> &EnumRegistry {
        &self.registry
    }

    /// Decode one block at `base` within `buf`.
    ///
    /// Field-level problems (unknown enum code, buffer ending inside a
    /// field) are recorded as issues on the returned record; only an
    /// unknown block name is an error.
    pub fn decode(&self, block: &str, buf: &[u8], base: usize) -> Result<DecodedRecord, CodecError> {
        let schema = self
            .schemas
            .get(block)
            .ok_or_else(|| CodecError::UnknownBlock(block.to_string()))?;
        Ok(self.decode_schema(schema, buf, base))
    }

    fn decode_schema(&self, schema: &BlockSchema, buf: &[u8], base: usize) -> DecodedRecord {
        let mut record = DecodedRecord::new();
        for f in schema.fields() {
            let width = match self.schemas.width_of(&f.kind) {
                Some(w) => w,
                None => continue,
            };
            let start = base + f.offset;
            let slice = match buf.get(start..start + width) {
                Some(s) => s,
                None => {
                    record.push_issue(
                        f.name.clone(),
                        CodecError::BufferTooShort {
                            field: f.name.clone(),
                            offset: start,
                            need: width,
                            have: buf.len().saturating_sub(start),
                        },
                    );
                    continue;
                }
            };
            match &f.kind {
                FieldKind::Uint { width } => {
                    record.set(f.name.clone(), Value::Uint(self.read_uint(slice, *width)));
                }
                FieldKind::Nibble { position } => {
                    let (high, low) = bits::split_byte(slice[0]);
                    let v = match position {
                        NibblePos::High => high,
                        NibblePos::Low => low,
                    };
                    record.set(f.name.clone(), Value::Uint(v as u64));
                }
                FieldKind::Str { .. } => {
                    record.set(f.name.clone(), Value::Str(strings::decode_fixed(slice)));
                }
                FieldKind::Enum { registry } => {
                    let raw = slice[0] as u64;
                    match self.registry.resolve(registry, raw) {
                        Ok(name) => record.set(f.name.clone(), Value::Sym(name.to_string())),
                        Err(_) => {
                            record.set(f.name.clone(), Value::UnresolvedEnum(raw));
                            record.push_issue(
                                f.name.clone(),
                                CodecError::UnresolvedEnum {
                                    field: f.name.clone(),
                                    registry: registry.clone(),
                                    raw,
                                },
                            );
                        }
                    }
                }
                FieldKind::Bytes { .. } => {
                    record.set(f.name.clone(), Value::Bytes(slice.to_vec()));
                }
                FieldKind::Block { schema: target } => {
                    if let Some(sub) = self.schemas.get(target) {
                        record.set(f.name.clone(), Value::Record(self.decode_schema(sub, buf, start)));
                    }
                }
            }
        }
        record
    }

    /// Validate the record against the block schema. Never fails; an
    /// unknown block name comes back as a single finding.
    pub fn validate(&self, block: &str, record: &DecodedRecord) -> ValidationResult {
        match self.schemas.get(block) {
            Some(schema) => validate::check(&self.schemas, &self.registry, schema, record),
            None => validate::unknown_block(block),
        }
    }

    /// Encode one block into a fresh buffer of exactly the schema's size.
    ///
    /// The record is validated first; any violation refuses the encode with
    /// the complete finding list before a single byte is written. Record
    /// entries with no matching field are ignored. Bytes no field covers
    /// stay zero.
    pub fn encode(&self, block: &str, record: &DecodedRecord) -> Result<Vec<u8>, CodecError> {
        let schema = self
            .schemas
            .get(block)
            .ok_or_else(|| CodecError::UnknownBlock(block.to_string()))?;
        let report = validate::check(&self.schemas, &self.registry, schema, record);
        if !report.is_valid() {
            return Err(CodecError::Refused(report));
        }
        let mut out = vec![0u8; schema.size];
        self.encode_schema(schema, record, &mut out, 0)?;
        Ok(out)
    }

    /// Encode one block into `buf` at `base` (for composing records into a
    /// whole project file). Same refuse-before-write policy as
    /// [`Codec::encode`]; bytes outside `base..base + size` are untouched.
    pub fn encode_into(
        &self,
        block: &str,
        record: &DecodedRecord,
        buf: &mut [u8],
        base: usize,
    ) -> Result<(), CodecError> {
        let schema = self
            .schemas
            .get(block)
            .ok_or_else(|| CodecError::UnknownBlock(block.to_string()))?;
        if base + schema.size > buf.len() {
            return Err(CodecError::BufferTooShort {
                field: block.to_string(),
                offset: base,
                need: schema.size,
                have: buf.len().saturating_sub(base),
            });
        }
        let report = validate::check(&self.schemas, &self.registry, schema, record);
        if !report.is_valid() {
            return Err(CodecError::Refused(report));
        }
        self.encode_schema(schema, record, buf, base)
    }

    fn encode_schema(
        &self,
        schema: &BlockSchema,
        record: &DecodedRecord,
        out: &mut [u8],
        base: usize,
    ) -> Result<(), CodecError> {
        for f in schema.fields() {
            let fallback;
            let value = match (record.get(&f.name), &f.default, &f.kind) {
                (Some(v), _, _) => v,
                (None, Some(d), _) => d,
                // An omitted sub-block encodes from its fields' defaults;
                // validation already guaranteed those exist.
                (None, None, FieldKind::Block { .. }) => {
                    fallback = Value::Record(DecodedRecord::new());
                    &fallback
                }
                (None, None, _) => {
                    return Err(CodecError::MissingRequiredField { field: f.name.clone() });
                }
            };
            self.encode_field(&f.name, &f.kind, value, out, base + f.offset)?;
        }
        Ok(())
    }

    fn encode_field(
        &self,
        name: &str,
        kind: &FieldKind,
        value: &Value,
        out: &mut [u8],
        start: usize,
    ) -> Result<(), CodecError> {
        match kind {
            FieldKind::Uint { width } => {
                let v = value
                    .as_u64()
                    .ok_or_else(|| wrong_kind(name, "integer", value))?;
                self.write_uint(&mut out[start..start + width], *width, v);
            }
            FieldKind::Nibble { position } => {
                let v = value
                    .as_u64()
                    .ok_or_else(|| wrong_kind(name, "integer", value))? as u8;
                let cur = out[start];
                out[start] = match position {
                    NibblePos::High => bits::set_bits(cur, v, 4, 4),
                    NibblePos::Low => bits::set_bits(cur, v, 0, 4),
                };
            }
            FieldKind::Str { length } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| wrong_kind(name, "string", value))?;
                out[start..start + length].copy_from_slice(&strings::encode_fixed(s, *length));
            }
            FieldKind::Enum { registry } => {
                let raw = match value {
                    Value::Sym(sym) => {
                        self.registry.reverse(registry, sym).map_err(|_| {
                            CodecError::UnknownSymbol {
                                field: name.to_string(),
                                registry: registry.clone(),
                                symbol: sym.clone(),
                            }
                        })?
                    }
                    Value::Uint(raw) => *raw,
                    other => return Err(wrong_kind(name, "enum symbol or integer", other)),
                };
                out[start] = raw as u8;
            }
            FieldKind::Bytes { length } => {
                let b = value
                    .as_bytes()
                    .ok_or_else(|| wrong_kind(name, "bytes", value))?;
                if b.len() != *length {
                    return Err(CodecError::WrongKind {
                        field: name.to_string(),
                        expected: "exact-length bytes",
                        found: "bytes of a different length",
                    });
                }
                out[start..start + length].copy_from_slice(b);
            }
            FieldKind::Block { schema: target } => {
                let sub = value
                    .as_record()
                    .ok_or_else(|| wrong_kind(name, "record", value))?;
                let sub_schema = self
                    .schemas
                    .get(target)
                    .ok_or_else(|| CodecError::UnknownBlock(target.clone()))?;
                self.encode_schema(sub_schema, sub, out, start)?;
            }
        }
        Ok(())
    }

    pub(crate) fn read_uint(&self, slice: &[u8], width: usize) -> u64 {
        if width == 1 {
            return slice[0] as u64;
        }
        match self.endianness {
            Endianness::Big => BigEndian::read_uint(slice, width),
            Endianness::Little => LittleEndian::read_uint(slice, width),
        }
    }

    pub(crate) fn write_uint(&self, slice: &mut [u8], width: usize, value: u64) {
        // Mask to the field width so byteorder never sees excess bits;
        // validation rejects oversized values before the write path runs.
        let value = if width >= 8 {
            value
        } else {
            value & ((1u64 << (8 * width)) - 1)
        };
        if width == 1 {
            slice[0] = value as u8;
            return;
        }
        match self.endianness {
            Endianness::Big => BigEndian::write_uint(slice, value, width),
            Endianness::Little => LittleEndian::write_uint(slice, value, width),
        }
    }
}

fn wrong_kind(field: &str, expected: &'static str, found: &Value) -> CodecError {
    CodecError::WrongKind {
        field: field.to_string(),
        expected,
        found: found.kind_name(),
    }
}
