//! Accumulating validation of records against block schemas.
//!
//! Validation never raises: it returns a result object listing every
//! violation found, so a caller (a preset loader rejecting a hand-edited
//! file, say) can report all problems in one pass instead of failing on the
//! first. The encode path runs these checks before writing a single byte;
//! an invalid record is refused outright, never partially written.

use std::fmt;

use crate::record::{join_path, DecodedRecord};
use crate::registry::EnumRegistry;
use crate::schema::{BlockSchema, FieldKind, SchemaSet};
use crate::value::Value;

/// Which check produced the finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Raw enum integer has no registered name.
    OutOfRange,
    /// Enum symbol not registered.
    UnknownSymbol,
    /// No value supplied and the field has no default.
    MissingField,
    /// Integer does not fit the field's byte width.
    IntegerWidth,
    /// String does not fit the field's byte length once encoded.
    StringLength,
    /// Byte run is not exactly the field's length.
    ByteLength,
    /// Value variant does not match the field kind.
    WrongKind,
    /// The named block schema does not exist.
    UnknownBlock,
}

/// One finding: the offending field (dotted path for nested blocks) and a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

/// Every violation found, in field order. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    fn push(&mut self, field: String, kind: ValidationErrorKind, message: String) {
        self.errors.push(ValidationError { field, kind, message });
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "no problems");
        }
        write!(f, "{} problem(s)", self.errors.len())?;
        for e in &self.errors {
            write!(f, "; {}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

/// Single finding for a block name with no schema, for callers that must
/// always return a result object.
pub(crate) fn unknown_block(block: &str) -> ValidationResult {
    let mut result = ValidationResult::default();
    result.push(
        block.to_string(),
        ValidationErrorKind::UnknownBlock,
        format!("unknown block schema {}", block),
    );
    result
}

/// Check a single value against one field kind. Used by in-place patching,
/// which writes one field without an enclosing record.
pub(crate) fn check_single(
    schemas: &SchemaSet,
    registry: &EnumRegistry,
    kind: &FieldKind,
    field: &str,
    value: &Value,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_field(schemas, registry, kind, value, field.to_string(), &mut result);
    result
}

/// Check one record against one block schema, descending into nested
/// sub-records with dotted field paths. Record entries with no matching
/// descriptor are ignored (forward-compatible by omission).
pub fn check(
    schemas: &SchemaSet,
    registry: &EnumRegistry,
    schema: &BlockSchema,
    record: &DecodedRecord,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_block(schemas, registry, schema, record, "", &mut result);
    result
}

fn check_block(
    schemas: &SchemaSet,
    registry: &EnumRegistry,
    schema: &BlockSchema,
    record: &DecodedRecord,
    prefix: &str,
    out: &mut ValidationResult,
) {
    let empty = DecodedRecord::new();
    for f in schema.fields() {
        let path = join_path(prefix, &f.name);
        let value = record.get(&f.name).or(f.default.as_ref());
        let value = match (value, &f.kind) {
            (Some(v), _) => v,
            (None, FieldKind::Block { schema: target }) => {
                // An omitted sub-block is encoded from defaults; descend so
                // sub-fields without defaults get precise dotted reports.
                if let Some(sub) = schemas.get(target) {
                    check_block(schemas, registry, sub, &empty, &path, out);
                }
                continue;
            }
            (None, _) => {
                out.push(
                    path,
                    ValidationErrorKind::MissingField,
                    "missing required field (no value and no default)".to_string(),
                );
                continue;
            }
        };
        check_field(schemas, registry, &f.kind, value, path, out);
    }
}

fn check_field(
    schemas: &SchemaSet,
    registry: &EnumRegistry,
    kind: &FieldKind,
    value: &Value,
    path: String,
    out: &mut ValidationResult,
) {
    match kind {
        FieldKind::Uint { width } => match value {
            Value::Uint(v) => {
                if !fits_width(*v, *width) {
                    out.push(
                        path,
                        ValidationErrorKind::IntegerWidth,
                        format!("value {:#x} does not fit in {} byte(s)", v, width),
                    );
                }
            }
            other => push_wrong_kind(out, path, "integer", other),
        },
        FieldKind::Nibble { .. } => match value {
            Value::Uint(v) => {
                if *v > 0xF {
                    out.push(
                        path,
                        ValidationErrorKind::OutOfRange,
                        format!("value {:#x} exceeds a nibble (0..=15)", v),
                    );
                }
            }
            other => push_wrong_kind(out, path, "integer", other),
        },
        FieldKind::Str { length } => match value {
            Value::Str(s) => {
                let n = s.as_bytes().len();
                if n > *length {
                    out.push(
                        path,
                        ValidationErrorKind::StringLength,
                        format!("{} bytes of text do not fit in {} byte field", n, length),
                    );
                }
            }
            other => push_wrong_kind(out, path, "string", other),
        },
        FieldKind::Enum { registry: key } => match value {
            Value::Sym(name) => {
                if registry.reverse(key, name).is_err() {
                    out.push(
                        path,
                        ValidationErrorKind::UnknownSymbol,
                        format!("symbol {:?} is not registered in {}", name, key),
                    );
                }
            }
            Value::Uint(raw) => {
                if *raw > 0xFF {
                    out.push(
                        path,
                        ValidationErrorKind::IntegerWidth,
                        format!("enum code {:#x} does not fit in one byte", raw),
                    );
                } else if registry.resolve(key, *raw).is_err() {
                    out.push(
                        path,
                        ValidationErrorKind::OutOfRange,
                        format!("raw value {:#04x} has no name in {}", raw, key),
                    );
                }
            }
            Value::UnresolvedEnum(raw) => {
                out.push(
                    path,
                    ValidationErrorKind::OutOfRange,
                    format!("raw value {:#04x} has no name in {}", raw, key),
                );
            }
            other => push_wrong_kind(out, path, "enum symbol or integer", other),
        },
        FieldKind::Bytes { length } => match value {
            Value::Bytes(b) => {
                if b.len() != *length {
                    out.push(
                        path,
                        ValidationErrorKind::ByteLength,
                        format!("expected exactly {} bytes, found {}", length, b.len()),
                    );
                }
            }
            other => push_wrong_kind(out, path, "bytes", other),
        },
        FieldKind::Block { schema: target } => match value {
            Value::Record(sub) => {
                if let Some(sub_schema) = schemas.get(target) {
                    check_block(schemas, registry, sub_schema, sub, &path, out);
                } else {
                    out.push(
                        path,
                        ValidationErrorKind::UnknownBlock,
                        format!("unknown block schema {}", target),
                    );
                }
            }
            other => push_wrong_kind(out, path, "record", other),
        },
    }
}

fn push_wrong_kind(out: &mut ValidationResult, path: String, expected: &str, found: &Value) {
    out.push(
        path,
        ValidationErrorKind::WrongKind,
        format!("expected {}, found {}", expected, found.kind_name()),
    );
}

fn fits_width(value: u64, width: usize) -> bool {
    if width >= 8 {
        true
    } else {
        value < (1u64 << (8 * width))
    }
}
