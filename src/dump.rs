//! Project decoded records to and from a flat, human-editable mapping, and
//! format them for display.
//!
//! The flat projection is the bridge to editable text formats: every field
//! becomes one `(name, scalar)` entry, name-sorted, with nested sub-blocks
//! flattened under dotted keys (`mods0.dest`). The reverse direction accepts
//! either an enum's symbolic name or its raw integer code for the same
//! field; symbols are resolved through the registry at encode time.

use crate::record::DecodedRecord;
use crate::schema::{BlockSchema, FieldKind, SchemaSet};
use crate::value::Value;

/// Scalar projection of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum PlainValue {
    Int(u64),
    Text(String),
}

/// Flatten a record into name-sorted `(path, scalar)` entries. Unresolved
/// enum codes project as their raw integer; byte runs as space-separated
/// hex.
pub fn record_to_plain(record: &DecodedRecord) -> Vec<(String, PlainValue)> {
    let mut out = Vec::new();
    flatten(record, "", &mut out);
    out
}

fn flatten(record: &DecodedRecord, prefix: &str, out: &mut Vec<(String, PlainValue)>) {
    for (name, value) in record.iter() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match value {
            Value::Uint(v) | Value::UnresolvedEnum(v) => out.push((path, PlainValue::Int(*v))),
            Value::Str(s) | Value::Sym(s) => out.push((path, PlainValue::Text(s.clone()))),
            Value::Bytes(b) => out.push((path, PlainValue::Text(hex_string(b)))),
            Value::Record(sub) => flatten(sub, &path, out),
        }
    }
}

/// Rebuild a record from flat entries for `block`. Field kinds drive the
/// conversion; enum fields accept a symbol (`Text`) or a raw code (`Int`).
/// Every problem is collected and reported together.
pub fn plain_to_record(
    schemas: &SchemaSet,
    block: &str,
    entries: &[(String, PlainValue)],
) -> Result<DecodedRecord, String> {
    let schema = schemas
        .get(block)
        .ok_or_else(|| format!("unknown block schema {}", block))?;
    let mut problems = Vec::new();
    let record = rebuild(schemas, schema, entries, "", &mut problems);
    if problems.is_empty() {
        Ok(record)
    } else {
        Err(problems.join("; "))
    }
}

fn rebuild(
    schemas: &SchemaSet,
    schema: &BlockSchema,
    entries: &[(String, PlainValue)],
    prefix: &str,
    problems: &mut Vec<String>,
) -> DecodedRecord {
    let mut record = DecodedRecord::new();
    for (path, plain) in entries {
        let local = match prefix {
            "" => path.as_str(),
            p => match path.strip_prefix(p).and_then(|s| s.strip_prefix('.')) {
                Some(rest) => rest,
                None => continue,
            },
        };
        let head = local.split('.').next().unwrap_or(local);
        let desc = match schema.field(head) {
            Some(d) => d,
            None => {
                problems.push(format!("{}: no such field in {}", path, schema.name));
                continue;
            }
        };
        match &desc.kind {
            FieldKind::Block { .. } => {
                // Dotted sub-entries are grouped in the second pass; a bare
                // scalar for a whole sub-block has no meaning.
                if !local.contains('.') {
                    problems.push(format!("{}: sub-blocks take dotted entries, not a scalar", path));
                }
            }
            kind => {
                if local.contains('.') {
                    problems.push(format!("{}: {} is not a sub-block", path, head));
                    continue;
                }
                match convert(kind, plain) {
                    Ok(v) => record.set(head, v),
                    Err(msg) => problems.push(format!("{}: {}", path, msg)),
                }
            }
        }
    }
    // Second pass: group sub-block entries per block-kind field.
    for f in schema.fields() {
        if let FieldKind::Block { schema: target } = &f.kind {
            let sub_prefix = if prefix.is_empty() {
                f.name.clone()
            } else {
                format!("{}.{}", prefix, f.name)
            };
            let has_entries = entries.iter().any(|(p, _)| {
                p.strip_prefix(&sub_prefix)
                    .map(|rest| rest.starts_with('.'))
                    .unwrap_or(false)
            });
            if !has_entries {
                continue;
            }
            if let Some(sub_schema) = schemas.get(target) {
                let sub = rebuild(schemas, sub_schema, entries, &sub_prefix, problems);
                record.set(f.name.clone(), Value::Record(sub));
            }
        }
    }
    record
}

fn convert(kind: &FieldKind, plain: &PlainValue) -> Result<Value, String> {
    Ok(match (kind, plain) {
        (FieldKind::Uint { .. }, PlainValue::Int(v)) => Value::Uint(*v),
        (FieldKind::Nibble { .. }, PlainValue::Int(v)) => Value::Uint(*v),
        (FieldKind::Enum { .. }, PlainValue::Int(v)) => Value::Uint(*v),
        (FieldKind::Enum { .. }, PlainValue::Text(s)) => Value::Sym(s.clone()),
        (FieldKind::Str { .. }, PlainValue::Text(s)) => Value::Str(s.clone()),
        (FieldKind::Bytes { .. }, PlainValue::Text(s)) => Value::Bytes(parse_hex(s)?),
        (FieldKind::Uint { .. } | FieldKind::Nibble { .. }, PlainValue::Text(_)) => {
            return Err("expected an integer".to_string());
        }
        (FieldKind::Str { .. }, PlainValue::Int(_)) => {
            return Err("expected text".to_string());
        }
        (FieldKind::Bytes { .. }, PlainValue::Int(_)) => {
            return Err("expected hex text".to_string());
        }
        (FieldKind::Block { .. }, _) => {
            return Err("sub-blocks take dotted entries, not a scalar".to_string());
        }
    })
}

/// Multi-line display of a record: name-sorted fields, nested blocks
/// indented, decode issues appended as `! field: message` lines.
pub fn format_record(record: &DecodedRecord, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    let mut lines = Vec::new();
    for (name, value) in record.iter() {
        match value {
            Value::Record(sub) => {
                lines.push(format!("{}{}:", pad, name));
                lines.push(format_record(sub, indent + 1));
            }
            Value::Uint(v) => lines.push(format!("{}{}: {}", pad, name, v)),
            Value::UnresolvedEnum(v) => lines.push(format!("{}{}: {:#04x} (?)", pad, name, v)),
            Value::Sym(s) => lines.push(format!("{}{}: {}", pad, name, s)),
            Value::Str(s) => lines.push(format!("{}{}: {:?}", pad, name, s)),
            Value::Bytes(b) => lines.push(format!("{}{}: hex({})", pad, name, hex_string(b))),
        }
    }
    for issue in record.issues() {
        lines.push(format!("{}! {}: {}", pad, issue.field, issue.error));
    }
    lines.join("\n")
}

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    s.split_whitespace()
        .map(|tok| u8::from_str_radix(tok, 16).map_err(|e| format!("bad hex byte {}: {}", tok, e)))
        .collect()
}
