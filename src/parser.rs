//! Parse schema text into block and enum definitions using PEST.
//!
//! One schema file describes one format version: enum categories first (or
//! interleaved), then block layouts. `block(X)[n]` is array sugar the parser
//! expands into numbered fields (`mods0`, `mods1`, ...) at a stride of X's
//! size, so the resolved schema only ever contains plain descriptors; the
//! referenced block must therefore be defined earlier in the file.

use pest::Parser;
use pest_derive::Parser as PestParser;

use crate::registry::EnumRegistry;
use crate::schema::{BlockSchema, FieldDescriptor, FieldKind, NibblePos, SchemaSet};
use crate::value::Value;

#[derive(PestParser)]
#[grammar = "schema.pest"]
struct SchemaTextParser;

/// Parsed but unresolved schema file: definitions in source order.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    pub enums: Vec<EnumDef>,
    pub blocks: Vec<BlockSchema>,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<(u64, String)>,
}

impl SchemaFile {
    /// Build the registry and the checked schema set. Every load-time
    /// consistency failure (duplicates, overlaps, unknown references)
    /// surfaces here, before any decode or encode is possible.
    pub fn resolve(self) -> Result<(SchemaSet, EnumRegistry), String> {
        let mut registry = EnumRegistry::new();
        for e in self.enums {
            registry.insert(e.name, e.members).map_err(|e| e.to_string())?;
        }
        let schemas = SchemaSet::resolve(self.blocks, &registry).map_err(|e| e.to_string())?;
        Ok((schemas, registry))
    }
}

/// Parse schema source into definitions.
pub fn parse(source: &str) -> Result<SchemaFile, String> {
    let pairs = SchemaTextParser::parse(Rule::schema_file, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_schema_file(pair)
}

fn build_schema_file(pair: pest::iterators::Pair<Rule>) -> Result<SchemaFile, String> {
    let mut enums = Vec::new();
    let mut blocks: Vec<BlockSchema> = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::enum_def => enums.push(build_enum_def(inner)?),
            Rule::block_def => {
                let block = build_block_def(inner, &blocks)?;
                blocks.push(block);
            }
            Rule::EOI => {}
            other => return Err(format!("unexpected rule at top level: {:?}", other)),
        }
    }
    Ok(SchemaFile { enums, blocks })
}

fn build_enum_def(pair: pest::iterators::Pair<Rule>) -> Result<EnumDef, String> {
    let mut name = String::new();
    let mut members = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::enum_member => {
                let mut it = inner.into_inner();
                let member = it.next().ok_or("enum member: missing name")?;
                let value = it.next().ok_or("enum member: missing value")?;
                members.push((parse_number(value.as_str())?, member.as_str().to_string()));
            }
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("enum: missing name".to_string());
    }
    Ok(EnumDef { name, members })
}

fn build_block_def(
    pair: pest::iterators::Pair<Rule>,
    prior: &[BlockSchema],
) -> Result<BlockSchema, String> {
    let mut name = String::new();
    let mut size = None;
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::number => size = Some(parse_number(inner.as_str())? as usize),
            Rule::field_def => build_field_def(inner, prior, &mut fields)?,
            _ => {}
        }
    }
    let size = size.ok_or_else(|| format!("block {}: missing size", name))?;
    Ok(BlockSchema::new(name, size, fields))
}

fn build_field_def(
    pair: pest::iterators::Pair<Rule>,
    prior: &[BlockSchema],
    out: &mut Vec<FieldDescriptor>,
) -> Result<(), String> {
    let mut name = String::new();
    let mut kind = None;
    let mut array_count = None;
    let mut offset = None;
    let mut default = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::kind_spec => {
                let (k, count) = build_kind_spec(inner)?;
                kind = Some(k);
                array_count = count;
            }
            Rule::number => offset = Some(parse_number(inner.as_str())? as usize),
            Rule::default_clause => default = Some(build_default(inner)?),
            _ => {}
        }
    }
    let kind = kind.ok_or_else(|| format!("field {}: missing kind", name))?;
    let offset = offset.ok_or_else(|| format!("field {}: missing offset", name))?;
    match array_count {
        None => {
            out.push(FieldDescriptor { name, offset, kind, default });
            Ok(())
        }
        Some(count) => {
            let target = match &kind {
                FieldKind::Block { schema } => schema.clone(),
                _ => return Err(format!("field {}: [n] only applies to block fields", name)),
            };
            if default.is_some() {
                return Err(format!("field {}: block arrays cannot take a default", name));
            }
            if count == 0 {
                return Err(format!("field {}: array count must be positive", name));
            }
            // Stride comes from the referenced block, so it must already be
            // defined; a forward reference has no size yet.
            let stride = prior
                .iter()
                .find(|b| b.name == target)
                .map(|b| b.size)
                .ok_or_else(|| {
                    format!("field {}: block {} must be defined before an array of it", name, target)
                })?;
            for i in 0..count {
                out.push(FieldDescriptor {
                    name: format!("{}{}", name, i),
                    offset: offset + i * stride,
                    kind: kind.clone(),
                    default: None,
                });
            }
            Ok(())
        }
    }
}

fn build_kind_spec(
    pair: pest::iterators::Pair<Rule>,
) -> Result<(FieldKind, Option<usize>), String> {
    let inner = pair.into_inner().next().ok_or("empty kind")?;
    match inner.as_rule() {
        Rule::uint_kind => {
            let width = match inner.as_str() {
                "u8" => 1,
                "u16" => 2,
                "u24" => 3,
                "u32" => 4,
                "u64" => 8,
                other => return Err(format!("unknown integer kind: {}", other)),
            };
            Ok((FieldKind::Uint { width }, None))
        }
        Rule::nibble_kind => {
            let pos = inner.into_inner().next().ok_or("nibble: missing position")?;
            let position = match pos.as_str() {
                "high" => NibblePos::High,
                "low" => NibblePos::Low,
                other => return Err(format!("nibble position must be high or low, got {}", other)),
            };
            Ok((FieldKind::Nibble { position }, None))
        }
        Rule::str_kind => {
            let len = inner.into_inner().next().ok_or("str: missing length")?;
            Ok((FieldKind::Str { length: parse_number(len.as_str())? as usize }, None))
        }
        Rule::enum_kind => {
            let key = inner.into_inner().next().ok_or("enum: missing registry")?;
            Ok((FieldKind::Enum { registry: key.as_str().to_string() }, None))
        }
        Rule::bytes_kind => {
            let len = inner.into_inner().next().ok_or("bytes: missing length")?;
            Ok((FieldKind::Bytes { length: parse_number(len.as_str())? as usize }, None))
        }
        Rule::block_kind => {
            let mut target = String::new();
            let mut count = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::ident => target = part.as_str().to_string(),
                    Rule::array_len => {
                        let n = part.into_inner().next().ok_or("array: missing count")?;
                        count = Some(parse_number(n.as_str())? as usize);
                    }
                    _ => {}
                }
            }
            Ok((FieldKind::Block { schema: target }, count))
        }
        other => Err(format!("unexpected kind rule: {:?}", other)),
    }
}

fn build_default(pair: pest::iterators::Pair<Rule>) -> Result<Value, String> {
    let value = pair
        .into_inner()
        .next()
        .ok_or("default: missing value")?
        .into_inner()
        .next()
        .ok_or("default: missing value")?;
    Ok(match value.as_rule() {
        Rule::number => Value::Uint(parse_number(value.as_str())?),
        Rule::string_lit => {
            let s = value.as_str();
            Value::Str(s[1..s.len() - 1].to_string())
        }
        Rule::ident => Value::Sym(value.as_str().to_string()),
        other => return Err(format!("unexpected default rule: {:?}", other)),
    })
}

fn parse_number(s: &str) -> Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).map_err(|e| format!("bad hex number {}: {}", s, e))
    } else {
        s.parse::<u64>().map_err(|e| format!("bad number {}: {}", s, e))
    }
}
