//! Block schemas: resolved field descriptors and load-time consistency
//! checks.
//!
//! A block is one fixed-size binary record (an instrument, a modulator, a
//! song header) addressed by a base offset within a file. Field offsets are
//! absolute within their block; nested blocks compose by offset addition.
//! Schemas are built once per format version and immutable afterwards; the
//! codec takes them by shared reference and never mutates them.
//!
//! [`SchemaSet::resolve`] is the single consistency checkpoint. Everything
//! that would corrupt a file if left to decode/encode time is fatal here:
//! out-of-bounds fields, overlapping byte ranges, unknown enum registries,
//! unknown or recursive block references. Overlap in particular is always an
//! authoring bug, with one sanctioned exception: a high/low nibble pair
//! sharing a byte is the format's own packing convention.

use std::collections::HashMap;

use thiserror::Error;

use crate::registry::EnumRegistry;
use crate::value::Value;

/// Which half of a shared byte a nibble field occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NibblePos {
    High,
    Low,
}

/// Field encoding. Exactly one kind per descriptor; the kind fixes the byte
/// width and both codec directions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Raw unsigned integer, `width` bytes (1..=8), codec endianness.
    Uint { width: usize },
    /// One nibble of a shared byte.
    Nibble { position: NibblePos },
    /// Fixed-width text, NUL-terminated, 0xFF-padded.
    Str { length: usize },
    /// Single-byte enum code resolved through the named registry.
    Enum { registry: String },
    /// Opaque byte run of exactly `length` bytes.
    Bytes { length: usize },
    /// Nested sub-block; width is the referenced schema's size.
    Block { schema: String },
}

impl FieldKind {
    /// Byte width when it does not depend on another schema. `Block` widths
    /// come from the referenced schema, so only a resolved set knows them.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            FieldKind::Uint { width } => Some(*width),
            FieldKind::Nibble { .. } => Some(1),
            FieldKind::Str { length } => Some(*length),
            FieldKind::Enum { .. } => Some(1),
            FieldKind::Bytes { length } => Some(*length),
            FieldKind::Block { .. } => None,
        }
    }
}

/// Resolved description of one field: position, encoding, optional default
/// used when an encode source omits the field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub offset: usize,
    pub kind: FieldKind,
    pub default: Option<Value>,
}

/// One block layout: named fields sharing a fixed total byte length.
/// Fields are kept sorted by offset regardless of declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSchema {
    pub name: String,
    pub size: usize,
    fields: Vec<FieldDescriptor>,
}

impl BlockSchema {
    pub fn new(name: impl Into<String>, size: usize, mut fields: Vec<FieldDescriptor>) -> Self {
        fields.sort_by_key(|f| f.offset);
        BlockSchema { name: name.into(), size, fields }
    }

    /// Fields in offset order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate block: {0}")]
    DuplicateBlock(String),
    #[error("{block}: duplicate field {field}")]
    DuplicateField { block: String, field: String },
    #[error("{block}.{field}: integer width {width} not supported (1..=8 bytes)")]
    BadWidth { block: String, field: String, width: usize },
    #[error("{block}.{field}: field ends at {end:#x}, past block size {size:#x}")]
    FieldOutOfBounds { block: String, field: String, end: usize, size: usize },
    #[error("{block}: fields {first} and {second} overlap at offset {offset:#04x}")]
    Overlap { block: String, first: String, second: String, offset: usize },
    #[error("{block}.{field}: unknown enum registry {registry}")]
    UnknownRegistry { block: String, field: String, registry: String },
    #[error("{block}.{field}: unknown block {target}")]
    UnknownBlock { block: String, field: String, target: String },
    #[error("{block}.{field}: recursive block reference through {target}")]
    RecursiveBlock { block: String, field: String, target: String },
}

/// All block schemas for one format version, indexed by name, fully checked.
#[derive(Debug, Clone)]
pub struct SchemaSet {
    blocks: Vec<BlockSchema>,
    by_name: HashMap<String, usize>,
}

impl SchemaSet {
    /// Check and index a set of block schemas against an enum registry.
    /// Every consistency failure here is fatal: no decode or encode may be
    /// attempted with an unresolved set.
    pub fn resolve(blocks: Vec<BlockSchema>, registry: &EnumRegistry) -> Result<Self, SchemaError> {
        let mut by_name = HashMap::with_capacity(blocks.len());
        for (i, b) in blocks.iter().enumerate() {
            if by_name.insert(b.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateBlock(b.name.clone()));
            }
        }
        for b in &blocks {
            check_fields(b, &blocks, &by_name, registry)?;
        }
        check_recursion(&blocks, &by_name)?;
        Ok(SchemaSet { blocks, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&BlockSchema> {
        self.by_name.get(name).map(|&i| &self.blocks[i])
    }

    pub fn blocks(&self) -> &[BlockSchema] {
        &self.blocks
    }

    /// Byte width of a field kind within this set. `None` only for a block
    /// reference that does not resolve, which [`SchemaSet::resolve`] rules
    /// out.
    pub fn width_of(&self, kind: &FieldKind) -> Option<usize> {
        match kind {
            FieldKind::Block { schema } => self.get(schema).map(|b| b.size),
            other => other.fixed_width(),
        }
    }
}

fn width_in(
    blocks: &[BlockSchema],
    by_name: &HashMap<String, usize>,
    kind: &FieldKind,
) -> Option<usize> {
    match kind {
        FieldKind::Block { schema } => by_name.get(schema).map(|&i| blocks[i].size),
        other => other.fixed_width(),
    }
}

fn check_fields(
    block: &BlockSchema,
    blocks: &[BlockSchema],
    by_name: &HashMap<String, usize>,
    registry: &EnumRegistry,
) -> Result<(), SchemaError> {
    let mut seen = HashMap::new();
    for f in block.fields() {
        if seen.insert(f.name.as_str(), ()).is_some() {
            return Err(SchemaError::DuplicateField {
                block: block.name.clone(),
                field: f.name.clone(),
            });
        }
        match &f.kind {
            FieldKind::Uint { width } if *width == 0 || *width > 8 => {
                return Err(SchemaError::BadWidth {
                    block: block.name.clone(),
                    field: f.name.clone(),
                    width: *width,
                });
            }
            FieldKind::Enum { registry: key } if !registry.contains(key) => {
                return Err(SchemaError::UnknownRegistry {
                    block: block.name.clone(),
                    field: f.name.clone(),
                    registry: key.clone(),
                });
            }
            FieldKind::Block { schema } if !by_name.contains_key(schema) => {
                return Err(SchemaError::UnknownBlock {
                    block: block.name.clone(),
                    field: f.name.clone(),
                    target: schema.clone(),
                });
            }
            _ => {}
        }
        // Width is known for every kind once references are checked.
        let width = width_in(blocks, by_name, &f.kind).unwrap_or(0);
        let end = f.offset + width;
        if end > block.size {
            return Err(SchemaError::FieldOutOfBounds {
                block: block.name.clone(),
                field: f.name.clone(),
                end,
                size: block.size,
            });
        }
    }
    check_overlap(block, blocks, by_name)
}

/// Byte-range overlap between any two fields is fatal, except the high/low
/// nibble pair sharing one byte. Fields are offset-sorted, so each field
/// only needs comparing with the run that starts before it ends.
fn check_overlap(
    block: &BlockSchema,
    blocks: &[BlockSchema],
    by_name: &HashMap<String, usize>,
) -> Result<(), SchemaError> {
    let fields = block.fields();
    for i in 0..fields.len() {
        let a = &fields[i];
        let a_end = a.offset + width_in(blocks, by_name, &a.kind).unwrap_or(0);
        for b in &fields[i + 1..] {
            if b.offset >= a_end {
                break;
            }
            let nibble_pair = matches!(
                (&a.kind, &b.kind),
                (
                    FieldKind::Nibble { position: pa },
                    FieldKind::Nibble { position: pb },
                ) if a.offset == b.offset && pa != pb
            );
            if !nibble_pair {
                return Err(SchemaError::Overlap {
                    block: block.name.clone(),
                    first: a.name.clone(),
                    second: b.name.clone(),
                    offset: b.offset,
                });
            }
        }
    }
    Ok(())
}

/// Reject cycles among block references. Real formats nest two or three
/// levels (file → instrument → modulator); a cycle would make field widths
/// and decode recursion unbounded.
fn check_recursion(
    blocks: &[BlockSchema],
    by_name: &HashMap<String, usize>,
) -> Result<(), SchemaError> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        InStack,
        Done,
    }

    fn visit(
        idx: usize,
        blocks: &[BlockSchema],
        by_name: &HashMap<String, usize>,
        state: &mut [State],
    ) -> Result<(), SchemaError> {
        state[idx] = State::InStack;
        for f in blocks[idx].fields() {
            if let FieldKind::Block { schema } = &f.kind {
                if let Some(&target) = by_name.get(schema.as_str()) {
                    match state[target] {
                        State::InStack => {
                            return Err(SchemaError::RecursiveBlock {
                                block: blocks[idx].name.clone(),
                                field: f.name.clone(),
                                target: schema.clone(),
                            });
                        }
                        State::Unvisited => visit(target, blocks, by_name, state)?,
                        State::Done => {}
                    }
                }
            }
        }
        state[idx] = State::Done;
        Ok(())
    }

    let mut state = vec![State::Unvisited; blocks.len()];
    for i in 0..blocks.len() {
        if state[i] == State::Unvisited {
            visit(i, blocks, by_name, &mut state)?;
        }
    }
    Ok(())
}
