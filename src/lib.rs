//! # trackfmt — Schema-Driven Tracker File Codec
//!
//! Decode and encode the fixed-layout binary project files used by hardware
//! music trackers (songs, instruments, presets), driven by a declarative
//! description of each block's fields: offsets, widths, encodings, defaults.
//!
//! ## Field kinds
//!
//! - Raw unsigned integers (`u8` .. `u64`, codec endianness)
//! - Nibble-packed parameter pairs (`nibble(high)` / `nibble(low)`)
//! - Fixed-width text (`str(n)`, NUL-terminated, 0xFF pad sentinel)
//! - Single-byte enum codes resolved through a registry (`enum(key)`)
//! - Opaque byte runs (`bytes(n)`)
//! - Nested sub-blocks (`block(name)`, arrays via `block(name)[n]`)
//!
//! ## Example schema
//!
//! ```text
//! enum instr_type {
//! 	WAVSYNTH = 0x00;
//! 	MACROSYNTH = 0x01;
//! }
//!
//! block instrument (size 215) {
//! 	kind: enum(instr_type) @ 0x00;
//! 	name: str(12) @ 0x01;
//! 	transpose: nibble(high) @ 0x0D;
//! 	table_tick: nibble(low) @ 0x0D;
//! }
//! ```
//!
//! ## Direction policies
//!
//! Decode is tolerant per field: an unknown enum code or a truncated buffer
//! marks that field with an issue and the rest of the block still decodes.
//! Encode is strict up front: the record is validated in full and either
//! every byte is written or the encode is refused with the complete finding
//! list. Schema consistency (overlapping fields, unknown references) is
//! checked once at load time and is fatal there.
//!
//! ## Usage
//!
//! See the [README](https://github.com/yourusername/trackfmt) and
//! `tests/integration.rs` for full examples.

pub mod bank;
pub mod bits;
pub mod codec;
pub mod dump;
pub mod parser;
pub mod patch;
pub mod record;
pub mod registry;
pub mod schema;
pub mod strings;
pub mod validate;
pub mod value;

pub use bank::{decode_bank, encode_bank, BankDecodeResult, BankRecord, FailedRecord};
pub use codec::{Codec, CodecError, Endianness};
pub use dump::{format_record, plain_to_record, record_to_plain, PlainValue};
pub use parser::{parse, EnumDef, SchemaFile};
pub use patch::{read_field, write_field};
pub use record::{DecodedRecord, FieldIssue};
pub use registry::{EnumRegistry, RegistryError};
pub use schema::{
    BlockSchema, FieldDescriptor, FieldKind, NibblePos, SchemaError, SchemaSet,
};
pub use validate::{ValidationError, ValidationErrorKind, ValidationResult};
pub use value::Value;
