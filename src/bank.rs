//! Decode a run of equally-sized records: an instrument bank, a phrase
//! table, a chain list.
//!
//! Project files store these as `count` back-to-back blocks at a fixed
//! stride. One unreadable slot must not block the rest, so slots that fall
//! entirely outside the buffer are reported with their byte ranges while
//! every reachable slot still decodes (carrying its own field issues, if
//! any).

use crate::codec::{Codec, CodecError};
use crate::record::DecodedRecord;

/// One successfully decoded slot.
#[derive(Debug, Clone, PartialEq)]
pub struct BankRecord {
    pub index: usize,
    pub byte_range: (usize, usize),
    pub record: DecodedRecord,
}

/// A slot that could not be decoded at all.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRecord {
    pub index: usize,
    pub byte_range: (usize, usize),
    pub reason: CodecError,
}

/// Decoded slots plus the slots that were out of reach.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BankDecodeResult {
    pub records: Vec<BankRecord>,
    pub failed: Vec<FailedRecord>,
}

/// Decode `count` records of `block` starting at `base`, stride = block
/// size. Slots starting past the end of the buffer land in `failed`; slots
/// the buffer only partially covers decode with per-field issues.
pub fn decode_bank(
    codec: &Codec,
    block: &str,
    buf: &[u8],
    base: usize,
    count: usize,
) -> Result<BankDecodeResult, CodecError> {
    let size = codec
        .schemas()
        .get(block)
        .ok_or_else(|| CodecError::UnknownBlock(block.to_string()))?
        .size;
    let mut result = BankDecodeResult::default();
    for index in 0..count {
        let start = base + index * size;
        let range = (start, start + size);
        if start >= buf.len() {
            result.failed.push(FailedRecord {
                index,
                byte_range: range,
                reason: CodecError::BufferTooShort {
                    field: block.to_string(),
                    offset: start,
                    need: size,
                    have: 0,
                },
            });
            continue;
        }
        let record = codec.decode(block, buf, start)?;
        result.records.push(BankRecord { index, byte_range: range, record });
    }
    Ok(result)
}

/// Encode `records` back-to-back into one buffer of `count * size` bytes.
/// Records are written at their `index` slot; any slot without a record is
/// left zeroed. Validation applies per record: the first refusal aborts the
/// whole encode, nothing is returned half-written.
pub fn encode_bank(
    codec: &Codec,
    block: &str,
    records: &[BankRecord],
    count: usize,
) -> Result<Vec<u8>, CodecError> {
    let size = codec
        .schemas()
        .get(block)
        .ok_or_else(|| CodecError::UnknownBlock(block.to_string()))?
        .size;
    let mut out = vec![0u8; count * size];
    for r in records {
        if r.index >= count {
            return Err(CodecError::BufferTooShort {
                field: block.to_string(),
                offset: r.index * size,
                need: size,
                have: 0,
            });
        }
        codec.encode_into(block, &r.record, &mut out, r.index * size)?;
    }
    Ok(out)
}
