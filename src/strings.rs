//! Fixed-width text fields.
//!
//! On disk a name field occupies exactly `length` bytes: UTF-8 text,
//! NUL-terminated when shorter than the field, with 0xFF used by the
//! firmware as a pad sentinel after (or instead of) the terminator.
//! Decoding never fails; encoding always produces exactly `length` bytes.
//! The round trip is one-directional by design: padding and truncation are
//! lossy, so `decode(encode(s))` may differ from `s`.

/// Firmware pad sentinel. Distinct from the NUL terminator: NUL ends the
/// string, 0xFF bytes are stripped wherever they appear before it.
pub const PAD_SENTINEL: u8 = 0xFF;

/// Decode a fixed-width field: truncate at the first NUL, strip every pad
/// sentinel from the remainder, interpret as UTF-8 (invalid sequences become
/// replacement characters), trim surrounding whitespace.
pub fn decode_fixed(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let kept: Vec<u8> = raw[..end]
        .iter()
        .copied()
        .filter(|&b| b != PAD_SENTINEL)
        .collect();
    String::from_utf8_lossy(&kept).trim().to_string()
}

/// Encode `s` into exactly `length` bytes: UTF-8, truncated byte-exact when
/// too long, NUL-padded on the right when shorter.
///
/// Truncation is not rune-aware: a multi-byte code point straddling the
/// boundary is split, and decode turns the partial sequence into a
/// replacement character. Known, accepted edge case.
pub fn encode_fixed(s: &str, length: usize) -> Vec<u8> {
    let mut out = s.as_bytes().to_vec();
    out.truncate(length);
    out.resize(length, 0);
    out
}
