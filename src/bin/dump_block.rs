//! Decode records from a project file and print their fields.
//!
//! Usage:
//!   dump_block SCHEMA.schema BLOCK FILE [--base N] [--count N] [--big-endian]
//!
//! With --count, decodes a bank of records at the block's stride; otherwise
//! a single record at --base (default 0). Numbers accept 0x prefixes.
//! Decode issues (unknown enum codes, truncated fields) are printed inline,
//! prefixed with `!`; they do not fail the run.

use trackfmt::{decode_bank, format_record, parse, Codec, Endianness};

fn parse_num(s: &str) -> anyhow::Result<usize> {
    let n = if let Some(hex) = s.strip_prefix("0x") {
        usize::from_str_radix(hex, 16)?
    } else {
        s.parse::<usize>()?
    };
    Ok(n)
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut positional = Vec::new();
    let mut base = 0usize;
    let mut count = None;
    let mut endianness = Endianness::Little;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--base" => {
                i += 1;
                base = parse_num(args.get(i).map(String::as_str).unwrap_or(""))?;
            }
            "--count" => {
                i += 1;
                count = Some(parse_num(args.get(i).map(String::as_str).unwrap_or(""))?);
            }
            "--big-endian" => endianness = Endianness::Big,
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let [schema_path, block, file_path] = positional.as_slice() else {
        eprintln!("usage: dump_block SCHEMA.schema BLOCK FILE [--base N] [--count N] [--big-endian]");
        std::process::exit(2);
    };

    let source = std::fs::read_to_string(schema_path)?;
    let (schemas, registry) = parse(&source)
        .map_err(|e| anyhow::anyhow!(e))?
        .resolve()
        .map_err(|e| anyhow::anyhow!(e))?;
    let codec = Codec::new(schemas, registry, endianness);
    let bytes = std::fs::read(file_path)?;

    match count {
        None => {
            let record = codec.decode(block, &bytes, base)?;
            println!("{}", format_record(&record, 0));
        }
        Some(n) => {
            let bank = decode_bank(&codec, block, &bytes, base, n)?;
            for r in &bank.records {
                println!(
                    "[{}] {:#06x}..{:#06x}",
                    r.index, r.byte_range.0, r.byte_range.1
                );
                println!("{}", format_record(&r.record, 1));
            }
            for f in &bank.failed {
                println!("[{}] failed: {}", f.index, f.reason);
            }
        }
    }
    Ok(())
}
