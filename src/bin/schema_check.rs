//! Check schema text files: parse, build the registry, resolve the block
//! set, and report every consistency problem (overlapping fields, unknown
//! enum registries, out-of-bounds offsets, recursive references).
//!
//! Usage:
//!   schema_check FILE.schema [...]
//!   schema_check < file.schema
//!
//! Exit code 1 if any file fails.

use std::io::Read;

use trackfmt::parse;

fn check_source(path: &str, source: &str) -> bool {
    let file = match parse(source) {
        Ok(f) => f,
        Err(e) => {
            println!("{}: error: {}", path, e);
            return false;
        }
    };
    let n_enums = file.enums.len();
    let n_blocks = file.blocks.len();
    match file.resolve() {
        Ok((schemas, _registry)) => {
            let n_fields: usize = schemas.blocks().iter().map(|b| b.fields().len()).sum();
            println!(
                "{}: ok ({} enum(s), {} block(s), {} field(s))",
                path, n_enums, n_blocks, n_fields
            );
            true
        }
        Err(e) => {
            println!("{}: error: {}", path, e);
            false
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut ok = true;

    if args.is_empty() {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        ok = check_source("<stdin>", &source);
    } else {
        for path in &args {
            let source = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("{}: {}", path, e))?;
            ok &= check_source(path, &source);
        }
    }

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
