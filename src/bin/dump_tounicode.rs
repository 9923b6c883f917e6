//! Debug tool: dump the codespace ranges and mappings of a ToUnicode CMap file

use pdf_text_stream::ToUnicodeCMap;
use std::env;
use std::fs;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: dump-tounicode <cmap_file>");
        std::process::exit(1);
    }

    let data = match fs::read(&args[1]) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error reading {}: {}", args[1], e);
            std::process::exit(1);
        }
    };
    let cmap = match ToUnicodeCMap::parse(&data) {
        Ok(cmap) => cmap,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("=== CODESPACE ({} ranges) ===", cmap.code_space_ranges().len());
    for range in cmap.code_space_ranges() {
        println!("  <{}> - <{}>", hex(&range.low), hex(&range.high));
    }

    let mut mappings: Vec<_> = cmap.mappings().collect();
    mappings.sort();
    println!("=== MAPPINGS ({}) ===", mappings.len());
    for (code, unicode) in mappings {
        let points: Vec<String> = unicode.chars().map(|c| format!("U+{:04X}", c as u32)).collect();
        println!("  <{}> -> {:?} ({})", hex(code), unicode, points.join(" "));
    }
}
