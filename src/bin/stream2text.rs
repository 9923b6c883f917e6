//! CLI tool that extracts text from a raw content stream or a whole PDF

use pdf_text_stream::{
    extract_file, extract_pdf_text, Diagnostic, ExtractError, FontRegistry, ToUnicodeCMap,
};
use std::env;
use std::fs;
use std::process;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <file> [--diagnostics] [--font NAME=cmap_file]...", program);
    eprintln!();
    eprintln!("Extracts text from a decompressed content stream, or from every");
    eprintln!("page when <file> ends in .pdf. Each --font maps a resource name");
    eprintln!("to a ToUnicode CMap file for content stream input.");
    process::exit(1);
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }

    let path = &args[1];
    let mut show_diagnostics = false;
    let fonts = FontRegistry::new();

    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--diagnostics" => show_diagnostics = true,
            "--font" => {
                let Some((name, cmap_path)) = rest.next().and_then(|mapping| mapping.split_once('=')) else {
                    usage(&args[0]);
                };
                let loaded = fs::read(cmap_path)
                    .map_err(ExtractError::Io)
                    .and_then(|data| ToUnicodeCMap::parse(&data));
                let cmap = match loaded {
                    Ok(cmap) => cmap,
                    Err(e) => {
                        eprintln!("Error loading CMap {}: {}", cmap_path, e);
                        process::exit(1);
                    }
                };
                fonts.register_with_to_unicode(name, name, cmap, true);
            }
            _ => usage(&args[0]),
        }
    }

    if path.to_ascii_lowercase().ends_with(".pdf") {
        match extract_pdf_text(path) {
            Ok(pages) => {
                for page in pages {
                    println!("=== PAGE {} ===", page.page);
                    println!("{}", page.text);
                    println!();
                    if show_diagnostics {
                        print_diagnostics(&page.diagnostics);
                    }
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    match extract_file(path, &fonts) {
        Ok(extraction) => {
            println!("{}", extraction.text);
            if show_diagnostics {
                print_diagnostics(&extraction.diagnostics);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
