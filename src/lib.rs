//! Text extraction from PDF content streams
//!
//! This crate provides:
//! - A streaming tokenizer and operand/operation parser for content streams
//! - An interpreter that turns text operators into plain text with rough
//!   line and word breaks
//! - ToUnicode CMap parsing and the standard single-byte encodings
//! - A lopdf-based adapter that runs the whole pipeline over every page of a
//!   PDF file

pub mod document;
pub mod encoding;
pub mod font;
pub mod glyph_names;
pub mod interpreter;
pub mod operand;
pub mod parser;
pub mod registry;
pub mod text_state;
pub mod tokenizer;
pub mod tounicode;

pub use document::{extract_pdf_text, extract_pdf_text_mem, extract_pdf_text_with_config, PageText};
pub use font::{Font, FontEncoding};
pub use interpreter::{Interpreter, LayoutConfig, OperatorError};
pub use operand::{Operand, OperandError};
pub use parser::{parse_content, ContentParser, Operation, ParsedContent, SkippedOperand};
pub use registry::{FontRegistry, FontResolver, DEFAULT_FONT_NAME};
pub use text_state::TextState;
pub use tounicode::ToUnicodeCMap;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Text pulled from a content stream, with everything that went wrong on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Non-fatal problem reported during extraction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Diagnostic {
    #[error("{0}")]
    SkippedOperand(SkippedOperand),
    #[error("{0}")]
    Operator(#[from] OperatorError),
    /// Shown bytes that decoded to U+FFFD
    #[error("{count} code(s) without a Unicode mapping in font {font}")]
    UnmappedCodes { font: String, count: usize },
    /// The stream could not be parsed; no text was extracted from it
    #[error("parse aborted: {0}")]
    Aborted(String),
}

/// Extract text with the default font for every font name
pub fn extract_text(stream: &[u8]) -> String {
    extract_text_with_fonts(stream, &FontRegistry::new())
}

/// Extract text, resolving `Tf` font names through `fonts`
pub fn extract_text_with_fonts(stream: &[u8], fonts: &dyn FontResolver) -> String {
    extract(stream, fonts, &LayoutConfig::default()).text
}

/// Extract text and diagnostics from an in-memory content stream
///
/// Never fails: a stream that can't be parsed yields empty text and a
/// [`Diagnostic::Aborted`].
pub fn extract(stream: &[u8], fonts: &dyn FontResolver, config: &LayoutConfig) -> Extraction {
    let mut interp = Interpreter::with_config(fonts, config.clone());
    let result = interp.process_bytes(stream);
    finish(interp, result)
}

/// Extract text from a content stream stored in a file
///
/// Only failing to open the file is an error; the file is read incrementally
/// and anything that goes wrong afterwards ends up in the diagnostics.
pub fn extract_file<P: AsRef<Path>>(path: P, fonts: &dyn FontResolver) -> Result<Extraction, ExtractError> {
    let file = File::open(path)?;
    let mut interp = Interpreter::new(fonts);
    let result = interp.process_stream(BufReader::new(file));
    Ok(finish(interp, result))
}

fn finish(mut interp: Interpreter<'_>, result: Result<(), ExtractError>) -> Extraction {
    if let Err(e) = result {
        log::warn!("content stream parse failed: {}", e);
        interp.push_diagnostic(Diagnostic::Aborted(e.to_string()));
    }
    interp.into_extraction()
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected ']' outside of an array")]
    UnexpectedArrayEnd,
    #[error("{depth} unclosed array(s) at end of stream")]
    UnclosedArray { depth: usize },
    #[error("unterminated {0} section in CMap")]
    UnterminatedCMapSection(&'static str),
    #[error("PDF parsing error: {0}")]
    Pdf(String),
}

impl From<lopdf::Error> for ExtractError {
    fn from(e: lopdf::Error) -> Self {
        ExtractError::Pdf(e.to_string())
    }
}
