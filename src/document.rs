//! Page-by-page extraction from whole PDF files using lopdf
//!
//! lopdf handles the file structure: pages, resources and stream filters.
//! Each page gets a [`FontRegistry`] built from its font resources and its
//! content stream is run through [`crate::extract`].

use crate::font::{Font, FontEncoding};
use crate::glyph_names::glyph_to_char;
use crate::interpreter::LayoutConfig;
use crate::registry::FontRegistry;
use crate::tounicode::ToUnicodeCMap;
use crate::{Diagnostic, ExtractError};
use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use rayon::prelude::*;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Text of one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page: u32,
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Extract the text of every page of a PDF file
pub fn extract_pdf_text<P: AsRef<Path>>(path: P) -> Result<Vec<PageText>, ExtractError> {
    extract_pdf_text_with_config(path, &LayoutConfig::default())
}

/// Extract the text of every page with custom layout thresholds
pub fn extract_pdf_text_with_config<P: AsRef<Path>>(
    path: P,
    config: &LayoutConfig,
) -> Result<Vec<PageText>, ExtractError> {
    let doc = Document::load(path)?;
    extract_pages(&doc, config)
}

/// Extract the text of every page of a PDF held in memory
pub fn extract_pdf_text_mem(buffer: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    let doc = Document::load_mem(buffer)?;
    extract_pages(&doc, &LayoutConfig::default())
}

/// A page ready for interpretation, detached from the document
struct PageJob {
    page: u32,
    fonts: FontRegistry,
    content: Vec<u8>,
}

/// Extract all pages of a loaded document.
///
/// Resources are gathered page by page, then the content streams are
/// interpreted in parallel. Pages come back in page order.
pub fn extract_pages(doc: &Document, config: &LayoutConfig) -> Result<Vec<PageText>, ExtractError> {
    let jobs = doc
        .get_pages()
        .into_iter()
        .map(|(page, page_id)| -> Result<PageJob, ExtractError> {
            Ok(PageJob {
                page,
                fonts: page_font_registry(doc, page_id),
                content: doc.get_page_content(page_id)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(jobs
        .into_par_iter()
        .map(|job| {
            let extraction = crate::extract(&job.content, &job.fonts, config);
            PageText {
                page: job.page,
                text: extraction.text,
                diagnostics: extraction.diagnostics,
            }
        })
        .collect())
}

/// Build the font table for one page from its `/Font` resources
fn page_font_registry(doc: &Document, page_id: ObjectId) -> FontRegistry {
    let registry = FontRegistry::new();
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    for (name, dict) in fonts {
        let name = String::from_utf8_lossy(&name).into_owned();
        let font = load_font(doc, &name, dict);
        log::debug!("page font {}", font);
        registry.register(font);
    }
    registry
}

fn load_font(doc: &Document, name: &str, dict: &Dictionary) -> Font {
    let base_font = name_value(doc, dict, b"BaseFont").unwrap_or_default();
    let is_type0 = name_value(doc, dict, b"Subtype").as_deref() == Some("Type0");

    let mut font = Font::new(name, FontEncoding::Unknown)
        .with_base_font(base_font)
        .with_multi_byte(is_type0);

    match dict.get(b"Encoding").ok().map(|obj| resolve(doc, obj)) {
        Some(Object::Name(encoding)) => {
            font.encoding = FontEncoding::from_name(&String::from_utf8_lossy(encoding));
        }
        Some(Object::Dictionary(encoding)) => {
            if let Some(base) = name_value(doc, encoding, b"BaseEncoding") {
                font.encoding = FontEncoding::from_name(&base);
            }
            if let Ok(Object::Array(differences)) = encoding.get(b"Differences").map(|obj| resolve(doc, obj)) {
                font.differences = parse_differences(doc, differences);
            }
        }
        _ => {}
    }
    // A simple font without an encoding still has standard Latin text
    if font.encoding == FontEncoding::Unknown && !is_type0 {
        font.encoding = FontEncoding::WinAnsi;
    }

    if let Some(cmap) = load_to_unicode(doc, dict) {
        font.to_unicode = Some(Arc::new(cmap));
    }
    font
}

fn load_to_unicode(doc: &Document, dict: &Dictionary) -> Option<ToUnicodeCMap> {
    let stream = match dict.get(b"ToUnicode").ok().map(|obj| resolve(doc, obj))? {
        Object::Stream(stream) => stream,
        _ => return None,
    };
    match ToUnicodeCMap::parse(&stream_content(stream)) {
        Ok(cmap) if !cmap.is_empty() => Some(cmap),
        Ok(_) => {
            log::debug!("ToUnicode CMap without mappings ignored");
            None
        }
        Err(e) => {
            log::warn!("ignoring unparsable ToUnicode CMap: {}", e);
            None
        }
    }
}

/// `/Differences [code /name /name code /name ...]`: each number sets the
/// code for the names that follow it.
fn parse_differences(doc: &Document, items: &[Object]) -> HashMap<u8, char> {
    let mut differences = HashMap::new();
    let mut code: Option<i64> = None;
    for item in items {
        match resolve(doc, item) {
            Object::Integer(n) => code = Some(*n),
            Object::Name(glyph) => {
                if let Some(current) = code {
                    let glyph = String::from_utf8_lossy(glyph);
                    match (u8::try_from(current), glyph_to_char(&glyph)) {
                        (Ok(byte), Some(c)) => {
                            differences.insert(byte, c);
                        }
                        _ => log::debug!("unmapped glyph /{} at code {}", glyph, current),
                    }
                    code = Some(current + 1);
                }
            }
            _ => {}
        }
    }
    differences
}

/// Decoded stream bytes. Falls back to a plain zlib inflate when lopdf
/// refuses the filter chain, and to the raw bytes after that.
fn stream_content(stream: &Stream) -> Vec<u8> {
    if let Ok(data) = stream.decompressed_content() {
        return data;
    }
    let is_flate = matches!(
        stream.dict.get(b"Filter"),
        Ok(Object::Name(filter)) if filter.as_slice() == b"FlateDecode"
    );
    if is_flate {
        if let Some(inflated) = inflate(&stream.content) {
            return inflated;
        }
        log::debug!("zlib fallback failed, using raw stream bytes");
    }
    stream.content.clone()
}

fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut inflated = Vec::new();
    decoder.read_to_end(&mut inflated).ok()?;
    Some(inflated)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn name_value(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_name().ok())
        .map(|name| String::from_utf8_lossy(name).into_owned())
}
