//! Fonts as seen by the interpreter: an encoding, an optional ToUnicode CMap
//! and the per-code overrides from `/Differences`.

use crate::encoding::{mac_roman_char, pdf_doc_char, win_ansi_char};
use crate::tounicode::ToUnicodeCMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Declared font encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontEncoding {
    #[default]
    Unknown,
    WinAnsi,
    MacRoman,
    PdfDoc,
    /// Identity-H / Identity-V, only meaningful with a CMap
    Identity,
    /// Decoded through a caller-supplied CMap
    Custom,
}

impl FontEncoding {
    /// Map a PDF `/Encoding` name to an encoding
    pub fn from_name(name: &str) -> Self {
        match name {
            "WinAnsiEncoding" => FontEncoding::WinAnsi,
            "MacRomanEncoding" => FontEncoding::MacRoman,
            "PDFDocEncoding" => FontEncoding::PdfDoc,
            "Identity-H" | "Identity-V" => FontEncoding::Identity,
            _ => FontEncoding::Unknown,
        }
    }

    fn decode_byte(self, byte: u8) -> char {
        match self {
            FontEncoding::WinAnsi => win_ansi_char(byte),
            FontEncoding::MacRoman => mac_roman_char(byte),
            FontEncoding::PdfDoc => pdf_doc_char(byte),
            FontEncoding::Identity | FontEncoding::Unknown | FontEncoding::Custom => byte as char,
        }
    }
}

impl fmt::Display for FontEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FontEncoding::Unknown => "Unknown",
            FontEncoding::WinAnsi => "WinAnsiEncoding",
            FontEncoding::MacRoman => "MacRomanEncoding",
            FontEncoding::PdfDoc => "PDFDocEncoding",
            FontEncoding::Identity => "Identity",
            FontEncoding::Custom => "Custom",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Font {
    /// Resource name the content stream refers to (e.g. "F1")
    pub name: String,
    pub base_font: String,
    pub encoding: FontEncoding,
    pub to_unicode: Option<Arc<ToUnicodeCMap>>,
    /// Two-byte character codes (Type0 fonts)
    pub is_multi_byte: bool,
    /// Per-code overrides from an `/Encoding` dictionary
    pub differences: HashMap<u8, char>,
}

impl Font {
    pub fn new(name: impl Into<String>, encoding: FontEncoding) -> Self {
        Self {
            name: name.into(),
            encoding,
            ..Default::default()
        }
    }

    pub fn with_base_font(mut self, base_font: impl Into<String>) -> Self {
        self.base_font = base_font.into();
        self
    }

    pub fn with_to_unicode(mut self, cmap: Arc<ToUnicodeCMap>) -> Self {
        self.to_unicode = Some(cmap);
        self
    }

    pub fn with_multi_byte(mut self, is_multi_byte: bool) -> Self {
        self.is_multi_byte = is_multi_byte;
        self
    }

    pub fn with_differences(mut self, differences: HashMap<u8, char>) -> Self {
        self.differences = differences;
        self
    }

    /// Decode the bytes of a shown string.
    ///
    /// A ToUnicode CMap wins when present. Multi-byte fonts without one read
    /// big-endian 16-bit codes as code points. Single-byte fonts apply
    /// `/Differences` first, then the declared encoding.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if let Some(cmap) = &self.to_unicode {
            return cmap.decode(bytes);
        }

        if self.is_multi_byte {
            return bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => char::from_u32(u16::from_be_bytes([*hi, *lo]) as u32)
                        .unwrap_or(char::REPLACEMENT_CHARACTER),
                    _ => char::REPLACEMENT_CHARACTER,
                })
                .collect();
        }

        bytes
            .iter()
            .map(|&b| {
                self.differences
                    .get(&b)
                    .copied()
                    .unwrap_or_else(|| self.encoding.decode_byte(b))
            })
            .collect()
    }
}

impl fmt::Display for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.base_font.is_empty() {
            write!(f, " ({})", self.base_font)?;
        }
        write!(f, " {}", self.encoding)?;
        if self.is_multi_byte {
            write!(f, " multi-byte")?;
        }
        if let Some(cmap) = &self.to_unicode {
            write!(f, " ToUnicode[{}]", cmap.len())?;
        }
        Ok(())
    }
}
