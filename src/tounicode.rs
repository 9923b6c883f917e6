//! ToUnicode CMap parsing for PDF text extraction
//!
//! This module parses ToUnicode CMaps to convert character codes to Unicode.
//! Only `bfchar`, `bfrange` and `codespacerange` sections are understood; every
//! other token of the CMap program (headers, `def`, dictionaries) is ignored.

use crate::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Splits a CMap program into words, keeping `<hex>` tokens and array brackets
/// separate even when the producer wrote them without spaces.
static CMAP_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^<>]*>|\[|\]|[^\s<>\[\]]+").expect("valid CMap token regex"));

/// Largest number of codes a single `bfrange` entry may expand to
const MAX_RANGE_LEN: u32 = 0x1_0000;

/// One `begincodespacerange` entry. Recorded for inspection only; decoding
/// does not enforce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSpaceRange {
    pub low: Vec<u8>,
    pub high: Vec<u8>,
}

/// A parsed ToUnicode CMap mapping byte codes to Unicode strings
///
/// Keys keep the width they were declared with, so `<0041>` and `<41>` are
/// different codes.
#[derive(Debug, Default, Clone)]
pub struct ToUnicodeCMap {
    mappings: HashMap<Vec<u8>, String>,
    code_space: Vec<CodeSpaceRange>,
}

impl ToUnicodeCMap {
    /// Create a new empty CMap
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a ToUnicode CMap from its decompressed content
    ///
    /// Malformed entries are skipped. A `bfchar` or `bfrange` block that is
    /// still open when the program ends is an error.
    pub fn parse(content: &[u8]) -> Result<Self, ExtractError> {
        let text = String::from_utf8_lossy(content);
        let mut tokens = CMAP_TOKEN_RE.find_iter(&text).map(|m| m.as_str());
        let mut cmap = ToUnicodeCMap::new();

        while let Some(token) = tokens.next() {
            match token {
                "begincodespacerange" => cmap.parse_code_space(&mut tokens),
                "beginbfchar" => cmap.parse_bfchar(&mut tokens)?,
                "beginbfrange" => cmap.parse_bfrange(&mut tokens)?,
                _ => {}
            }
        }

        Ok(cmap)
    }

    /// Add a single mapping
    pub fn insert(&mut self, code: impl Into<Vec<u8>>, unicode: impl Into<String>) {
        self.mappings.insert(code.into(), unicode.into());
    }

    /// Look up the Unicode string for a byte code
    pub fn lookup(&self, code: &[u8]) -> Option<&str> {
        self.mappings.get(code).map(String::as_str)
    }

    /// Number of code mappings
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn code_space_ranges(&self) -> &[CodeSpaceRange] {
        &self.code_space
    }

    /// Iterate over all `(code, unicode)` pairs in no particular order
    pub fn mappings(&self) -> impl Iterator<Item = (&[u8], &str)> + '_ {
        self.mappings.iter().map(|(k, v)| (k.as_slice(), v.as_str()))
    }

    /// Decode a byte run, preferring 2-byte codes over 1-byte codes.
    ///
    /// Bytes matching neither produce U+FFFD and the scan moves on by one byte.
    /// Codes wider than two bytes are never matched.
    pub fn decode(&self, data: &[u8]) -> String {
        let mut result = String::with_capacity(data.len());
        let mut i = 0;

        while i < data.len() {
            if i + 1 < data.len() {
                if let Some(s) = self.lookup(&data[i..i + 2]) {
                    result.push_str(s);
                    i += 2;
                    continue;
                }
            }

            match self.lookup(&data[i..i + 1]) {
                Some(s) => result.push_str(s),
                None => {
                    log::debug!("no ToUnicode mapping for code {:02X}", data[i]);
                    result.push('\u{FFFD}');
                }
            }
            i += 1;
        }

        result
    }

    fn parse_code_space<'a, I>(&mut self, tokens: &mut I)
    where
        I: Iterator<Item = &'a str>,
    {
        while let Some(low) = tokens.next() {
            if low == "endcodespacerange" {
                return;
            }
            let Some(high) = tokens.next() else {
                return;
            };
            if high == "endcodespacerange" {
                return;
            }
            if let (Some(low), Some(high)) = (hex_token(low), hex_token(high)) {
                self.code_space.push(CodeSpaceRange { low, high });
            }
        }
    }

    /// Parse a bfchar section: <src> <dst> pairs
    fn parse_bfchar<'a, I>(&mut self, tokens: &mut I) -> Result<(), ExtractError>
    where
        I: Iterator<Item = &'a str>,
    {
        const END: &str = "endbfchar";

        loop {
            let Some(src) = next_entry(tokens, END, "bfchar")? else {
                return Ok(());
            };
            if !is_bracketed(src) {
                continue;
            }
            let Some(dst) = next_entry(tokens, END, "bfchar")? else {
                return Ok(());
            };
            if !is_bracketed(dst) {
                continue;
            }

            match (hex_token(src), hex_token(dst).and_then(|d| utf16be_to_string(&d))) {
                (Some(code), Some(unicode)) => {
                    self.mappings.insert(code, unicode);
                }
                _ => log::debug!("skipping malformed bfchar entry {} {}", src, dst),
            }
        }
    }

    /// Parse a bfrange section: <start> <end> <dst> triplets
    fn parse_bfrange<'a, I>(&mut self, tokens: &mut I) -> Result<(), ExtractError>
    where
        I: Iterator<Item = &'a str>,
    {
        const END: &str = "endbfrange";

        loop {
            let Some(start) = next_entry(tokens, END, "bfrange")? else {
                return Ok(());
            };
            if !is_bracketed(start) {
                continue;
            }
            let Some(end) = next_entry(tokens, END, "bfrange")? else {
                return Ok(());
            };
            if !is_bracketed(end) {
                continue;
            }
            let Some(dst) = next_entry(tokens, END, "bfrange")? else {
                return Ok(());
            };

            // Array destinations are not supported; skip the whole array
            if dst == "[" {
                loop {
                    match tokens.next() {
                        Some("]") => break,
                        Some(_) => {}
                        None => return Err(ExtractError::UnterminatedCMapSection("bfrange")),
                    }
                }
                log::debug!("skipping bfrange {} {} with array destination", start, end);
                continue;
            }
            if !is_bracketed(dst) {
                continue;
            }

            match (hex_token(start), hex_token(end), hex_token(dst)) {
                (Some(start), Some(end), Some(dst)) => self.insert_range(&start, &end, &dst),
                _ => log::debug!("skipping malformed bfrange entry {} {} {}", start, end, dst),
            }
        }
    }

    fn insert_range(&mut self, start: &[u8], end: &[u8], dst: &[u8]) {
        let width = start.len();
        if width == 0 || width > 4 {
            return;
        }
        if end.len() != width {
            log::debug!("skipping bfrange with mismatched code widths {:?} {:?}", start, end);
            return;
        }
        let low = be_u32(start);
        let high = be_u32(end);
        if high < low || high - low >= MAX_RANGE_LEN {
            log::debug!("skipping bfrange {:x}..{:x}", low, high);
            return;
        }

        let units = utf16_units(dst);
        for offset in 0..=(high - low) {
            let unicode = match (dst.len(), units.as_slice()) {
                (1, _) => char::from_u32(dst[0] as u32 + offset).map(String::from),
                (_, [unit]) => char::from_u32(*unit as u32 + offset).map(String::from),
                (_, [prefix @ .., last]) => {
                    let mut shifted = prefix.to_vec();
                    shifted.push(last.wrapping_add(offset as u16));
                    Some(String::from_utf16_lossy(&shifted))
                }
                (_, []) => None,
            };
            let Some(unicode) = unicode else {
                continue;
            };
            let code = (low + offset).to_be_bytes()[4 - width..].to_vec();
            self.mappings.insert(code, unicode);
        }
    }
}

/// Next token of a section, `None` once the closing keyword is reached
fn next_entry<'a, I>(
    tokens: &mut I,
    end: &str,
    section: &'static str,
) -> Result<Option<&'a str>, ExtractError>
where
    I: Iterator<Item = &'a str>,
{
    match tokens.next() {
        Some(token) if token == end => Ok(None),
        Some(token) => Ok(Some(token)),
        None => Err(ExtractError::UnterminatedCMapSection(section)),
    }
}

fn is_bracketed(token: &str) -> bool {
    token.starts_with('<') && token.ends_with('>') && token.len() >= 2
}

/// Decode `<hex>` to bytes. Odd-length or non-hex payloads are rejected.
fn hex_token(token: &str) -> Option<Vec<u8>> {
    let hex: Vec<u8> = token
        .strip_prefix('<')?
        .strip_suffix('>')?
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if hex.len() % 2 != 0 {
        return None;
    }
    hex.chunks(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(digits, 16).ok()
        })
        .collect()
}

fn be_u32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// Big-endian UTF-16 code units, with a leading byte-order mark removed
fn utf16_units(data: &[u8]) -> Vec<u16> {
    let data = data.strip_prefix(b"\xFE\xFF").unwrap_or(data);
    data.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Convert a bfchar destination to a string: one byte is a code point,
/// anything longer is UTF-16BE.
fn utf16be_to_string(data: &[u8]) -> Option<String> {
    match data {
        [] => None,
        [byte] => Some(char::from(*byte).to_string()),
        _ => {
            let units = utf16_units(data);
            if units.is_empty() {
                None
            } else {
                Some(String::from_utf16_lossy(&units))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bfchar() {
        let cmap_content = r#"
/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange
<0000><FFFF>
endcodespacerange
3 beginbfchar
<0003> <0020>
<0024> <0041>
<0025> <0042>
endbfchar
endcmap
"#;
        let cmap = ToUnicodeCMap::parse(cmap_content.as_bytes()).unwrap();

        assert_eq!(cmap.lookup(&[0x00, 0x03]), Some(" "));
        assert_eq!(cmap.lookup(&[0x00, 0x24]), Some("A"));
        assert_eq!(cmap.lookup(&[0x00, 0x25]), Some("B"));
        assert_eq!(cmap.len(), 3);
        assert_eq!(
            cmap.code_space_ranges(),
            &[CodeSpaceRange {
                low: vec![0x00, 0x00],
                high: vec![0xFF, 0xFF],
            }]
        );
    }

    #[test]
    fn test_decode_two_byte_codes() {
        let cmap_content = r#"
3 beginbfchar
<0003> <0020>
<0024> <0041>
<0025> <0042>
endbfchar
"#;
        let cmap = ToUnicodeCMap::parse(cmap_content.as_bytes()).unwrap();

        let codes = [0x00, 0x24, 0x00, 0x25, 0x00, 0x03];
        assert_eq!(cmap.decode(&codes), "AB ");
    }

    #[test]
    fn test_bfrange_expansion() {
        let cmap = ToUnicodeCMap::parse(b"1 beginbfrange\n<20> <23> <0041>\nendbfrange").unwrap();

        assert_eq!(cmap.len(), 4);
        assert_eq!(cmap.lookup(&[0x20]), Some("A"));
        assert_eq!(cmap.lookup(&[0x21]), Some("B"));
        assert_eq!(cmap.lookup(&[0x22]), Some("C"));
        assert_eq!(cmap.lookup(&[0x23]), Some("D"));
    }

    #[test]
    fn test_bfrange_keeps_source_width() {
        let cmap = ToUnicodeCMap::parse(b"beginbfrange <00FE> <0101> <0061> endbfrange").unwrap();

        assert_eq!(cmap.lookup(&[0x00, 0xFE]), Some("a"));
        assert_eq!(cmap.lookup(&[0x00, 0xFF]), Some("b"));
        assert_eq!(cmap.lookup(&[0x01, 0x00]), Some("c"));
        assert_eq!(cmap.lookup(&[0x01, 0x01]), Some("d"));
    }

    #[test]
    fn test_bfrange_with_mismatched_widths_is_skipped() {
        let content = b"2 beginbfchar
<00> <0042>
<01> <0043>
endbfchar
1 beginbfrange
<FF> <0101> <0041>
endbfrange";
        let cmap = ToUnicodeCMap::parse(content).unwrap();

        assert_eq!(cmap.len(), 2);
        assert_eq!(cmap.lookup(&[0x00]), Some("B"));
        assert_eq!(cmap.lookup(&[0x01]), Some("C"));
        assert_eq!(cmap.lookup(&[0xFF]), None);
    }

    #[test]
    fn test_bfrange_multi_unit_destination_increments_last_unit() {
        let cmap = ToUnicodeCMap::parse(b"beginbfrange <01> <02> <00660069> endbfrange").unwrap();

        assert_eq!(cmap.lookup(&[0x01]), Some("fi"));
        assert_eq!(cmap.lookup(&[0x02]), Some("fj"));
    }

    #[test]
    fn test_bfrange_array_destination_is_skipped() {
        let content = b"2 beginbfrange
<01> <02> [<0041> <0042>]
<10> <10> <0058>
endbfrange";
        let cmap = ToUnicodeCMap::parse(content).unwrap();

        assert_eq!(cmap.lookup(&[0x01]), None);
        assert_eq!(cmap.lookup(&[0x02]), None);
        assert_eq!(cmap.lookup(&[0x10]), Some("X"));
    }

    #[test]
    fn test_bfchar_strips_bom_and_joins_surrogates() {
        let content = b"beginbfchar
<01> <FEFF0041>
<02> <D83DDE00>
<03> <41>
endbfchar";
        let cmap = ToUnicodeCMap::parse(content).unwrap();

        assert_eq!(cmap.lookup(&[0x01]), Some("A"));
        assert_eq!(cmap.lookup(&[0x02]), Some("\u{1F600}"));
        assert_eq!(cmap.lookup(&[0x03]), Some("A"));
    }

    #[test]
    fn test_bfchar_ligature_destination() {
        let cmap = ToUnicodeCMap::parse(b"beginbfchar <1F> <00660066> endbfchar").unwrap();
        assert_eq!(cmap.lookup(&[0x1F]), Some("ff"));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let content = b"beginbfchar
<01> junk
<zz> <0041>
<02> <0042>
endbfchar";
        let cmap = ToUnicodeCMap::parse(content).unwrap();

        assert_eq!(cmap.len(), 1);
        assert_eq!(cmap.lookup(&[0x02]), Some("B"));
    }

    #[test]
    fn test_unterminated_bfchar_is_error() {
        let err = ToUnicodeCMap::parse(b"1 beginbfchar <01> <0041>").unwrap_err();
        assert!(matches!(err, ExtractError::UnterminatedCMapSection("bfchar")));
    }

    #[test]
    fn test_unterminated_bfrange_is_error() {
        let err = ToUnicodeCMap::parse(b"1 beginbfrange <01> <02>").unwrap_err();
        assert!(matches!(err, ExtractError::UnterminatedCMapSection("bfrange")));
    }

    #[test]
    fn test_lowercase_and_uppercase_hex_are_the_same_code() {
        let cmap = ToUnicodeCMap::parse(b"beginbfchar <0a> <0041> <0B> <0042> endbfchar").unwrap();
        assert_eq!(cmap.decode(&[0x0A, 0x0B]), "AB");
    }

    #[test]
    fn test_decode_prefers_two_byte_then_falls_back() {
        let mut cmap = ToUnicodeCMap::new();
        cmap.insert(vec![0x01, 0x02], "X");
        cmap.insert(vec![0x01], "a");
        cmap.insert(vec![0x02], "b");

        assert_eq!(cmap.decode(&[0x01, 0x02]), "X");
        assert_eq!(cmap.decode(&[0x02, 0x01]), "ba");
        assert_eq!(cmap.decode(&[0x01, 0x09, 0x02]), "a\u{FFFD}b");
        assert_eq!(cmap.decode(&[]), "");
    }
}
