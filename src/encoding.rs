//! Standard single-byte text encodings
//!
//! Bytes below 0x80 are ASCII in every table. WinAnsi and PDFDoc only differ
//! from ISO Latin-1 in the 0x80-0x9F block, so the tables below cover that
//! block and everything else falls through to Latin-1. Holes in a table also
//! fall back to Latin-1.

/// Windows code page 1252, bytes 0x80-0x9F
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), // 0x80 euro
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None, // 0x90
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// PDFDocEncoding, bytes 0x80-0x9F
const PDF_DOC_HIGH: [Option<char>; 32] = [
    Some('\u{2022}'), // 0x80 bullet
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{2026}'),
    Some('\u{2014}'),
    Some('\u{2013}'),
    Some('\u{0192}'),
    Some('\u{2044}'),
    Some('\u{2039}'),
    Some('\u{203A}'),
    Some('\u{2212}'),
    Some('\u{2030}'),
    Some('\u{201E}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2018}'),
    Some('\u{2019}'), // 0x90
    Some('\u{201A}'),
    Some('\u{2122}'),
    Some('\u{FB01}'),
    Some('\u{FB02}'),
    Some('\u{0141}'),
    Some('\u{0152}'),
    Some('\u{0160}'),
    Some('\u{0178}'),
    Some('\u{017D}'),
    Some('\u{0131}'),
    Some('\u{0142}'),
    Some('\u{0153}'),
    Some('\u{0161}'),
    Some('\u{017E}'),
    None,
];

fn from_table(table: &[Option<char>; 32], byte: u8) -> char {
    match byte {
        0x80..=0x9F => table[(byte - 0x80) as usize].unwrap_or(byte as char),
        _ => byte as char,
    }
}

/// Map one WinAnsiEncoding byte to its character
pub fn win_ansi_char(byte: u8) -> char {
    from_table(&WIN_ANSI_HIGH, byte)
}

/// Map one PDFDocEncoding byte to its character
pub fn pdf_doc_char(byte: u8) -> char {
    from_table(&PDF_DOC_HIGH, byte)
}

/// Map one MacRomanEncoding byte to its character.
///
/// This is an ISO Latin-1 approximation: MacRoman differs from Latin-1 for
/// most of the upper half, so accented text from Mac-encoded fonts without a
/// ToUnicode CMap may come out wrong.
pub fn mac_roman_char(byte: u8) -> char {
    byte as char
}

/// Decode WinAnsiEncoding (CP1252) bytes
pub fn decode_win_ansi(data: &[u8]) -> String {
    data.iter().map(|&b| win_ansi_char(b)).collect()
}

/// Decode PDFDocEncoding bytes
pub fn decode_pdf_doc(data: &[u8]) -> String {
    data.iter().map(|&b| pdf_doc_char(b)).collect()
}

/// Decode MacRomanEncoding bytes (Latin-1 approximation)
pub fn decode_mac_roman(data: &[u8]) -> String {
    data.iter().map(|&b| mac_roman_char(b)).collect()
}

/// Decode bytes as ISO Latin-1, one code point per byte
pub fn decode_latin1(data: &[u8]) -> String {
    data.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let text = b"Hello, World! 123";
        assert_eq!(decode_win_ansi(text), "Hello, World! 123");
        assert_eq!(decode_pdf_doc(text), "Hello, World! 123");
        assert_eq!(decode_mac_roman(text), "Hello, World! 123");
    }

    #[test]
    fn test_win_ansi_specials() {
        assert_eq!(decode_win_ansi(&[0x80]), "\u{20AC}");
        assert_eq!(decode_win_ansi(&[0x93, b'q', 0x94]), "\u{201C}q\u{201D}");
        assert_eq!(decode_win_ansi(&[0x96, 0x97]), "\u{2013}\u{2014}");
        assert_eq!(decode_win_ansi(&[0x99]), "\u{2122}");
    }

    #[test]
    fn test_win_ansi_upper_half_is_latin1() {
        assert_eq!(decode_win_ansi(&[0xE9]), "é");
        assert_eq!(decode_win_ansi(&[0xA9]), "©");
        assert_eq!(decode_win_ansi(&[0xFF]), "ÿ");
    }

    #[test]
    fn test_win_ansi_holes_fall_back_to_latin1() {
        assert_eq!(win_ansi_char(0x81), '\u{81}');
        assert_eq!(win_ansi_char(0x8D), '\u{8D}');
        assert_eq!(win_ansi_char(0x9D), '\u{9D}');
    }

    #[test]
    fn test_pdf_doc_specials() {
        assert_eq!(pdf_doc_char(0x80), '\u{2022}');
        assert_eq!(pdf_doc_char(0x93), '\u{FB01}');
        assert_eq!(pdf_doc_char(0x9E), '\u{017E}');
        // undefined in PDFDoc, same fallback as WinAnsi holes
        assert_eq!(pdf_doc_char(0x9F), '\u{9F}');
        assert_eq!(pdf_doc_char(0xC4), 'Ä');
    }

    #[test]
    fn test_mac_roman_is_latin1() {
        assert_eq!(decode_mac_roman(&[0xE9, 0x41]), "éA");
        assert_eq!(decode_latin1(&[0xE9, 0x41]), "éA");
    }
}
