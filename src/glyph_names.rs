//! Adobe glyph names to Unicode, for `/Differences` arrays
//!
//! Covers the glyph names that show up in simple-font encodings: letters,
//! digits ("zero", "one"), punctuation, Latin-1 accents and the usual
//! typographic marks. Anything else is tried as `uniXXXX` / `uXXXX[XX]`.

use std::collections::HashMap;
use std::sync::LazyLock;

const NAMED_GLYPHS: &[(&str, char)] = &[
    ("space", ' '),
    ("exclam", '!'),
    ("quotedbl", '"'),
    ("numbersign", '#'),
    ("dollar", '$'),
    ("percent", '%'),
    ("ampersand", '&'),
    ("quotesingle", '\''),
    ("parenleft", '('),
    ("parenright", ')'),
    ("asterisk", '*'),
    ("plus", '+'),
    ("comma", ','),
    ("hyphen", '-'),
    ("period", '.'),
    ("slash", '/'),
    ("zero", '0'),
    ("one", '1'),
    ("two", '2'),
    ("three", '3'),
    ("four", '4'),
    ("five", '5'),
    ("six", '6'),
    ("seven", '7'),
    ("eight", '8'),
    ("nine", '9'),
    ("colon", ':'),
    ("semicolon", ';'),
    ("less", '<'),
    ("equal", '='),
    ("greater", '>'),
    ("question", '?'),
    ("at", '@'),
    ("bracketleft", '['),
    ("backslash", '\\'),
    ("bracketright", ']'),
    ("asciicircum", '^'),
    ("underscore", '_'),
    ("grave", '`'),
    ("braceleft", '{'),
    ("bar", '|'),
    ("braceright", '}'),
    ("asciitilde", '~'),
    // Typographic punctuation
    ("quoteleft", '\u{2018}'),
    ("quoteright", '\u{2019}'),
    ("quotesinglbase", '\u{201A}'),
    ("quotedblleft", '\u{201C}'),
    ("quotedblright", '\u{201D}'),
    ("quotedblbase", '\u{201E}'),
    ("guilsinglleft", '\u{2039}'),
    ("guilsinglright", '\u{203A}'),
    ("guillemotleft", '\u{00AB}'),
    ("guillemotright", '\u{00BB}'),
    ("endash", '\u{2013}'),
    ("emdash", '\u{2014}'),
    ("bullet", '\u{2022}'),
    ("ellipsis", '\u{2026}'),
    ("dagger", '\u{2020}'),
    ("daggerdbl", '\u{2021}'),
    ("perthousand", '\u{2030}'),
    ("trademark", '\u{2122}'),
    ("fraction", '\u{2044}'),
    ("minus", '\u{2212}'),
    ("Euro", '\u{20AC}'),
    ("florin", '\u{0192}'),
    ("circumflex", '\u{02C6}'),
    ("tilde", '\u{02DC}'),
    ("dotlessi", '\u{0131}'),
    // Ligatures
    ("fi", '\u{FB01}'),
    ("fl", '\u{FB02}'),
    ("ff", '\u{FB00}'),
    ("ffi", '\u{FB03}'),
    ("ffl", '\u{FB04}'),
    ("OE", '\u{0152}'),
    ("oe", '\u{0153}'),
    ("AE", '\u{00C6}'),
    ("ae", '\u{00E6}'),
    ("germandbls", '\u{00DF}'),
    // Latin-1 supplement
    ("exclamdown", '\u{00A1}'),
    ("cent", '\u{00A2}'),
    ("sterling", '\u{00A3}'),
    ("currency", '\u{00A4}'),
    ("yen", '\u{00A5}'),
    ("brokenbar", '\u{00A6}'),
    ("section", '\u{00A7}'),
    ("dieresis", '\u{00A8}'),
    ("copyright", '\u{00A9}'),
    ("ordfeminine", '\u{00AA}'),
    ("logicalnot", '\u{00AC}'),
    ("registered", '\u{00AE}'),
    ("macron", '\u{00AF}'),
    ("degree", '\u{00B0}'),
    ("plusminus", '\u{00B1}'),
    ("acute", '\u{00B4}'),
    ("mu", '\u{00B5}'),
    ("paragraph", '\u{00B6}'),
    ("periodcentered", '\u{00B7}'),
    ("cedilla", '\u{00B8}'),
    ("ordmasculine", '\u{00BA}'),
    ("onequarter", '\u{00BC}'),
    ("onehalf", '\u{00BD}'),
    ("threequarters", '\u{00BE}'),
    ("questiondown", '\u{00BF}'),
    ("multiply", '\u{00D7}'),
    ("divide", '\u{00F7}'),
    ("Agrave", 'À'),
    ("Aacute", 'Á'),
    ("Acircumflex", 'Â'),
    ("Atilde", 'Ã'),
    ("Adieresis", 'Ä'),
    ("Aring", 'Å'),
    ("Ccedilla", 'Ç'),
    ("Egrave", 'È'),
    ("Eacute", 'É'),
    ("Ecircumflex", 'Ê'),
    ("Edieresis", 'Ë'),
    ("Igrave", 'Ì'),
    ("Iacute", 'Í'),
    ("Icircumflex", 'Î'),
    ("Idieresis", 'Ï'),
    ("Eth", 'Ð'),
    ("Ntilde", 'Ñ'),
    ("Ograve", 'Ò'),
    ("Oacute", 'Ó'),
    ("Ocircumflex", 'Ô'),
    ("Otilde", 'Õ'),
    ("Odieresis", 'Ö'),
    ("Oslash", 'Ø'),
    ("Ugrave", 'Ù'),
    ("Uacute", 'Ú'),
    ("Ucircumflex", 'Û'),
    ("Udieresis", 'Ü'),
    ("Yacute", 'Ý'),
    ("Thorn", 'Þ'),
    ("agrave", 'à'),
    ("aacute", 'á'),
    ("acircumflex", 'â'),
    ("atilde", 'ã'),
    ("adieresis", 'ä'),
    ("aring", 'å'),
    ("ccedilla", 'ç'),
    ("egrave", 'è'),
    ("eacute", 'é'),
    ("ecircumflex", 'ê'),
    ("edieresis", 'ë'),
    ("igrave", 'ì'),
    ("iacute", 'í'),
    ("icircumflex", 'î'),
    ("idieresis", 'ï'),
    ("eth", 'ð'),
    ("ntilde", 'ñ'),
    ("ograve", 'ò'),
    ("oacute", 'ó'),
    ("ocircumflex", 'ô'),
    ("otilde", 'õ'),
    ("odieresis", 'ö'),
    ("oslash", 'ø'),
    ("ugrave", 'ù'),
    ("uacute", 'ú'),
    ("ucircumflex", 'û'),
    ("udieresis", 'ü'),
    ("yacute", 'ý'),
    ("thorn", 'þ'),
    ("ydieresis", 'ÿ'),
    ("Scaron", '\u{0160}'),
    ("scaron", '\u{0161}'),
    ("Zcaron", '\u{017D}'),
    ("zcaron", '\u{017E}'),
    ("Ydieresis", '\u{0178}'),
    ("Lslash", '\u{0141}'),
    ("lslash", '\u{0142}'),
];

static GLYPH_TO_UNICODE: LazyLock<HashMap<&'static str, char>> =
    LazyLock::new(|| NAMED_GLYPHS.iter().copied().collect());

/// Convert a glyph name to its Unicode character
pub fn glyph_to_char(name: &str) -> Option<char> {
    if let Some(&c) = GLYPH_TO_UNICODE.get(name) {
        return Some(c);
    }

    // Single ASCII letters name themselves
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c);
        }
    }

    // uniXXXX
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 && hex.is_char_boundary(4) {
            if let Ok(code) = u32::from_str_radix(&hex[..4], 16) {
                return char::from_u32(code);
            }
        }
    }

    // uXXXX .. uXXXXXX
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Ok(code) = u32::from_str_radix(hex, 16) {
                return char::from_u32(code);
            }
        }
    }

    None
}
