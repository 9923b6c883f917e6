//! Typed operands decoded from content stream tokens

use crate::encoding::decode_latin1;
use crate::tokenizer::is_whitespace;
use std::fmt;

/// A content stream operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Integer or real number
    Number(f64),
    /// Literal string `( ... )` with escapes already processed
    Text(String),
    /// Hex string `< ... >` as raw bytes
    Bytes(Vec<u8>),
    /// Name without the leading `/`
    Name(String),
    /// Array, possibly nested
    Array(Vec<Operand>),
    /// `<< ... >>` kept verbatim; never looked into
    Dictionary(String),
}

impl Operand {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Operand]> {
        match self {
            Operand::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::Number(_) => "number",
            Operand::Text(_) => "literal string",
            Operand::Bytes(_) => "hex string",
            Operand::Name(_) => "name",
            Operand::Array(_) => "array",
            Operand::Dictionary(_) => "dictionary",
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number(n) => write!(f, "{}", n),
            Operand::Text(s) => write!(f, "({})", s),
            Operand::Bytes(bytes) => {
                write!(f, "<")?;
                for b in bytes {
                    write!(f, "{:02X}", b)?;
                }
                write!(f, ">")
            }
            Operand::Name(name) => write!(f, "/{}", name),
            Operand::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Operand::Dictionary(raw) => write!(f, "{}", raw),
        }
    }
}

/// What a single token turned into
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Operand(Operand),
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
}

/// Why a token could not be turned into an operand
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperandError {
    #[error("empty token")]
    Empty,
    #[error("invalid literal string")]
    InvalidLiteral,
    #[error("invalid hex string")]
    InvalidHexString,
    #[error("invalid hex byte '{0}'")]
    InvalidHexByte(String),
    #[error("unrecognized operand type")]
    Unrecognized,
}

/// Convert one token into an operand or an array marker
pub fn parse_operand(token: &[u8]) -> Result<Parsed, OperandError> {
    match token {
        [] => Err(OperandError::Empty),
        [b'[', ..] if token.len() == 1 => Ok(Parsed::ArrayStart),
        [b']', ..] if token.len() == 1 => Ok(Parsed::ArrayEnd),
        [b'(', ..] => {
            let bytes = decode_literal(token)?;
            Ok(Parsed::Operand(Operand::Text(bytes_to_text(bytes))))
        }
        [b'<', b'<', ..] => Ok(Parsed::Operand(Operand::Dictionary(
            String::from_utf8_lossy(token).into_owned(),
        ))),
        [b'<', ..] => Ok(Parsed::Operand(Operand::Bytes(decode_hex(token)?))),
        [b'/', name @ ..] => Ok(Parsed::Operand(Operand::Name(
            String::from_utf8_lossy(name).into_owned(),
        ))),
        _ => parse_number(token).map(|n| Parsed::Operand(Operand::Number(n))),
    }
}

fn parse_number(token: &[u8]) -> Result<f64, OperandError> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .ok_or(OperandError::Unrecognized)
}

/// Decode a `( ... )` token, processing backslash escapes.
///
/// `\n \r \t \b \f \( \) \\` are the usual control characters, `\ddd` (one to
/// three octal digits) is a byte value taken mod 256, and a backslash before
/// any other character is dropped together with that character.
pub fn decode_literal(token: &[u8]) -> Result<Vec<u8>, OperandError> {
    let body = token
        .strip_prefix(b"(")
        .and_then(|t| t.strip_suffix(b")"))
        .ok_or(OperandError::InvalidLiteral)?;

    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let c = body[i];
        i += 1;
        if c != b'\\' {
            out.push(c);
            continue;
        }
        let Some(&escaped) = body.get(i) else {
            break;
        };
        i += 1;
        match escaped {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'(' | b')' | b'\\' => out.push(escaped),
            b'0'..=b'7' => {
                let mut value = (escaped - b'0') as u32;
                for _ in 0..2 {
                    match body.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Decode a `< ... >` token. Whitespace is ignored and an odd number of
/// digits is padded with a trailing `0`.
pub fn decode_hex(token: &[u8]) -> Result<Vec<u8>, OperandError> {
    if token.len() < 2 {
        return Err(OperandError::InvalidHexString);
    }
    let body = token
        .strip_prefix(b"<")
        .and_then(|t| t.strip_suffix(b">"))
        .ok_or(OperandError::InvalidHexString)?;

    let mut digits: Vec<u8> = body.iter().copied().filter(|&b| !is_whitespace(b)).collect();
    if digits.len() % 2 != 0 {
        digits.push(b'0');
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| OperandError::InvalidHexByte(String::from_utf8_lossy(pair).into_owned()))
        })
        .collect()
}

/// Literal string bytes as text: UTF-8 when they are valid UTF-8, otherwise
/// one code point per byte.
fn bytes_to_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| decode_latin1(e.as_bytes()))
}
