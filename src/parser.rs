//! Groups content stream tokens into operations
//!
//! Operands are collected until an operator word shows up at array depth
//! zero. A token that can't be turned into an operand is skipped and recorded;
//! broken array structure aborts the whole parse.

use crate::operand::{parse_operand, Operand, OperandError, Parsed};
use crate::tokenizer::{tokenize, TokenReader};
use crate::ExtractError;
use std::io::{self, Read};

/// One operator with the operands that preceded it
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    pub operands: Vec<Operand>,
}

impl Operation {
    pub fn new(name: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self {
            name: name.into(),
            operands,
        }
    }
}

/// A token dropped because it was not a valid operand
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedOperand {
    pub token: String,
    pub error: OperandError,
}

impl std::fmt::Display for SkippedOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "skipped operand {:?}: {}", self.token, self.error)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedContent {
    pub operations: Vec<Operation>,
    pub skipped: Vec<SkippedOperand>,
}

/// Operator words: a letter, `*`, `'` or `"` first, then letters, those
/// marks, or digits (`d0`, `d1`).
pub fn is_operator(token: &[u8]) -> bool {
    let is_mark = |b: u8| b.is_ascii_alphabetic() || matches!(b, b'*' | b'\'' | b'"');
    match token.split_first() {
        Some((&first, rest)) => is_mark(first) && rest.iter().all(|&b| is_mark(b) || b.is_ascii_digit()),
        None => false,
    }
}

/// Parses a content stream read from `R`
pub struct ContentParser<R> {
    tokens: TokenReader<R>,
}

impl<R: Read> ContentParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            tokens: TokenReader::new(reader),
        }
    }

    pub fn parse(self) -> Result<ParsedContent, ExtractError> {
        group_operations(self.tokens)
    }
}

/// Collect operands from `tokens` and attach them to the next operator word
fn group_operations<T, I>(tokens: I) -> Result<ParsedContent, ExtractError>
where
    T: AsRef<[u8]>,
    I: IntoIterator<Item = io::Result<T>>,
{
    let mut content = ParsedContent::default();
    let mut pending: Vec<Operand> = Vec::new();
    let mut arrays: Vec<Vec<Operand>> = Vec::new();

    for token in tokens {
        let token = token?;
        let token = token.as_ref();
        if arrays.is_empty() && is_operator(token) {
            content.operations.push(Operation {
                name: String::from_utf8_lossy(token).into_owned(),
                operands: std::mem::take(&mut pending),
            });
            continue;
        }

        let value = match parse_operand(token) {
            Ok(Parsed::ArrayStart) => {
                arrays.push(Vec::new());
                continue;
            }
            Ok(Parsed::ArrayEnd) => {
                let items = arrays.pop().ok_or(ExtractError::UnexpectedArrayEnd)?;
                Operand::Array(items)
            }
            Ok(Parsed::Operand(operand)) => operand,
            Err(error) => {
                let skipped = SkippedOperand {
                    token: String::from_utf8_lossy(token).into_owned(),
                    error,
                };
                log::warn!("{}", skipped);
                content.skipped.push(skipped);
                continue;
            }
        };

        match arrays.last_mut() {
            Some(array) => array.push(value),
            None => pending.push(value),
        }
    }

    if !arrays.is_empty() {
        return Err(ExtractError::UnclosedArray {
            depth: arrays.len(),
        });
    }
    if !pending.is_empty() {
        log::debug!("{} trailing operands without an operator", pending.len());
    }
    Ok(content)
}

/// Parse an in-memory content stream
///
/// Tokenizes the slice directly; no reader buffer is involved.
pub fn parse_content(data: &[u8]) -> Result<ParsedContent, ExtractError> {
    group_operations(tokenize(data).map(Ok::<_, io::Error>))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(data: &[u8]) -> Vec<Operation> {
        parse_content(data).unwrap().operations
    }

    #[test]
    fn test_operator_detection() {
        assert!(is_operator(b"Tj"));
        assert!(is_operator(b"T*"));
        assert!(is_operator(b"'"));
        assert!(is_operator(b"\""));
        assert!(is_operator(b"d0"));
        assert!(!is_operator(b"12"));
        assert!(!is_operator(b"/F1"));
        assert!(!is_operator(b"1d"));
        assert!(!is_operator(b""));
    }

    #[test]
    fn test_operands_are_grouped() {
        let parsed = ops(b"BT /F1 12 Tf (Hi) Tj ET");
        assert_eq!(
            parsed,
            vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Operand::Name("F1".into()), Operand::Number(12.0)]
                ),
                Operation::new("Tj", vec![Operand::Text("Hi".into())]),
                Operation::new("ET", vec![]),
            ]
        );
    }

    #[test]
    fn test_nested_arrays() {
        let parsed = ops(b"[(a) [1 [2]] <41>] TJ");
        assert_eq!(
            parsed[0].operands,
            vec![Operand::Array(vec![
                Operand::Text("a".into()),
                Operand::Array(vec![
                    Operand::Number(1.0),
                    Operand::Array(vec![Operand::Number(2.0)]),
                ]),
                Operand::Bytes(b"A".to_vec()),
            ])]
        );
    }

    #[test]
    fn test_operator_inside_array_is_not_an_operation() {
        // A word inside an array fails the operand parse and is skipped
        let content = parse_content(b"[(a) Tj (b)] TJ").unwrap();
        assert_eq!(content.operations.len(), 1);
        assert_eq!(content.operations[0].name, "TJ");
        assert_eq!(content.skipped.len(), 1);
        assert_eq!(content.skipped[0].token, "Tj");
    }

    #[test]
    fn test_bad_operand_is_skipped() {
        let content = parse_content(b"BT 1.2.3 (x) Tj ET").unwrap();
        assert_eq!(content.operations[1].operands, vec![Operand::Text("x".into())]);
        assert_eq!(
            content.skipped,
            vec![SkippedOperand {
                token: "1.2.3".into(),
                error: OperandError::Unrecognized,
            }]
        );
    }

    #[test]
    fn test_dictionary_operand() {
        let parsed = ops(b"/Span <</ActualText (x)>> BDC EMC");
        assert_eq!(parsed[0].name, "BDC");
        assert_eq!(
            parsed[0].operands[1],
            Operand::Dictionary("<</ActualText (x)>>".into())
        );
        assert_eq!(parsed[1], Operation::new("EMC", vec![]));
    }

    #[test]
    fn test_unexpected_array_end_is_fatal() {
        assert!(matches!(
            parse_content(b"BT (a) ] Tj ET"),
            Err(ExtractError::UnexpectedArrayEnd)
        ));
    }

    #[test]
    fn test_unclosed_array_is_fatal() {
        assert!(matches!(
            parse_content(b"BT [(a) [(b) TJ ET"),
            Err(ExtractError::UnclosedArray { depth: 2 })
        ));
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(parse_content(b"").unwrap(), ParsedContent::default());
        assert_eq!(parse_content(b"  % nothing\n").unwrap(), ParsedContent::default());
    }
}
