//! Content stream tokenizer
//!
//! Splits raw content stream bytes into PDF syntax tokens. A token is a byte
//! slice whose first byte tells what it is: `(` literal string, `<` hex string,
//! `<<` dictionary, `[`/`]` array delimiters, `/` name, anything else a number
//! or an operator word. Whitespace and `%` comments between tokens are skipped.
//!
//! [`next_token`] works on a partial buffer and can ask for more input, which
//! is what lets [`TokenReader`] tokenize any [`Read`] without loading it whole.

use std::io::{self, Read};

const READ_CHUNK: usize = 8 * 1024;

/// PDF whitespace: NUL, TAB, LF, VT, FF, CR and SPACE
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r' | b' ')
}

pub fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Find the next token in `data`.
///
/// Returns `(consumed, token)`:
/// - `(n, Some(token))`: a token was found and `n` bytes (leading whitespace
///   included) were used up.
/// - `(n, None)` with `n > 0`: only whitespace or comments were skipped.
/// - `(0, None)`: more input is needed before anything can be decided. This
///   never happens when `at_eof` is set; at end of input a partial token is
///   returned as is.
pub fn next_token(data: &[u8], at_eof: bool) -> (usize, Option<&[u8]>) {
    let start = match skip_whitespace_and_comments(data, at_eof) {
        Skip::Token(start) => start,
        Skip::Exhausted(consumed) => return (consumed, None),
    };

    let end = match data[start] {
        b'(' => scan_literal(data, start + 1),
        b'<' if data.get(start + 1) == Some(&b'<') => scan_dictionary(data, start + 2),
        b'<' => scan_hex(data, start + 1),
        // Stray closing delimiters become one-byte tokens so the scan always advances
        b'[' | b']' | b')' | b'>' | b'{' | b'}' => Some(start + 1),
        _ => scan_regular(data, start + 1),
    };

    match end {
        Some(end) => (end, Some(&data[start..end])),
        None if at_eof => (data.len(), Some(&data[start..])),
        None => (start, None),
    }
}

enum Skip {
    /// A token starts at this offset
    Token(usize),
    /// Nothing but whitespace/comments up to this offset
    Exhausted(usize),
}

fn skip_whitespace_and_comments(data: &[u8], at_eof: bool) -> Skip {
    let mut pos = 0;
    while pos < data.len() {
        let b = data[pos];
        if is_whitespace(b) {
            pos += 1;
        } else if b == b'%' {
            let comment_start = pos;
            while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                pos += 1;
            }
            // A comment cut off by the buffer end may continue in the next read
            if pos == data.len() && !at_eof {
                return Skip::Exhausted(comment_start);
            }
        } else {
            return Skip::Token(pos);
        }
    }
    Skip::Exhausted(pos)
}

/// Balanced-parenthesis scan starting just after the opening `(`
fn scan_literal(data: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1;
    let mut escaping = false;
    for (offset, &b) in data[from..].iter().enumerate() {
        if escaping {
            escaping = false;
        } else if b == b'\\' {
            escaping = true;
        } else if b == b'(' {
            depth += 1;
        } else if b == b')' {
            depth -= 1;
            if depth == 0 {
                return Some(from + offset + 1);
            }
        }
    }
    None
}

/// Scan to `>`; a byte that is neither hex nor whitespace ends the token early
fn scan_hex(data: &[u8], from: usize) -> Option<usize> {
    for (offset, &b) in data[from..].iter().enumerate() {
        if b == b'>' {
            return Some(from + offset + 1);
        }
        if !(b.is_ascii_hexdigit() || is_whitespace(b)) {
            return Some(from + offset);
        }
    }
    None
}

/// Nested `<< >>` scan starting after the opening `<<`, stepping over
/// literal strings so parentheses inside values don't confuse it.
fn scan_dictionary(data: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1;
    let mut pos = from;
    while pos < data.len() {
        match (data[pos], data.get(pos + 1)) {
            (b'>', Some(b'>')) => {
                depth -= 1;
                pos += 2;
                if depth == 0 {
                    return Some(pos);
                }
            }
            (b'<', Some(b'<')) => {
                depth += 1;
                pos += 2;
            }
            (b'(', _) => pos = scan_literal(data, pos + 1)?,
            _ => pos += 1,
        }
    }
    None
}

/// Names, numbers and operator words run until whitespace or a delimiter
fn scan_regular(data: &[u8], from: usize) -> Option<usize> {
    data[from..]
        .iter()
        .position(|&b| is_whitespace(b) || is_delimiter(b))
        .map(|offset| from + offset)
}

/// Iterate over the tokens of an in-memory content stream
pub fn tokenize(data: &[u8]) -> Tokens<'_> {
    Tokens { rest: data }
}

/// Iterator returned by [`tokenize`]
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        while !self.rest.is_empty() {
            let (consumed, token) = next_token(self.rest, true);
            self.rest = &self.rest[consumed..];
            if token.is_some() {
                return token;
            }
        }
        None
    }
}

/// Tokenizes a [`Read`] incrementally, refilling its buffer whenever
/// [`next_token`] asks for more input.
pub struct TokenReader<R> {
    reader: R,
    buf: Vec<u8>,
    start: usize,
    eof: bool,
}

impl<R: Read> TokenReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            start: 0,
            eof: false,
        }
    }

    /// Next token, `Ok(None)` at end of input
    pub fn next_token(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            let (consumed, token) = next_token(&self.buf[self.start..], self.eof);
            let token = token.map(<[u8]>::to_vec);
            self.start += consumed;
            if token.is_some() {
                return Ok(token);
            }
            if self.eof {
                return Ok(None);
            }
            self.fill()?;
        }
    }

    /// Reads at least as much as is already pending, so the buffer doubles
    /// while a single token keeps asking for more input.
    fn fill(&mut self) -> io::Result<()> {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }

        let filled = self.buf.len();
        let want = READ_CHUNK.max(filled);
        self.buf.resize(filled + want, 0);
        let mut read = 0;
        while read < want {
            match self.reader.read(&mut self.buf[filled + read..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(filled + read);
                    return Err(e);
                }
            }
        }
        self.buf.truncate(filled + read);
        Ok(())
    }
}

impl<R: Read> Iterator for TokenReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(data: &[u8]) -> Vec<&[u8]> {
        tokenize(data).collect()
    }

    /// Hands out its data a few bytes at a time
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// Fills every buffer it is given and counts the calls
    struct Counting<'a> {
        data: &'a [u8],
        reads: usize,
    }

    impl Read for Counting<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn test_simple_operators_and_operands() {
        let toks = tokens(b"BT /F1 12 Tf 72 720 Td ET");
        assert_eq!(
            toks,
            vec![
                &b"BT"[..],
                b"/F1",
                b"12",
                b"Tf",
                b"72",
                b"720",
                b"Td",
                b"ET"
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let toks = tokens(b"% header comment\nBT % trailing\r\nET");
        assert_eq!(toks, vec![&b"BT"[..], b"ET"]);
    }

    #[test]
    fn test_literal_string_with_nesting_and_escapes() {
        let toks = tokens(br"(a (nested) \) str)Tj");
        assert_eq!(toks, vec![&br"(a (nested) \) str)"[..], b"Tj"]);
    }

    #[test]
    fn test_hex_string() {
        let toks = tokens(b"<48 65\n6C>Tj");
        assert_eq!(toks, vec![&b"<48 65\n6C>"[..], b"Tj"]);
    }

    #[test]
    fn test_hex_string_stops_at_invalid_byte() {
        let toks = tokens(b"<48zz> Tj");
        assert_eq!(toks[0], &b"<48"[..]);
        assert_eq!(toks[1], &b"zz"[..]);
        assert_eq!(toks[2], &b">"[..]);
        assert_eq!(toks[3], &b"Tj"[..]);
    }

    #[test]
    fn test_dictionary_is_one_token() {
        let toks = tokens(b"/Span <</ActualText (a >> b) /Nested <</X 1>> >> BDC");
        assert_eq!(
            toks,
            vec![
                &b"/Span"[..],
                b"<</ActualText (a >> b) /Nested <</X 1>> >>",
                b"BDC"
            ]
        );
    }

    #[test]
    fn test_array_delimiters() {
        let toks = tokens(b"[(a)-20(b)]TJ");
        assert_eq!(toks, vec![&b"["[..], b"(a)", b"-20", b"(b)", b"]", b"TJ"]);
    }

    #[test]
    fn test_name_ends_at_delimiter() {
        let toks = tokens(b"/F1/F2(x)");
        assert_eq!(toks, vec![&b"/F1"[..], b"/F2", b"(x)"]);
    }

    #[test]
    fn test_partial_token_flushed_at_eof() {
        assert_eq!(tokens(b"(unterminated"), vec![&b"(unterminated"[..]]);
        assert_eq!(tokens(b"<<no end"), vec![&b"<<no end"[..]]);
        assert_eq!(tokens(b"12 Tf"), vec![&b"12"[..], b"Tf"]);
    }

    #[test]
    fn test_need_more_input() {
        assert_eq!(next_token(b"  (abc", false), (2, None));
        assert_eq!(next_token(b"Tj", false), (0, None));
        assert_eq!(next_token(b"Tj ", false), (2, Some(&b"Tj"[..])));
        assert_eq!(next_token(b"Tj", true), (2, Some(&b"Tj"[..])));
        assert_eq!(next_token(b"   ", false), (3, None));
        assert_eq!(next_token(b"% open comment", false), (0, None));
        assert_eq!(next_token(b"% closed comment", true), (16, None));
    }

    #[test]
    fn test_stray_delimiters_make_progress() {
        assert_eq!(tokens(b") } {"), vec![&b")"[..], b"}", b"{"]);
    }

    #[test]
    fn test_reader_matches_in_memory() {
        let stream: &[u8] = b"BT\n/F1 12 Tf\n[(Hel) -20 <6C6C> (o \\(world\\))] TJ % done\n<</K 1>> ET";
        let expected: Vec<Vec<u8>> = tokenize(stream).map(<[u8]>::to_vec).collect();

        for step in [1, 2, 3, 7, 64] {
            let reader = TokenReader::new(Trickle { data: stream, step });
            let got: Vec<Vec<u8>> = reader.map(|t| t.unwrap()).collect();
            assert_eq!(got, expected, "step {}", step);
        }
    }

    #[test]
    fn test_reader_grows_reads_for_huge_token() {
        let mut stream = b"BT (ok) Tj ET (".to_vec();
        stream.resize(stream.len() + 4 * 1024 * 1024, b'x');

        let mut source = Counting { data: &stream, reads: 0 };
        let toks: Vec<Vec<u8>> = TokenReader::new(&mut source).map(|t| t.unwrap()).collect();

        assert_eq!(toks.len(), 5);
        assert_eq!(toks[4].len(), 4 * 1024 * 1024 + 1);
        assert!(source.reads < 40, "{} reads", source.reads);
    }

    #[test]
    fn test_reader_propagates_read_errors() {
        let mut reader = TokenReader::new(Broken);
        let err = reader.next_token().unwrap_err();
        assert_eq!(err.to_string(), "disk on fire");
    }
}
