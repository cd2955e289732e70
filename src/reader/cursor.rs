//! Bounds-checked cursor over the input document

use std::borrow::Cow;

use crate::{
    error::{JsonSyntaxError, ParsePosition, SyntaxErrorKind, TokenKind},
    number::{scan_number, NumberRun},
};

fn is_whitespace(b: u8) -> bool {
    // Besides the JSON whitespace also backspace and form feed are skipped
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x08 | 0x0C)
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b',' | b':' | b'}' | b']')
}

/// Read position within the input
///
/// The position only moves forward, and never beyond the end of the input. A clone can
/// read ahead without consuming anything.
#[derive(Clone, Debug)]
pub(crate) struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Cursor { input, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    /// Advances by `count` bytes; the caller must have peeked at these bytes before
    pub fn advance(&mut self, count: usize) {
        debug_assert!(self.pos + count <= self.input.len());
        self.pos = (self.pos + count).min(self.input.len());
    }

    pub fn skip_whitespace(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && is_whitespace(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    /// Classifies the token at the current position without consuming it
    ///
    /// Returns `None` at the end of the input.
    pub fn classify(&self) -> Option<TokenKind> {
        let kind = match self.peek()? {
            b'"' | b'\'' => TokenKind::String,
            b'-' | b'0'..=b'9' => TokenKind::Number,
            b'{' => TokenKind::Object,
            b'[' => TokenKind::Array,
            b't' | b'T' => TokenKind::True,
            b'f' | b'F' => TokenKind::False,
            b'n' | b'N' => TokenKind::Null,
            b'u' | b'U' => TokenKind::Undefined,
            _ => TokenKind::BareText,
        };
        Some(kind)
    }

    /// Consumes `expected`, or fails with `error_kind` at the current position
    pub fn expect(&mut self, expected: u8, error_kind: SyntaxErrorKind) -> Result<(), JsonSyntaxError> {
        match self.peek() {
            Some(b) if b == expected => {
                self.pos += 1;
                Ok(())
            }
            None => Err(self.error(SyntaxErrorKind::IncompleteDocument)),
            Some(_) => Err(self.error(error_kind)),
        }
    }

    /// Consumes the literal, comparing ASCII letters case-insensitively
    ///
    /// The literal must not be directly followed by other letters or digits.
    pub fn match_literal(&mut self, literal: &str) -> Result<(), JsonSyntaxError> {
        let bytes = self.input.as_bytes();
        for (i, expected) in literal.bytes().enumerate() {
            match bytes.get(self.pos + i) {
                Some(b) if b.eq_ignore_ascii_case(&expected) => {}
                _ => return Err(self.error_at(SyntaxErrorKind::InvalidLiteral, self.pos + i)),
            }
        }
        let end = self.pos + literal.len();
        if let Some(b) = bytes.get(end) {
            if b.is_ascii_alphanumeric() || *b == b'_' {
                return Err(self.error_at(SyntaxErrorKind::InvalidLiteral, end));
            }
        }
        self.pos = end;
        Ok(())
    }

    /// Whether the next significant character `offset` bytes ahead terminates a value
    ///
    /// The end of the input counts as terminator as well.
    pub fn is_ending(&self, offset: usize) -> bool {
        let bytes = self.input.as_bytes();
        let mut i = self.pos + offset;
        while i < bytes.len() && is_whitespace(bytes[i]) {
            i += 1;
        }
        match bytes.get(i) {
            None => true,
            Some(b) => matches!(b, b'}' | b']' | b','),
        }
    }

    /// Scans the number literal at the current position without consuming it
    pub fn scan_number(&self) -> Option<NumberRun> {
        scan_number(&self.input.as_bytes()[self.pos..])
    }

    /// Consumes `len` bytes and returns them
    pub fn take(&mut self, len: usize) -> &'a str {
        let start = self.pos;
        self.advance(len);
        // Number runs only consist of ASCII chars, so this is a char boundary
        self.input.get(start..self.pos).unwrap_or_default()
    }

    /// Consumes unquoted text up to the next `,`, `:`, `}` or `]`
    ///
    /// Trailing whitespace is not part of the result, but is consumed.
    pub fn read_bare_text(&mut self) -> &'a str {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && !is_delimiter(bytes[self.pos]) {
            self.pos += 1;
        }
        // Delimiters are ASCII, so this is a char boundary
        let text = self.input.get(start..self.pos).unwrap_or_default();
        text.trim_end_matches(|c: char| c.is_ascii() && is_whitespace(c as u8))
    }

    /// Consumes a string quoted with `"` or `'` and decodes its escape sequences
    ///
    /// If the string contains no escape sequences it is borrowed from the input.
    pub fn read_quoted_string(&mut self) -> Result<Cow<'a, str>, JsonSyntaxError> {
        let start = self.pos;
        let quote = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => quote,
            _ => return Err(self.error(SyntaxErrorKind::UnexpectedCharacter)),
        };
        let bytes = self.input.as_bytes();
        let content_start = start + 1;

        let first_special = memchr::memchr2(quote, b'\\', &bytes[content_start..])
            .map(|i| content_start + i)
            .ok_or_else(|| self.error_at(SyntaxErrorKind::UnterminatedString, start))?;
        if bytes[first_special] == quote {
            self.pos = first_special + 1;
            let content = self.input.get(content_start..first_special).unwrap_or_default();
            return Ok(Cow::Borrowed(content));
        }

        // First pass: validate escape sequences and compute the exact decoded length
        let mut decoded_len = first_special - content_start;
        let mut i = first_special;
        let end = loop {
            match bytes.get(i) {
                None => return Err(self.error_at(SyntaxErrorKind::UnterminatedString, start)),
                Some(&b) if b == quote => break i,
                Some(b'\\') => {
                    let (c, escape_len) = self.decode_escape(i)?;
                    decoded_len += c.len_utf8();
                    i += escape_len;
                }
                Some(_) => {
                    let run = memchr::memchr2(quote, b'\\', &bytes[i..]).unwrap_or(bytes.len() - i);
                    decoded_len += run;
                    i += run;
                }
            }
        };

        // Second pass: decode into a string of the exact size
        let mut decoded = String::with_capacity(decoded_len);
        let mut run_start = content_start;
        let mut i = first_special;
        while i < end {
            if bytes[i] == b'\\' {
                decoded.push_str(self.input.get(run_start..i).unwrap_or_default());
                let (c, escape_len) = self.decode_escape(i)?;
                decoded.push(c);
                i += escape_len;
                run_start = i;
            } else {
                i += 1;
            }
        }
        decoded.push_str(self.input.get(run_start..end).unwrap_or_default());
        debug_assert_eq!(decoded_len, decoded.len());

        self.pos = end + 1;
        Ok(Cow::Owned(decoded))
    }

    /// Decodes the escape sequence starting with the `\` at `start`
    ///
    /// Returns the char and the length of the escape sequence in bytes.
    fn decode_escape(&self, start: usize) -> Result<(char, usize), JsonSyntaxError> {
        let bytes = self.input.as_bytes();
        let c = match bytes.get(start + 1) {
            Some(b'\\') => '\\',
            Some(b'"') => '"',
            Some(b'\'') => '\'',
            Some(b'/') => '/',
            Some(b'n') => '\n',
            Some(b'r') => '\r',
            Some(b't') => '\t',
            Some(b'b') => '\u{0008}',
            Some(b'f') => '\u{000C}',
            Some(b'u') => return self.decode_unicode_escape(start),
            None => return Err(self.error_at(SyntaxErrorKind::MalformedEscapeSequence, start)),
            Some(_) => return Err(self.error_at(SyntaxErrorKind::UnknownEscapeSequence, start)),
        };
        Ok((c, 2))
    }

    fn read_hex_unit(&self, start: usize) -> Result<u32, JsonSyntaxError> {
        let malformed = || self.error_at(SyntaxErrorKind::MalformedEscapeSequence, start);
        let hex = self
            .input
            .as_bytes()
            .get(start + 2..start + 6)
            .ok_or_else(malformed)?;
        let mut value = 0;
        for &b in hex {
            let digit = (b as char).to_digit(16).ok_or_else(malformed)?;
            value = value << 4 | digit;
        }
        Ok(value)
    }

    fn decode_unicode_escape(&self, start: usize) -> Result<(char, usize), JsonSyntaxError> {
        let unpaired = || self.error_at(SyntaxErrorKind::UnpairedSurrogatePairEscapeSequence, start);
        let unit = self.read_hex_unit(start)?;
        match unit {
            0xD800..=0xDBFF => {
                let low_start = start + 6;
                let bytes = self.input.as_bytes();
                if bytes.get(low_start) != Some(&b'\\') || bytes.get(low_start + 1) != Some(&b'u') {
                    return Err(unpaired());
                }
                let low = self.read_hex_unit(low_start)?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(unpaired());
                }
                let code_point = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                let c = char::from_u32(code_point).ok_or_else(unpaired)?;
                Ok((c, 12))
            }
            0xDC00..=0xDFFF => Err(unpaired()),
            _ => {
                let c = char::from_u32(unit).ok_or_else(unpaired)?;
                Ok((c, 6))
            }
        }
    }

    /// Skips the complete value at the current position
    ///
    /// The content is only checked for balanced brackets and terminated strings.
    pub fn skip_value(&mut self) -> Result<(), JsonSyntaxError> {
        let mut nesting = 0_usize;
        loop {
            self.skip_whitespace();
            let b = match self.peek() {
                Some(b) => b,
                None => return Err(self.error(SyntaxErrorKind::IncompleteDocument)),
            };
            match b {
                b'{' | b'[' => {
                    nesting += 1;
                    self.pos += 1;
                }
                b'}' | b']' => {
                    if nesting == 0 {
                        return Err(self.error(SyntaxErrorKind::UnexpectedCharacter));
                    }
                    nesting -= 1;
                    self.pos += 1;
                }
                b',' | b':' if nesting > 0 => self.pos += 1,
                b'"' | b'\'' => {
                    self.read_quoted_string()?;
                }
                _ => {
                    if self.read_bare_text().is_empty() {
                        return Err(self.error(SyntaxErrorKind::UnexpectedCharacter));
                    }
                }
            }
            if nesting == 0 {
                return Ok(());
            }
        }
    }

    /// Creates an error at the current position
    pub fn error(&self, kind: SyntaxErrorKind) -> JsonSyntaxError {
        self.error_at(kind, self.pos)
    }

    pub fn error_at(&self, kind: SyntaxErrorKind, offset: usize) -> JsonSyntaxError {
        JsonSyntaxError {
            kind,
            location: self.position_of(offset),
        }
    }

    pub fn location(&self) -> ParsePosition {
        self.position_of(self.pos)
    }

    /// Computes line and column by scanning the input from the start
    ///
    /// Only done for errors, so it is not tracked while reading.
    fn position_of(&self, offset: usize) -> ParsePosition {
        let offset = offset.min(self.input.len());
        let mut line = 0;
        let mut column = 0;
        let mut chars = self.input.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if i >= offset {
                break;
            }
            match c {
                '\r' => {
                    // CR LF is a single line break
                    if let Some((next_i, '\n')) = chars.peek() {
                        if *next_i < offset {
                            chars.next();
                        }
                    }
                    line += 1;
                    column = 0;
                }
                '\n' => {
                    line += 1;
                    column = 0;
                }
                _ => column += 1,
            }
        }
        ParsePosition {
            offset,
            line,
            column,
        }
    }
}
