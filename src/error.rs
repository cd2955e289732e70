//! Error types shared by the reading and the writing side

use std::fmt::{Display, Formatter};

use thiserror::Error;

type IoError = std::io::Error;

/// Classification of the next significant character of the input
///
/// This is not a materialized value, it only describes what kind of token the
/// cursor is currently positioned at.
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum TokenKind {
    /// Quoted string, either with `"` or with `'`
    String,
    /// Number literal, for example `-12.5e3`
    Number,
    /// `{ ... }`
    Object,
    /// `[ ... ]`
    Array,
    /// `true`, matched case-insensitively
    True,
    /// `false`, matched case-insensitively
    False,
    /// `null`, matched case-insensitively
    Null,
    /// `undefined`, matched case-insensitively; decoded as `null`
    Undefined,
    /// Unquoted scalar text read up to the next `,`, `:`, `}` or `]`
    BareText,
}

/// Line and column position
///
/// Both values start at 0. The characters _CR_ (U+000D), _LF_ (U+000A) and _CR LF_
/// are considered line breaks. The column counts Unicode characters, not bytes.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct ParsePosition {
    /// Byte offset from the start of the input
    pub offset: usize,
    /// Line number, starting at 0
    pub line: usize,
    /// Character column within the current line, starting at 0
    pub column: usize,
}

impl Display for ParsePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}, column {} (offset {})",
            self.line, self.column, self.offset
        )
    }
}

/// JSON syntax error
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("JSON syntax error {kind} at {location}")]
pub struct JsonSyntaxError {
    /// Kind of the error
    pub kind: SyntaxErrorKind,
    /// Location where the error occurred
    pub location: ParsePosition,
}

/// Describes why a syntax error occurred
#[non_exhaustive]
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum SyntaxErrorKind {
    /// A literal value is incomplete or invalid, for example `tru` instead of `true`
    InvalidLiteral,
    /// A character was encountered which cannot start a value
    UnexpectedCharacter,
    /// A colon (`:`) is missing between member name and member value
    MissingColon,
    /// Neither a comma (`,`) nor the closing bracket followed an array item or object member
    MissingCommaOrClosingBracket,
    /// A member name or the end of an object (`}`) was expected but something else was encountered
    ExpectingMemberNameOrObjectEnd,
    /// A quoted string is missing its closing quote
    UnterminatedString,
    /// An unknown escape sequence (`\...`) was encountered
    UnknownEscapeSequence,
    /// A malformed escape sequence was encountered, for example `\u00` instead of `\u0000`
    MalformedEscapeSequence,
    /// An unpaired UTF-16 surrogate was encountered in a `\uXXXX` escape sequence
    UnpairedSurrogatePairEscapeSequence,
    /// The document ended inside of a value, for example a closing `]` is missing
    IncompleteDocument,
    /// Unexpected trailing data was detected after the top-level value
    TrailingData,
    /// The path of a `$ref` pointer object is malformed
    MalformedReferencePath,
}

/// Error which occurred while encoding or decoding
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JsonError {
    /// A syntax error was encountered
    #[error("syntax error: {0}")]
    SyntaxError(#[from] JsonSyntaxError),
    /// The next value had a different type than the one requested
    ///
    /// This error occurs for example when trying to read a JSON string when the next
    /// value is actually a JSON object.
    #[error("expected {expected} but got {actual} at {location}")]
    TypeMismatch {
        /// The requested token kind
        expected: TokenKind,
        /// The token kind found in the input
        actual: TokenKind,
        /// Location of the value
        location: ParsePosition,
    },
    /// A number literal cannot be represented by the requested number type
    #[error("number '{number}' is out of range for {target} at {location}")]
    Range {
        /// The number literal
        number: String,
        /// Name of the requested number type
        target: &'static str,
        /// Location of the number literal
        location: ParsePosition,
    },
    /// The nesting depth exceeds the configured maximum
    #[error("nesting depth exceeds the maximum of {max_depth}")]
    OutOfDepth {
        /// The configured maximum depth
        max_depth: usize,
    },
    /// A value contains itself while cycles are configured to be an error
    #[error("loop reference: value at '{path}' refers to its ancestor at '{target}'")]
    LoopReference {
        /// Path at which the value was first encountered
        target: String,
        /// Path at which the value was encountered again
        path: String,
    },
    /// The arena would have to grow beyond its configured maximum size
    #[error("out of memory: cannot reserve {requested} more bytes for {len} bytes in use (maximum {max_size})")]
    OutOfMemory {
        /// Number of additional bytes which were requested
        requested: usize,
        /// Number of bytes in use
        len: usize,
        /// Configured maximum arena size
        max_size: usize,
    },
    /// A `$ref` pointer does not lead to a value
    #[error("unresolved reference '{path}': {reason}")]
    UnresolvedReference {
        /// The pointer path
        path: String,
        /// Why the pointer could not be resolved
        reason: &'static str,
    },
    /// An IO error occurred while reading input or flushing output, or the input
    /// was not valid UTF-8
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
}
