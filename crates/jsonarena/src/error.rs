use core::fmt;

use thiserror::Error;

use crate::resource::AllocError;

/// A location in the input stream, counted across every chunk written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Bytes consumed before this point.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, in bytes.
    pub column: usize,
}

impl Position {
    pub(crate) fn advance(&mut self, byte: u8) {
        self.offset += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Everything that can go wrong while driving a [`Parser`](crate::Parser).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserError {
    /// `write` or `finish` before `start`, or after `release`.
    #[error("parser has not been started")]
    NotStarted,
    /// `release` before the value was complete.
    #[error("value is not complete")]
    NotDone,
    /// `release` called twice.
    #[error("value has already been released")]
    AlreadyReleased,
    /// The input is not valid JSON.
    #[error("syntax error: {kind} at {position}")]
    Syntax {
        /// What was wrong.
        kind: SyntaxError,
        /// Where it was detected.
        position: Position,
    },
    /// The memory resource failed to allocate.
    #[error("out of memory")]
    OutOfMemory,
}

impl ParserError {
    /// The kind of syntax error, if this is one.
    #[must_use]
    pub fn syntax(&self) -> Option<SyntaxError> {
        match self {
            Self::Syntax { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<AllocError> for ParserError {
    fn from(_: AllocError) -> Self {
        Self::OutOfMemory
    }
}

/// The ways a document can be malformed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SyntaxError {
    #[error("unexpected character '{}'", .0.escape_ascii())]
    UnexpectedCharacter(u8),
    #[error("invalid escape character '{}'", .0.escape_ascii())]
    InvalidEscape(u8),
    #[error("invalid hex digit '{}' in unicode escape", .0.escape_ascii())]
    InvalidHexDigit(u8),
    #[error("unpaired surrogate \\u{0:04X}")]
    UnpairedSurrogate(u16),
    #[error("control character 0x{0:02X} in string")]
    ControlCharacter(u8),
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("number out of range")]
    NumberOutOfRange,
    #[error("nesting deeper than {0}")]
    TooDeep(usize),
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("trailing characters after value")]
    TrailingCharacters,
    #[error("trailing comma")]
    TrailingComma,
    #[error("mismatched closing '{}'", *.0 as char)]
    MismatchedClose(u8),
}

/// Internal failure before a position is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    Syntax(SyntaxError),
    OutOfMemory,
}

impl From<SyntaxError> for Failure {
    fn from(kind: SyntaxError) -> Self {
        Self::Syntax(kind)
    }
}

impl From<AllocError> for Failure {
    fn from(_: AllocError) -> Self {
        Self::OutOfMemory
    }
}
