//! The incremental parser.
//!
//! Overview
//! - [`Parser`] accepts input in chunks of any size and builds a [`Value`]
//!   tree inside the memory resource bound by [`Parser::start`]. A chunk may
//!   end anywhere: inside a literal, a number, a string, or an escape.
//! - The parser never recurses. Open containers live on an explicit frame
//!   stack; a partially scanned token lives in `token`, with its bytes in the
//!   current chunk (from `mark`) and, once the chunk runs out, in `scratch`.
//! - Strings and numbers that fit in a single chunk are decoded straight from
//!   it; `scratch` is only filled when a token straddles chunks.
//!
//! Lifecycle
//! - `start` (or `start_default`) binds a resource and resets all state.
//! - `write` consumes what it can; `finish` additionally requires that the
//!   value is complete.
//! - `release` hands out the tree. A failed parser keeps returning its first
//!   error until it is started again.
//!
//! # Examples
//!
//! ```
//! use jsonarena::{Parser, ParserOptions};
//!
//! let mut parser = Parser::new(ParserOptions::default());
//! parser.start_default();
//! parser.write(br#"{"greeting":"hel"#)?;
//! parser.write(br#"lo","n":4"#)?;
//! parser.finish(b"2}")?;
//! let value = parser.release()?;
//! assert_eq!(value.to_string(), r#"{"greeting":"hello","n":42}"#);
//! # Ok::<(), jsonarena::ParserError>(())
//! ```

mod escape_buffer;
mod literal_buffer;
mod numbers;
mod unescape;

use alloc::{rc::Rc, vec::Vec};
use core::fmt;

use escape_buffer::UnicodeEscapeBuffer;
use literal_buffer::{ExpectedLiteralBuffer, Literal, Step};
use log::debug;
use numbers::{NumberScanner, NumberStep, classify};
use unescape::unescape;

use crate::{
    error::{Failure, ParserError, Position, SyntaxError},
    options::ParserOptions,
    resource::{MonotonicResource, Storage},
    value::{Array, JsonString, Object, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No resource bound yet.
    Initial,
    Ready,
    InProgress,
    Done,
    Failed,
    Released,
}

/// What the grammar allows next, outside of any token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    RootValue,
    FirstArrayValue,
    ArrayValue,
    ArrayComma,
    FirstPropertyName,
    PropertyName,
    Colon,
    PropertyValue,
    ObjectComma,
    /// The root value is complete; only whitespace is consumed.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Backslash,
    Unicode(UnicodeEscapeBuffer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StringScan {
    escape: Escape,
    is_key: bool,
}

/// The token being scanned, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    None,
    Literal(ExpectedLiteralBuffer),
    Number(NumberScanner),
    String(StringScan),
}

#[derive(Debug)]
enum Frame<'r> {
    Array(Array<'r>),
    Object {
        object: Object<'r>,
        /// Set between a member's key and its value.
        key: Option<JsonString<'r>>,
    },
}

enum Advance {
    /// This many bytes belong to the current state.
    Consumed(usize),
    /// The state changed without consuming; look at the byte again.
    Retry,
    /// The value is complete and the byte is not whitespace.
    Stop,
}

/// An incremental JSON parser producing a [`Value`] tree.
///
/// The lifetime `'r` is the lifetime of the bound [`Storage`]; trees released
/// by the parser carry it as well.
pub struct Parser<'r> {
    options: ParserOptions,
    phase: Phase,
    storage: Storage<'r>,
    /// Present while a parser-owned resource is bound.
    default_resource: Option<Rc<MonotonicResource<'static>>>,
    /// First-block hint for the next parser-owned resource.
    reserve: usize,
    stack: Vec<Frame<'r>>,
    expect: Expect,
    token: Token,
    /// Start of the current token within the chunk being consumed.
    mark: usize,
    /// Bytes of the current token from earlier chunks.
    scratch: Vec<u8>,
    root: Option<Value<'r>>,
    position: Position,
    error: Option<ParserError>,
}

impl Default for Parser<'_> {
    fn default() -> Self {
        Self::new(ParserOptions::default())
    }
}

impl<'r> Parser<'r> {
    /// Creates a parser. Nothing can be written before [`start`](Self::start)
    /// or [`start_default`](Self::start_default).
    #[must_use]
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            phase: Phase::Initial,
            storage: Storage::system(),
            default_resource: None,
            reserve: 0,
            stack: Vec::new(),
            expect: Expect::RootValue,
            token: Token::None,
            mark: 0,
            scratch: Vec::new(),
            root: None,
            position: Position::default(),
            error: None,
        }
    }

    /// Binds `storage` for the next value and discards any previous state.
    ///
    /// Does not allocate from `storage`.
    pub fn start(&mut self, storage: Storage<'r>) {
        self.reset(storage);
        self.default_resource = None;
        debug!("parser started with a {:?} resource", self.storage.kind());
    }

    /// Binds a fresh parser-owned [`MonotonicResource`].
    ///
    /// The resource lives until the parser and every tree built in it are
    /// gone. Its first block honours the largest [`reserve`](Self::reserve)
    /// hint given so far.
    pub fn start_default(&mut self) {
        let resource = Rc::new(MonotonicResource::with_initial_size(self.reserve));
        self.reset(Storage::from(resource.clone()));
        self.default_resource = Some(resource);
        debug!("parser started with its own monotonic resource");
    }

    /// Hints the size of the parser-owned resource's first block.
    ///
    /// Ignored while an external resource is bound, once the parser-owned
    /// resource has allocated, and when smaller than an earlier hint.
    pub fn reserve(&mut self, bytes: usize) {
        if let Some(resource) = &self.default_resource {
            resource.reserve(bytes);
        } else if matches!(self.phase, Phase::Initial | Phase::Released) {
            self.reserve = self.reserve.max(bytes);
        }
    }

    /// Consumes as much of `bytes` as belongs to the value.
    ///
    /// Returns the number of bytes consumed. Everything is consumed unless
    /// the value completes early, in which case trailing whitespace is
    /// consumed and the first other byte is left alone.
    ///
    /// # Errors
    ///
    /// [`ParserError::NotStarted`] before `start`, a syntax error for
    /// malformed input, or [`ParserError::OutOfMemory`]. After a syntax or
    /// allocation error, every call returns that same error.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, ParserError> {
        match self.phase {
            Phase::Initial | Phase::Released => return Err(ParserError::NotStarted),
            Phase::Failed => return Err(self.error.unwrap_or(ParserError::NotStarted)),
            Phase::Ready => self.phase = Phase::InProgress,
            Phase::InProgress | Phase::Done => {}
        }
        self.consume(bytes).map_err(|failure| self.fail(failure))
    }

    /// Like [`write`](Self::write), then requires a complete value.
    ///
    /// # Errors
    ///
    /// As for `write`, plus [`SyntaxError::UnexpectedEndOfInput`] when the
    /// value is incomplete.
    pub fn finish(&mut self, bytes: &[u8]) -> Result<usize, ParserError> {
        let consumed = self.write(bytes)?;
        self.end_of_input().map_err(|failure| self.fail(failure))?;
        Ok(consumed)
    }

    /// Takes the completed tree.
    ///
    /// # Errors
    ///
    /// [`ParserError::NotDone`] unless the value is complete, and
    /// [`ParserError::AlreadyReleased`] on a second call.
    pub fn release(&mut self) -> Result<Value<'r>, ParserError> {
        match self.phase {
            Phase::Done => {}
            Phase::Released => return Err(ParserError::AlreadyReleased),
            _ => return Err(ParserError::NotDone),
        }
        let root = self.root.take().ok_or(ParserError::NotDone)?;
        self.phase = Phase::Released;
        self.default_resource = None;
        self.storage = Storage::system();
        debug!("parser released its value after {} bytes", self.position.offset);
        Ok(root)
    }

    /// Whether a complete value has been parsed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Position of the next byte to be consumed.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Number of containers currently open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn reset(&mut self, storage: Storage<'r>) {
        self.storage = storage;
        self.stack.clear();
        self.expect = Expect::RootValue;
        self.token = Token::None;
        self.mark = 0;
        self.scratch.clear();
        self.root = None;
        self.position = Position::default();
        self.error = None;
        self.phase = Phase::Ready;
    }

    fn fail(&mut self, failure: Failure) -> ParserError {
        let error = match failure {
            Failure::Syntax(kind) => ParserError::Syntax {
                kind,
                position: self.position,
            },
            Failure::OutOfMemory => ParserError::OutOfMemory,
        };
        debug!("parser failed: {error}");
        self.phase = Phase::Failed;
        self.error = Some(error);
        #[cfg(any(test, feature = "fuzzing"))]
        assert!(!self.options.panic_on_error, "{error}");
        error
    }

    fn consume(&mut self, chunk: &[u8]) -> Result<usize, Failure> {
        self.mark = 0;
        let mut i = 0;
        while i < chunk.len() {
            match self.step(chunk, i)? {
                Advance::Consumed(n) => {
                    for &b in &chunk[i..i + n] {
                        self.position.advance(b);
                    }
                    i += n;
                }
                Advance::Retry => {}
                Advance::Stop => break,
            }
        }
        if matches!(self.token, Token::Number(_) | Token::String(_)) {
            self.scratch.extend_from_slice(&chunk[self.mark..i]);
        }
        self.mark = 0;
        Ok(i)
    }

    fn end_of_input(&mut self) -> Result<(), Failure> {
        match self.token {
            Token::None => {}
            Token::Number(scanner) if scanner.is_complete() => {
                self.finish_number(&[], 0, scanner)?;
            }
            _ => return Err(SyntaxError::UnexpectedEndOfInput.into()),
        }
        if self.expect == Expect::End {
            Ok(())
        } else {
            Err(SyntaxError::UnexpectedEndOfInput.into())
        }
    }

    fn step(&mut self, chunk: &[u8], i: usize) -> Result<Advance, Failure> {
        let byte = chunk[i];
        match self.token {
            Token::None => self.step_structural(i, byte),
            Token::Literal(mut literal) => match literal.step(byte) {
                Step::NeedMore => {
                    self.token = Token::Literal(literal);
                    Ok(Advance::Consumed(1))
                }
                Step::Done(kind) => {
                    self.token = Token::None;
                    self.emit(match kind {
                        Literal::Null => Value::Null,
                        Literal::True => Value::Bool(true),
                        Literal::False => Value::Bool(false),
                    })?;
                    Ok(Advance::Consumed(1))
                }
                Step::Reject => Err(SyntaxError::UnexpectedCharacter(byte).into()),
            },
            Token::Number(mut scanner) => match scanner.step(byte) {
                NumberStep::Accept => {
                    self.token = Token::Number(scanner);
                    Ok(Advance::Consumed(1))
                }
                NumberStep::End => {
                    self.finish_number(chunk, i, scanner)?;
                    Ok(Advance::Retry)
                }
                NumberStep::Reject => Err(SyntaxError::UnexpectedCharacter(byte).into()),
            },
            Token::String(scan) => self.step_string(chunk, i, scan),
        }
    }

    fn step_structural(&mut self, i: usize, byte: u8) -> Result<Advance, Failure> {
        if matches!(byte, b' ' | b'\t' | b'\n' | b'\r') {
            return Ok(Advance::Consumed(1));
        }
        match (self.expect, byte) {
            (Expect::End, _) => return Ok(Advance::Stop),
            (Expect::FirstArrayValue | Expect::ArrayComma, b']')
            | (Expect::FirstPropertyName | Expect::ObjectComma, b'}') => self.close(byte)?,
            (Expect::ArrayValue, b']') | (Expect::PropertyName, b'}') => {
                return Err(SyntaxError::TrailingComma.into());
            }
            (Expect::FirstArrayValue | Expect::ArrayComma, b'}')
            | (Expect::FirstPropertyName | Expect::ObjectComma, b']') => {
                return Err(SyntaxError::MismatchedClose(byte).into());
            }
            (Expect::ArrayComma, b',') => self.expect = Expect::ArrayValue,
            (Expect::ObjectComma, b',') => self.expect = Expect::PropertyName,
            (Expect::Colon, b':') => self.expect = Expect::PropertyValue,
            (Expect::FirstPropertyName | Expect::PropertyName, b'"') => self.begin_string(i, true),
            (
                Expect::RootValue
                | Expect::FirstArrayValue
                | Expect::ArrayValue
                | Expect::PropertyValue,
                _,
            ) => self.begin_value(i, byte)?,
            _ => return Err(SyntaxError::UnexpectedCharacter(byte).into()),
        }
        Ok(Advance::Consumed(1))
    }

    fn begin_value(&mut self, i: usize, byte: u8) -> Result<(), Failure> {
        match byte {
            b'{' => {
                self.open(Frame::Object {
                    object: Object::new_in(self.storage.clone()),
                    key: None,
                })?;
                self.expect = Expect::FirstPropertyName;
            }
            b'[' => {
                self.open(Frame::Array(Array::new_in(self.storage.clone())))?;
                self.expect = Expect::FirstArrayValue;
            }
            b'"' => self.begin_string(i, false),
            _ => {
                if let Some(scanner) = NumberScanner::start(byte) {
                    self.token = Token::Number(scanner);
                    self.mark = i;
                } else if let Some(literal) = ExpectedLiteralBuffer::new(byte) {
                    self.token = Token::Literal(literal);
                } else {
                    return Err(SyntaxError::UnexpectedCharacter(byte).into());
                }
            }
        }
        Ok(())
    }

    fn begin_string(&mut self, i: usize, is_key: bool) {
        self.token = Token::String(StringScan {
            escape: Escape::None,
            is_key,
        });
        self.mark = i + 1;
    }

    fn step_string(&mut self, chunk: &[u8], i: usize, mut scan: StringScan) -> Result<Advance, Failure> {
        let byte = chunk[i];
        match scan.escape {
            Escape::Backslash => {
                scan.escape = match byte {
                    b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => Escape::None,
                    b'u' => Escape::Unicode(UnicodeEscapeBuffer::new()),
                    _ => return Err(SyntaxError::InvalidEscape(byte).into()),
                };
            }
            Escape::Unicode(mut digits) => {
                scan.escape = match digits.feed(byte)? {
                    Some(_) => Escape::None,
                    None => Escape::Unicode(digits),
                };
            }
            Escape::None => {
                let allow_controls = self.options.allow_control_characters;
                let rest = &chunk[i..];
                let plain = rest
                    .iter()
                    .position(|&b| b == b'"' || b == b'\\' || (b < 0x20 && !allow_controls))
                    .unwrap_or(rest.len());
                if plain > 0 {
                    return Ok(Advance::Consumed(plain));
                }
                match byte {
                    b'"' => {
                        self.finish_string(chunk, i, scan.is_key)?;
                        return Ok(Advance::Consumed(1));
                    }
                    b'\\' => scan.escape = Escape::Backslash,
                    _ => return Err(SyntaxError::ControlCharacter(byte).into()),
                }
            }
        }
        self.token = Token::String(scan);
        Ok(Advance::Consumed(1))
    }

    fn finish_string(&mut self, chunk: &[u8], end: usize, is_key: bool) -> Result<(), Failure> {
        let raw = token_bytes(&mut self.scratch, chunk, self.mark, end);
        let text = unescape(raw, &self.storage)?;
        self.scratch.clear();
        self.token = Token::None;
        if is_key {
            if let Some(Frame::Object { key, .. }) = self.stack.last_mut() {
                *key = Some(text);
            }
            self.expect = Expect::Colon;
            Ok(())
        } else {
            self.emit(Value::String(text))
        }
    }

    fn finish_number(&mut self, chunk: &[u8], end: usize, scanner: NumberScanner) -> Result<(), Failure> {
        let literal = token_bytes(&mut self.scratch, chunk, self.mark, end);
        let number = classify(literal, scanner.hints())?;
        self.scratch.clear();
        self.token = Token::None;
        self.emit(number.into())
    }

    fn open(&mut self, frame: Frame<'r>) -> Result<(), Failure> {
        if self.stack.len() >= self.options.max_depth {
            return Err(SyntaxError::TooDeep(self.options.max_depth).into());
        }
        self.stack.push(frame);
        Ok(())
    }

    fn close(&mut self, byte: u8) -> Result<(), Failure> {
        let value = match self.stack.pop() {
            Some(Frame::Array(array)) => Value::Array(array),
            Some(Frame::Object { object, .. }) => Value::Object(object),
            None => return Err(SyntaxError::UnexpectedCharacter(byte).into()),
        };
        self.emit(value)
    }

    /// Attaches a finished value to the innermost container, or makes it the
    /// root.
    fn emit(&mut self, value: Value<'r>) -> Result<(), Failure> {
        match self.stack.last_mut() {
            None => {
                self.root = Some(value);
                self.expect = Expect::End;
                self.phase = Phase::Done;
            }
            Some(Frame::Array(array)) => {
                array.push(value)?;
                self.expect = Expect::ArrayComma;
            }
            Some(Frame::Object { object, key }) => {
                // Values are only accepted after a key and a colon.
                if let Some(key) = key.take() {
                    object.push(key, value)?;
                }
                self.expect = Expect::ObjectComma;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Parser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("phase", &self.phase)
            .field("expect", &self.expect)
            .field("depth", &self.stack.len())
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// The bytes of the current token: straight from `chunk` when the token
/// started in it, otherwise appended to what earlier chunks left in `scratch`.
fn token_bytes<'a>(scratch: &'a mut Vec<u8>, chunk: &'a [u8], mark: usize, end: usize) -> &'a [u8] {
    if scratch.is_empty() {
        &chunk[mark..end]
    } else {
        scratch.extend_from_slice(&chunk[mark..end]);
        scratch
    }
}

#[cfg(test)]
mod tests;
