//! An incremental JSON parser that builds value trees inside pluggable
//! memory resources.
//!
//! Input may arrive in chunks split at any byte; the tree is the same however
//! the document is cut up. Every string, array and object of the tree is
//! allocated from a [`MemoryResource`] chosen by the caller:
//! [`SystemResource`], the bump-allocating [`MonotonicResource`], or the
//! size-class [`PoolResource`].
//!
//! ```
//! use jsonarena::{MonotonicResource, Parser, ParserOptions, Storage};
//!
//! let mut parser = Parser::new(ParserOptions::default());
//! parser.start(Storage::new(MonotonicResource::new()));
//! for chunk in [&b"[1, 18446744"[..], b"073709551615, 2.5", b", \"\\u00e9\"]"] {
//!     parser.write(chunk)?;
//! }
//! parser.finish(b"")?;
//! let value = parser.release()?;
//! assert_eq!(value.to_string(), r#"[1,18446744073709551615,2.5,"é"]"#);
//! # Ok::<(), jsonarena::ParserError>(())
//! ```

#![no_std]
extern crate alloc;

#[cfg(test)]
extern crate std;

mod chunk_utils;
mod error;
mod options;
mod parser;
mod resource;
mod storage;
mod value;

#[cfg(test)]
mod tests;

#[doc(hidden)]
pub use chunk_utils::{produce_chunks, split_at_offsets};
pub use error::{ParserError, Position, SyntaxError};
pub use options::{DEFAULT_MAX_DEPTH, ParserOptions};
pub use parser::Parser;
pub use resource::{
    AllocError, MemoryResource, MonotonicResource, PoolResource, ResourceKind, Storage,
    SystemResource,
};
pub use value::{Array, JsonString, Number, Object, Value};

/// Parses a complete document into a parser-owned monotonic resource.
///
/// # Errors
///
/// Fails on malformed input, including anything but whitespace after the
/// value.
///
/// ```
/// let v = jsonarena::parse("[true, null]").unwrap();
/// assert_eq!(v.to_string(), "[true,null]");
/// assert!(jsonarena::parse("[] x").is_err());
/// ```
pub fn parse(input: impl AsRef<[u8]>) -> Result<Value<'static>, ParserError> {
    let mut parser = Parser::new(ParserOptions::default());
    parser.start_default();
    finish_all(parser, input.as_ref())
}

/// Parses a complete document into `storage`.
///
/// # Errors
///
/// As for [`parse`], plus [`ParserError::OutOfMemory`] when `storage` fails.
pub fn parse_with<'r>(
    input: impl AsRef<[u8]>,
    storage: Storage<'r>,
) -> Result<Value<'r>, ParserError> {
    let mut parser = Parser::new(ParserOptions::default());
    parser.start(storage);
    finish_all(parser, input.as_ref())
}

fn finish_all<'r>(mut parser: Parser<'r>, input: &[u8]) -> Result<Value<'r>, ParserError> {
    let consumed = parser.finish(input)?;
    if consumed < input.len() {
        return Err(ParserError::Syntax {
            kind: SyntaxError::TrailingCharacters,
            position: parser.position(),
        });
    }
    parser.release()
}
