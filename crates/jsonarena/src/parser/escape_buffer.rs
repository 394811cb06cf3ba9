//! Accumulates the four hex digits of a `\uXXXX` escape.
//!
//! Only the digits are validated here. Pairing surrogates is left to the
//! unescaper, which sees the whole string.

use crate::error::SyntaxError;

/// Hex digits of a `\u` escape seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct UnicodeEscapeBuffer {
    unit: u16,
    len: u8,
}

impl UnicodeEscapeBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte of the escape.
    ///
    /// Returns `Ok(Some(unit))` after the fourth digit, `Ok(None)` before it.
    pub(crate) fn feed(&mut self, byte: u8) -> Result<Option<u16>, SyntaxError> {
        let digit = hex_value(byte).ok_or(SyntaxError::InvalidHexDigit(byte))?;
        self.unit = (self.unit << 4) | u16::from(digit);
        self.len += 1;
        if self.len == 4 {
            let unit = self.unit;
            *self = Self::new();
            Ok(Some(unit))
        } else {
            Ok(None)
        }
    }
}

pub(crate) fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
