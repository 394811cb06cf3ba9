//! Number scanning and classification.
//!
//! [`NumberScanner`] follows the JSON number grammar one byte at a time so a
//! literal can be split across any number of chunks. [`classify`] turns the
//! finished literal into an exact integer where possible and a double
//! otherwise.

use crate::{error::SyntaxError, value::Number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// After a leading `-`.
    Sign,
    /// A lone leading `0`.
    Zero,
    Integer,
    /// After `.`, a digit is required.
    Point,
    Fraction,
    /// After `e`/`E`, a sign or digit is required.
    Exponent,
    ExponentSign,
    ExponentDigits,
}

/// Shape of a scanned literal, gathered while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct NumberHints {
    pub negative: bool,
    pub fraction: bool,
    pub exponent: bool,
    /// Digits before any `.` or exponent.
    pub digits: usize,
}

pub(crate) enum NumberStep {
    /// The byte belongs to the number.
    Accept,
    /// The number ended before this byte, which is not consumed.
    End,
    /// The byte cannot follow what has been scanned.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NumberScanner {
    state: State,
    hints: NumberHints,
}

impl NumberScanner {
    /// Starts a number at `first`, which must be `-` or a digit.
    pub(crate) fn start(first: u8) -> Option<Self> {
        let mut hints = NumberHints::default();
        let state = match first {
            b'-' => {
                hints.negative = true;
                State::Sign
            }
            b'0' => State::Zero,
            b'1'..=b'9' => State::Integer,
            _ => return None,
        };
        if first != b'-' {
            hints.digits = 1;
        }
        Some(Self { state, hints })
    }

    pub(crate) fn step(&mut self, byte: u8) -> NumberStep {
        let next = match (self.state, byte) {
            (State::Sign, b'0') => State::Zero,
            (State::Sign | State::Integer, b'0'..=b'9') => State::Integer,
            (State::Zero | State::Integer, b'.') => State::Point,
            (State::Zero | State::Integer | State::Fraction, b'e' | b'E') => State::Exponent,
            (State::Point | State::Fraction, b'0'..=b'9') => State::Fraction,
            (State::Exponent, b'+' | b'-') => State::ExponentSign,
            (State::Exponent | State::ExponentSign | State::ExponentDigits, b'0'..=b'9') => {
                State::ExponentDigits
            }
            // Leading zeros are not allowed.
            (State::Zero, b'0'..=b'9') => return NumberStep::Reject,
            (State::Zero | State::Integer | State::Fraction | State::ExponentDigits, _) => {
                return NumberStep::End;
            }
            (State::Sign | State::Point | State::Exponent | State::ExponentSign, _) => {
                return NumberStep::Reject;
            }
        };
        match next {
            State::Zero | State::Integer => self.hints.digits += 1,
            State::Point => self.hints.fraction = true,
            State::Exponent => self.hints.exponent = true,
            _ => {}
        }
        self.state = next;
        NumberStep::Accept
    }

    /// Whether the bytes so far form a whole number.
    pub(crate) fn is_complete(&self) -> bool {
        matches!(
            self.state,
            State::Zero | State::Integer | State::Fraction | State::ExponentDigits
        )
    }

    pub(crate) fn hints(&self) -> NumberHints {
        self.hints
    }
}

/// Classifies a complete number literal.
///
/// Integers become `Int64` when they fit, then `UInt64` when non-negative and
/// they fit; everything else is a correctly rounded `Double`. A literal that
/// rounds to infinity is rejected.
pub(crate) fn classify(literal: &[u8], hints: NumberHints) -> Result<Number, SyntaxError> {
    let text = core::str::from_utf8(literal).map_err(|_| SyntaxError::InvalidUtf8)?;
    if !hints.fraction && !hints.exponent {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Number::Int64(n));
        }
        if !hints.negative && hints.digits <= 20 {
            if let Ok(n) = text.parse::<u64>() {
                return Ok(Number::UInt64(n));
            }
        }
    }
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Number::Double(n)),
        _ => Err(SyntaxError::NumberOutOfRange),
    }
}
