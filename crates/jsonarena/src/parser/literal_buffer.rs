#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Literal {
    Null,
    True,
    False,
}

/// What happened after feeding one more byte into the literal matcher?
pub(crate) enum Step {
    /// Byte matched, but the literal is not finished yet.
    NeedMore,
    /// Byte matched *and* it was the last byte of the literal.
    Done(Literal),
    /// Byte did **not** match the expected one.
    Reject,
}

/// The remaining bytes of `null`, `true` or `false` while matching.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct ExpectedLiteralBuffer {
    rest: &'static [u8],
    kind: Literal,
}

impl ExpectedLiteralBuffer {
    /// Start matching after the *first* byte (`n`, `t`, or `f`).
    pub(crate) fn new(first: u8) -> Option<Self> {
        let (rest, kind): (&'static [u8], _) = match first {
            b'n' => (b"ull", Literal::Null),
            b't' => (b"rue", Literal::True),
            b'f' => (b"alse", Literal::False),
            _ => return None,
        };
        Some(Self { rest, kind })
    }

    /// Give the matcher the next input byte and learn what to do next.
    pub(crate) fn step(&mut self, byte: u8) -> Step {
        match self.rest.split_first() {
            Some((&expected, rest)) if expected == byte => {
                self.rest = rest;
                if rest.is_empty() {
                    Step::Done(self.kind)
                } else {
                    Step::NeedMore
                }
            }
            _ => Step::Reject,
        }
    }
}
