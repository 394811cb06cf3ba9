/// Nesting limit used by [`ParserOptions::default`].
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Configuration options for the incremental parser.
///
/// # Examples
///
/// ```rust
/// use jsonarena::{Parser, ParserOptions};
///
/// let parser = Parser::new(ParserOptions {
///     max_depth: 64,
///     ..Default::default()
/// });
/// # drop(parser);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Maximum number of open arrays and objects.
    ///
    /// Opening one more container fails with
    /// [`SyntaxError::TooDeep`](crate::SyntaxError::TooDeep).
    ///
    /// # Default
    ///
    /// `1024`
    pub max_depth: usize,

    /// Whether raw bytes below U+0020 are allowed inside strings.
    ///
    /// When `true` they are stored verbatim, so a raw NUL survives parsing.
    /// When `false` they are rejected as
    /// [`SyntaxError::ControlCharacter`](crate::SyntaxError::ControlCharacter),
    /// as strict RFC 8259 requires.
    ///
    /// # Default
    ///
    /// `true`
    pub allow_control_characters: bool,

    #[cfg(any(test, feature = "fuzzing"))]
    /// Panic on syntax errors instead of returning them.
    ///
    /// Enabled only in test builds to produce backtraces on parse failures.
    pub panic_on_error: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            allow_control_characters: true,
            #[cfg(any(test, feature = "fuzzing"))]
            panic_on_error: false,
        }
    }
}
