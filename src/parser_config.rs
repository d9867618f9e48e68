//! Parser options controlling recovery behaviour and resource limits.

/// Parser options for controlling error handling and recovery behavior.
///
/// # Example
///
/// ```
/// use pdf_primitives::parser_config::ParserOptions;
///
/// // Lenient mode (default): log and continue past malformed input
/// let lenient = ParserOptions::lenient();
///
/// // Strict mode: recoverable problems become errors
/// let strict = ParserOptions::strict();
/// assert!(strict.strict);
///
/// let custom = ParserOptions {
///     max_form_depth: 4,
///     ..ParserOptions::default()
/// };
/// assert!(!custom.strict);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParserOptions {
    /// Turn recoverable problems (bad dictionary keys, unknown operators,
    /// wrong operator arity) into errors.
    pub strict: bool,

    /// Maximum array / dictionary nesting depth
    pub max_nesting: usize,

    /// Maximum depth of nested form XObjects inlined by the evaluator
    pub max_form_depth: usize,

    /// Maximum number of cross-reference sections followed through /Prev
    pub max_xref_sections: usize,

    /// Block size used when scanning forward for `endstream`
    pub endstream_scan_block: usize,

    /// Maximum decompressed stream size in bytes (0 disables the check)
    pub max_decompressed_size: usize,

    /// TJ adjustment (thousandths of text space, negated) at or above which
    /// an explicit word break is inserted
    pub word_break_threshold: f64,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: fail on recoverable problems.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::lenient()
        }
    }

    /// Lenient mode: log recoverable problems and carry on.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_nesting: 100,
            max_form_depth: 20,
            max_xref_sections: 100,
            endstream_scan_block: 2048,
            max_decompressed_size: 100 * 1024 * 1024,
            word_break_threshold: 250.0,
        }
    }
}
