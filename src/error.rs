//! Error types for the PDF engine.
//!
//! Only fatal conditions are represented here. Malformed input that can be
//! worked around (bad dictionary keys, unknown operators, unsupported filters,
//! wrong operator arity) is logged through the `log` facade and parsing goes on.

use crate::object::ObjectRef;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading a document.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid PDF header
    #[error("Invalid PDF header: {0}")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table: {0}")]
    InvalidXref(String),

    /// A cross-reference stream declared an entry type other than 0, 1 or 2
    #[error("Invalid entry type {0} in cross-reference stream")]
    InvalidXrefEntryType(u64),

    /// The object found at an xref offset does not carry the expected header
    #[error("Bad cross-reference entry for {0}: {1}")]
    BadXrefEntry(ObjectRef, String),

    /// Object stream container with unusable /N or /First
    #[error("Invalid object stream {0}: {1}")]
    InvalidObjectStream(u32, String),

    /// Input ended in the middle of a structure that can be resumed later
    #[error("Missing data at byte {0}")]
    MissingData(usize),

    /// No trailer could be located after exhausting every start offset
    #[error("Trailer not found")]
    TrailerNotFound,

    /// Referenced object not found
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Pattern dictionary with a /PatternType other than tiling or shading
    #[error("Unknown pattern type: {0}")]
    UnknownPatternType(i64),

    /// Page index outside of the page tree
    #[error("Page index {0} out of range")]
    PageNotFound(usize),

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Font error
    #[error("Font error: {0}")]
    Font(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}
