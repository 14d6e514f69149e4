//! Error types produced while decoding request bodies.
//!
//! Only failures that make the whole body unusable surface here. Missing or
//! mistyped fields inside an element never do; the parsers skip them.
//!
//! | Error | Cause |
//! |-------|-------|
//! | [`Io`](ParseError::Io) | The underlying reader failed |
//! | [`Json`](ParseError::Json) | The body is not valid JSON |
//! | [`Closed`](ParseError::Closed) | The parser already released its reader |
use thiserror::Error;

/// Failure to decode a request body.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ParseError {
    #[error("failed to read request body: {0}")]
    Io(#[from] std::io::Error),

    /// Syntax errors and premature end of input.
    #[error("request body is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("parser is closed")]
    Closed,
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            ParseError::Io(err.into())
        } else {
            ParseError::Json(err)
        }
    }
}
