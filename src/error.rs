//! Error types for the PQL library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`PqlError`] enum. Parse failures carry the byte offset of the offending
//! token so callers can point at the broken part of a query.
//!
//! # Examples
//!
//! ```
//! use portal_pql::error::{PqlError, Result};
//!
//! fn checked(category: &str) -> Result<()> {
//!     if category.is_empty() {
//!         return Err(PqlError::precondition("category"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(checked("").is_err());
//! ```

use thiserror::Error;

/// The main error type for PQL operations.
#[derive(Error, Debug)]
pub enum PqlError {
    /// Malformed PQL text.
    #[error("Syntax error at position {position}: {message}")]
    Syntax {
        /// Byte offset of the offending token.
        position: usize,
        /// What was found and what was expected.
        message: String,
    },

    /// A required parameter of a mutation was missing or empty.
    #[error("Missing required parameter: {0}")]
    Precondition(String),

    /// A value that cannot be represented by the query model.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with PqlError.
pub type Result<T> = std::result::Result<T, PqlError>;

impl PqlError {
    /// Create a new syntax error at the given byte offset.
    pub fn syntax<S: Into<String>>(position: usize, msg: S) -> Self {
        PqlError::Syntax {
            position,
            message: msg.into(),
        }
    }

    /// Create a new precondition error naming the missing parameter.
    pub fn precondition<S: Into<String>>(parameter: S) -> Self {
        PqlError::Precondition(parameter.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        PqlError::InvalidArgument(msg.into())
    }

    /// Returns true if this error came from the parser.
    pub fn is_syntax(&self) -> bool {
        matches!(self, PqlError::Syntax { .. })
    }

    /// Byte offset of a syntax error, if this is one.
    pub fn position(&self) -> Option<usize> {
        match self {
            PqlError::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }
}
