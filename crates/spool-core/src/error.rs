//! Error types for core domain parsing.

use thiserror::Error;

/// Primary error type for core domain operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Info-hash text had an unsupported length.
    #[error("info hash has an invalid length")]
    InvalidHashLength {
        /// Offending input.
        value: String,
        /// Observed length in characters.
        length: usize,
    },
    /// Info-hash text could not be decoded.
    #[error("info hash is not valid hex or base32")]
    InvalidHashEncoding {
        /// Offending input.
        value: String,
    },
    /// Poster search language was not recognised.
    #[error("unsupported poster language")]
    UnsupportedLanguage {
        /// Offending input.
        value: String,
    },
}

/// Convenience alias for core results.
pub type CoreResult<T> = Result<T, CoreError>;
