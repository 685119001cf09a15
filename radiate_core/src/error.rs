//! Error types for the synchronization and projection engines.

use thiserror::Error;

/// Errors raised by the core engines.
///
/// An empty projection or an annotation-free frame is not an error: those
/// come back as empty vectors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed or contract-violating input (empty timestamp table,
    /// unknown class name, degenerate bounding box, singular transform)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Query timestamp outside the span covered by the sequence.
    ///
    /// Nearest-neighbour resolution still yields a usable frame, so callers
    /// may treat this as a warning.
    #[error("Timestamp {t:.6}s outside sequence span [{start:.6}, {end:.6}]")]
    OutOfRange { t: f64, start: f64, end: f64 },

    /// A timestamp log line could not be parsed
    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Config, calibration or annotation document failed to deserialize
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Creates an invalid-input error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a parse error for a 1-based line number.
    pub fn parse(line: usize, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            line,
            reason: reason.to_string(),
        }
    }

    /// Returns true for the non-fatal span warning.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, SyncError>;
