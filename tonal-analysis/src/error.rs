//! Error types for tonal analysis

use thiserror::Error;

/// Errors that can occur while estimating key and scale
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// No usable harmonic energy (silence, zero frames, upstream decode failure)
    #[error("Insufficient signal: {0}")]
    DegenerateInput(String),
    /// A scale template or catalog violates the offset invariants
    #[error("Malformed scale template '{name}': {reason}")]
    MalformedCatalog { name: String, reason: String },
    /// Chroma input with the wrong shape or invalid values
    #[error("Invalid chroma input: {0}")]
    InvalidInput(String),
}

impl AnalysisError {
    /// True when the error means "no signal" rather than "bad data"
    pub fn is_degenerate(&self) -> bool {
        matches!(self, AnalysisError::DegenerateInput(_))
    }

    pub(crate) fn malformed(name: &str, reason: impl Into<String>) -> Self {
        AnalysisError::MalformedCatalog {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
