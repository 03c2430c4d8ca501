use thiserror::Error;

/// Failures raised by the numerical core.
///
/// Every variant is returned before any mutation takes place, so the value an
/// operation was called on is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WiaError {
    /// Malformed input: length mismatch, non-ascending domain, unknown or duplicate header,
    /// out-of-range indices.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A value was queried before the operation that produces it ran.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// Resampling preconditions were not met.
    #[error("resample failed: {0}")]
    Resample(String),
    /// Circular alignment would join two samples that differ by more than the adaptive bound.
    #[error("alignment discordance: boundary difference {boundary} exceeds threshold {threshold}")]
    Discordance { boundary: f64, threshold: f64 },
}

pub type Result<T> = std::result::Result<T, WiaError>;

pub(crate) fn invalid(msg: impl Into<String>) -> WiaError {
    WiaError::InvalidArgument(msg.into())
}
