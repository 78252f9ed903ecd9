//! W3C trace-context value generation.
//!
//! Serialized form: `00-{32 hex trace id}-{16 hex parent id}-{01|00}`.
//! Values are generated per outbound request and never persisted.

use std::fmt;

use thiserror::Error;

/// Error type for traceparent generation.
#[derive(Debug, Error)]
pub enum TraceparentError {
    /// The OS random source refused to produce bytes. A predictable or
    /// malformed traceparent breaks backend correlation, so generation fails
    /// rather than degrading.
    #[error("random source unavailable: {0}")]
    Random(getrandom::Error),
}

/// A W3C `traceparent` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Traceparent {
    pub trace_id: [u8; 16],
    pub parent_id: [u8; 8],
    pub sampled: bool,
}

impl Traceparent {
    /// Generate a value with fresh random trace and parent identifiers.
    pub fn generate(sampled: bool) -> Result<Self, TraceparentError> {
        let mut trace_id = [0u8; 16];
        getrandom::fill(&mut trace_id).map_err(TraceparentError::Random)?;
        let mut parent_id = [0u8; 8];
        getrandom::fill(&mut parent_id).map_err(TraceparentError::Random)?;
        Ok(Self {
            trace_id,
            parent_id,
            sampled,
        })
    }
}

impl fmt::Display for Traceparent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "00-{}-{}-{}",
            hex::encode(self.trace_id),
            hex::encode(self.parent_id),
            if self.sampled { "01" } else { "00" }
        )
    }
}

/// Generate a serialized `traceparent` header value.
pub fn generate_traceparent(sampled: bool) -> Result<String, TraceparentError> {
    Traceparent::generate(sampled).map(|value| value.to_string())
}
