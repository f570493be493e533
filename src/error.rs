//! The error kinds the core can surface (§7). Nothing in the render inner
//! loop throws; these are returned from setup/resize/build entry points.

use std::fmt;

#[derive(Debug, Clone)]
pub enum RenderError {
    /// Invalid resolution, zero threads, an out-of-range config field.
    Configuration(String),
    /// Allocation failure for BVH scratch, film, or photon arrays.
    ResourceExhaustion(String),
    /// A violated invariant at a build/setup entry point (e.g. the BVH
    /// builder's leaf count not matching its input after construction),
    /// surfaced as an error rather than panicking so callers can decide
    /// whether to halt. Invariants that only make sense to check inside the
    /// render inner loop (NaN PDF, negative throughput) are asserted with
    /// `debug_assert!` at the point of computation instead, since this
    /// module's contract is that the inner loop never returns a `Result`.
    InvariantViolation(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            RenderError::ResourceExhaustion(msg) => write!(f, "resource exhaustion: {}", msg),
            RenderError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_format_with_context() {
        let e = RenderError::Configuration("numThreads must be >= 1".to_string());
        let msg = format!("{}", e);
        assert!(msg.contains("numThreads"));
    }
}
