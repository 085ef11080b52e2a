//! Error types for probitstat

use thiserror::Error;

/// probitstat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed or inconsistent input table / configuration
    #[error("Validation error: {0}")]
    Validation(String),

    /// Too few usable dose groups for a straight-line fit
    #[error("Insufficient data: {usable} usable dose group(s), at least {required} required")]
    InsufficientData {
        /// Rows left after dropping non-finite observations.
        usable: usize,
        /// Minimum number of rows the fit needs.
        required: usize,
    },

    /// Slope estimate is zero (or the design cannot identify one)
    #[error("Degenerate slope: {0}")]
    DegenerateSlope(String),

    /// Maximum-likelihood optimizer did not converge
    #[error("Optimization did not converge: {0}")]
    NonConvergentOptimization(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

impl Error {
    /// Stable machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) | Error::Csv(_) | Error::Validation(_) => "validation",
            Error::InsufficientData { .. } => "insufficient_data",
            Error::DegenerateSlope(_) => "degenerate_slope",
            Error::NonConvergentOptimization(_) => "non_convergent_optimization",
            Error::Computation(_) => "computation",
        }
    }

    /// Whether the error is caused by the caller's input rather than the numerics.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::Json(_) | Error::Csv(_) | Error::Validation(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(Error::Validation("x".into()).kind(), "validation");
        assert_eq!(Error::InsufficientData { usable: 1, required: 2 }.kind(), "insufficient_data");
        assert_eq!(Error::DegenerateSlope("zero".into()).kind(), "degenerate_slope");
        assert_eq!(
            Error::NonConvergentOptimization("max iter".into()).kind(),
            "non_convergent_optimization"
        );
    }

    #[test]
    fn test_insufficient_data_message() {
        let e = Error::InsufficientData { usable: 1, required: 2 };
        assert_eq!(
            e.to_string(),
            "Insufficient data: 1 usable dose group(s), at least 2 required"
        );
        assert!(!e.is_input_error());
        assert!(Error::Validation("bad".into()).is_input_error());
    }
}
