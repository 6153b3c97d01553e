//! Valuation Errors
//!
//! Error taxonomy shared by every engine operation.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValuationError {
    /// Unknown symbol - surfaced directly, never retried
    #[error("No calibration for symbol '{0}'")]
    NotFound(String),

    /// Out-of-domain price/risk or malformed calibration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rebuilt grid failed validation; the prior version stays live
    #[error("Calibration invalid for '{symbol}': {reason}")]
    CalibrationInvalid { symbol: String, reason: String },

    /// Polynomial root search ran out of iterations
    #[error("Root search did not converge after {iterations} iterations (target price {target})")]
    NumericNonConvergence { iterations: usize, target: f64 },

    /// A rebuild for this symbol is already running
    #[error("Rebuild already in progress for '{0}'")]
    AlreadyInProgress(String),

    /// The live version moved while a rebuild was computing
    #[error("Version conflict for '{symbol}': expected v{expected}, live v{actual}")]
    VersionConflict {
        symbol: String,
        expected: u64,
        actual: u64,
    },
}

impl ValuationError {
    /// Request-local failures that leave the store untouched
    pub fn is_request_local(&self) -> bool {
        matches!(
            self,
            ValuationError::InvalidInput(_) | ValuationError::NumericNonConvergence { .. }
        )
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ValuationError::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ValuationError::NotFound("ETH".to_string());
        assert_eq!(err.to_string(), "No calibration for symbol 'ETH'");

        let err = ValuationError::VersionConflict {
            symbol: "BTC".to_string(),
            expected: 3,
            actual: 4,
        };
        assert_eq!(err.to_string(), "Version conflict for 'BTC': expected v3, live v4");
    }

    #[test]
    fn test_request_local_classification() {
        assert!(ValuationError::invalid("price must be > 0").is_request_local());
        assert!(ValuationError::NumericNonConvergence { iterations: 100, target: 1.0 }.is_request_local());
        assert!(!ValuationError::NotFound("SOL".to_string()).is_request_local());
        assert!(!ValuationError::AlreadyInProgress("SOL".to_string()).is_request_local());
    }
}
