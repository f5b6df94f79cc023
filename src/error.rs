//! Error types for the swap orchestrator

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    // Validation: caller input is wrong, never reaches the bridge
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid tokens: {0}")]
    InvalidTokens(String),

    #[error("Invalid slippage: {0}")]
    InvalidSlippage(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    // Dependency: bridge calls, retried within the stage policy
    #[error("Fee estimate failed: {0}")]
    FeeEstimateFailed(String),

    #[error("Wrap failed: {0}")]
    WrapFailed(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Swap failed: {0}")]
    SwapFailed(String),

    #[error("Unwrap failed: {0}")]
    UnwrapFailed(String),

    // Economic
    #[error("Insufficient amount: {0}")]
    InsufficientAmount(String),

    #[error("Swap {request_id} not found")]
    NotFound { request_id: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::FeeEstimateFailed(_)
                | OrchestratorError::WrapFailed(_)
                | OrchestratorError::TransferFailed(_)
                | OrchestratorError::SwapFailed(_)
                | OrchestratorError::UnwrapFailed(_)
        )
    }

    /// Check if error is caused by caller input (validation or economic)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::InvalidAmount(_)
                | OrchestratorError::InvalidAddress(_)
                | OrchestratorError::InvalidToken(_)
                | OrchestratorError::InvalidTokens(_)
                | OrchestratorError::InvalidSlippage(_)
                | OrchestratorError::DeadlineExceeded(_)
                | OrchestratorError::InsufficientAmount(_)
        )
    }

    /// Stable machine-readable code, surfaced in `SwapResult.error_code`
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidAmount(_) => "invalid_amount",
            OrchestratorError::InvalidAddress(_) => "invalid_address",
            OrchestratorError::InvalidToken(_) => "invalid_token",
            OrchestratorError::InvalidTokens(_) => "invalid_tokens",
            OrchestratorError::InvalidSlippage(_) => "invalid_slippage",
            OrchestratorError::DeadlineExceeded(_) => "deadline_exceeded",
            OrchestratorError::FeeEstimateFailed(_) => "fee_estimate_failed",
            OrchestratorError::WrapFailed(_) => "wrap_failed",
            OrchestratorError::TransferFailed(_) => "transfer_failed",
            OrchestratorError::SwapFailed(_) => "swap_failed",
            OrchestratorError::UnwrapFailed(_) => "unwrap_failed",
            OrchestratorError::InsufficientAmount(_) => "insufficient_amount",
            OrchestratorError::NotFound { .. } => "not_found",
            OrchestratorError::InvalidStateTransition { .. } => "invalid_state_transition",
            OrchestratorError::Internal(_) => "internal",
        }
    }
}

/// Result type for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(OrchestratorError::TransferFailed("rpc down".into()).is_retryable());
        assert!(OrchestratorError::FeeEstimateFailed("oracle down".into()).is_retryable());
        assert!(!OrchestratorError::InvalidAmount("0".into()).is_retryable());
        assert!(!OrchestratorError::InsufficientAmount("fees".into()).is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_dependency_errors() {
        let err = OrchestratorError::InvalidTokens("different chains".into());
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "invalid_tokens");
    }

    #[test]
    fn test_dependency_codes_differ_from_lifecycle_statuses() {
        use crate::swap::SwapStatus;

        let dependency = [
            OrchestratorError::FeeEstimateFailed(String::new()),
            OrchestratorError::WrapFailed(String::new()),
            OrchestratorError::TransferFailed(String::new()),
            OrchestratorError::SwapFailed(String::new()),
            OrchestratorError::UnwrapFailed(String::new()),
        ];
        for err in dependency {
            assert!(SwapStatus::all().iter().all(|s| s.as_str() != err.code()));
        }
    }

    #[test]
    fn test_display_surfaces_stage_message() {
        let err = OrchestratorError::TransferFailed("bridge rejected".into());
        assert_eq!(err.to_string(), "Transfer failed: bridge rejected");
    }
}
