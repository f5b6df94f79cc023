//! Status aggregation for polling clients

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::state::StateManager;
use crate::swap::{PendingStatus, StatusReport};

use std::sync::Arc;

/// Answers status queries from the state manager without blocking on any
/// running workflow
pub struct StatusAggregator {
    state: Arc<StateManager>,
}

impl StatusAggregator {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state }
    }

    /// Terminal swaps return their stored result; live ones a pending view
    pub fn get_status(&self, request_id: &str) -> OrchestratorResult<StatusReport> {
        let record = self
            .state
            .get(request_id)
            .ok_or_else(|| OrchestratorError::NotFound {
                request_id: request_id.to_string(),
            })?;

        match record.result {
            Some(result) if record.status.is_terminal() => Ok(StatusReport::Completed(result)),
            _ => Ok(StatusReport::Pending(PendingStatus {
                request_id: record.request_id,
                status: record.status,
                quote: record.quote,
                transactions: record.transactions,
                updated_at: record.updated_at,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SwapEvent;
    use crate::swap::{SwapRequest, SwapResult, SwapStatus, Token};
    use chrono::Utc;
    use num_bigint::BigInt;

    fn request() -> SwapRequest {
        SwapRequest {
            request_id: None,
            source_token: Token::new("ETH", "Ether", 18, "0x0", 1, "ethereum", false),
            dest_token: Token::new("USDC", "USD Coin", 6, "0x1", 1, "ethereum", false),
            amount: BigInt::from(1_000),
            source_address: "0xsource".into(),
            dest_address: "0xdest".into(),
            slippage: 0.0,
            deadline: None,
            refund_address: None,
        }
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let aggregator = StatusAggregator::new(Arc::new(StateManager::new()));
        assert_eq!(
            aggregator.get_status("nope"),
            Err(OrchestratorError::NotFound {
                request_id: "nope".into()
            })
        );
    }

    #[test]
    fn test_live_swap_reports_pending() {
        let state = Arc::new(StateManager::new());
        state.create("req-1", request());
        let aggregator = StatusAggregator::new(state);

        match aggregator.get_status("req-1").unwrap() {
            StatusReport::Pending(pending) => {
                assert_eq!(pending.status, SwapStatus::Initiated);
                assert!(pending.quote.is_none());
                assert!(pending.transactions.is_empty());
            }
            other => panic!("expected pending, got {:?}", other),
        }
    }

    #[test]
    fn test_terminal_swap_returns_stable_result() {
        let state = Arc::new(StateManager::new());
        state.create("req-1", request());
        state
            .complete(
                SwapResult {
                    request_id: "req-1".into(),
                    status: SwapStatus::Failed,
                    success: false,
                    source_tx: None,
                    bridge_tx: None,
                    destination_tx: None,
                    transactions: Vec::new(),
                    compensation_tx: None,
                    input_amount: BigInt::from(1_000),
                    output_amount: BigInt::from(0),
                    fee: None,
                    completed_at: Utc::now(),
                    error_message: Some("Invalid amount: zero".into()),
                    error_code: Some("invalid_amount".into()),
                },
                SwapEvent::Failed {
                    request_id: "req-1".into(),
                    error_code: "invalid_amount".into(),
                    error: "Invalid amount: zero".into(),
                },
            )
            .unwrap();
        let aggregator = StatusAggregator::new(state);

        let first = aggregator.get_status("req-1").unwrap();
        let second = aggregator.get_status("req-1").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.status(), SwapStatus::Failed);
        assert!(matches!(first, StatusReport::Completed(_)));
    }
}
