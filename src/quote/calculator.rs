//! Fee and quote computation

use super::rates;
use crate::bridge::{BridgeProvider, FeeEstimateRequest};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::swap::{RoutePlan, SwapQuote, SwapRequest};

use chrono::Utc;
use num_traits::Signed;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Placeholder price impact, percent
const PRICE_IMPACT_PERCENT: f64 = 0.3;

/// Produces fee breakdowns and quotes. Read-only apart from the bridge's
/// fee estimate.
pub struct QuoteCalculator {
    bridge: Arc<dyn BridgeProvider>,
    /// How long a quote stays valid; matches the confirmation window
    validity: Duration,
}

impl QuoteCalculator {
    pub fn new(bridge: Arc<dyn BridgeProvider>, validity: Duration) -> Self {
        Self { bridge, validity }
    }

    /// Quote a swap request
    pub async fn quote(&self, request: &SwapRequest) -> OrchestratorResult<SwapQuote> {
        if !request.amount.is_positive() {
            return Err(OrchestratorError::InvalidAmount(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        let plan = RoutePlan::plan(&request.source_token, &request.dest_token)?;

        let fee = self
            .bridge
            .estimate_fee(FeeEstimateRequest {
                source_token: request.source_token.clone(),
                dest_token: request.dest_token.clone(),
                amount: request.amount.clone(),
            })
            .await
            .map_err(|e| OrchestratorError::FeeEstimateFailed(e.to_string()))?;

        let net_input = &request.amount - fee.total();
        if !net_input.is_positive() {
            return Err(OrchestratorError::InsufficientAmount(format!(
                "fees of {} exceed amount {}",
                fee.total(),
                request.amount
            )));
        }

        let output_amount = rates::convert(&net_input, &request.source_token, &request.dest_token);
        if !output_amount.is_positive() {
            return Err(OrchestratorError::InsufficientAmount(format!(
                "{} {} converts to nothing after fees",
                request.amount, request.source_token.symbol
            )));
        }

        if !rates::is_known_pair(
            request.source_token.base_symbol(),
            request.dest_token.base_symbol(),
        ) {
            debug!(
                "No rate for {} -> {}, quoting at parity",
                request.source_token.symbol, request.dest_token.symbol
            );
        }

        let exchange_rate = rates::display_ratio(
            &output_amount,
            &request.dest_token,
            &request.amount,
            &request.source_token,
        );

        let quoted_at = Utc::now();
        let expires_at = quoted_at
            + chrono::Duration::from_std(self.validity)
                .map_err(|e| OrchestratorError::Internal(e.to_string()))?;

        Ok(SwapQuote {
            source_token: request.source_token.clone(),
            dest_token: request.dest_token.clone(),
            input_amount: request.amount.clone(),
            output_amount,
            fee,
            path: plan.path(),
            price_impact: PRICE_IMPACT_PERCENT,
            exchange_rate,
            quoted_at,
            expires_at,
        })
    }
}
