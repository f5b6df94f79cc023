//! Wrap, transfer, swap and unwrap executors
//!
//! Each executor validates its inputs, makes exactly one bridge call and
//! normalizes the result into a `Transaction`. A failed call yields no
//! transaction.

use crate::bridge::{self, BridgeProvider};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::swap::{StepType, Token, Transaction, TxStatus};

use chrono::Utc;
use num_bigint::BigInt;
use num_traits::Signed;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct WrapStep {
    pub token: Token,
    pub amount: BigInt,
    pub source_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferStep {
    /// Wrapped token on the source chain
    pub token: Token,
    pub dest_chain_id: u64,
    pub dest_chain_name: String,
    pub amount: BigInt,
    pub source_address: String,
    pub dest_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapStep {
    pub source_token: Token,
    pub dest_token: Token,
    pub amount: BigInt,
    pub from_address: String,
    pub dest_address: String,
    /// Percent
    pub slippage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnwrapStep {
    pub wrapped_token: Token,
    pub dest_token: Token,
    pub amount: BigInt,
    pub from_address: String,
    pub dest_address: String,
}

/// Pipeline step executors sharing one bridge
pub struct StepExecutor {
    bridge: Arc<dyn BridgeProvider>,
}

impl StepExecutor {
    pub fn new(bridge: Arc<dyn BridgeProvider>) -> Self {
        Self { bridge }
    }

    /// Convert a native token into the bridge's wrapped representation
    pub async fn wrap(&self, request_id: &str, step: &WrapStep) -> OrchestratorResult<Transaction> {
        require_amount(&step.amount)?;
        require_address("source", &step.source_address)?;

        let response = self
            .bridge
            .wrap(bridge::WrapRequest {
                token: step.token.clone(),
                amount: step.amount.clone(),
                source_address: step.source_address.clone(),
            })
            .await
            .map_err(|e| OrchestratorError::WrapFailed(e.to_string()))?;

        let status = settled_status(&response.status, OrchestratorError::WrapFailed)?;
        debug!(
            "[{}] wrap {} {} -> {} {}",
            request_id,
            step.amount,
            step.token.symbol,
            response.amount_after_fees,
            response.wrapped_token.symbol
        );

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            step: StepType::Wrap,
            tx_hash: response.tx_hash,
            dest_tx_hash: None,
            status,
            from_address: step.source_address.clone(),
            to_address: step.source_address.clone(),
            source_chain_id: step.token.chain_id,
            dest_chain_id: response.wrapped_token.chain_id,
            source_token: step.token.clone(),
            dest_token: response.wrapped_token,
            amount: step.amount.clone(),
            value: response.amount_after_fees,
            block_number: None,
            timestamp: Utc::now(),
        })
    }

    /// Move a wrapped token's custody record to another chain
    pub async fn transfer(
        &self,
        request_id: &str,
        step: &TransferStep,
    ) -> OrchestratorResult<Transaction> {
        require_amount(&step.amount)?;
        require_address("source", &step.source_address)?;
        require_address("destination", &step.dest_address)?;
        if !step.token.is_wrapped {
            return Err(OrchestratorError::InvalidToken(format!(
                "only wrapped assets may cross chains, got {}",
                step.token
            )));
        }

        let response = self
            .bridge
            .transfer(bridge::TransferRequest {
                wrapped_token: step.token.clone(),
                source_chain_id: step.token.chain_id,
                dest_chain_id: step.dest_chain_id,
                amount: step.amount.clone(),
                source_address: step.source_address.clone(),
                dest_address: step.dest_address.clone(),
            })
            .await
            .map_err(|e| OrchestratorError::TransferFailed(e.to_string()))?;

        let status = settled_status(&response.status, OrchestratorError::TransferFailed)?;
        if response.dest_tx_hash.is_none() {
            debug!("[{}] transfer accepted, destination hash pending", request_id);
        }

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            step: StepType::Transfer,
            tx_hash: response.source_tx_hash,
            dest_tx_hash: response.dest_tx_hash,
            status,
            from_address: step.source_address.clone(),
            to_address: step.dest_address.clone(),
            source_chain_id: step.token.chain_id,
            dest_chain_id: step.dest_chain_id,
            source_token: step.token.clone(),
            dest_token: step.token.on_chain(step.dest_chain_id, &step.dest_chain_name),
            amount: step.amount.clone(),
            value: response.amount_after_fees,
            block_number: None,
            timestamp: Utc::now(),
        })
    }

    /// Same-chain swap. The bridge applies slippage as a haircut on the
    /// computed output before deducting its fee; the swap settles on return.
    pub async fn swap(&self, request_id: &str, step: &SwapStep) -> OrchestratorResult<Transaction> {
        require_amount(&step.amount)?;
        require_address("destination", &step.dest_address)?;
        if step.source_token.chain_id != step.dest_token.chain_id {
            return Err(OrchestratorError::InvalidTokens(format!(
                "swap needs both tokens on one chain, got {} and {}",
                step.source_token, step.dest_token
            )));
        }
        if !(0.0..=100.0).contains(&step.slippage) {
            return Err(OrchestratorError::InvalidSlippage(format!(
                "{}% is outside 0-100",
                step.slippage
            )));
        }

        let response = self
            .bridge
            .swap(bridge::SwapRequest {
                source_token: step.source_token.clone(),
                dest_token: step.dest_token.clone(),
                amount: step.amount.clone(),
                dest_address: step.dest_address.clone(),
                slippage: step.slippage,
            })
            .await
            .map_err(|e| OrchestratorError::SwapFailed(e.to_string()))?;

        settled_status(&response.status, OrchestratorError::SwapFailed)?;

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            step: StepType::Swap,
            tx_hash: response.tx_hash,
            dest_tx_hash: None,
            status: TxStatus::Completed,
            from_address: step.from_address.clone(),
            to_address: step.dest_address.clone(),
            source_chain_id: step.source_token.chain_id,
            dest_chain_id: step.dest_token.chain_id,
            source_token: step.source_token.clone(),
            dest_token: step.dest_token.clone(),
            amount: step.amount.clone(),
            value: response.output_amount,
            block_number: None,
            timestamp: Utc::now(),
        })
    }

    /// Redeem a wrapped token back into its native asset
    pub async fn unwrap(
        &self,
        request_id: &str,
        step: &UnwrapStep,
    ) -> OrchestratorResult<Transaction> {
        require_amount(&step.amount)?;
        require_address("destination", &step.dest_address)?;
        if !step.wrapped_token.is_wrapped {
            return Err(OrchestratorError::InvalidToken(format!(
                "{} is not a wrapped token",
                step.wrapped_token
            )));
        }

        let response = self
            .bridge
            .unwrap(bridge::UnwrapRequest {
                wrapped_token: step.wrapped_token.clone(),
                dest_token: step.dest_token.clone(),
                amount: step.amount.clone(),
                dest_address: step.dest_address.clone(),
            })
            .await
            .map_err(|e| OrchestratorError::UnwrapFailed(e.to_string()))?;

        let status = settled_status(&response.status, OrchestratorError::UnwrapFailed)?;

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            step: StepType::Unwrap,
            tx_hash: response.tx_hash,
            dest_tx_hash: None,
            status,
            from_address: step.from_address.clone(),
            to_address: step.dest_address.clone(),
            source_chain_id: step.wrapped_token.chain_id,
            dest_chain_id: step.dest_token.chain_id,
            source_token: step.wrapped_token.clone(),
            dest_token: step.dest_token.clone(),
            amount: step.amount.clone(),
            value: response.amount_after_fees,
            block_number: None,
            timestamp: Utc::now(),
        })
    }
}

fn require_amount(amount: &BigInt) -> OrchestratorResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(OrchestratorError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )))
    }
}

fn require_address(role: &str, address: &str) -> OrchestratorResult<()> {
    if address.trim().is_empty() {
        Err(OrchestratorError::InvalidAddress(format!(
            "{} address is empty",
            role
        )))
    } else {
        Ok(())
    }
}

/// A bridge that answers but reports failure has not produced a transaction
fn settled_status(
    status: &str,
    stage_error: fn(String) -> OrchestratorError,
) -> OrchestratorResult<TxStatus> {
    match TxStatus::from_bridge(status) {
        TxStatus::Failed | TxStatus::Cancelled => {
            Err(stage_error(format!("bridge reported status {}", status)))
        }
        other => Ok(other),
    }
}
