//! Bridging capability consumed by the step executors
//!
//! The concrete provider (wrap contracts, cross-chain messaging, DEX routing)
//! lives outside this service. Every call is treated as at-least-once: the
//! orchestrator may repeat it after a timeout, so callers must not assume the
//! provider deduplicates.

pub mod simulated;

pub use simulated::SimulatedBridge;

use crate::swap::{Fee, Token};

use async_trait::async_trait;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Operations offered by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeOperation {
    Wrap,
    Unwrap,
    Transfer,
    Swap,
    FeeEstimate,
}

impl BridgeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeOperation::Wrap => "wrap",
            BridgeOperation::Unwrap => "unwrap",
            BridgeOperation::Transfer => "transfer",
            BridgeOperation::Swap => "swap",
            BridgeOperation::FeeEstimate => "fee_estimate",
        }
    }
}

impl fmt::Display for BridgeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by the bridge provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("bridge unavailable: {0}")]
    Unavailable(String),

    #[error("rejected by bridge: {0}")]
    Rejected(String),

    #[error("bridge call timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrapRequest {
    pub token: Token,
    pub amount: BigInt,
    pub source_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrapResponse {
    pub wrapped_token: Token,
    pub amount_after_fees: BigInt,
    pub status: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnwrapRequest {
    pub wrapped_token: Token,
    pub dest_token: Token,
    pub amount: BigInt,
    pub dest_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnwrapResponse {
    pub amount_after_fees: BigInt,
    pub status: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub wrapped_token: Token,
    pub source_chain_id: u64,
    pub dest_chain_id: u64,
    pub amount: BigInt,
    pub source_address: String,
    pub dest_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferResponse {
    pub amount_after_fees: BigInt,
    pub status: String,
    pub source_tx_hash: String,
    /// Absent until the destination chain confirms
    pub dest_tx_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub source_token: Token,
    pub dest_token: Token,
    pub amount: BigInt,
    pub dest_address: String,
    /// Percent
    pub slippage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapResponse {
    pub output_amount: BigInt,
    pub status: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeEstimateRequest {
    pub source_token: Token,
    pub dest_token: Token,
    pub amount: BigInt,
}

/// Asset-bridging capability. Implementations must tolerate concurrent calls
/// from unrelated swaps.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BridgeProvider: Send + Sync {
    async fn wrap(&self, request: WrapRequest) -> Result<WrapResponse, BridgeError>;

    async fn unwrap(&self, request: UnwrapRequest) -> Result<UnwrapResponse, BridgeError>;

    async fn transfer(&self, request: TransferRequest) -> Result<TransferResponse, BridgeError>;

    /// Same-chain swap
    async fn swap(&self, request: SwapRequest) -> Result<SwapResponse, BridgeError>;

    async fn estimate_fee(&self, request: FeeEstimateRequest) -> Result<Fee, BridgeError>;
}
