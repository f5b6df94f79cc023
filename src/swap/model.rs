//! Swap requests, quotes, pipeline transactions and results

use super::token::Token;

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user's request to move value from one token to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequest {
    /// Idempotency key; generated once by the orchestrator when absent
    #[serde(default)]
    pub request_id: Option<String>,
    pub source_token: Token,
    pub dest_token: Token,
    /// Amount in source-token smallest units
    #[serde(with = "super::amount")]
    pub amount: BigInt,
    pub source_address: String,
    pub dest_address: String,
    /// Slippage tolerance in percent
    #[serde(default)]
    pub slippage: f64,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund_address: Option<String>,
}

impl SwapRequest {
    /// Address that receives compensating unwraps
    pub fn refund_target(&self) -> &str {
        match self.refund_address.as_deref() {
            Some(addr) if !addr.trim().is_empty() => addr,
            _ => &self.source_address,
        }
    }
}

/// Fee breakdown in source-token smallest units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    #[serde(with = "super::amount")]
    pub gas_fee: BigInt,
    #[serde(with = "super::amount")]
    pub protocol_fee: BigInt,
    #[serde(with = "super::amount")]
    pub network_fee: BigInt,
    #[serde(with = "super::amount")]
    pub bridge_fee: BigInt,
    /// Display only
    pub total_usd: f64,
}

impl Fee {
    pub fn total(&self) -> BigInt {
        &self.gas_fee + &self.protocol_fee + &self.network_fee + &self.bridge_fee
    }
}

/// A perishable price quote presented for confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub source_token: Token,
    pub dest_token: Token,
    #[serde(with = "super::amount")]
    pub input_amount: BigInt,
    #[serde(with = "super::amount")]
    pub output_amount: BigInt,
    pub fee: Fee,
    /// Token symbols along the route
    pub path: Vec<String>,
    /// Percent, display only
    pub price_impact: f64,
    /// output / input in whole tokens (each side scaled by its decimals),
    /// display only
    pub exchange_rate: f64,
    pub quoted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Pipeline stage kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Wrap,
    Transfer,
    Swap,
    Unwrap,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Wrap => "wrap",
            StepType::Transfer => "transfer",
            StepType::Swap => "swap",
            StepType::Unwrap => "unwrap",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TxStatus {
    /// Map a bridge-reported status string
    pub fn from_bridge(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "completed" | "confirmed" | "success" => TxStatus::Completed,
            "failed" | "reverted" => TxStatus::Failed,
            "cancelled" | "canceled" => TxStatus::Cancelled,
            _ => TxStatus::Pending,
        }
    }
}

/// Record of one executed pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub request_id: String,
    #[serde(rename = "type")]
    pub step: StepType,
    pub tx_hash: String,
    /// Destination-chain hash for transfers; may lag the source confirmation
    #[serde(default)]
    pub dest_tx_hash: Option<String>,
    pub status: TxStatus,
    pub from_address: String,
    pub to_address: String,
    pub source_chain_id: u64,
    pub dest_chain_id: u64,
    pub source_token: Token,
    pub dest_token: Token,
    #[serde(with = "super::amount")]
    pub amount: BigInt,
    /// Resulting value after fees, in dest-token units
    #[serde(with = "super::amount")]
    pub value: BigInt,
    #[serde(default)]
    pub block_number: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Initiated,
    QuoteReady,
    Confirmed,
    Cancelled,
    Timeout,
    Executing,
    Succeeded,
    Failed,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Initiated => "initiated",
            SwapStatus::QuoteReady => "quote_ready",
            SwapStatus::Confirmed => "confirmed",
            SwapStatus::Cancelled => "cancelled",
            SwapStatus::Timeout => "timeout",
            SwapStatus::Executing => "executing",
            SwapStatus::Succeeded => "succeeded",
            SwapStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapStatus::Cancelled | SwapStatus::Timeout | SwapStatus::Succeeded | SwapStatus::Failed
        )
    }

    /// Allowed edges of the lifecycle graph
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        use SwapStatus::*;
        matches!(
            (self, next),
            (Initiated, QuoteReady)
                | (Initiated, Failed)
                | (QuoteReady, Confirmed)
                | (QuoteReady, Cancelled)
                | (QuoteReady, Timeout)
                | (Confirmed, Executing)
                | (Executing, Succeeded)
                | (Executing, Failed)
        )
    }

    pub fn all() -> [SwapStatus; 8] {
        use SwapStatus::*;
        [
            Initiated, QuoteReady, Confirmed, Cancelled, Timeout, Executing, Succeeded, Failed,
        ]
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal, immutable record of one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapResult {
    pub request_id: String,
    pub status: SwapStatus,
    pub success: bool,
    pub source_tx: Option<Transaction>,
    pub bridge_tx: Option<Transaction>,
    pub destination_tx: Option<Transaction>,
    /// Every stage transaction in execution order
    pub transactions: Vec<Transaction>,
    pub compensation_tx: Option<Transaction>,
    #[serde(with = "super::amount")]
    pub input_amount: BigInt,
    #[serde(with = "super::amount")]
    pub output_amount: BigInt,
    pub fee: Option<Fee>,
    pub completed_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
}

/// Non-terminal view returned to polling clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingStatus {
    pub request_id: String,
    pub status: SwapStatus,
    pub quote: Option<SwapQuote>,
    pub transactions: Vec<Transaction>,
    pub updated_at: DateTime<Utc>,
}

/// Answer to a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatusReport {
    Completed(SwapResult),
    Pending(PendingStatus),
}

impl StatusReport {
    pub fn status(&self) -> SwapStatus {
        match self {
            StatusReport::Completed(result) => result.status,
            StatusReport::Pending(pending) => pending.status,
        }
    }
}
