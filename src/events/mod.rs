//! Swap journal events
//!
//! Every lifecycle decision and every stage boundary is journaled before the
//! in-memory status moves. `StageStarted` is written ahead of the bridge call
//! so the journal shows which side effects may have been issued.

use crate::swap::{StepType, SwapStatus};

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// Events recorded for a single swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwapEvent {
    /// Request accepted and registered
    Initiated { request_id: String },

    /// Quote computed, waiting for the user
    QuoteReady {
        request_id: String,
        #[serde(with = "crate::swap::amount")]
        output_amount: BigInt,
        expires_at: DateTime<Utc>,
    },

    Confirmed { request_id: String },

    Cancelled { request_id: String },

    /// Confirmation window elapsed
    TimedOut { request_id: String },

    /// Pipeline stages begin
    Executing { request_id: String },

    /// Bridge call about to be issued
    StageStarted {
        request_id: String,
        stage: StepType,
        #[serde(with = "crate::swap::amount")]
        amount: BigInt,
    },

    StageCompleted {
        request_id: String,
        stage: StepType,
        transaction_id: String,
        tx_hash: String,
    },

    /// Retries exhausted or a terminal error
    StageFailed {
        request_id: String,
        stage: StepType,
        error: String,
    },

    /// Best-effort unwrap back to the refund address
    CompensationAttempted {
        request_id: String,
        succeeded: bool,
        tx_hash: Option<String>,
        error: Option<String>,
    },

    Succeeded {
        request_id: String,
        #[serde(with = "crate::swap::amount")]
        output_amount: BigInt,
    },

    Failed {
        request_id: String,
        error_code: String,
        error: String,
    },
}

impl SwapEvent {
    pub fn request_id(&self) -> &str {
        match self {
            SwapEvent::Initiated { request_id }
            | SwapEvent::QuoteReady { request_id, .. }
            | SwapEvent::Confirmed { request_id }
            | SwapEvent::Cancelled { request_id }
            | SwapEvent::TimedOut { request_id }
            | SwapEvent::Executing { request_id }
            | SwapEvent::StageStarted { request_id, .. }
            | SwapEvent::StageCompleted { request_id, .. }
            | SwapEvent::StageFailed { request_id, .. }
            | SwapEvent::CompensationAttempted { request_id, .. }
            | SwapEvent::Succeeded { request_id, .. }
            | SwapEvent::Failed { request_id, .. } => request_id,
        }
    }

    /// Get event name for logging/metrics
    pub fn name(&self) -> &'static str {
        match self {
            SwapEvent::Initiated { .. } => "initiated",
            SwapEvent::QuoteReady { .. } => "quote_ready",
            SwapEvent::Confirmed { .. } => "confirmed",
            SwapEvent::Cancelled { .. } => "cancelled",
            SwapEvent::TimedOut { .. } => "timed_out",
            SwapEvent::Executing { .. } => "executing",
            SwapEvent::StageStarted { .. } => "stage_started",
            SwapEvent::StageCompleted { .. } => "stage_completed",
            SwapEvent::StageFailed { .. } => "stage_failed",
            SwapEvent::CompensationAttempted { .. } => "compensation_attempted",
            SwapEvent::Succeeded { .. } => "succeeded",
            SwapEvent::Failed { .. } => "failed",
        }
    }

    /// Status this event moves the swap into, if any
    pub fn status(&self) -> Option<SwapStatus> {
        match self {
            SwapEvent::Initiated { .. } => Some(SwapStatus::Initiated),
            SwapEvent::QuoteReady { .. } => Some(SwapStatus::QuoteReady),
            SwapEvent::Confirmed { .. } => Some(SwapStatus::Confirmed),
            SwapEvent::Cancelled { .. } => Some(SwapStatus::Cancelled),
            SwapEvent::TimedOut { .. } => Some(SwapStatus::Timeout),
            SwapEvent::Executing { .. } => Some(SwapStatus::Executing),
            SwapEvent::Succeeded { .. } => Some(SwapStatus::Succeeded),
            SwapEvent::Failed { .. } => Some(SwapStatus::Failed),
            _ => None,
        }
    }
}

/// A journaled event with its position in the swap's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: SwapEvent,
}
