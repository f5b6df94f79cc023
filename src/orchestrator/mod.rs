//! Swap orchestration
//!
//! The orchestrator:
//! 1. Registers one workflow instance per request id
//! 2. Quotes the request and waits for confirm, cancel or timeout
//! 3. Runs wrap, transfer, swap and unwrap as the route needs, with bounded retry
//! 4. Compensates a wrap whose transfer failed
//! 5. Serves status for running and finished swaps

pub mod engine;
pub mod retry;
pub mod status;
mod workflow;

pub use engine::{CancelOutcome, SwapOrchestrator};
