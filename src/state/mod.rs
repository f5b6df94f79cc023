//! In-memory swap state
//!
//! Handles:
//! - Swap records keyed by request id
//! - The write-ahead event journal
//! - Status transitions along the lifecycle graph
//! - Retention cleanup of finished swaps

mod manager;

pub use manager::{StateManager, SwapHistory, SwapStats};
