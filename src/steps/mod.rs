//! Pipeline step executors
//!
//! Four independently retryable operations that each call the bridge once:
//! - Wrap: native -> bridge-synthetic
//! - Transfer: wrapped asset across chains
//! - Swap: same-chain exchange
//! - Unwrap: bridge-synthetic -> native

mod executor;

pub use executor::{StepExecutor, SwapStep, TransferStep, UnwrapStep, WrapStep};
