//! Swap domain model
//!
//! Tokens, requests, quotes, stage transactions, results and route planning.

pub mod amount;
pub mod model;
pub mod route;
pub mod token;

pub use model::{
    Fee, PendingStatus, StatusReport, StepType, SwapQuote, SwapRequest, SwapResult, SwapStatus,
    Transaction, TxStatus,
};
pub use route::{PlannedStage, RoutePlan};
pub use token::Token;
