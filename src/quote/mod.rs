//! Fee and quote calculation
//!
//! Output amounts come from a placeholder rate table; only the shape of the
//! computation (validation, fee deduction, decimal scaling, rounding down) is
//! meaningful.

pub mod calculator;
pub mod rates;

pub use calculator::QuoteCalculator;
