//! Placeholder exchange-rate table
//!
//! Rates are exact integer rationals so amount conversion never goes through
//! floating point. Conversion rounds down.

use crate::swap::Token;

use lazy_static::lazy_static;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::collections::HashMap;

lazy_static! {
    /// (from, to) -> (numerator, denominator): one whole `from` buys numer/denom whole `to`
    static ref RATE_TABLE: HashMap<(&'static str, &'static str), (u64, u64)> = {
        let mut table = HashMap::new();
        table.insert(("ETH", "USDC"), (3000, 1));
        table.insert(("ETH", "USDT"), (3000, 1));
        table.insert(("ETH", "DAI"), (3000, 1));
        table.insert(("ETH", "MATIC"), (5000, 1));
        table.insert(("BTC", "ETH"), (20, 1));
        table.insert(("BTC", "USDC"), (60000, 1));
        table.insert(("MATIC", "USDC"), (3, 5));
        table.insert(("USDC", "USDT"), (1, 1));
        table.insert(("USDC", "DAI"), (1, 1));
        table
    };
}

/// Exchange rate between two whole-token units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rate {
    pub numer: BigInt,
    pub denom: BigInt,
}

impl Rate {
    fn new(numer: u64, denom: u64) -> Self {
        Self {
            numer: BigInt::from(numer),
            denom: BigInt::from(denom),
        }
    }
}

/// Look up the rate between two base symbols. Same-symbol pairs trade 1:1,
/// reverse pairs use the inverted entry, unknown pairs fall back to 1:1.
pub fn rate(from: &str, to: &str) -> Rate {
    if from == to {
        return Rate::new(1, 1);
    }
    if let Some(&(numer, denom)) = RATE_TABLE.get(&(from, to)) {
        return Rate::new(numer, denom);
    }
    if let Some(&(numer, denom)) = RATE_TABLE.get(&(to, from)) {
        return Rate::new(denom, numer);
    }
    Rate::new(1, 1)
}

/// Whether the pair has an explicit table entry (or is trivially 1:1)
pub fn is_known_pair(from: &str, to: &str) -> bool {
    from == to || RATE_TABLE.contains_key(&(from, to)) || RATE_TABLE.contains_key(&(to, from))
}

/// Convert `amount` smallest units of `from` into smallest units of `to`
pub fn convert(amount: &BigInt, from: &Token, to: &Token) -> BigInt {
    let rate = rate(from.base_symbol(), to.base_symbol());
    let numer = amount * &rate.numer * pow10(to.decimals);
    let denom = &rate.denom * pow10(from.decimals);
    numer / denom
}

/// Human-scale ratio of two amounts, adjusted for decimals. Display only.
pub fn display_ratio(output: &BigInt, to: &Token, input: &BigInt, from: &Token) -> f64 {
    let output = output.to_f64().unwrap_or(0.0) / 10f64.powi(to.decimals as i32);
    let input = input.to_f64().unwrap_or(0.0) / 10f64.powi(from.decimals as i32);
    if input == 0.0 {
        0.0
    } else {
        output / input
    }
}

fn pow10(decimals: u8) -> BigInt {
    num_traits::pow(BigInt::from(10), decimals as usize)
}
