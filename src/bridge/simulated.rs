//! In-process bridge used when no external provider is wired in
//!
//! Settles every call immediately (after an optional artificial latency),
//! charges the configured fee schedule, and can be told to fail specific
//! operations to exercise retries and compensation.

use super::{
    BridgeError, BridgeOperation, BridgeProvider, FeeEstimateRequest, SwapRequest, SwapResponse,
    TransferRequest, TransferResponse, UnwrapRequest, UnwrapResponse, WrapRequest, WrapResponse,
};
use crate::config::{BridgeConfig, FailureKind};
use crate::quote::rates;
use crate::swap::{Fee, Token};

use async_trait::async_trait;
use dashmap::DashMap;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use sha3::{Digest, Keccak256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const BPS_DENOMINATOR: u32 = 10_000;

/// Deterministic bridge simulation
pub struct SimulatedBridge {
    config: BridgeConfig,
    /// Monotonic counter mixed into transaction hashes
    nonce: AtomicU64,
    /// Calls received per operation
    calls: DashMap<BridgeOperation, u32>,
}

impl SimulatedBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            nonce: AtomicU64::new(0),
            calls: DashMap::new(),
        }
    }

    /// Number of calls received for an operation, failed ones included
    pub fn call_count(&self, operation: BridgeOperation) -> u32 {
        self.calls.get(&operation).map(|c| *c).unwrap_or(0)
    }

    /// Register the call, apply latency and any configured failure
    async fn enter(&self, operation: BridgeOperation) -> Result<(), BridgeError> {
        let count = {
            let mut entry = self.calls.entry(operation).or_insert(0);
            *entry += 1;
            *entry
        };

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        for failure in self
            .config
            .failures
            .iter()
            .filter(|f| f.operation == operation)
        {
            let active = match failure.times {
                None => true,
                Some(times) => count <= times,
            };
            if active {
                warn!(
                    "Simulated bridge failing {} (call {}): {}",
                    operation, count, failure.message
                );
                return Err(match failure.kind {
                    FailureKind::Unavailable => BridgeError::Unavailable(failure.message.clone()),
                    FailureKind::Timeout => BridgeError::Timeout,
                });
            }
        }

        Ok(())
    }

    fn tx_hash(&self, operation: BridgeOperation, payload: &str) -> String {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Keccak256::new();
        hasher.update(operation.as_str().as_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.update(payload.as_bytes());
        format!("0x{}", hex::encode(hasher.finalize()))
    }

    fn usd_value(&self, token: &Token, units: &BigInt) -> f64 {
        let price = self
            .config
            .usd_prices
            .get(token.base_symbol())
            .copied()
            .unwrap_or(0.0);
        let whole = units.to_f64().unwrap_or(0.0) / 10f64.powi(token.decimals as i32);
        whole * price
    }

    fn after_operation_fee(&self, amount: &BigInt) -> BigInt {
        amount - bps(amount, self.config.operation_fee_bps)
    }
}

fn bps(amount: &BigInt, basis_points: u32) -> BigInt {
    amount * BigInt::from(basis_points) / BigInt::from(BPS_DENOMINATOR)
}

fn require_positive(amount: &BigInt) -> Result<(), BridgeError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(BridgeError::Rejected(format!("non-positive amount {}", amount)))
    }
}

#[async_trait]
impl BridgeProvider for SimulatedBridge {
    async fn wrap(&self, request: WrapRequest) -> Result<WrapResponse, BridgeError> {
        self.enter(BridgeOperation::Wrap).await?;
        require_positive(&request.amount)?;
        if request.token.is_wrapped {
            return Err(BridgeError::Rejected(format!(
                "{} is already wrapped",
                request.token
            )));
        }

        let wrapped_token = request.token.wrapped_form();
        let amount_after_fees = self.after_operation_fee(&request.amount);
        let tx_hash = self.tx_hash(
            BridgeOperation::Wrap,
            &format!("{}:{}:{}", request.token, request.amount, request.source_address),
        );

        debug!(
            "Wrapped {} {} -> {} {}",
            request.amount, request.token.symbol, amount_after_fees, wrapped_token.symbol
        );

        Ok(WrapResponse {
            wrapped_token,
            amount_after_fees,
            status: "completed".to_string(),
            tx_hash,
        })
    }

    async fn unwrap(&self, request: UnwrapRequest) -> Result<UnwrapResponse, BridgeError> {
        self.enter(BridgeOperation::Unwrap).await?;
        require_positive(&request.amount)?;
        if !request.wrapped_token.same_asset(&request.dest_token) {
            return Err(BridgeError::Rejected(format!(
                "{} does not redeem into {}",
                request.wrapped_token, request.dest_token
            )));
        }

        let amount_after_fees = self.after_operation_fee(&request.amount);
        let tx_hash = self.tx_hash(
            BridgeOperation::Unwrap,
            &format!(
                "{}:{}:{}",
                request.wrapped_token, request.amount, request.dest_address
            ),
        );

        Ok(UnwrapResponse {
            amount_after_fees,
            status: "completed".to_string(),
            tx_hash,
        })
    }

    async fn transfer(&self, request: TransferRequest) -> Result<TransferResponse, BridgeError> {
        self.enter(BridgeOperation::Transfer).await?;
        require_positive(&request.amount)?;
        if request.source_chain_id == request.dest_chain_id {
            return Err(BridgeError::Rejected(
                "transfer requires distinct chains".to_string(),
            ));
        }

        let amount_after_fees = &request.amount - bps(&request.amount, self.config.bridge_fee_bps);
        let payload = format!(
            "{}:{}->{}:{}",
            request.wrapped_token, request.source_chain_id, request.dest_chain_id, request.amount
        );
        let source_tx_hash = self.tx_hash(BridgeOperation::Transfer, &payload);
        let dest_tx_hash = Some(self.tx_hash(BridgeOperation::Transfer, &payload));

        Ok(TransferResponse {
            amount_after_fees,
            status: "completed".to_string(),
            source_tx_hash,
            dest_tx_hash,
        })
    }

    async fn swap(&self, request: SwapRequest) -> Result<SwapResponse, BridgeError> {
        self.enter(BridgeOperation::Swap).await?;
        require_positive(&request.amount)?;
        if request.source_token.chain_id != request.dest_token.chain_id {
            return Err(BridgeError::Rejected(
                "swap requires both tokens on one chain".to_string(),
            ));
        }

        let computed = rates::convert(
            &request.amount,
            &request.source_token,
            &request.dest_token,
        );

        // Slippage haircut before the swap fee
        let slippage_bps = (request.slippage * 100.0).round().clamp(0.0, 10_000.0) as u32;
        let after_slippage = bps(&computed, BPS_DENOMINATOR - slippage_bps);
        let output_amount = &after_slippage - bps(&after_slippage, self.config.protocol_fee_bps);

        if !output_amount.is_positive() {
            return Err(BridgeError::Rejected(format!(
                "swap of {} {} yields nothing",
                request.amount, request.source_token.symbol
            )));
        }

        let tx_hash = self.tx_hash(
            BridgeOperation::Swap,
            &format!(
                "{}->{}:{}",
                request.source_token, request.dest_token, request.amount
            ),
        );

        Ok(SwapResponse {
            output_amount,
            status: "completed".to_string(),
            tx_hash,
        })
    }

    async fn estimate_fee(&self, request: FeeEstimateRequest) -> Result<Fee, BridgeError> {
        self.enter(BridgeOperation::FeeEstimate).await?;

        let amount = &request.amount;
        let bridge_fee = if request.source_token.chain_id != request.dest_token.chain_id {
            bps(amount, self.config.bridge_fee_bps)
        } else {
            BigInt::zero()
        };

        let mut fee = Fee {
            gas_fee: bps(amount, self.config.gas_fee_bps),
            protocol_fee: bps(amount, self.config.protocol_fee_bps),
            network_fee: BigInt::from(self.config.network_fee_units),
            bridge_fee,
            total_usd: 0.0,
        };
        fee.total_usd = self.usd_value(&request.source_token, &fee.total());

        Ok(fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailureInjection;

    fn eth(chain_id: u64) -> Token {
        Token::new("ETH", "Ether", 18, "0x0", chain_id, "chain", false)
    }

    fn usdc(chain_id: u64) -> Token {
        Token::new("USDC", "USD Coin", 6, "0x1", chain_id, "chain", false)
    }

    fn one_eth() -> BigInt {
        BigInt::from(10u64.pow(18))
    }

    #[tokio::test]
    async fn test_fee_estimate_cross_chain_includes_bridge_fee() {
        let bridge = SimulatedBridge::new(BridgeConfig::default());

        let fee = bridge
            .estimate_fee(FeeEstimateRequest {
                source_token: eth(1),
                dest_token: usdc(137),
                amount: one_eth(),
            })
            .await
            .unwrap();

        // 5 bps gas, 10 bps protocol, 5 bps bridge, 1000 units network
        assert_eq!(fee.gas_fee, one_eth() * 5 / 10_000);
        assert_eq!(fee.protocol_fee, one_eth() * 10 / 10_000);
        assert_eq!(fee.bridge_fee, one_eth() * 5 / 10_000);
        assert_eq!(fee.network_fee, BigInt::from(1_000));
        assert!(fee.total_usd > 5.9 && fee.total_usd < 6.1);

        let same_chain = bridge
            .estimate_fee(FeeEstimateRequest {
                source_token: eth(1),
                dest_token: usdc(1),
                amount: one_eth(),
            })
            .await
            .unwrap();
        assert!(same_chain.bridge_fee.is_zero());
    }

    #[tokio::test]
    async fn test_swap_applies_slippage_then_fee() {
        let mut config = BridgeConfig::default();
        config.protocol_fee_bps = 0;
        let bridge = SimulatedBridge::new(config);

        let response = bridge
            .swap(SwapRequest {
                source_token: eth(1),
                dest_token: usdc(1),
                amount: one_eth(),
                dest_address: "0xdest".into(),
                slippage: 1.0,
            })
            .await
            .unwrap();

        // 3000 USDC minus 1%
        assert_eq!(response.output_amount, BigInt::from(2_970_000_000u64));
        assert_eq!(response.tx_hash.len(), 66);
    }

    #[tokio::test]
    async fn test_swap_rejects_cross_chain() {
        let bridge = SimulatedBridge::new(BridgeConfig::default());
        let err = bridge
            .swap(SwapRequest {
                source_token: eth(1),
                dest_token: usdc(137),
                amount: one_eth(),
                dest_address: "0xdest".into(),
                slippage: 0.5,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_failure_injection_first_n_calls() {
        let mut config = BridgeConfig::default();
        config.failures.push(FailureInjection {
            operation: BridgeOperation::Wrap,
            times: Some(2),
            kind: FailureKind::Unavailable,
            message: "congested".into(),
        });
        let bridge = SimulatedBridge::new(config);

        let request = WrapRequest {
            token: eth(1),
            amount: one_eth(),
            source_address: "0xsource".into(),
        };

        assert_eq!(
            bridge.wrap(request.clone()).await.unwrap_err(),
            BridgeError::Unavailable("congested".into())
        );
        assert!(bridge.wrap(request.clone()).await.is_err());
        let ok = bridge.wrap(request).await.unwrap();
        assert_eq!(ok.wrapped_token.symbol, "uETH");
        assert_eq!(bridge.call_count(BridgeOperation::Wrap), 3);
    }

    #[tokio::test]
    async fn test_injected_timeout() {
        let mut config = BridgeConfig::default();
        config.failures.push(FailureInjection {
            operation: BridgeOperation::FeeEstimate,
            times: None,
            kind: FailureKind::Timeout,
            message: "ignored".into(),
        });
        let bridge = SimulatedBridge::new(config);

        let err = bridge
            .estimate_fee(FeeEstimateRequest {
                source_token: eth(1),
                dest_token: eth(137),
                amount: one_eth(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::Timeout);
    }

    #[tokio::test]
    async fn test_hashes_are_unique_per_call() {
        let bridge = SimulatedBridge::new(BridgeConfig::default());
        let request = WrapRequest {
            token: eth(1),
            amount: one_eth(),
            source_address: "0xsource".into(),
        };
        let first = bridge.wrap(request.clone()).await.unwrap();
        let second = bridge.wrap(request).await.unwrap();
        assert_ne!(first.tx_hash, second.tx_hash);
    }
}
