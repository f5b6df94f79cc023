//! Route planning: which pipeline stages a token pair needs, in order

use super::model::StepType;
use super::token::Token;
use crate::error::{OrchestratorError, OrchestratorResult};

/// One planned stage and the token it is expected to produce
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStage {
    pub step: StepType,
    pub from: Token,
    pub to: Token,
}

/// Ordered stages for a source/destination pair
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    pub stages: Vec<PlannedStage>,
}

impl RoutePlan {
    /// Plan the stages that move `source` into `dest`.
    ///
    /// Cross-chain routes always travel as the wrapped asset: wrap if needed,
    /// transfer, swap into the wrapped form of the destination, unwrap if the
    /// destination is native. Same-chain routes never touch the bridge's
    /// wrapped representation unless one endpoint is wrapped.
    pub fn plan(source: &Token, dest: &Token) -> OrchestratorResult<Self> {
        if source == dest && source.is_wrapped == dest.is_wrapped {
            return Err(OrchestratorError::InvalidTokens(format!(
                "source and destination are both {}",
                source
            )));
        }

        let mut stages = Vec::new();

        if source.chain_id == dest.chain_id {
            if source.same_asset(dest) {
                let step = match (source.is_wrapped, dest.is_wrapped) {
                    (false, true) => StepType::Wrap,
                    (true, false) => StepType::Unwrap,
                    _ => {
                        return Err(OrchestratorError::InvalidTokens(format!(
                            "{} and {} are the same asset",
                            source, dest
                        )))
                    }
                };
                stages.push(PlannedStage {
                    step,
                    from: source.clone(),
                    to: dest.clone(),
                });
            } else {
                stages.push(PlannedStage {
                    step: StepType::Swap,
                    from: source.clone(),
                    to: dest.clone(),
                });
            }
            return Ok(Self { stages });
        }

        let mut working = source.clone();

        if !working.is_wrapped {
            let wrapped = working.wrapped_form();
            stages.push(PlannedStage {
                step: StepType::Wrap,
                from: working,
                to: wrapped.clone(),
            });
            working = wrapped;
        }

        let transferred = working.on_chain(dest.chain_id, &dest.chain_name);
        stages.push(PlannedStage {
            step: StepType::Transfer,
            from: working,
            to: transferred.clone(),
        });
        working = transferred;

        if !working.same_asset(dest) {
            let target = dest.wrapped_form();
            stages.push(PlannedStage {
                step: StepType::Swap,
                from: working,
                to: target.clone(),
            });
            working = target;
        }

        if !dest.is_wrapped && working.is_wrapped {
            stages.push(PlannedStage {
                step: StepType::Unwrap,
                from: working,
                to: dest.clone(),
            });
        }

        Ok(Self { stages })
    }

    pub fn steps(&self) -> Vec<StepType> {
        self.stages.iter().map(|s| s.step).collect()
    }

    /// Symbols visited along the route, without consecutive repeats
    pub fn path(&self) -> Vec<String> {
        let mut path: Vec<String> = Vec::with_capacity(self.stages.len() + 1);
        if let Some(first) = self.stages.first() {
            path.push(first.from.symbol.clone());
        }
        for stage in &self.stages {
            if path.last() != Some(&stage.to.symbol) {
                path.push(stage.to.symbol.clone());
            }
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(symbol: &str, chain_id: u64, wrapped: bool) -> Token {
        Token::new(symbol, symbol, 18, "0x0", chain_id, format!("chain-{}", chain_id), wrapped)
    }

    #[test]
    fn test_native_cross_chain_full_pipeline() {
        let plan = RoutePlan::plan(&token("ETH", 1, false), &token("USDC", 137, false)).unwrap();
        assert_eq!(
            plan.steps(),
            vec![
                StepType::Wrap,
                StepType::Transfer,
                StepType::Swap,
                StepType::Unwrap
            ]
        );
        assert_eq!(plan.path(), vec!["ETH", "uETH", "uUSDC", "USDC"]);

        let swap = &plan.stages[2];
        assert_eq!(swap.from.chain_id, 137);
        assert_eq!(swap.to.symbol, "uUSDC");
    }

    #[test]
    fn test_same_chain_single_swap() {
        let plan = RoutePlan::plan(&token("ETH", 1, false), &token("USDC", 1, false)).unwrap();
        assert_eq!(plan.steps(), vec![StepType::Swap]);
        assert_eq!(plan.path(), vec!["ETH", "USDC"]);
    }

    #[test]
    fn test_same_asset_cross_chain_skips_swap() {
        let plan = RoutePlan::plan(&token("ETH", 1, false), &token("ETH", 10, false)).unwrap();
        assert_eq!(
            plan.steps(),
            vec![StepType::Wrap, StepType::Transfer, StepType::Unwrap]
        );
    }

    #[test]
    fn test_wrapped_source_skips_wrap() {
        let plan = RoutePlan::plan(&token("uETH", 1, true), &token("USDC", 137, false)).unwrap();
        assert_eq!(
            plan.steps(),
            vec![StepType::Transfer, StepType::Swap, StepType::Unwrap]
        );
    }

    #[test]
    fn test_wrapped_destination_skips_unwrap() {
        let plan = RoutePlan::plan(&token("ETH", 1, false), &token("uUSDC", 137, true)).unwrap();
        assert_eq!(
            plan.steps(),
            vec![StepType::Wrap, StepType::Transfer, StepType::Swap]
        );
    }

    #[test]
    fn test_same_chain_wrap_only() {
        let plan = RoutePlan::plan(&token("ETH", 1, false), &token("uETH", 1, true)).unwrap();
        assert_eq!(plan.steps(), vec![StepType::Wrap]);
    }

    #[test]
    fn test_identical_tokens_rejected() {
        let err = RoutePlan::plan(&token("ETH", 1, false), &token("ETH", 1, false)).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTokens(_)));
    }
}
