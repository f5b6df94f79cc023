//! Per-request swap workflow
//!
//! One workflow task drives one request id through the lifecycle. It is the
//! only writer of that request's record, so status changes need no lock
//! beyond the state manager's map entry.

use super::retry::{run_activity, RetryPolicy};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::events::SwapEvent;
use crate::quote::QuoteCalculator;
use crate::state::StateManager;
use crate::steps::{StepExecutor, SwapStep, TransferStep, UnwrapStep, WrapStep};
use crate::swap::{
    PlannedStage, RoutePlan, StepType, SwapQuote, SwapRequest, SwapResult, SwapStatus, Token,
    Transaction, TxStatus,
};

use chrono::Utc;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// User decision on a quoted swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Confirm,
    Cancel,
}

/// A signal plus the channel that reports whether it decided the wait.
/// Dropping `ack` unanswered means the signal was not applied.
pub(crate) struct SignalEnvelope {
    pub signal: Signal,
    pub ack: oneshot::Sender<SwapStatus>,
}

/// Shared services every workflow uses
pub(crate) struct WorkflowContext {
    pub state: Arc<StateManager>,
    pub calculator: QuoteCalculator,
    pub executor: StepExecutor,
    pub retry: RetryPolicy,
    pub activity_timeout: Duration,
    pub confirmation_timeout: Duration,
}

enum Decision {
    Confirmed,
    Cancelled,
    TimedOut,
}

/// Run a swap to a terminal status
pub(crate) async fn run(
    context: Arc<WorkflowContext>,
    request_id: String,
    request: SwapRequest,
    signals: mpsc::Receiver<SignalEnvelope>,
) -> SwapStatus {
    let workflow = Workflow {
        ctx: context,
        request_id,
        request,
    };
    let status = workflow.drive(signals).await;
    crate::metrics::record_swap_terminal(status);
    status
}

struct Workflow {
    ctx: Arc<WorkflowContext>,
    request_id: String,
    request: SwapRequest,
}

impl Workflow {
    async fn drive(&self, signals: mpsc::Receiver<SignalEnvelope>) -> SwapStatus {
        let quote = match self.prepare().await {
            Ok(quote) => quote,
            Err(e) => {
                warn!("[{}] Rejected before quoting: {}", self.request_id, e);
                return self.fail(&e, Vec::new(), None, None);
            }
        };

        match self.await_decision(signals).await {
            Ok(Decision::Confirmed) => {}
            Ok(Decision::Cancelled) => {
                info!("[{}] Cancelled by user", self.request_id);
                return SwapStatus::Cancelled;
            }
            Ok(Decision::TimedOut) => {
                info!(
                    "[{}] No decision within {:?}, quote for {} {} expired",
                    self.request_id,
                    self.ctx.confirmation_timeout,
                    quote.output_amount,
                    quote.dest_token.symbol
                );
                return SwapStatus::Timeout;
            }
            Err(e) => {
                error!("[{}] Could not record decision: {}", self.request_id, e);
                return self.ctx.state.status(&self.request_id).unwrap_or(SwapStatus::Failed);
            }
        }

        if let Err(e) = self.journal(SwapEvent::Executing {
            request_id: self.request_id.clone(),
        }) {
            error!("[{}] Could not start execution: {}", self.request_id, e);
            return self.ctx.state.status(&self.request_id).unwrap_or(SwapStatus::Confirmed);
        }

        self.execute(quote).await
    }

    /// Validate the request and quote it
    async fn prepare(&self) -> OrchestratorResult<SwapQuote> {
        self.validate()?;

        let quote = run_activity(
            &self.ctx.retry,
            self.ctx.activity_timeout,
            "fee_estimate",
            OrchestratorError::FeeEstimateFailed,
            || self.ctx.calculator.quote(&self.request),
        )
        .await?;

        self.ctx.state.set_quote(&self.request_id, quote.clone())?;
        self.journal(SwapEvent::QuoteReady {
            request_id: self.request_id.clone(),
            output_amount: quote.output_amount.clone(),
            expires_at: quote.expires_at,
        })?;
        debug!(
            "[{}] Quote ready: {} {} -> {} {} via {}",
            self.request_id,
            quote.input_amount,
            quote.source_token.symbol,
            quote.output_amount,
            quote.dest_token.symbol,
            quote.path.join(" -> ")
        );
        Ok(quote)
    }

    fn validate(&self) -> OrchestratorResult<()> {
        let request = &self.request;
        if !request.amount.is_positive() {
            return Err(OrchestratorError::InvalidAmount(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        if !(0.0..=100.0).contains(&request.slippage) {
            return Err(OrchestratorError::InvalidSlippage(format!(
                "{}% is outside 0-100",
                request.slippage
            )));
        }
        if request.source_address.trim().is_empty() {
            return Err(OrchestratorError::InvalidAddress(
                "source address is empty".to_string(),
            ));
        }
        if request.dest_address.trim().is_empty() {
            return Err(OrchestratorError::InvalidAddress(
                "destination address is empty".to_string(),
            ));
        }
        if let Some(deadline) = request.deadline {
            if deadline <= Utc::now() {
                return Err(OrchestratorError::DeadlineExceeded(format!(
                    "deadline {} has passed",
                    deadline
                )));
            }
        }
        RoutePlan::plan(&request.source_token, &request.dest_token).map(|_| ())
    }

    /// Wait for the first of confirm, cancel or the confirmation timer.
    /// The receiver is dropped on return, which rejects every later signal.
    async fn await_decision(
        &self,
        mut signals: mpsc::Receiver<SignalEnvelope>,
    ) -> OrchestratorResult<Decision> {
        let timer = tokio::time::sleep(self.ctx.confirmation_timeout);
        tokio::pin!(timer);

        let decided = loop {
            tokio::select! {
                // Signals buffered before the quote was ready win over an
                // already elapsed timer
                biased;

                envelope = signals.recv() => match envelope {
                    Some(envelope) => break Some(envelope),
                    None => {
                        // Engine gone; only the timer can decide now
                        (&mut timer).await;
                        break None;
                    }
                },
                _ = &mut timer => break None,
            }
        };

        let Some(SignalEnvelope { signal, ack }) = decided else {
            self.finish_record(SwapEvent::TimedOut {
                request_id: self.request_id.clone(),
            })?;
            return Ok(Decision::TimedOut);
        };

        let (event, decision) = match signal {
            Signal::Confirm => (
                SwapEvent::Confirmed {
                    request_id: self.request_id.clone(),
                },
                Decision::Confirmed,
            ),
            Signal::Cancel => (
                SwapEvent::Cancelled {
                    request_id: self.request_id.clone(),
                },
                Decision::Cancelled,
            ),
        };
        let status = event.status().unwrap_or(SwapStatus::Confirmed);
        self.finish_record(event)?;

        // The caller may have given up waiting; the decision stands either way
        let _ = ack.send(status);
        Ok(decision)
    }

    /// Confirmed moves the status directly; cancel and timeout are recorded
    /// together with their terminal result.
    fn finish_record(&self, event: SwapEvent) -> OrchestratorResult<()> {
        match event {
            SwapEvent::Confirmed { .. } => self.journal(event),
            terminal => {
                let status = terminal.status().unwrap_or(SwapStatus::Timeout);
                let result = self.result(status, Vec::new(), None, None);
                self.ctx.state.complete(result, terminal)
            }
        }
    }

    /// Run the planned stages in order, threading each stage's output into
    /// the next stage's input.
    async fn execute(&self, quote: SwapQuote) -> SwapStatus {
        let plan = match RoutePlan::plan(&self.request.source_token, &self.request.dest_token) {
            Ok(plan) => plan,
            Err(e) => return self.fail(&e, Vec::new(), None, Some(quote)),
        };
        info!(
            "[{}] Executing {} stage(s): {:?}",
            self.request_id,
            plan.stages.len(),
            plan.steps()
        );

        let mut transactions: Vec<Transaction> = Vec::with_capacity(plan.stages.len());
        let mut working_token = self.request.source_token.clone();
        let mut working_amount = self.request.amount.clone();
        let mut holder = self.request.source_address.clone();

        for stage in &plan.stages {
            match self
                .run_stage(stage, &working_token, &working_amount, &holder)
                .await
            {
                Ok(tx) => {
                    working_token = tx.dest_token.clone();
                    working_amount = tx.value.clone();
                    holder = tx.to_address.clone();
                    transactions.push(tx);
                }
                Err(e) => {
                    let compensation = match (stage.step, transactions.last()) {
                        (StepType::Transfer, Some(wrap)) if wrap.step == StepType::Wrap => {
                            self.compensate(wrap).await
                        }
                        _ => None,
                    };
                    return self.fail(&e, transactions, compensation, Some(quote));
                }
            }
        }

        let output_amount = transactions
            .last()
            .map(|tx| tx.value.clone())
            .unwrap_or_else(BigInt::zero);
        let mut result = self.result(
            SwapStatus::Succeeded,
            transactions,
            None,
            Some(quote),
        );
        result.output_amount = output_amount.clone();

        let event = SwapEvent::Succeeded {
            request_id: self.request_id.clone(),
            output_amount: output_amount.clone(),
        };
        if let Err(e) = self.ctx.state.complete(result, event) {
            error!("[{}] Could not record success: {}", self.request_id, e);
        }
        info!(
            "[{}] Swap succeeded: {} {} delivered to {}",
            self.request_id, output_amount, self.request.dest_token.symbol, self.request.dest_address
        );
        SwapStatus::Succeeded
    }

    /// One stage: journal, call the bridge under the retry policy, journal
    /// again. A transaction is only kept once it reports completed.
    async fn run_stage(
        &self,
        stage: &PlannedStage,
        token: &Token,
        amount: &BigInt,
        holder: &str,
    ) -> OrchestratorResult<Transaction> {
        self.journal(SwapEvent::StageStarted {
            request_id: self.request_id.clone(),
            stage: stage.step,
            amount: amount.clone(),
        })?;

        let started = Instant::now();
        let outcome = self.call_stage(stage, token, amount, holder).await.and_then(|tx| {
            if tx.status == TxStatus::Completed {
                Ok(tx)
            } else {
                Err(stage_failure(stage.step)(
                    format!("transaction {} left in {:?} status", tx.tx_hash, tx.status),
                ))
            }
        });
        crate::metrics::record_stage_duration(stage.step, started.elapsed().as_secs_f64());

        match outcome {
            Ok(tx) => {
                self.journal(SwapEvent::StageCompleted {
                    request_id: self.request_id.clone(),
                    stage: stage.step,
                    transaction_id: tx.id.clone(),
                    tx_hash: tx.tx_hash.clone(),
                })?;
                self.ctx.state.append_transaction(&self.request_id, tx.clone())?;
                debug!(
                    "[{}] {} completed: {} -> {}",
                    self.request_id, stage.step, tx.amount, tx.value
                );
                Ok(tx)
            }
            Err(e) => {
                warn!("[{}] {} failed: {}", self.request_id, stage.step, e);
                crate::metrics::record_stage_failure(stage.step);
                self.journal(SwapEvent::StageFailed {
                    request_id: self.request_id.clone(),
                    stage: stage.step,
                    error: e.to_string(),
                })?;
                Err(e)
            }
        }
    }

    async fn call_stage(
        &self,
        stage: &PlannedStage,
        token: &Token,
        amount: &BigInt,
        holder: &str,
    ) -> OrchestratorResult<Transaction> {
        let executor = &self.ctx.executor;
        let request_id = self.request_id.as_str();
        let request = &self.request;

        match stage.step {
            StepType::Wrap => {
                let step = WrapStep {
                    token: token.clone(),
                    amount: amount.clone(),
                    source_address: holder.to_string(),
                };
                self.retrying(StepType::Wrap, "wrap", || executor.wrap(request_id, &step))
                    .await
            }
            StepType::Transfer => {
                let step = TransferStep {
                    token: token.clone(),
                    dest_chain_id: request.dest_token.chain_id,
                    dest_chain_name: request.dest_token.chain_name.clone(),
                    amount: amount.clone(),
                    source_address: holder.to_string(),
                    dest_address: request.dest_address.clone(),
                };
                self.retrying(StepType::Transfer, "transfer", || {
                    executor.transfer(request_id, &step)
                })
                .await
            }
            StepType::Swap => {
                let step = SwapStep {
                    source_token: token.clone(),
                    dest_token: stage.to.clone(),
                    amount: amount.clone(),
                    from_address: holder.to_string(),
                    dest_address: request.dest_address.clone(),
                    slippage: request.slippage,
                };
                self.retrying(StepType::Swap, "swap", || executor.swap(request_id, &step))
                    .await
            }
            StepType::Unwrap => {
                let step = UnwrapStep {
                    wrapped_token: token.clone(),
                    dest_token: stage.to.clone(),
                    amount: amount.clone(),
                    from_address: holder.to_string(),
                    dest_address: request.dest_address.clone(),
                };
                self.retrying(StepType::Unwrap, "unwrap", || executor.unwrap(request_id, &step))
                    .await
            }
        }
    }

    async fn retrying<F, Fut>(
        &self,
        step: StepType,
        operation: &str,
        activity: F,
    ) -> OrchestratorResult<Transaction>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = OrchestratorResult<Transaction>>,
    {
        run_activity(
            &self.ctx.retry,
            self.ctx.activity_timeout,
            operation,
            stage_failure(step),
            activity,
        )
        .await
    }

    /// Best-effort unwrap of a wrapped amount whose transfer failed. Failure
    /// is logged and journaled, never returned.
    async fn compensate(&self, wrap: &Transaction) -> Option<Transaction> {
        let refund_to = self.request.refund_target().to_string();
        warn!(
            "[{}] Transfer failed after wrap, unwrapping {} {} to {}",
            self.request_id, wrap.value, wrap.dest_token.symbol, refund_to
        );

        let step = UnwrapStep {
            wrapped_token: wrap.dest_token.clone(),
            dest_token: wrap.source_token.clone(),
            amount: wrap.value.clone(),
            from_address: wrap.to_address.clone(),
            dest_address: refund_to,
        };
        let executor = &self.ctx.executor;
        let outcome = self
            .retrying(StepType::Unwrap, "compensation_unwrap", || {
                executor.unwrap(&self.request_id, &step)
            })
            .await;

        let (event, compensation) = match outcome {
            Ok(tx) => {
                info!(
                    "[{}] Compensation unwrap {} returned {} {}",
                    self.request_id, tx.tx_hash, tx.value, tx.dest_token.symbol
                );
                crate::metrics::record_compensation(true);
                (
                    SwapEvent::CompensationAttempted {
                        request_id: self.request_id.clone(),
                        succeeded: true,
                        tx_hash: Some(tx.tx_hash.clone()),
                        error: None,
                    },
                    Some(tx),
                )
            }
            Err(e) => {
                error!(
                    "[{}] Compensation unwrap failed, {} {} left wrapped: {}",
                    self.request_id, wrap.value, wrap.dest_token.symbol, e
                );
                crate::metrics::record_compensation(false);
                (
                    SwapEvent::CompensationAttempted {
                        request_id: self.request_id.clone(),
                        succeeded: false,
                        tx_hash: None,
                        error: Some(e.to_string()),
                    },
                    None,
                )
            }
        };

        if let Err(e) = self.journal(event) {
            error!("[{}] Could not journal compensation: {}", self.request_id, e);
        }
        compensation
    }

    /// Record a terminal failure. Works from `initiated` and `executing`.
    fn fail(
        &self,
        error: &OrchestratorError,
        transactions: Vec<Transaction>,
        compensation_tx: Option<Transaction>,
        quote: Option<SwapQuote>,
    ) -> SwapStatus {
        let mut result = self.result(SwapStatus::Failed, transactions, compensation_tx, quote);
        result.error_message = Some(error.to_string());
        result.error_code = Some(error.code().to_string());

        let event = SwapEvent::Failed {
            request_id: self.request_id.clone(),
            error_code: error.code().to_string(),
            error: error.to_string(),
        };
        if let Err(e) = self.ctx.state.complete(result, event) {
            error!("[{}] Could not record failure: {}", self.request_id, e);
        }
        SwapStatus::Failed
    }

    fn result(
        &self,
        status: SwapStatus,
        transactions: Vec<Transaction>,
        compensation_tx: Option<Transaction>,
        quote: Option<SwapQuote>,
    ) -> SwapResult {
        let quote = quote.or_else(|| {
            self.ctx
                .state
                .get(&self.request_id)
                .and_then(|record| record.quote)
        });
        let find = |step: StepType| transactions.iter().find(|tx| tx.step == step).cloned();
        let destination_tx = transactions
            .iter()
            .rev()
            .find(|tx| {
                tx.step != StepType::Transfer
                    && tx.dest_chain_id == self.request.dest_token.chain_id
            })
            .cloned();

        SwapResult {
            request_id: self.request_id.clone(),
            status,
            success: status == SwapStatus::Succeeded,
            source_tx: transactions.first().cloned(),
            bridge_tx: find(StepType::Transfer),
            destination_tx,
            compensation_tx,
            input_amount: self.request.amount.clone(),
            output_amount: BigInt::zero(),
            fee: quote.map(|q| q.fee),
            completed_at: Utc::now(),
            error_message: None,
            error_code: None,
            transactions,
        }
    }

    fn journal(&self, event: SwapEvent) -> OrchestratorResult<()> {
        self.ctx.state.record_event(event)
    }
}

/// Dependency error a stage fails with
fn stage_failure(step: StepType) -> fn(String) -> OrchestratorError {
    match step {
        StepType::Wrap => OrchestratorError::WrapFailed,
        StepType::Transfer => OrchestratorError::TransferFailed,
        StepType::Swap => OrchestratorError::SwapFailed,
        StepType::Unwrap => OrchestratorError::UnwrapFailed,
    }
}
