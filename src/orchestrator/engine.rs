//! Swap orchestration engine

use super::retry::{run_activity, RetryPolicy};
use super::status::StatusAggregator;
use super::workflow::{self, Signal, SignalEnvelope, WorkflowContext};
use crate::bridge::BridgeProvider;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::quote::QuoteCalculator;
use crate::state::{StateManager, SwapHistory, SwapStats};
use crate::steps::StepExecutor;
use crate::swap::{StatusReport, SwapQuote, SwapRequest, SwapStatus};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, Duration};
use tracing::{debug, info};
use uuid::Uuid;

/// Signals queued per instance before the quote is ready
const SIGNAL_BUFFER: usize = 8;

/// Whether a signal decided the confirmation wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalOutcome {
    pub applied: bool,
    pub status: SwapStatus,
}

/// Result of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
    Applied { status: SwapStatus },
    /// The swap had already been decided or finished
    NotApplied { status: SwapStatus },
}

impl From<SignalOutcome> for CancelOutcome {
    fn from(outcome: SignalOutcome) -> Self {
        if outcome.applied {
            CancelOutcome::Applied {
                status: outcome.status,
            }
        } else {
            CancelOutcome::NotApplied {
                status: outcome.status,
            }
        }
    }
}

/// Cross-chain swap orchestrator
pub struct SwapOrchestrator {
    /// Services shared by every workflow
    context: Arc<WorkflowContext>,
    /// State manager holding records and journals
    state: Arc<StateManager>,
    status: StatusAggregator,
    /// Signal channels of running workflows, one per request id
    instances: Arc<DashMap<String, mpsc::Sender<SignalEnvelope>>>,
    config: OrchestratorConfig,
    shutdown: watch::Sender<bool>,
}

impl SwapOrchestrator {
    pub fn new(config: OrchestratorConfig, bridge: Arc<dyn BridgeProvider>) -> Self {
        let state = Arc::new(StateManager::new());
        let context = Arc::new(WorkflowContext {
            state: state.clone(),
            calculator: QuoteCalculator::new(bridge.clone(), config.confirmation_timeout()),
            executor: StepExecutor::new(bridge),
            retry: RetryPolicy::from(&config.retry),
            activity_timeout: config.activity_timeout(),
            confirmation_timeout: config.confirmation_timeout(),
        });
        let (shutdown, _) = watch::channel(false);

        info!(
            "Orchestrator {} initialized (confirmation window {:?})",
            config.instance_id,
            config.confirmation_timeout()
        );

        Self {
            status: StatusAggregator::new(state.clone()),
            context,
            state,
            instances: Arc::new(DashMap::new()),
            config,
            shutdown,
        }
    }

    /// Start a swap and return its request id. Starting an id that already
    /// exists returns that id without a second instance.
    pub fn start_swap(&self, mut request: SwapRequest) -> String {
        let request_id = request
            .request_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        request.request_id = Some(request_id.clone());

        let receiver = match self.instances.entry(request_id.clone()) {
            Entry::Occupied(_) => {
                debug!("[{}] Already running", request_id);
                return request_id;
            }
            Entry::Vacant(slot) => {
                if !self.state.create(&request_id, request.clone()) {
                    debug!("[{}] Already finished", request_id);
                    return request_id;
                }
                let (sender, receiver) = mpsc::channel(SIGNAL_BUFFER);
                slot.insert(sender);
                receiver
            }
        };

        info!(
            "[{}] Swap started: {} {} -> {}",
            request_id, request.amount, request.source_token, request.dest_token
        );
        crate::metrics::record_swap_started();

        let context = self.context.clone();
        let instances = self.instances.clone();
        let id = request_id.clone();
        tokio::spawn(async move {
            let status = workflow::run(context, id.clone(), request, receiver).await;
            instances.remove(&id);
            debug!("[{}] Workflow finished in {}", id, status);
        });

        request_id
    }

    /// Deliver a confirm or cancel signal and wait for the workflow's answer
    pub async fn signal(&self, request_id: &str, signal: Signal) -> OrchestratorResult<SignalOutcome> {
        let sender = self.instances.get(request_id).map(|s| s.value().clone());

        if let Some(sender) = sender {
            let (ack, answer) = oneshot::channel();
            if sender.send(SignalEnvelope { signal, ack }).await.is_ok() {
                if let Ok(status) = answer.await {
                    info!("[{}] {:?} applied", request_id, signal);
                    return Ok(SignalOutcome {
                        applied: true,
                        status,
                    });
                }
            }
        }

        let status = self
            .state
            .status(request_id)
            .ok_or_else(|| OrchestratorError::NotFound {
                request_id: request_id.to_string(),
            })?;
        debug!("[{}] {:?} not applied in {}", request_id, signal, status);
        Ok(SignalOutcome {
            applied: false,
            status,
        })
    }

    pub async fn confirm(&self, request_id: &str) -> OrchestratorResult<SignalOutcome> {
        self.signal(request_id, Signal::Confirm).await
    }

    /// Cancel takes effect only before execution begins
    pub async fn cancel(&self, request_id: &str) -> OrchestratorResult<CancelOutcome> {
        self.signal(request_id, Signal::Cancel).await.map(Into::into)
    }

    pub fn get_status(&self, request_id: &str) -> OrchestratorResult<StatusReport> {
        self.status.get_status(request_id)
    }

    /// Quote without starting a swap
    pub async fn quote(&self, request: &SwapRequest) -> OrchestratorResult<SwapQuote> {
        run_activity(
            &self.context.retry,
            self.context.activity_timeout,
            "fee_estimate",
            OrchestratorError::FeeEstimateFailed,
            || self.context.calculator.quote(request),
        )
        .await
    }

    /// Request and journal of a swap, including finished ones
    pub fn history(&self, request_id: &str) -> OrchestratorResult<SwapHistory> {
        self.state
            .history(request_id)
            .ok_or_else(|| OrchestratorError::NotFound {
                request_id: request_id.to_string(),
            })
    }

    pub fn stats(&self) -> SwapStats {
        self.state.get_stats()
    }

    /// Number of workflows still running
    pub fn active_instances(&self) -> usize {
        self.instances.len()
    }

    /// Periodic cleanup loop; returns after `stop`
    pub async fn run(&self) -> OrchestratorResult<()> {
        let mut shutdown = self.shutdown.subscribe();
        let mut cleanup_interval =
            interval(Duration::from_secs(self.config.cleanup_interval_secs.max(1)));
        let retention = Duration::from_secs(self.config.retention_secs);

        info!("Orchestrator engine started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = cleanup_interval.tick() => {
                    let removed = self.state.cleanup(retention);
                    if removed > 0 {
                        debug!("Removed {} expired swaps, {} running", removed, self.instances.len());
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Orchestrator engine stopped");
        Ok(())
    }

    pub fn stop(&self) {
        self.shutdown.send_replace(true);
        info!("Orchestrator shutdown initiated");
    }
}
