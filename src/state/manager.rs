//! In-memory swap state manager

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::events::{JournalEntry, SwapEvent};
use crate::swap::{SwapQuote, SwapRequest, SwapResult, SwapStatus, Transaction};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Everything known about one swap
#[derive(Debug, Clone)]
pub struct SwapRecord {
    pub request_id: String,
    pub request: SwapRequest,
    pub status: SwapStatus,
    pub quote: Option<SwapQuote>,
    /// Stage transactions in execution order
    pub transactions: Vec<Transaction>,
    pub journal: Vec<JournalEntry>,
    /// Present once the swap is terminal
    pub result: Option<SwapResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SwapRecord {
    fn append(&mut self, event: SwapEvent) -> OrchestratorResult<()> {
        let next = event.status();
        if let Some(to) = next {
            if !self.status.can_transition_to(to) {
                return Err(OrchestratorError::InvalidStateTransition {
                    from: self.status.to_string(),
                    to: to.to_string(),
                });
            }
        }

        let now = Utc::now();
        self.journal.push(JournalEntry {
            sequence: self.journal.len() as u64,
            recorded_at: now,
            event,
        });
        if let Some(status) = next {
            self.status = status;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Swap records keyed by request id
pub struct StateManager {
    records: DashMap<String, SwapRecord>,
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Register a swap in `initiated`. Returns false if the id is taken.
    pub fn create(&self, request_id: &str, request: SwapRequest) -> bool {
        match self.records.entry(request_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let now = Utc::now();
                slot.insert(SwapRecord {
                    request_id: request_id.to_string(),
                    request,
                    status: SwapStatus::Initiated,
                    quote: None,
                    transactions: Vec::new(),
                    journal: vec![JournalEntry {
                        sequence: 0,
                        recorded_at: now,
                        event: SwapEvent::Initiated {
                            request_id: request_id.to_string(),
                        },
                    }],
                    result: None,
                    created_at: now,
                    updated_at: now,
                });
                debug!("Registered swap {}", request_id);
                true
            }
        }
    }

    /// Journal an event, moving the status when the event carries one
    pub fn record_event(&self, event: SwapEvent) -> OrchestratorResult<()> {
        let mut record = self.record_mut(event.request_id())?;
        record.append(event)
    }

    pub fn set_quote(&self, request_id: &str, quote: SwapQuote) -> OrchestratorResult<()> {
        let mut record = self.record_mut(request_id)?;
        record.quote = Some(quote);
        record.updated_at = Utc::now();
        Ok(())
    }

    pub fn append_transaction(&self, request_id: &str, tx: Transaction) -> OrchestratorResult<()> {
        let mut record = self.record_mut(request_id)?;
        record.transactions.push(tx);
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Journal the terminal event and store the result in one step so
    /// readers never see a terminal status without its result.
    pub fn complete(&self, result: SwapResult, event: SwapEvent) -> OrchestratorResult<()> {
        let mut record = self.record_mut(&result.request_id)?;
        if event.status() != Some(result.status) || !result.status.is_terminal() {
            return Err(OrchestratorError::Internal(format!(
                "{} event cannot finalize a {} result",
                event.name(),
                result.status
            )));
        }
        record.append(event)?;
        record.result = Some(result);
        Ok(())
    }

    pub fn get(&self, request_id: &str) -> Option<SwapRecord> {
        self.records.get(request_id).map(|r| r.value().clone())
    }

    pub fn status(&self, request_id: &str) -> Option<SwapStatus> {
        self.records.get(request_id).map(|r| r.status)
    }

    /// The original request and its journal, oldest entry first
    pub fn history(&self, request_id: &str) -> Option<SwapHistory> {
        self.records.get(request_id).map(|record| SwapHistory {
            request_id: record.request_id.clone(),
            request: record.request.clone(),
            status: record.status,
            created_at: record.created_at,
            journal: record.journal.clone(),
        })
    }

    /// Count swaps per status
    pub fn get_stats(&self) -> SwapStats {
        let mut stats = SwapStats::default();
        for record in self.records.iter() {
            stats.total += 1;
            match record.status {
                SwapStatus::Initiated => stats.initiated += 1,
                SwapStatus::QuoteReady => stats.quote_ready += 1,
                SwapStatus::Confirmed => stats.confirmed += 1,
                SwapStatus::Cancelled => stats.cancelled += 1,
                SwapStatus::Timeout => stats.timeout += 1,
                SwapStatus::Executing => stats.executing += 1,
                SwapStatus::Succeeded => stats.succeeded += 1,
                SwapStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Drop terminal swaps last touched more than `retention` ago
    pub fn cleanup(&self, retention: Duration) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = Utc::now() - retention;

        let before = self.records.len();
        self.records
            .retain(|_, record| !(record.status.is_terminal() && record.updated_at < cutoff));
        let removed = before.saturating_sub(self.records.len());

        if removed > 0 {
            info!("Cleaned up {} finished swaps", removed);
        }
        removed
    }

    fn record_mut(
        &self,
        request_id: &str,
    ) -> OrchestratorResult<dashmap::mapref::one::RefMut<'_, String, SwapRecord>> {
        self.records
            .get_mut(request_id)
            .ok_or_else(|| OrchestratorError::NotFound {
                request_id: request_id.to_string(),
            })
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Audit view of one swap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapHistory {
    pub request_id: String,
    pub request: SwapRequest,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
    pub journal: Vec<JournalEntry>,
}

/// Swap counts per status
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SwapStats {
    pub total: u64,
    pub initiated: u64,
    pub quote_ready: u64,
    pub confirmed: u64,
    pub cancelled: u64,
    pub timeout: u64,
    pub executing: u64,
    pub succeeded: u64,
    pub failed: u64,
}
