//! Cost accounting: an append-only ledger and the decorator that feeds it.
//!
//! Every call through [`CostTracked`] writes two entries: an `Estimate`
//! before the call (from the query's usage hint) and a `Reconcile` after it
//! with the actual cost of the reported usage (zero on failure). The
//! difference between the two is the estimation error.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CollaboratorError, ProviderError};
use crate::provider::{Provider, SharedProvider};
use crate::types::{ProviderDescriptor, ProviderResponse, QueryRequest};

/// Which side of a call a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// Written before the call.
    Estimate,
    /// Written after the call with the actual cost.
    Reconcile,
}

/// One ledger line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Provider name.
    pub provider: String,
    /// Correlation ID of the query.
    pub request_id: Uuid,
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
    /// Estimate or reconcile.
    pub kind: LedgerEntryKind,
    /// Cost estimated before the call.
    pub estimated_cost: f64,
    /// Actual cost. `None` on estimate entries.
    pub actual_cost: Option<f64>,
}

impl LedgerEntry {
    /// `actual - estimated` for reconcile entries.
    pub fn delta(&self) -> Option<f64> {
        self.actual_cost.map(|actual| actual - self.estimated_cost)
    }
}

/// Append-only store of cost entries.
pub trait CostLedger: Send + Sync {
    /// Append one entry.
    fn append(&self, entry: LedgerEntry) -> Result<(), CollaboratorError>;
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all entries in append order.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of actual costs across reconcile entries.
    pub fn total_actual(&self) -> f64 {
        self.entries().iter().filter_map(|e| e.actual_cost).sum()
    }

    /// Sum of estimated costs across estimate entries.
    pub fn total_estimated(&self) -> f64 {
        self.entries()
            .iter()
            .filter(|e| e.kind == LedgerEntryKind::Estimate)
            .map(|e| e.estimated_cost)
            .sum()
    }

    /// Actual cost per provider.
    pub fn actual_by_provider(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for entry in self.entries() {
            if let Some(actual) = entry.actual_cost {
                *totals.entry(entry.provider).or_insert(0.0) += actual;
            }
        }
        totals
    }
}

impl CostLedger for MemoryLedger {
    fn append(&self, entry: LedgerEntry) -> Result<(), CollaboratorError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        Ok(())
    }
}

/// Records estimated and actual cost of every call to the inner provider.
pub struct CostTracked {
    inner: SharedProvider,
    ledger: Arc<dyn CostLedger>,
}

impl CostTracked {
    /// Wrap `inner`, writing to `ledger`.
    pub fn new(inner: SharedProvider, ledger: Arc<dyn CostLedger>) -> Self {
        Self { inner, ledger }
    }

    fn append(&self, entry: LedgerEntry) {
        if let Err(e) = self.ledger.append(entry) {
            tracing::warn!(provider = self.inner.name(), error = %e, "cost ledger append failed");
        }
    }
}

impl std::fmt::Debug for CostTracked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTracked")
            .field("inner", &self.inner.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Provider for CostTracked {
    fn descriptor(&self) -> &ProviderDescriptor {
        self.inner.descriptor()
    }

    async fn execute(&self, query: &QueryRequest) -> Result<ProviderResponse, ProviderError> {
        let provider = self.inner.name().to_owned();
        let estimated = self.inner.estimate_cost(query.expected_units());
        self.append(LedgerEntry {
            provider: provider.clone(),
            request_id: query.request_id,
            timestamp: Utc::now(),
            kind: LedgerEntryKind::Estimate,
            estimated_cost: estimated,
            actual_cost: None,
        });

        let result = self.inner.execute(query).await;
        let actual = match &result {
            Ok(response) => self.inner.response_cost(response),
            Err(_) => 0.0,
        };
        tracing::debug!(provider = %provider, estimated, actual, "cost reconciled");
        self.append(LedgerEntry {
            provider,
            request_id: query.request_id,
            timestamp: Utc::now(),
            kind: LedgerEntryKind::Reconcile,
            estimated_cost: estimated,
            actual_cost: Some(actual),
        });
        result
    }

    async fn validate(&self) -> bool {
        self.inner.validate().await
    }

    fn estimate_cost(&self, units: u64) -> f64 {
        self.inner.estimate_cost(units)
    }
}
