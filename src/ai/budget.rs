//! Cost Ledger and Admission Gate
//!
//! Thread-safe spend tracking with a running-average ceiling. The ledger is
//! the only shared mutable state in the orchestration core; admission and
//! accounting are two separate critical sections, each atomic on its own, so
//! concurrent analyses never lose updates.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::types::{DiagnosticSnapshot, ScanAnalysis};

// =============================================================================
// Ledger Entries
// =============================================================================

/// One completed (success or fallback) stuck-scan analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub repo_name: String,
    pub scanner: String,
    pub recorded_at: DateTime<Utc>,
    pub analysis: ScanAnalysis,
    pub snapshot: DiagnosticSnapshot,
}

impl LedgerEntry {
    pub fn new(snapshot: DiagnosticSnapshot, analysis: ScanAnalysis) -> Self {
        Self {
            id: Uuid::new_v4(),
            repo_name: snapshot.repo_name.clone(),
            scanner: snapshot.scanner.clone(),
            recorded_at: Utc::now(),
            analysis,
            snapshot,
        }
    }
}

/// Append-only spend history. Owned exclusively by the governor.
#[derive(Debug, Default)]
struct CostLedger {
    total_cost: f64,
    total_tokens: u64,
    history: Vec<LedgerEntry>,
}

// =============================================================================
// Admission
// =============================================================================

/// Outcome of the budget gate for one prospective call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Granted,
    /// Average spend per analysis is over the ceiling; skip the provider
    /// call entirely.
    Denied { average: f64, ceiling: f64 },
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

// =============================================================================
// Cost Governor
// =============================================================================

/// Read-only ledger summary.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub total_cost: f64,
    pub total_tokens: u64,
    pub analyses: usize,
    pub average_cost: f64,
}

/// Gates paid calls against a running-average ceiling and accounts for
/// completed calls.
#[derive(Debug)]
pub struct CostGovernor {
    ledger: Mutex<CostLedger>,
    ceiling: f64,
}

impl CostGovernor {
    pub fn new(ceiling: f64) -> Self {
        Self {
            ledger: Mutex::new(CostLedger::default()),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Decide whether the next paid analysis may run.
    ///
    /// With an empty history, spend recorded from elsewhere can still deny;
    /// otherwise the average cost per recorded analysis is compared against
    /// the ceiling. Denial mutates nothing.
    pub fn admit(&self) -> Admission {
        let ledger = self.lock();

        if ledger.history.is_empty() {
            if ledger.total_cost > self.ceiling {
                return Admission::Denied {
                    average: ledger.total_cost,
                    ceiling: self.ceiling,
                };
            }
            return Admission::Granted;
        }

        let average = ledger.total_cost / ledger.history.len() as f64;
        if average > self.ceiling {
            Admission::Denied {
                average,
                ceiling: self.ceiling,
            }
        } else {
            Admission::Granted
        }
    }

    /// Account for one admitted call: append the history entry and add its
    /// reported cost and tokens. Called exactly once per admitted call.
    pub fn record_analysis(&self, entry: LedgerEntry) {
        let mut ledger = self.lock();
        ledger.total_cost += entry.analysis.estimated_cost;
        ledger.total_tokens += entry.analysis.tokens_used;
        debug!(
            repo = %entry.repo_name,
            cost = entry.analysis.estimated_cost,
            total = ledger.total_cost,
            "analysis recorded"
        );
        ledger.history.push(entry);
    }

    /// Record spend that did not come from a governed analysis call
    /// (externally seeded cost). Never appends history, so it cannot dilute
    /// the per-analysis average.
    pub fn record_external(&self, cost: f64, tokens: u64) {
        let mut ledger = self.lock();
        ledger.total_cost += cost.max(0.0);
        ledger.total_tokens += tokens;
    }

    pub fn total_cost(&self) -> f64 {
        self.lock().total_cost
    }

    pub fn total_tokens(&self) -> u64 {
        self.lock().total_tokens
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// All recorded analyses, oldest first.
    pub fn history(&self) -> Vec<LedgerEntry> {
        self.lock().history.clone()
    }

    /// Prior analyses for one repository, oldest first.
    pub fn history_for_repo(&self, repo_name: &str) -> Vec<LedgerEntry> {
        self.lock()
            .history
            .iter()
            .filter(|entry| entry.repo_name == repo_name)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> LedgerStats {
        let ledger = self.lock();
        let analyses = ledger.history.len();
        LedgerStats {
            total_cost: ledger.total_cost,
            total_tokens: ledger.total_tokens,
            analyses,
            average_cost: if analyses > 0 {
                ledger.total_cost / analyses as f64
            } else {
                0.0
            },
        }
    }

    /// A poisoned ledger still holds consistent counters (no critical
    /// section leaves them half-updated), so recover the guard.
    fn lock(&self) -> MutexGuard<'_, CostLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
