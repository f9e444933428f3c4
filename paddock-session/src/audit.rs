//! Audit trail of analysis attempts.
//!
//! Records every analysis the session issued and how it settled.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::machine::{AnalysisTicket, Settlement};

/// Default number of entries kept.
pub const DEFAULT_AUDIT_CAPACITY: usize = 200;

/// One analysis attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisEntry {
    /// Unique entry ID
    pub entry_id: String,
    /// History revision the analysis was issued for
    pub revision: u64,
    /// Results sent, oldest first
    pub window: Vec<u8>,
    /// When the call was started
    pub issued_at: DateTime<Utc>,
    /// When the call settled
    pub settled_at: Option<DateTime<Utc>>,
    /// How it settled (None while outstanding)
    pub settlement: Option<Settlement>,
}

impl AnalysisEntry {
    /// Create an entry for a ticket about to be started.
    pub fn from_ticket(ticket: &AnalysisTicket) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            revision: ticket.revision,
            window: ticket.request.results.clone(),
            issued_at: Utc::now(),
            settled_at: None,
            settlement: None,
        }
    }

    /// Call duration in ms, once settled.
    pub fn duration_ms(&self) -> Option<u64> {
        self.settled_at
            .map(|settled| (settled - self.issued_at).num_milliseconds().max(0) as u64)
    }
}

/// Bounded log of analysis attempts, newest first.
#[derive(Debug)]
pub struct AnalysisLog {
    entries: VecDeque<AnalysisEntry>,
    max_entries: usize,
}

impl AnalysisLog {
    /// Create a log with the default capacity.
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_AUDIT_CAPACITY)
    }

    /// Create with custom max entries.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
        }
    }

    /// Log a ticket being started.
    pub fn log_issued(&mut self, ticket: &AnalysisTicket) {
        self.entries.push_front(AnalysisEntry::from_ticket(ticket));

        // Prune if over limit
        while self.entries.len() > self.max_entries {
            self.entries.pop_back();
        }
    }

    /// Record how the analysis for `revision` settled.
    pub fn log_settled(&mut self, revision: u64, settlement: &Settlement) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.revision == revision && e.settlement.is_none())
        {
            entry.settled_at = Some(Utc::now());
            entry.settlement = Some(settlement.clone());
        }
    }

    /// Get recent entries.
    pub fn recent(&self, limit: usize) -> Vec<AnalysisEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Get statistics.
    pub fn stats(&self) -> AnalysisStats {
        let mut stats = AnalysisStats {
            total: self.entries.len(),
            ..Default::default()
        };

        for entry in &self.entries {
            match &entry.settlement {
                None => stats.outstanding += 1,
                Some(Settlement::Surfaced { .. }) => stats.surfaced += 1,
                Some(Settlement::Filtered { .. }) => stats.filtered += 1,
                Some(Settlement::Failed { .. }) => stats.failed += 1,
                Some(Settlement::Stale) => stats.stale += 1,
            }
        }

        stats
    }

    /// Get count.
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for AnalysisLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts by settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub total: usize,
    pub outstanding: usize,
    pub surfaced: usize,
    pub filtered: usize,
    pub failed: usize,
    pub stale: usize,
}
