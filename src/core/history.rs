//! Bounded log of applied transitions.
//!
//! Every transfer the engine applies is recorded with the names involved and
//! a timestamp, so adapters can show what happened without hooking every
//! callback themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of one applied transition.
///
/// # Example
///
/// ```rust
/// use hsm_engine::TransitionRecord;
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     source: "s1".to_string(),
///     target: "s2".to_string(),
///     cause: "c".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.target, "s2");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The state whose event hook requested the transition
    pub source: String,
    /// The requested target, or a pseudo-state marker
    pub target: String,
    /// Name of the cause being dispatched
    pub cause: String,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
}

/// Ordered, bounded history of transitions.
///
/// When the limit is reached the oldest record is dropped.
///
/// # Example
///
/// ```rust
/// use hsm_engine::{TransitionHistory, TransitionRecord};
/// use chrono::Utc;
///
/// let mut history = TransitionHistory::with_limit(2);
/// for target in ["a", "b", "c"] {
///     history.record(TransitionRecord {
///         source: "top".to_string(),
///         target: target.to_string(),
///         cause: "go".to_string(),
///         timestamp: Utc::now(),
///     });
/// }
/// let targets: Vec<&str> = history.records().map(|r| r.target.as_str()).collect();
/// assert_eq!(targets, vec!["b", "c"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionHistory {
    limit: usize,
    records: VecDeque<TransitionRecord>,
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::with_limit(64)
    }
}

impl TransitionHistory {
    /// Create an empty history keeping at most `limit` records.
    /// A limit of zero disables recording.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            records: VecDeque::new(),
        }
    }

    pub fn record(&mut self, record: TransitionRecord) {
        if self.limit == 0 {
            return;
        }
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    /// Targets in the order they were reached.
    pub fn get_path(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.target.as_str()).collect()
    }

    /// Time between the oldest and newest retained records.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }
}
