//! Prediction log.
//!
//! A fixed-capacity FIFO of request/response records shared by every
//! request path: predict appends, the logs and drift endpoints read. One
//! `RwLock` guards the deque, so a reader sees the buffer either before or
//! after any append and never a partial entry.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use price_sentinel_core::{config::DEFAULT_LOG_CAPACITY, features::FeatureVector, stats};
use price_sentinel_models::{PredictionDetails, Selection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::trace;
use uuid::Uuid;

/// Outcome of a logged request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Error,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Error => "error",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LogStatus::Success),
            "error" => Ok(LogStatus::Error),
            other => Err(format!("Unknown log status: {}", other)),
        }
    }
}

/// Input recorded with an entry.
///
/// Successful requests keep the clean, coerced feature vector; failed ones
/// keep whatever mapping was submitted (empty if the body did not parse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogInput {
    Features(FeatureVector),
    Raw(Map<String, Value>),
}

/// One request/response record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub input: LogInput,
    pub prediction: Option<f64>,
    pub status: LogStatus,
    pub error: Option<String>,
    pub model_used: Option<String>,
    pub details: Option<PredictionDetails>,
}

impl LogEntry {
    /// Record of a served prediction
    pub fn success(features: FeatureVector, selection: &Selection) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            input: LogInput::Features(features),
            prediction: Some(selection.value),
            status: LogStatus::Success,
            error: None,
            model_used: Some(selection.model_used.clone()),
            details: Some(selection.details.clone()),
        }
    }

    /// Record of a rejected or failed request
    pub fn failure(input: Map<String, Value>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            input: LogInput::Raw(input),
            prediction: None,
            status: LogStatus::Error,
            error: Some(message.into()),
            model_used: None,
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == LogStatus::Success
    }

    /// Feature vector of a successful entry
    pub fn features(&self) -> Option<&FeatureVector> {
        match (&self.status, &self.input) {
            (LogStatus::Success, LogInput::Features(features)) => Some(features),
            _ => None,
        }
    }
}

/// Aggregate counts over the whole buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub total_requests: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// Percentage, two decimals
    pub success_rate: f64,
}

impl LogSummary {
    fn from_entries<'a>(entries: impl Iterator<Item = &'a LogEntry>) -> Self {
        let (mut total, mut success) = (0usize, 0usize);
        for entry in entries {
            total += 1;
            if entry.is_success() {
                success += 1;
            }
        }
        let success_rate = if total > 0 {
            stats::round_to(success as f64 / total as f64 * 100.0, 2)
        } else {
            0.0
        };
        Self {
            total_requests: total,
            success_count: success,
            error_count: total - success,
            success_rate,
        }
    }
}

/// Filtered, newest-first slice of the log together with the summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQuery {
    pub logs: Vec<LogEntry>,
    pub summary: LogSummary,
}

/// Bounded ring buffer of recent predictions.
#[derive(Debug)]
pub struct PredictionLog {
    entries: RwLock<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for PredictionLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl PredictionLog {
    /// Create an empty log holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Append an entry, evicting the oldest one when full
    pub fn append(&self, entry: LogEntry) {
        let status = entry.status;
        {
            let mut entries = self.entries.write();
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
        trace!(status = %status, "Prediction logged");
        ::metrics::counter!("price_sentinel_log_entries_total", "status" => status.as_str())
            .increment(1);
    }

    /// Every entry, oldest first
    pub fn read_all(&self) -> Vec<LogEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// The last `n` entries, newest first
    pub fn read_recent(&self, n: usize) -> Vec<LogEntry> {
        self.entries.read().iter().rev().take(n).cloned().collect()
    }

    pub fn summary(&self) -> LogSummary {
        LogSummary::from_entries(self.entries.read().iter())
    }

    /// Entries matching `status` (all when `None`), the last `limit` of them,
    /// newest first. The summary always covers the whole buffer.
    pub fn query(&self, limit: usize, status: Option<LogStatus>) -> LogQuery {
        let entries = self.entries.read();
        let logs = entries
            .iter()
            .rev()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .take(limit)
            .cloned()
            .collect();
        LogQuery {
            logs,
            summary: LogSummary::from_entries(entries.iter()),
        }
    }

    pub fn success_count(&self) -> usize {
        self.entries.read().iter().filter(|e| e.is_success()).count()
    }

    /// Feature vectors of the last `n` successful entries, oldest first
    pub fn recent_successes(&self, n: usize) -> Vec<FeatureVector> {
        let entries = self.entries.read();
        let mut recent: Vec<FeatureVector> = entries
            .iter()
            .rev()
            .filter_map(LogEntry::features)
            .take(n)
            .copied()
            .collect();
        recent.reverse();
        recent
    }
}
