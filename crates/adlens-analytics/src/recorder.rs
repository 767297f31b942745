//! Bounded in-process record of pipeline timings and failures.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: String,
    pub client_id: Option<i64>,
    pub duration_ms: u64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageError {
    pub stage: String,
    pub client_id: Option<i64>,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderSnapshot {
    pub capacity: usize,
    /// Oldest first.
    pub timings: Vec<StageTiming>,
    pub errors: Vec<StageError>,
}

/// Keeps the most recent `capacity` timings and errors; older entries are
/// dropped. Shared between tasks behind an `Arc`.
#[derive(Debug)]
pub struct PipelineRecorder {
    capacity: usize,
    timings: Mutex<VecDeque<StageTiming>>,
    errors: Mutex<VecDeque<StageError>>,
}

impl Default for PipelineRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn push_bounded<T>(queue: &Mutex<VecDeque<T>>, capacity: usize, item: T) {
    let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
    while queue.len() >= capacity {
        queue.pop_front();
    }
    queue.push_back(item);
}

impl PipelineRecorder {
    /// A capacity of 0 is raised to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            timings: Mutex::new(VecDeque::with_capacity(capacity)),
            errors: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record_timing(&self, stage: &str, client_id: Option<i64>, elapsed: Duration) {
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(stage, ?client_id, duration_ms, "pipeline stage finished");
        push_bounded(
            &self.timings,
            self.capacity,
            StageTiming {
                stage: stage.to_string(),
                client_id,
                duration_ms,
                at: Utc::now(),
            },
        );
    }

    pub fn record_error(&self, stage: &str, client_id: Option<i64>, message: impl Into<String>) {
        push_bounded(
            &self.errors,
            self.capacity,
            StageError {
                stage: stage.to_string(),
                client_id,
                message: message.into(),
                at: Utc::now(),
            },
        );
    }

    #[must_use]
    pub fn snapshot(&self) -> RecorderSnapshot {
        RecorderSnapshot {
            capacity: self.capacity,
            timings: self
                .timings
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned()
                .collect(),
            errors: self
                .errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned()
                .collect(),
        }
    }
}
