//! Append-only alert log, bounded to the most recent records.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::resilience::error::{ErrorKind, Severity};

/// One recorded failure or recovery attempt. Never modified once written.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub kind: String,
    pub severity: Severity,
    /// Unix seconds.
    pub timestamp: u64,
    pub context: Value,
}

impl AlertRecord {
    pub fn new(kind: &ErrorKind, severity: Severity, context: Value) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id: Uuid::new_v4(),
            kind: kind.as_str().to_string(),
            severity,
            timestamp,
            context,
        }
    }
}

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug)]
pub struct AlertLog {
    records: RwLock<VecDeque<AlertRecord>>,
    capacity: usize,
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log keeping at most `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, record: AlertRecord) {
        tracing::debug!(id = %record.id, kind = %record.kind, severity = %record.severity, "Alert recorded");
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Copy of every retained record, oldest first.
    pub fn snapshot(&self) -> Vec<AlertRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
