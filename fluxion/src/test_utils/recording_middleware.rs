//! A middleware that records every transaction state transition.

use fluxion_core::{Middleware, TransactionId, TransactionRecord, TransactionState};
use std::sync::Mutex;

/// Records every [`TransactionRecord`] it sees, for assertions on
/// transition sequences.
pub struct RecordingMiddleware {
    records: Mutex<Vec<TransactionRecord>>,
}

impl RecordingMiddleware {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Every record seen so far, in delivery order.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.records
            .lock()
            .expect("recording middleware lock poisoned")
            .clone()
    }

    /// The state sequence observed for one transaction.
    pub fn states_for(&self, id: &TransactionId) -> Vec<TransactionState> {
        self.records()
            .into_iter()
            .filter(|r| &r.id == id)
            .map(|r| r.state)
            .collect()
    }

    /// The action ids observed, in delivery order.
    pub fn action_ids(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|r| r.action_id.to_string())
            .collect()
    }
}

impl Default for RecordingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RecordingMiddleware {
    fn on_transaction(&self, record: &TransactionRecord) {
        self.records
            .lock()
            .expect("recording middleware lock poisoned")
            .push(record.clone());
    }
}
