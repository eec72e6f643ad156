//! Concrete [`Middleware`] using the [`tracing`] crate.

use fluxion_core::{Middleware, TransactionId, TransactionRecord, TransactionState};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// A [`Middleware`] that emits structured [`tracing`] events for every
/// transaction state transition.
///
/// Keeps a per-transaction start-time map keyed by transaction id and
/// records the measured duration on `Completed`; cancellations get their
/// own line. Wire to any `tracing`-compatible subscriber.
///
/// # Event levels
///
/// | Transition | Level |
/// |------------|-------|
/// | Pending, Started | `DEBUG` |
/// | Completed, Canceled | `INFO` |
pub struct LoggingMiddleware {
    started: Mutex<HashMap<TransactionId, Instant>>,
}

impl LoggingMiddleware {
    /// Create a new logging middleware.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for LoggingMiddleware {
    fn on_transaction(&self, record: &TransactionRecord) {
        match record.state {
            TransactionState::Pending => {
                tracing::debug!(
                    transaction = %record.id,
                    action = %record.action_id,
                    "fluxion.transaction.pending"
                );
            }
            TransactionState::Started => {
                self.started
                    .lock()
                    .expect("logging middleware lock poisoned")
                    .insert(record.id.clone(), Instant::now());
                tracing::debug!(
                    transaction = %record.id,
                    action = %record.action_id,
                    "fluxion.transaction.started"
                );
            }
            TransactionState::Completed => {
                let elapsed_ms = self
                    .started
                    .lock()
                    .expect("logging middleware lock poisoned")
                    .remove(&record.id)
                    .map(|start| start.elapsed().as_secs_f64() * 1000.0);
                tracing::info!(
                    transaction = %record.id,
                    action = %record.action_id,
                    elapsed_ms,
                    "fluxion.transaction.completed"
                );
            }
            TransactionState::Canceled => {
                self.started
                    .lock()
                    .expect("logging middleware lock poisoned")
                    .remove(&record.id);
                tracing::info!(
                    transaction = %record.id,
                    action = %record.action_id,
                    "fluxion.transaction.canceled"
                );
            }
        }
    }
}
