//! The Middleware interface — observation of transaction state transitions.

use crate::state::TransactionRecord;

/// An observer of transaction state transitions.
///
/// Middleware is registered on a store and called synchronously on the
/// thread performing each transition, for every transaction that runs
/// against that store (including signpost records for mutations performed
/// outside an explicit transaction). Implementations must be fast and must
/// not block; anything expensive belongs on a channel.
///
/// Implementations:
/// - LoggingMiddleware: durations + cancellation lines via `tracing`
/// - RecordingMiddleware (test-utils): captures records for assertions
pub trait Middleware: Send + Sync {
    /// Called on every state transition of every transaction.
    fn on_transaction(&self, record: &TransactionRecord);
}

/// Reserved action-id strings emitted by the engine for mutations that do
/// not originate in a user action. Middleware must not assume a real async
/// operation stands behind a record carrying one of these.
pub mod signpost {
    /// Emitted before replaying prior state.
    pub const PRIOR: &str = "__signpost_prior";
    /// Emitted for a direct `mutate` call outside any transaction.
    pub const MODEL_UPDATE: &str = "__signpost_model_update";
    /// Emitted for undo/redo style replays.
    pub const UNDO_REDO: &str = "__signpost_undo_redo";
}
