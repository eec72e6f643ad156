//! Diff dispatch: when and where a store computes its transactional diff.

use fluxion_core::FlatModel;
use std::sync::Arc;

/// When a diffing store computes and publishes its delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStrategy {
    /// Don't diff.
    None,
    /// Compute on the mutating thread, after the storage lock is
    /// released, before the mutation call returns to its caller.
    Sync,
    /// Compute on the executor's serial diff queue. Diffs for a given
    /// store are published in mutation order.
    Async,
}

/// Per-store diffing configuration: the strategy plus the type-erased
/// encoder that snapshots the model as a flat encoding inside the
/// storage lock.
pub(crate) struct DiffState<M> {
    pub strategy: DiffStrategy,
    pub encoder: Arc<dyn Fn(&M) -> FlatModel + Send + Sync>,
}

impl<M> Clone for DiffState<M> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy,
            encoder: Arc::clone(&self.encoder),
        }
    }
}
