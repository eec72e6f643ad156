//! What an action body sees while it runs.

use crate::group::GroupError;
use crate::store::Store;
use crate::transaction::Transaction;
use fluxion_core::TransactionError;
use std::sync::Arc;

/// The surface exposed to [`Action`](crate::Action) bodies.
///
/// Wraps the target store, the running transaction, and the batch's shared
/// group error cell. Cloneable so deferred work can carry it into a
/// spawned task and settle the transaction later.
pub struct TransactionContext<M> {
    store: Store<M>,
    transaction: Transaction<M>,
    group: Arc<GroupError>,
}

impl<M: Clone + Send + Sync + 'static> TransactionContext<M> {
    pub(crate) fn new(store: Store<M>, transaction: Transaction<M>) -> Self {
        let group = transaction.group_or_init();
        Self {
            store,
            transaction,
            group,
        }
    }

    /// The target store.
    pub fn store(&self) -> &Store<M> {
        &self.store
    }

    /// The running transaction (id, action id, state channel).
    pub fn transaction(&self) -> &Transaction<M> {
        &self.transaction
    }

    /// The shared error cell of this transaction's batch.
    pub fn group_error(&self) -> &Arc<GroupError> {
        &self.group
    }

    /// The transaction's underlying operation, for callers that settle
    /// it through a side channel.
    pub fn operation(&self) -> crate::operation::Operation {
        self.transaction.operation()
    }

    /// Mutate the store's model, attributed to this transaction.
    /// Shorthand for `store.mutate_with(transaction record, f)`.
    pub fn mutate(&self, f: impl FnOnce(&mut M) + Send + 'static) {
        self.store
            .mutate_with(Some(self.transaction.record()), f);
    }

    /// Settle the transaction successfully.
    pub fn fulfill(&self) {
        self.transaction.operation().finish();
    }

    /// Settle the transaction with an error. The error lands in the group
    /// cell iff the cell is still empty; the transaction itself completes.
    pub fn reject(&self, error: impl Into<TransactionError>) {
        self.group.record(error.into());
        self.transaction.operation().finish();
    }

    /// Short-circuit on a previous failure in the batch: if the group
    /// cell already holds an error, settle this transaction and return
    /// true. Idiomatic at the head of each subsequent action body.
    pub fn reject_on_previous(&self) -> bool {
        if self.group.has_error() {
            self.transaction.operation().finish();
            true
        } else {
            false
        }
    }
}

impl<M> Clone for TransactionContext<M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            transaction: self.transaction.clone(),
            group: Arc::clone(&self.group),
        }
    }
}
