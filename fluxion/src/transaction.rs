//! One execution of one action against one store.

use crate::action::{Action, BoxFuture};
use crate::context::TransactionContext;
use crate::group::GroupError;
use crate::operation::{Operation, OperationState};
use crate::store::{Store, StoreInner};
use fluxion_core::{
    ActionId, ExecutionMode, TransactionId, TransactionRecord, TransactionState,
};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// The running instance of an action against a store.
///
/// Identified by a push id, so transactions created in time order compare
/// in time order. Holds the action, a weak reference to the target store
/// (the executor's ongoing registry keeps the only strong reference until
/// terminal state), the scheduling mode, an optional throttle delay, the
/// group error cell assigned at submission, and the underlying
/// [`Operation`].
///
/// Cloning clones the handle.
pub struct Transaction<M> {
    inner: Arc<TransactionInner<M>>,
}

struct TransactionInner<M> {
    id: TransactionId,
    action: Arc<dyn Action<M>>,
    store: Weak<StoreInner<M>>,
    mode: ExecutionMode,
    throttle: Mutex<Option<Duration>>,
    group: OnceLock<Arc<GroupError>>,
    operation: Operation,
    state: Mutex<TransactionState>,
    state_tx: watch::Sender<TransactionState>,
}

impl<M: Clone + Send + Sync + 'static> Transaction<M> {
    pub(crate) fn new(
        store: &Store<M>,
        action: Arc<dyn Action<M>>,
        mode: ExecutionMode,
    ) -> Self {
        let (state_tx, _) = watch::channel(TransactionState::Pending);
        let transaction = Self {
            inner: Arc::new(TransactionInner {
                id: TransactionId::generate(),
                action,
                store: store.downgrade(),
                mode,
                throttle: Mutex::new(None),
                group: OnceLock::new(),
                operation: Operation::new(),
                state: Mutex::new(TransactionState::Pending),
                state_tx,
            }),
        };

        // Propagate the operation's terminal transition into the
        // transaction state machine (and through it, the middleware bus).
        let weak = Arc::downgrade(&transaction.inner);
        transaction.inner.operation.on_terminal(move |op_state| {
            if let Some(inner) = weak.upgrade() {
                let transaction = Transaction { inner };
                match op_state {
                    OperationState::Finished => {
                        transaction.set_state(TransactionState::Completed)
                    }
                    OperationState::Canceled => {
                        transaction.set_state(TransactionState::Canceled)
                    }
                    _ => {}
                }
            }
        });

        transaction
    }

    /// The transaction's push id.
    pub fn id(&self) -> TransactionId {
        self.inner.id.clone()
    }

    /// The id of the action this transaction executes.
    pub fn action_id(&self) -> ActionId {
        self.inner.action.id()
    }

    /// The scheduling mode.
    pub fn mode(&self) -> ExecutionMode {
        self.inner.mode.clone()
    }

    /// The current state.
    pub fn state(&self) -> TransactionState {
        *self.inner.state.lock().expect("transaction state lock poisoned")
    }

    /// A channel publishing every state transition; receivers see the
    /// latest state.
    pub fn states(&self) -> watch::Receiver<TransactionState> {
        self.inner.state_tx.subscribe()
    }

    /// The underlying operation.
    pub fn operation(&self) -> Operation {
        self.inner.operation.clone()
    }

    /// The throttle delay, if configured.
    pub fn throttle(&self) -> Option<Duration> {
        *self.inner.throttle.lock().expect("transaction throttle lock poisoned")
    }

    /// Configure (or clear) the throttle delay. Zero delays are treated
    /// as no throttle.
    pub fn set_throttle(&self, delay: Option<Duration>) {
        *self.inner.throttle.lock().expect("transaction throttle lock poisoned") =
            delay.filter(|d| !d.is_zero());
    }

    /// Make this transaction depend on `others`: its operation will not
    /// start until each of their operations is terminal.
    pub fn depend_on(&self, others: &[&dyn TransactionHandle]) {
        for other in others {
            self.inner.operation.add_dependency(&other.operation());
        }
    }

    /// The group error cell, if one was assigned at submission.
    pub fn group(&self) -> Option<Arc<GroupError>> {
        self.inner.group.get().cloned()
    }

    /// A snapshot record of this transaction at its current state.
    pub fn record(&self) -> TransactionRecord {
        TransactionRecord {
            id: self.id(),
            action_id: self.action_id(),
            state: self.state(),
            mode: self.mode(),
        }
    }

    /// Erase the model type for the executor and the DSL.
    pub fn handle(&self) -> Arc<dyn TransactionHandle> {
        Arc::new(self.clone())
    }

    pub(crate) fn group_or_init(&self) -> Arc<GroupError> {
        self.inner
            .group
            .get_or_init(|| Arc::new(GroupError::new()))
            .clone()
    }

    pub(crate) fn assign_group(&self, group: Arc<GroupError>) {
        // First assignment wins; a transaction belongs to one batch.
        let _ = self.inner.group.set(group);
    }

    fn set_state(&self, state: TransactionState) {
        {
            let mut current = self
                .inner
                .state
                .lock()
                .expect("transaction state lock poisoned");
            if current.is_terminal() || *current == state {
                return;
            }
            *current = state;
        }
        self.inner.state_tx.send_replace(state);
        if let Some(inner) = self.inner.store.upgrade() {
            Store::from_inner(inner).notify_middleware(&self.record());
        }
    }

    /// Run the transaction to a terminal state: start the operation, run
    /// the reducer, and wait for `fulfill`/`reject`/cancellation.
    pub(crate) async fn run(&self) {
        let operation = self.operation();
        if !operation.begin() {
            // Canceled before it could start.
            return;
        }
        self.set_state(TransactionState::Started);

        match self.inner.store.upgrade() {
            Some(inner) => {
                let ctx = TransactionContext::new(Store::from_inner(inner), self.clone());
                self.inner.action.reduce(&ctx).await;
            }
            None => {
                // The store is gone; there is nothing to reduce against.
                operation.finish();
            }
        }

        operation.wait_terminal().await;
    }

    /// Cancel the transaction: flip the operation, run the action's
    /// compensation when it was executing, record the cancellation in the
    /// group cell, then fire terminal hooks.
    pub fn cancel(&self) {
        let operation = self.operation();
        let Some(prior) = operation.begin_cancel() else {
            return;
        };
        if let Some(group) = self.group() {
            group.record(fluxion_core::TransactionError::Canceled);
        }
        if prior == OperationState::Executing {
            if let Some(inner) = self.inner.store.upgrade() {
                let ctx = TransactionContext::new(Store::from_inner(inner), self.clone());
                self.inner.action.cancel(&ctx);
            }
        }
        operation.complete_cancel();
    }
}

impl<M> Clone for Transaction<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Object-safe view of a transaction, independent of its model type.
///
/// The executor, the queues, and the DSL all work in terms of handles so
/// that one batch can span stores with different model types (a parent
/// and its children, typically).
pub trait TransactionHandle: Send + Sync {
    /// The transaction's push id.
    fn id(&self) -> TransactionId;
    /// The id of the action behind the transaction.
    fn action_id(&self) -> ActionId;
    /// The scheduling mode.
    fn mode(&self) -> ExecutionMode;
    /// The current state.
    fn state(&self) -> TransactionState;
    /// The state transition channel.
    fn states(&self) -> watch::Receiver<TransactionState>;
    /// The underlying operation.
    fn operation(&self) -> Operation;
    /// The throttle delay, if configured.
    fn throttle(&self) -> Option<Duration>;
    /// Configure the throttle delay.
    fn set_throttle(&self, delay: Option<Duration>);
    /// Assign the batch's group error cell. First assignment wins.
    fn assign_group(&self, group: Arc<GroupError>);
    /// The group error cell, if assigned.
    fn group(&self) -> Option<Arc<GroupError>>;
    /// Run to a terminal state.
    fn execute(&self) -> BoxFuture<'static, ()>;
    /// Cancel, running compensation when executing.
    fn cancel(&self);
}

impl<M: Clone + Send + Sync + 'static> TransactionHandle for Transaction<M> {
    fn id(&self) -> TransactionId {
        Transaction::id(self)
    }

    fn action_id(&self) -> ActionId {
        Transaction::action_id(self)
    }

    fn mode(&self) -> ExecutionMode {
        Transaction::mode(self)
    }

    fn state(&self) -> TransactionState {
        Transaction::state(self)
    }

    fn states(&self) -> watch::Receiver<TransactionState> {
        Transaction::states(self)
    }

    fn operation(&self) -> Operation {
        Transaction::operation(self)
    }

    fn throttle(&self) -> Option<Duration> {
        Transaction::throttle(self)
    }

    fn set_throttle(&self, delay: Option<Duration>) {
        Transaction::set_throttle(self, delay)
    }

    fn assign_group(&self, group: Arc<GroupError>) {
        Transaction::assign_group(self, group)
    }

    fn group(&self) -> Option<Arc<GroupError>> {
        Transaction::group(self)
    }

    fn execute(&self) -> BoxFuture<'static, ()> {
        let transaction = self.clone();
        Box::pin(async move { transaction.run().await })
    }

    fn cancel(&self) {
        Transaction::cancel(self)
    }
}
