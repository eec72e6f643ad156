//! The store: a model storage bound to middleware, observers, a parent
//! link, and the executor.

use crate::action::Action;
use crate::diffing::{DiffState, DiffStrategy};
use crate::dsl::TransactionGroup;
use crate::executor::{CompletionHandler, Executor};
use crate::queue;
use crate::storage::{Lens, ModelStorage, MutateFn};
use crate::transaction::Transaction;
use fluxion_core::{
    signpost, ActionId, ExecutionMode, FlatModel, Middleware, TransactionDiff, TransactionId,
    TransactionRecord, TransactionState,
};
use std::any::Any;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// A handle to one node of the store graph.
///
/// Owns (or, for children, aliases) a value-type model, serializes its
/// mutations, notifies observers on the main queue in mutation order, and
/// is the entry point for building and running transactions. Cloning
/// clones the handle; the node is shared.
///
/// Child stores hold a strong reference to their parent; parents track
/// children weakly, so a store graph is torn down leaf-first as handles
/// drop.
pub struct Store<M> {
    inner: Arc<StoreInner<M>>,
}

pub(crate) struct StoreInner<M> {
    storage: ModelStorage<M>,
    executor: Executor,
    parent: Option<Arc<dyn AnyStore>>,
    middleware: Mutex<Vec<Arc<dyn Middleware>>>,
    observers: Mutex<Vec<(u64, Arc<dyn Fn() + Send + Sync>)>>,
    next_observer: AtomicU64,
    // Downstream republish hooks (child stores), invoked synchronously at
    // emit time so suppression flags are consulted in the right scope.
    links: Mutex<Vec<Arc<dyn Fn() + Send + Sync>>>,
    version: watch::Sender<u64>,
    suppress: AtomicU32,
    diff: Mutex<Option<DiffState<M>>>,
    diff_tx: watch::Sender<Option<TransactionDiff>>,
}

/// Type-erased store node, for walking the parent chain.
trait AnyStore: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn parent_node(&self) -> Option<Arc<dyn AnyStore>>;
}

impl<M: Clone + Send + Sync + 'static> AnyStore for Store<M> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn parent_node(&self) -> Option<Arc<dyn AnyStore>> {
        self.inner.parent.clone()
    }
}

impl<M: Clone + Send + Sync + 'static> Store<M> {
    /// Create a root store over `model`, scheduled by the process-wide
    /// executor.
    pub fn new(model: M) -> Self {
        Self::with_executor(model, Executor::global().clone())
    }

    /// Create a root store over `model` with a private executor. Tests
    /// should prefer this to avoid cross-test interference.
    pub fn with_executor(model: M, executor: Executor) -> Self {
        Self::build(ModelStorage::root(model), executor, None)
    }

    fn build(
        storage: ModelStorage<M>,
        executor: Executor,
        parent: Option<Arc<dyn AnyStore>>,
    ) -> Self {
        let (version, _) = watch::channel(0);
        let (diff_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(StoreInner {
                storage,
                executor,
                parent,
                middleware: Mutex::new(Vec::new()),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(0),
                links: Mutex::new(Vec::new()),
                version,
                suppress: AtomicU32::new(0),
                diff: Mutex::new(None),
                diff_tx,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner<M>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner<M>> {
        Arc::downgrade(&self.inner)
    }

    /// The executor scheduling this store's transactions.
    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    /// A snapshot of the current model.
    pub fn model(&self) -> M {
        self.inner.storage.read()
    }

    // --- Mutation ---

    /// Mutate the model outside any transaction. Middleware sees a
    /// signpost record with the reserved `__signpost_model_update` action
    /// id.
    pub fn mutate(&self, f: impl FnOnce(&mut M) + Send + 'static) {
        self.mutate_with(None, f)
    }

    /// Mutate the model, attributed to `record` when given.
    pub fn mutate_with(
        &self,
        record: Option<TransactionRecord>,
        f: impl FnOnce(&mut M) + Send + 'static,
    ) {
        self.mutate_boxed(record, Box::new(f))
    }

    pub(crate) fn mutate_boxed(&self, record: Option<TransactionRecord>, f: MutateFn<M>) {
        let signposted = record.is_none();
        let record = record.unwrap_or_else(signpost_record);

        // Snapshot the flat encodings inside the storage lock so diffs
        // observe exactly this mutation, even under concurrent writers.
        let diff_state = self
            .inner
            .diff
            .lock()
            .expect("store diff lock poisoned")
            .clone();
        let snapshots: Arc<Mutex<Option<(FlatModel, FlatModel)>>> = Arc::new(Mutex::new(None));
        let wrapped: MutateFn<M> = match &diff_state {
            Some(state) if state.strategy != DiffStrategy::None => {
                let encoder = Arc::clone(&state.encoder);
                let snapshots = Arc::clone(&snapshots);
                Box::new(move |model: &mut M| {
                    let before = encoder(model);
                    f(model);
                    let after = encoder(model);
                    *snapshots.lock().expect("diff snapshot lock poisoned") =
                        Some((before, after));
                })
            }
            _ => f,
        };

        // Suppress this store's own notifications while the write runs;
        // for a child the write re-enters through the parent, whose
        // republish link must not double-notify us.
        self.perform_without_notifying(|| {
            self.inner.storage.mutate(Some(record.clone()), wrapped)
        });

        if signposted {
            self.notify_middleware(&record);
        }
        self.notify_observers();

        if let Some(state) = diff_state {
            let taken = snapshots
                .lock()
                .expect("diff snapshot lock poisoned")
                .take();
            if let Some((before, after)) = taken {
                self.publish_diff(record, before, after, state.strategy);
            }
        }
    }

    /// Run `f` with observer notifications from this store suppressed.
    /// Used by parent↔child reconciliation to avoid doubled notifications;
    /// nests.
    pub fn perform_without_notifying<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.suppress.fetch_add(1, Ordering::SeqCst);
        let result = f();
        self.inner.suppress.fetch_sub(1, Ordering::SeqCst);
        result
    }

    // --- Observation ---

    /// Register a change observer. The callback runs on the main queue,
    /// once per mutation, in mutation order. The returned handle
    /// unregisters on drop; call [`ObserverHandle::detach`] to observe for
    /// the store's lifetime.
    pub fn observe(&self, f: impl Fn() + Send + Sync + 'static) -> ObserverHandle {
        let token = self.inner.next_observer.fetch_add(1, Ordering::SeqCst);
        self.inner
            .observers
            .lock()
            .expect("store observer lock poisoned")
            .push((token, Arc::new(f)));
        let weak = Arc::downgrade(&self.inner);
        ObserverHandle {
            unregister: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .observers
                        .lock()
                        .expect("store observer lock poisoned")
                        .retain(|(t, _)| *t != token);
                }
            })),
        }
    }

    /// A version channel bumped on every (non-suppressed) change
    /// notification. Receivers see the latest version.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Emit the change signal: bump the version, deliver observer
    /// callbacks on the main queue (inline when already there), and let
    /// child stores republish. Suppressed while inside
    /// [`perform_without_notifying`](Self::perform_without_notifying).
    pub fn notify_observers(&self) {
        if self.inner.suppress.load(Ordering::SeqCst) > 0 {
            return;
        }
        self.inner.version.send_modify(|v| *v += 1);

        let observers: Vec<Arc<dyn Fn() + Send + Sync>> = self
            .inner
            .observers
            .lock()
            .expect("store observer lock poisoned")
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        if !observers.is_empty() {
            let deliver = move || {
                for observer in &observers {
                    observer();
                }
            };
            if queue::is_main() {
                deliver();
            } else {
                self.inner.executor.main_queue().post_fn(deliver);
            }
        }

        let links: Vec<Arc<dyn Fn() + Send + Sync>> = self
            .inner
            .links
            .lock()
            .expect("store link lock poisoned")
            .clone();
        for link in links {
            link();
        }
    }

    // --- Middleware ---

    /// Register `middleware`. Registration is idempotent by reference
    /// identity.
    pub fn register_middleware(&self, middleware: Arc<dyn Middleware>) {
        let mut list = self
            .inner
            .middleware
            .lock()
            .expect("store middleware lock poisoned");
        if !list.iter().any(|m| Arc::ptr_eq(m, &middleware)) {
            list.push(middleware);
        }
    }

    /// Unregister `middleware` by reference identity.
    pub fn unregister_middleware(&self, middleware: &Arc<dyn Middleware>) {
        self.inner
            .middleware
            .lock()
            .expect("store middleware lock poisoned")
            .retain(|m| !Arc::ptr_eq(m, middleware));
    }

    pub(crate) fn notify_middleware(&self, record: &TransactionRecord) {
        let list: Vec<Arc<dyn Middleware>> = self
            .inner
            .middleware
            .lock()
            .expect("store middleware lock poisoned")
            .clone();
        for middleware in list {
            middleware.on_transaction(record);
        }
    }

    // --- Store graph ---

    /// Build a child store aliasing the subtree selected by `lens`.
    ///
    /// Mutations on the child execute inside this store's mutation path
    /// (single source of truth); this store's notifications fire
    /// unconditionally, and the child republishes them downstream.
    pub fn child<C: Clone + Send + Sync + 'static>(&self, lens: Lens<M, C>) -> Store<C> {
        let read = {
            let parent = self.clone();
            let lens = lens.clone();
            Box::new(move || {
                let model = parent.model();
                lens.get(&model)
            }) as Box<dyn Fn() -> C + Send + Sync>
        };
        let write = {
            let parent = self.clone();
            Box::new(move |record: Option<TransactionRecord>, f: MutateFn<C>| {
                let lens = lens.clone();
                parent.mutate_boxed(
                    record,
                    Box::new(move |model: &mut M| {
                        let mut value = lens.get(model);
                        f(&mut value);
                        lens.set(model, value);
                    }),
                );
            }) as Box<dyn Fn(Option<TransactionRecord>, MutateFn<C>) + Send + Sync>
        };

        let child = Store::build(
            ModelStorage::child(read, write),
            self.inner.executor.clone(),
            Some(Arc::new(self.clone())),
        );

        // Parent-originated mutations surface as child notifications too.
        // The link holds the child weakly; the parent never keeps a child
        // alive.
        let weak = child.downgrade();
        self.inner
            .links
            .lock()
            .expect("store link lock poisoned")
            .push(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Store::from_inner(inner).notify_observers();
                }
            }));

        child
    }

    /// Walk the parent chain and return the nearest ancestor whose model
    /// type is `T`.
    pub fn parent_of<T: Clone + Send + Sync + 'static>(&self) -> Option<Store<T>> {
        let mut current = self.inner.parent.clone();
        while let Some(node) = current {
            if let Some(store) = node.as_any().downcast_ref::<Store<T>>() {
                return Some(store.clone());
            }
            current = node.parent_node();
        }
        None
    }

    // --- Transactions ---

    /// Build a transaction for `action` without submitting it.
    pub fn transaction(
        &self,
        action: impl Action<M> + 'static,
        mode: ExecutionMode,
    ) -> Transaction<M> {
        Transaction::new(self, Arc::new(action), mode)
    }

    /// Build and submit one transaction. For `Inline` and `Main` modes
    /// this returns after the transaction is terminal; for `Background`
    /// it returns once the transaction is enqueued.
    pub async fn run(
        &self,
        action: impl Action<M> + 'static,
        mode: ExecutionMode,
    ) -> Transaction<M> {
        self.run_with(action, mode, None, None).await
    }

    /// Build and submit one transaction with an optional throttle delay
    /// and completion handler. Throttled submissions always return
    /// immediately; the execution slot may be superseded before it runs.
    pub async fn run_with(
        &self,
        action: impl Action<M> + 'static,
        mode: ExecutionMode,
        throttle: Option<Duration>,
        completion: Option<CompletionHandler>,
    ) -> Transaction<M> {
        let transaction = self.transaction(action, mode);
        transaction.set_throttle(throttle);
        self.inner
            .executor
            .run(vec![transaction.handle()], completion)
            .await;
        transaction
    }

    /// Submit `actions` as one batch linked by a linear dependency chain:
    /// action *i* depends on action *i−1*.
    pub async fn run_all(
        &self,
        actions: Vec<Arc<dyn Action<M>>>,
        mode: ExecutionMode,
        completion: Option<CompletionHandler>,
    ) -> Vec<Transaction<M>> {
        let transactions: Vec<Transaction<M>> = actions
            .into_iter()
            .map(|action| Transaction::new(self, action, mode.clone()))
            .collect();
        for pair in transactions.windows(2) {
            pair[1].operation().add_dependency(&pair[0].operation());
        }
        let handles = transactions.iter().map(Transaction::handle).collect();
        self.inner.executor.run(handles, completion).await;
        transactions
    }

    /// Submit a DSL-built group with its dependencies pre-wired.
    pub async fn run_group(&self, group: TransactionGroup, completion: Option<CompletionHandler>) {
        let handles = group.flatten();
        self.inner.executor.run(handles, completion).await;
    }

    // --- Diffing ---

    /// The latest-value channel of published diffs. Never publishes until
    /// diffing is enabled.
    pub fn diffs(&self) -> watch::Receiver<Option<TransactionDiff>> {
        self.inner.diff_tx.subscribe()
    }

    fn publish_diff(
        &self,
        record: TransactionRecord,
        before: FlatModel,
        after: FlatModel,
        strategy: DiffStrategy,
    ) {
        let diff_tx = self.inner.diff_tx.clone();
        let publish = move || {
            let changes = fluxion_diff::diff(&before, &after);
            diff_tx.send_replace(Some(TransactionDiff {
                transaction_id: record.id,
                action_id: record.action_id,
                changes,
            }));
        };
        match strategy {
            DiffStrategy::None => {}
            DiffStrategy::Sync => publish(),
            DiffStrategy::Async => self.inner.executor.diff_queue().post_fn(publish),
        }
    }
}

impl<M: Clone + Send + Sync + serde::Serialize + 'static> Store<M> {
    /// Enable transactional diffing: after every mutation the model's
    /// flat encoding is compared against the previous snapshot and the
    /// delta is published on [`diffs`](Self::diffs).
    ///
    /// # Panics
    ///
    /// Panics during a later mutation if the model does not encode to a
    /// JSON object (a diffing model must be record-shaped). That is a
    /// contract violation, not a runtime condition.
    pub fn enable_diffing(&self, strategy: DiffStrategy) {
        let encoder = Arc::new(|model: &M| {
            let value = serde_json::to_value(model)
                .unwrap_or_else(|e| panic!("diffing model failed to encode: {e}"));
            assert!(
                value.is_object(),
                "diffing model must encode to an object (record-shaped), got {value}"
            );
            fluxion_diff::flatten(&value)
        });
        *self.inner.diff.lock().expect("store diff lock poisoned") = Some(DiffState {
            strategy,
            encoder,
        });
    }
}

impl<M> Clone for Store<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Keeps an observer registered. Dropping the handle unregisters the
/// observer; [`detach`](Self::detach) keeps it registered for the store's
/// lifetime.
pub struct ObserverHandle {
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl ObserverHandle {
    /// Unregister the observer now.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister.take() {
            f();
        }
    }

    /// Keep the observer registered for the store's lifetime.
    pub fn detach(mut self) {
        self.unregister = None;
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister.take() {
            f();
        }
    }
}

fn signpost_record() -> TransactionRecord {
    TransactionRecord {
        id: TransactionId::generate(),
        action_id: ActionId::new(signpost::MODEL_UPDATE),
        state: TransactionState::Completed,
        mode: ExecutionMode::Inline,
    }
}
