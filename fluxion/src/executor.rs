//! The transaction executor: queues, scheduling modes, throttling, and
//! group cancellation.

use crate::group::GroupError;
use crate::queue::{self, Queue, SerialQueue};
use crate::throttle::ThrottlerRegistry;
use crate::transaction::TransactionHandle;
use fluxion_core::{ExecutionMode, QueueName, TransactionError, TransactionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

/// Invoked on the main queue once every transaction of a batch is
/// terminal, with the batch's first error (if any).
pub type CompletionHandler = Box<dyn FnOnce(Option<TransactionError>) + Send>;

/// Schedules transactions across the main serial queue and named
/// background queues, honoring mode, dependencies, throttling, and
/// cancellation.
///
/// [`Executor::global`] is the process-wide instance stores use by
/// default; tests should construct private executors with
/// [`Executor::new`] to avoid cross-test interference. Construction
/// spawns the queue drain tasks, so an executor must be created from
/// within a Tokio runtime.
///
/// Cloning clones the handle.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    main: SerialQueue,
    diff: SerialQueue,
    default_queue: Queue,
    queues: RwLock<HashMap<QueueName, Queue>>,
    throttlers: ThrottlerRegistry,
    // Strong references to in-flight transactions; entries leave on the
    // terminal transition. Everything else holds transactions weakly.
    ongoing: Mutex<HashMap<TransactionId, Arc<dyn TransactionHandle>>>,
}

impl Executor {
    /// Create a private executor with its own main queue, default
    /// background queue, and throttler registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                main: SerialQueue::spawn(true),
                diff: SerialQueue::spawn(false),
                default_queue: Queue::new(),
                queues: RwLock::new(HashMap::new()),
                throttlers: ThrottlerRegistry::new(),
                ongoing: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The process-wide executor. First use must happen inside a Tokio
    /// runtime.
    pub fn global() -> &'static Executor {
        static GLOBAL: OnceLock<Executor> = OnceLock::new();
        GLOBAL.get_or_init(Executor::new)
    }

    /// Register a named queue.
    pub fn register_queue(&self, name: QueueName, queue: Queue) {
        self.inner
            .queues
            .write()
            .expect("executor queue lock poisoned")
            .insert(name, queue);
    }

    /// Look up a queue by name; `None` and unknown names resolve to the
    /// default background queue (unknown names log at error).
    pub fn queue(&self, name: Option<&QueueName>) -> Queue {
        let Some(name) = name else {
            return self.inner.default_queue.clone();
        };
        let queues = self
            .inner
            .queues
            .read()
            .expect("executor queue lock poisoned");
        match queues.get(name) {
            Some(queue) => queue.clone(),
            None => {
                tracing::error!(queue = %name, "unknown queue name, falling back to default");
                self.inner.default_queue.clone()
            }
        }
    }

    /// Submit a batch: every transaction shares one fresh group error
    /// cell; `completion` (when given) runs on the main queue after all
    /// of them are terminal.
    ///
    /// `Inline` and `Main` transactions are awaited here, in order;
    /// `Background` and throttled transactions are scheduled and left to
    /// run.
    pub async fn run(
        &self,
        transactions: Vec<Arc<dyn TransactionHandle>>,
        completion: Option<CompletionHandler>,
    ) {
        let group = Arc::new(GroupError::new());
        for transaction in &transactions {
            transaction.assign_group(Arc::clone(&group));
            self.register_ongoing(transaction);
        }

        if let Some(completion) = completion {
            let operations: Vec<_> =
                transactions.iter().map(|t| t.operation()).collect();
            let main = self.inner.main.clone();
            let group = Arc::clone(&group);
            tokio::spawn(async move {
                for operation in operations {
                    operation.wait_terminal().await;
                }
                main.post_fn(move || completion(group.first_error()));
            });
        }

        for transaction in transactions {
            self.schedule(transaction).await;
        }
    }

    async fn schedule(&self, transaction: Arc<dyn TransactionHandle>) {
        if let Some(delay) = transaction.throttle().filter(|d| !d.is_zero()) {
            self.schedule_throttled(transaction, delay);
            return;
        }

        match transaction.mode() {
            ExecutionMode::Inline => {
                transaction.operation().wait_dependencies().await;
                transaction.execute().await;
            }
            ExecutionMode::Main => {
                transaction.operation().wait_dependencies().await;
                if queue::is_main() {
                    // Already on the main queue: execute inline rather
                    // than posting and waiting on ourselves.
                    transaction.execute().await;
                } else {
                    let operation = transaction.operation();
                    self.inner.main.post(transaction.execute());
                    operation.wait_terminal().await;
                }
            }
            ExecutionMode::Background(name) => {
                self.queue(name.as_ref()).submit(transaction);
            }
        }
    }

    /// Dependencies gate the submission to the throttler: the window is
    /// consulted only once prerequisites are terminal. When the throttler
    /// fires, the operation runs on the main queue.
    fn schedule_throttled(&self, transaction: Arc<dyn TransactionHandle>, delay: Duration) {
        let executor = self.clone();
        tokio::spawn(async move {
            transaction.operation().wait_dependencies().await;
            let action = transaction.action_id();
            let main = executor.inner.main.clone();
            let execute = {
                let transaction = Arc::clone(&transaction);
                Box::pin(async move {
                    main.post(transaction.execute());
                })
            };
            let superseded = Arc::clone(&transaction);
            executor.inner.throttlers.submit(
                &action,
                delay,
                execute,
                Box::new(move || superseded.cancel()),
            );
        });
    }

    /// Cancel every transaction on the named queue; with no name, cancel
    /// every ongoing transaction known to this executor.
    pub fn cancel_all(&self, queue: Option<&QueueName>) {
        match queue {
            Some(name) => self.queue(Some(name)).cancel_all(),
            None => {
                let ongoing: Vec<Arc<dyn TransactionHandle>> = self
                    .inner
                    .ongoing
                    .lock()
                    .expect("executor ongoing lock poisoned")
                    .values()
                    .cloned()
                    .collect();
                for transaction in ongoing {
                    transaction.cancel();
                }
            }
        }
    }

    /// Number of transactions currently in flight (submitted, not yet
    /// terminal).
    pub fn ongoing_count(&self) -> usize {
        self.inner
            .ongoing
            .lock()
            .expect("executor ongoing lock poisoned")
            .len()
    }

    pub(crate) fn main_queue(&self) -> &SerialQueue {
        &self.inner.main
    }

    pub(crate) fn diff_queue(&self) -> &SerialQueue {
        &self.inner.diff
    }

    fn register_ongoing(&self, transaction: &Arc<dyn TransactionHandle>) {
        let id = transaction.id();
        self.inner
            .ongoing
            .lock()
            .expect("executor ongoing lock poisoned")
            .insert(id.clone(), Arc::clone(transaction));
        let weak = Arc::downgrade(&self.inner);
        transaction.operation().on_terminal(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner
                    .ongoing
                    .lock()
                    .expect("executor ongoing lock poisoned")
                    .remove(&id);
            }
        });
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}
