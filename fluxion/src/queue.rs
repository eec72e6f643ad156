//! Operation queues: the cooperative main serial queue and named
//! background queues.

use crate::transaction::TransactionHandle;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, Semaphore};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

tokio::task_local! {
    static ON_MAIN_QUEUE: ();
}

/// Whether the current task is running on the main serial queue.
///
/// `ExecutionMode::Main` uses this to execute inline instead of posting
/// to itself, and change notifications use it to deliver inline when the
/// mutation already happened on the main queue.
pub fn is_main() -> bool {
    ON_MAIN_QUEUE.try_with(|_| ()).is_ok()
}

/// A strictly serial queue: one drain task runs posted jobs in order,
/// one at a time. The embedding runtime's "main thread" is modeled by a
/// dedicated serial queue whose jobs see [`is_main`] return true.
#[derive(Clone)]
pub(crate) struct SerialQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Spawn the drain task. `main` marks drained jobs as running on the
    /// main queue.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(main: bool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if main {
                    ON_MAIN_QUEUE.scope((), job).await;
                } else {
                    job.await;
                }
            }
        });
        Self { tx }
    }

    /// Post a job. Jobs run in post order; a job that awaits keeps every
    /// later job waiting (the queue is cooperative).
    pub fn post(&self, job: impl Future<Output = ()> + Send + 'static) {
        // A closed channel means the runtime is shutting down; dropping
        // the job is the only sensible behavior then.
        let _ = self.tx.send(Box::pin(job));
    }

    /// Post a synchronous closure.
    pub fn post_fn(&self, f: impl FnOnce() + Send + 'static) {
        self.post(async move { f() });
    }
}

/// A background operation queue.
///
/// Operations are spawned as they are submitted; each waits for its
/// prerequisites, then (when the queue is bounded) for a concurrency
/// permit, then executes. Start order is therefore ready order:
/// submission order modulo dependency edges. The queue tracks its
/// transactions weakly so `cancel_all` can reach everything currently
/// enqueued or executing without keeping anything alive.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    semaphore: Option<Arc<Semaphore>>,
    transactions: Mutex<Vec<Weak<dyn TransactionHandle>>>,
}

impl Queue {
    /// Create a queue with unbounded concurrency.
    pub fn new() -> Self {
        Self::with_concurrency(None)
    }

    /// Create a queue that runs at most `max_concurrency` operations at a
    /// time (`None` for unbounded).
    pub fn with_concurrency(max_concurrency: Option<usize>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                semaphore: max_concurrency.map(|n| Arc::new(Semaphore::new(n))),
                transactions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Submit a transaction: spawn its run future and track it for
    /// cancellation.
    pub(crate) fn submit(&self, transaction: Arc<dyn TransactionHandle>) {
        {
            let mut transactions = self
                .inner
                .transactions
                .lock()
                .expect("queue transaction lock poisoned");
            transactions.retain(|t| t.strong_count() > 0);
            transactions.push(Arc::downgrade(&transaction));
        }

        let semaphore = self.inner.semaphore.clone();
        tokio::spawn(async move {
            transaction.operation().wait_dependencies().await;
            let _permit = match semaphore {
                Some(s) => s.acquire_owned().await.ok(),
                None => None,
            };
            transaction.execute().await;
        });
    }

    /// Cancel every transaction currently enqueued or executing on this
    /// queue. Dependents of canceled operations still start; they are
    /// expected to short-circuit through the group error cell.
    pub fn cancel_all(&self) {
        let transactions: Vec<Arc<dyn TransactionHandle>> = {
            let mut list = self
                .inner
                .transactions
                .lock()
                .expect("queue transaction lock poisoned");
            let alive: Vec<_> = list.iter().filter_map(Weak::upgrade).collect();
            list.clear();
            alive
        };
        for transaction in transactions {
            transaction.cancel();
        }
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serial_queue_preserves_post_order() {
        let queue = SerialQueue::spawn(false);
        let (tx, mut rx) = mpsc::unbounded_channel::<u32>();

        for i in 0..10u32 {
            let tx = tx.clone();
            queue.post_fn(move || {
                let _ = tx.send(i);
            });
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(i) = rx.recv().await {
            seen.push(i);
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn main_flag_is_scoped_to_the_main_queue() {
        assert!(!is_main());

        let main = SerialQueue::spawn(true);
        let (tx, rx) = tokio::sync::oneshot::channel();
        main.post_fn(move || {
            let _ = tx.send(is_main());
        });
        assert!(rx.await.unwrap());

        let background = SerialQueue::spawn(false);
        let (tx, rx) = tokio::sync::oneshot::channel();
        background.post_fn(move || {
            let _ = tx.send(is_main());
        });
        assert!(!rx.await.unwrap());
    }
}
