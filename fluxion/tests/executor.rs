use async_trait::async_trait;
use fluxion::{
    Action, ActionId, ExecutionMode, Executor, Queue, QueueName, Store, TransactionContext,
    TransactionError, TransactionState,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

#[derive(Clone, Debug)]
struct Counter {
    count: i64,
}

fn counter_store() -> Store<Counter> {
    Store::with_executor(Counter { count: 0 }, Executor::new())
}

/// Adds `amount`, recording its label so tests can assert execution order.
struct Increase {
    amount: i64,
    label: &'static str,
    order: Arc<Mutex<Vec<&'static str>>>,
}

impl Increase {
    fn new(amount: i64, label: &'static str, order: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            amount,
            label,
            order: Arc::clone(order),
        })
    }
}

#[async_trait]
impl Action<Counter> for Increase {
    fn id(&self) -> ActionId {
        "increase".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Counter>) {
        self.order.lock().unwrap().push(self.label);
        let amount = self.amount;
        ctx.mutate(move |counter| counter.count += amount);
        ctx.fulfill();
    }
}

/// Rejects with a message unless a previous action already failed.
struct Fail(&'static str);

#[async_trait]
impl Action<Counter> for Fail {
    fn id(&self) -> ActionId {
        "fail".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Counter>) {
        if ctx.reject_on_previous() {
            return;
        }
        ctx.reject(self.0);
    }
}

/// Short-circuits on a previous error, otherwise increments.
struct IncreaseUnlessFailed;

#[async_trait]
impl Action<Counter> for IncreaseUnlessFailed {
    fn id(&self) -> ActionId {
        "increase_unless_failed".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Counter>) {
        if ctx.reject_on_previous() {
            return;
        }
        ctx.mutate(|counter| counter.count += 1);
        ctx.fulfill();
    }
}

// --- Inline execution ---

#[tokio::test]
async fn inline_run_finishes_before_returning() {
    let store = counter_store();
    let order = Arc::new(Mutex::new(Vec::new()));

    let tx = store
        .run(Increase::new(42, "a", &order), ExecutionMode::Inline)
        .await;

    assert_eq!(store.model().count, 42);
    assert_eq!(tx.state(), TransactionState::Completed);
}

// --- Completion handler ---

#[tokio::test]
async fn completion_fires_once_on_the_main_queue_without_error() {
    let store = counter_store();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = oneshot::channel();

    store
        .run_with(
            Increase::new(1, "a", &order),
            ExecutionMode::Inline,
            None,
            Some(Box::new(move |error| {
                let _ = done_tx.send((fluxion::is_main(), error.is_none()));
            })),
        )
        .await;

    let (on_main, no_error) = done_rx.await.unwrap();
    assert!(on_main);
    assert!(no_error);
}

#[tokio::test]
async fn completion_sees_the_first_group_error() {
    let store = counter_store();
    let (done_tx, done_rx) = oneshot::channel();

    store
        .run_all(
            vec![Arc::new(Fail("boom")), Arc::new(IncreaseUnlessFailed)],
            ExecutionMode::Background(None),
            Some(Box::new(move |error| {
                let _ = done_tx.send(error);
            })),
        )
        .await;

    let error = done_rx.await.unwrap().expect("group error expected");
    assert_eq!(error.to_string(), "boom");
    // The second action short-circuited.
    assert_eq!(store.model().count, 0);
}

// --- Background chains ---

#[tokio::test]
async fn chained_actions_execute_in_submission_order() {
    let store = counter_store();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = oneshot::channel();

    store
        .run_all(
            vec![
                Increase::new(1, "first", &order),
                Increase::new(1, "second", &order),
                Increase::new(1, "third", &order),
            ],
            ExecutionMode::Background(None),
            Some(Box::new(move |error| {
                let _ = done_tx.send(error);
            })),
        )
        .await;

    assert!(done_rx.await.unwrap().is_none());
    assert_eq!(store.model().count, 3);
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

// --- Named queues ---

#[tokio::test]
async fn unknown_queue_names_fall_back_to_the_default() {
    let store = counter_store();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = oneshot::channel();

    store
        .run_with(
            Increase::new(7, "a", &order),
            ExecutionMode::Background(Some(QueueName::new("no-such-queue"))),
            None,
            Some(Box::new(move |error| {
                let _ = done_tx.send(error);
            })),
        )
        .await;

    assert!(done_rx.await.unwrap().is_none());
    assert_eq!(store.model().count, 7);
}

#[tokio::test]
async fn registered_queues_are_used() {
    let store = counter_store();
    store
        .executor()
        .register_queue(QueueName::new("io"), Queue::with_concurrency(Some(1)));
    let order = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = oneshot::channel();

    store
        .run_with(
            Increase::new(5, "a", &order),
            ExecutionMode::Background(Some(QueueName::new("io"))),
            None,
            Some(Box::new(move |error| {
                let _ = done_tx.send(error);
            })),
        )
        .await;

    assert!(done_rx.await.unwrap().is_none());
    assert_eq!(store.model().count, 5);
}

// --- Main mode ---

struct WhereAmI {
    on_main: Arc<AtomicI64>,
}

#[async_trait]
impl Action<Counter> for WhereAmI {
    fn id(&self) -> ActionId {
        "where_am_i".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Counter>) {
        self.on_main
            .store(if fluxion::is_main() { 1 } else { 0 }, Ordering::SeqCst);
        ctx.fulfill();
    }
}

#[tokio::test]
async fn main_mode_runs_on_the_main_queue() {
    let store = counter_store();
    let on_main = Arc::new(AtomicI64::new(-1));

    let tx = store
        .run(
            WhereAmI {
                on_main: Arc::clone(&on_main),
            },
            ExecutionMode::Main,
        )
        .await;

    assert_eq!(tx.state(), TransactionState::Completed);
    assert_eq!(on_main.load(Ordering::SeqCst), 1);
}

// --- Cancellation ---

/// Starts, then parks until canceled; compensation records the
/// interruption in the model.
struct Park {
    started: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl Action<Counter> for Park {
    fn id(&self) -> ActionId {
        "park".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Counter>) {
        ctx.mutate(|counter| counter.count = 100);
        if let Some(started) = self.started.lock().unwrap().take() {
            let _ = started.send(());
        }
        // Keep executing until canceled; the sender side never fires.
        let (_keep, forever) = oneshot::channel::<()>();
        let _ = forever.await;
    }

    fn cancel(&self, ctx: &TransactionContext<Counter>) {
        ctx.mutate(|counter| counter.count = -1);
    }
}

#[tokio::test]
async fn cancel_all_runs_compensation_and_reports_cancellation() {
    let store = counter_store();
    let (started_tx, started_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let tx = store
        .run_with(
            Arc::new(Park {
                started: Mutex::new(Some(started_tx)),
            }),
            ExecutionMode::Background(None),
            None,
            Some(Box::new(move |error| {
                let _ = done_tx.send(error);
            })),
        )
        .await;

    started_rx.await.unwrap();
    store.executor().cancel_all(None);

    let error = done_rx.await.unwrap().expect("cancellation expected");
    assert!(matches!(error, TransactionError::Canceled));
    assert_eq!(tx.state(), TransactionState::Canceled);
    // Compensation ran before the completion handler observed the batch.
    assert_eq!(store.model().count, -1);
}

#[tokio::test]
async fn ongoing_registry_empties_after_terminal_states() {
    let store = counter_store();
    let order = Arc::new(Mutex::new(Vec::new()));

    store
        .run(Increase::new(1, "a", &order), ExecutionMode::Inline)
        .await;

    assert_eq!(store.executor().ongoing_count(), 0);
}
