//! End-to-end scenarios across the whole workspace: stores, executor,
//! store graph, diffing, and throttling together.

use async_trait::async_trait;
use fluxion::test_utils::RecordingMiddleware;
use fluxion::{
    Action, ActionId, DiffStrategy, ExecutionMode, Executor, FlatKeyPath, Lens, PropertyDiff,
    Store, TransactionContext, TransactionError, TransactionState,
};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

fn path(s: &str) -> FlatKeyPath {
    s.parse().unwrap()
}

/// Settles immediately without touching the model.
struct Noop;

#[async_trait]
impl<M: Clone + Send + Sync + 'static> Action<M> for Noop {
    fn id(&self) -> ActionId {
        "noop".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<M>) {
        ctx.fulfill();
    }
}

/// Push a no-op transaction through the main queue and wait for it, so
/// every notification posted before it has been delivered.
async fn flush_main<M: Clone + Send + Sync + 'static>(store: &Store<M>) {
    store.run(Noop, ExecutionMode::Main).await;
}

// --- Scenario: counter increments ---

#[derive(Clone, Debug)]
struct Counter {
    count: i64,
}

struct Increase {
    amount: i64,
}

#[async_trait]
impl Action<Counter> for Increase {
    fn id(&self) -> ActionId {
        "increase".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Counter>) {
        let amount = self.amount;
        ctx.mutate(move |counter| counter.count += amount);
        ctx.fulfill();
    }
}

#[tokio::test]
async fn counter_increments_inline() {
    let store = Store::with_executor(Counter { count: 0 }, Executor::new());
    let (done_tx, done_rx) = oneshot::channel();

    store
        .run_with(
            Increase { amount: 42 },
            ExecutionMode::Inline,
            None,
            Some(Box::new(move |error| {
                let _ = done_tx.send(error);
            })),
        )
        .await;

    assert_eq!(store.model().count, 42);
    assert!(done_rx.await.unwrap().is_none());
}

// --- Scenario: chain of three ---

#[tokio::test]
async fn chain_of_three_executes_in_order_and_completes_once() {
    let store = Store::with_executor(Counter { count: 0 }, Executor::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = oneshot::channel();

    struct Step {
        label: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Action<Counter> for Step {
        fn id(&self) -> ActionId {
            "increase".into()
        }

        async fn reduce(&self, ctx: &TransactionContext<Counter>) {
            self.order.lock().unwrap().push(self.label);
            ctx.mutate(|counter| counter.count += 1);
            ctx.fulfill();
        }
    }

    let step = |label| {
        Arc::new(Step {
            label,
            order: Arc::clone(&order),
        }) as Arc<dyn Action<Counter>>
    };

    let done_tx = Mutex::new(Some(done_tx));
    let completions_in_handler = Arc::clone(&completions);
    store
        .run_all(
            vec![step("one"), step("two"), step("three")],
            ExecutionMode::Background(None),
            Some(Box::new(move |error| {
                completions_in_handler.fetch_add(1, Ordering::SeqCst);
                if let Some(done_tx) = done_tx.lock().unwrap().take() {
                    let _ = done_tx.send(error);
                }
            })),
        )
        .await;

    assert!(done_rx.await.unwrap().is_none());
    assert_eq!(store.model().count, 3);
    assert_eq!(*order.lock().unwrap(), vec!["one", "two", "three"]);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

// --- Scenario: cancellation propagates ---

#[derive(Clone, Debug, PartialEq)]
enum LoadState {
    Uninitialized,
    Success(String),
    Error(String),
}

struct Load {
    started: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl Action<LoadState> for Load {
    fn id(&self) -> ActionId {
        "load".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<LoadState>) {
        ctx.mutate(|state| *state = LoadState::Success("Loaded".into()));
        if let Some(started) = self.started.lock().unwrap().take() {
            let _ = started.send(());
        }
        // Await an external signal that never arrives.
        let (_keep, signal) = oneshot::channel::<()>();
        let _ = signal.await;
    }

    fn cancel(&self, ctx: &TransactionContext<LoadState>) {
        ctx.mutate(|state| *state = LoadState::Error("canceled".into()));
    }
}

#[tokio::test]
async fn cancellation_compensates_and_reaches_the_completion_handler() {
    let store = Store::with_executor(LoadState::Uninitialized, Executor::new());
    let (started_tx, started_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let tx = store
        .run_with(
            Load {
                started: Mutex::new(Some(started_tx)),
            },
            ExecutionMode::Background(None),
            None,
            Some(Box::new(move |error| {
                let _ = done_tx.send(error);
            })),
        )
        .await;

    started_rx.await.unwrap();
    assert_eq!(store.model(), LoadState::Success("Loaded".into()));

    store.executor().cancel_all(None);

    let error = done_rx.await.unwrap().expect("cancellation expected");
    assert!(matches!(error, TransactionError::Canceled));
    assert_eq!(tx.state(), TransactionState::Canceled);
    assert_eq!(store.model(), LoadState::Error("canceled".into()));
}

// --- Scenario: parent and child reconciliation ---

#[derive(Clone, Debug)]
struct App {
    todo: Todo,
}

#[derive(Clone, Debug)]
struct Todo {
    done: bool,
}

struct MarkDone;

#[async_trait]
impl Action<Todo> for MarkDone {
    fn id(&self) -> ActionId {
        "mark_done".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Todo>) {
        ctx.mutate(|todo| todo.done = true);
        ctx.fulfill();
    }
}

#[tokio::test]
async fn child_mutation_reconciles_with_the_parent() {
    let store = Store::with_executor(
        App {
            todo: Todo { done: false },
        },
        Executor::new(),
    );
    let child = store.child(Lens::new(
        |app: &App| app.todo.clone(),
        |app, todo| app.todo = todo,
    ));

    let parent_notifications = Arc::new(AtomicUsize::new(0));
    store
        .observe({
            let seen = Arc::clone(&parent_notifications);
            move || {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        })
        .detach();

    child.run(MarkDone, ExecutionMode::Inline).await;
    flush_main(&store).await;

    assert!(child.model().done);
    assert!(store.model().todo.done);
    assert_eq!(parent_notifications.load(Ordering::SeqCst), 1);
}

// --- Scenario: diff of a label change ---

#[derive(Clone, Debug, Serialize)]
struct Labeled {
    label: String,
    #[serde(rename = "nullableLabel")]
    nullable_label: Option<String>,
    nested: Nested,
}

#[derive(Clone, Debug, Serialize)]
struct Nested {
    label: String,
}

struct UpdateLabel(&'static str);

#[async_trait]
impl Action<Labeled> for UpdateLabel {
    fn id(&self) -> ActionId {
        "update_label".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Labeled>) {
        let label = self.0;
        ctx.mutate(|model| {
            model.label = label.to_string();
            model.nested.label = label.to_string();
            model.nullable_label = None;
        });
        ctx.fulfill();
    }
}

#[tokio::test]
async fn label_change_publishes_the_expected_diff() {
    let store = Store::with_executor(
        Labeled {
            label: "Foo".into(),
            nullable_label: Some("Something".into()),
            nested: Nested {
                label: "Foo".into(),
            },
        },
        Executor::new(),
    );
    store.enable_diffing(DiffStrategy::Sync);

    let tx = store.run(UpdateLabel("Bar"), ExecutionMode::Inline).await;

    let diff = store.diffs().borrow().clone().expect("diff published");
    assert_eq!(diff.transaction_id, tx.id());
    assert_eq!(diff.changes.len(), 3);
    assert_eq!(
        diff.changes[&path("label")],
        PropertyDiff::Changed {
            old: json!("Foo"),
            new: json!("Bar"),
        }
    );
    assert_eq!(
        diff.changes[&path("nested/label")],
        PropertyDiff::Changed {
            old: json!("Foo"),
            new: json!("Bar"),
        }
    );
    assert_eq!(
        diff.changes[&path("nullableLabel")],
        PropertyDiff::Removed
    );
}

// --- Scenario: throttled action ---

#[tokio::test(start_paused = true)]
async fn throttled_submissions_coalesce_into_one_execution() {
    let store = Store::with_executor(Counter { count: 0 }, Executor::new());
    let executions = Arc::new(AtomicUsize::new(0));

    struct Bump {
        executions: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Action<Counter> for Bump {
        fn id(&self) -> ActionId {
            "bump".into()
        }

        async fn reduce(&self, ctx: &TransactionContext<Counter>) {
            self.executions.fetch_add(1, Ordering::SeqCst);
            ctx.mutate(|counter| counter.count += 1);
            ctx.fulfill();
        }
    }

    let throttle = Some(Duration::from_millis(500));
    let mut transactions = Vec::new();
    for _ in 0..3 {
        transactions.push(
            store
                .run_with(
                    Bump {
                        executions: Arc::clone(&executions),
                    },
                    ExecutionMode::Background(None),
                    throttle,
                    None,
                )
                .await,
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(store.model().count, 1);
    // The two superseded submissions received their cancellation.
    assert_eq!(transactions[0].state(), TransactionState::Canceled);
    assert_eq!(transactions[1].state(), TransactionState::Canceled);
    assert_eq!(transactions[2].state(), TransactionState::Completed);
}

// --- State machine across the stack ---

#[tokio::test]
async fn observed_states_are_a_prefix_of_the_machine() {
    let store = Store::with_executor(Counter { count: 0 }, Executor::new());
    let recorder = Arc::new(RecordingMiddleware::new());
    store.register_middleware(recorder.clone());

    let tx = store.run(Increase { amount: 1 }, ExecutionMode::Inline).await;

    assert_eq!(
        recorder.states_for(&tx.id()),
        vec![TransactionState::Started, TransactionState::Completed]
    );
}
