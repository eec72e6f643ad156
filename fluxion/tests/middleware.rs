use async_trait::async_trait;
use fluxion::{
    Action, ActionId, ExecutionMode, Executor, LoggingMiddleware, Middleware, Store,
    TransactionContext, TransactionRecord, TransactionState,
};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

#[derive(Clone, Debug)]
struct Counter {
    count: i64,
}

fn counter_store() -> Store<Counter> {
    Store::with_executor(Counter { count: 0 }, Executor::new())
}

struct Recorder {
    records: Mutex<Vec<TransactionRecord>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
        })
    }

    fn states(&self) -> Vec<TransactionState> {
        self.records.lock().unwrap().iter().map(|r| r.state).collect()
    }
}

impl Middleware for Recorder {
    fn on_transaction(&self, record: &TransactionRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

struct Increase;

#[async_trait]
impl Action<Counter> for Increase {
    fn id(&self) -> ActionId {
        "increase".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Counter>) {
        ctx.mutate(|counter| counter.count += 1);
        ctx.fulfill();
    }
}

struct Park {
    started: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl Action<Counter> for Park {
    fn id(&self) -> ActionId {
        "park".into()
    }

    async fn reduce(&self, ctx: &TransactionContext<Counter>) {
        if let Some(started) = self.started.lock().unwrap().take() {
            let _ = started.send(());
        }
        let (_keep, forever) = oneshot::channel::<()>();
        let _ = forever.await;
        let _ = ctx;
    }
}

// --- Transition sequences ---

#[tokio::test]
async fn completed_transactions_report_started_then_completed() {
    let store = counter_store();
    let recorder = Recorder::new();
    store.register_middleware(recorder.clone());

    store.run(Increase, ExecutionMode::Inline).await;

    assert_eq!(
        recorder.states(),
        vec![TransactionState::Started, TransactionState::Completed]
    );
}

#[tokio::test]
async fn canceled_transactions_report_canceled() {
    let store = counter_store();
    let recorder = Recorder::new();
    store.register_middleware(recorder.clone());
    let (started_tx, started_rx) = oneshot::channel();

    store
        .run(
            Park {
                started: Mutex::new(Some(started_tx)),
            },
            ExecutionMode::Background(None),
        )
        .await;
    started_rx.await.unwrap();
    store.executor().cancel_all(None);

    assert_eq!(
        recorder.states(),
        vec![TransactionState::Started, TransactionState::Canceled]
    );
}

// --- Registration semantics ---

#[tokio::test]
async fn registration_is_idempotent_by_identity() {
    let store = counter_store();
    let recorder = Recorder::new();
    store.register_middleware(recorder.clone());
    store.register_middleware(recorder.clone());

    store.run(Increase, ExecutionMode::Inline).await;

    // One delivery per transition, not two.
    assert_eq!(recorder.states().len(), 2);
}

#[tokio::test]
async fn unregistered_middleware_stops_hearing() {
    let store = counter_store();
    let recorder = Recorder::new();
    let as_middleware: Arc<dyn Middleware> = recorder.clone();
    store.register_middleware(as_middleware.clone());

    store.run(Increase, ExecutionMode::Inline).await;
    store.unregister_middleware(&as_middleware);
    store.run(Increase, ExecutionMode::Inline).await;

    assert_eq!(recorder.states().len(), 2);
}

#[tokio::test]
async fn middlewares_hear_in_registration_order() {
    let store = counter_store();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    struct Named {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }
    impl Middleware for Named {
        fn on_transaction(&self, _record: &TransactionRecord) {
            self.log.lock().unwrap().push(self.name);
        }
    }

    store.register_middleware(Arc::new(Named {
        name: "first",
        log: Arc::clone(&log),
    }));
    store.register_middleware(Arc::new(Named {
        name: "second",
        log: Arc::clone(&log),
    }));

    store.run(Increase, ExecutionMode::Inline).await;

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen, vec!["first", "second", "first", "second"]);
}

// --- Logging middleware ---

#[tokio::test]
async fn logging_middleware_observes_the_full_lifecycle() {
    let store = counter_store();
    store.register_middleware(Arc::new(LoggingMiddleware::new()));

    // Durations on completion, a cancellation line on cancel; both paths
    // must be clean without a subscriber installed.
    store.run(Increase, ExecutionMode::Inline).await;

    let (started_tx, started_rx) = oneshot::channel();
    store
        .run(
            Park {
                started: Mutex::new(Some(started_tx)),
            },
            ExecutionMode::Background(None),
        )
        .await;
    started_rx.await.unwrap();
    store.executor().cancel_all(None);
}
