//! The scheduling primitive: a cancelable unit of work with dependencies.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Lifecycle of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Created; may still gain dependencies.
    Ready,
    /// The reducer is running (or has deferred work outstanding).
    Executing,
    /// Finished normally.
    Finished,
    /// Canceled before or during execution.
    Canceled,
}

impl OperationState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Canceled)
    }
}

type TerminalHook = Box<dyn FnOnce(OperationState) + Send>;

/// A cancelable unit of work forming one node of the dependency DAG.
///
/// An operation may not start until every prerequisite is terminal;
/// canceled prerequisites satisfy the contract, so dependents still start
/// (and typically short-circuit through the group error cell).
/// `finish` and `cancel` transition exactly once to their terminal state;
/// terminal hooks run exactly once, on the terminal transition.
///
/// Cloning an operation clones the handle, not the work.
#[derive(Clone)]
pub struct Operation {
    inner: Arc<OperationInner>,
}

struct OperationInner {
    state: Mutex<OperationState>,
    dependencies: Mutex<Vec<watch::Receiver<bool>>>,
    terminal_tx: watch::Sender<bool>,
    hooks: Mutex<Vec<TerminalHook>>,
}

impl Operation {
    /// Create a new operation in the `Ready` state.
    pub fn new() -> Self {
        let (terminal_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(OperationInner {
                state: Mutex::new(OperationState::Ready),
                dependencies: Mutex::new(Vec::new()),
                terminal_tx,
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> OperationState {
        *self.inner.state.lock().expect("operation state lock poisoned")
    }

    /// Whether the operation reached `Finished` or `Canceled`.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Add a prerequisite: this operation will not start until `other` is
    /// terminal.
    ///
    /// # Panics
    ///
    /// Panics if this operation has already started — adding a dependency
    /// after start is a contract violation, not a runtime condition.
    pub fn add_dependency(&self, other: &Operation) {
        let state = self.state();
        assert!(
            state == OperationState::Ready,
            "add_dependency called on an operation that already started ({state:?})"
        );
        self.inner
            .dependencies
            .lock()
            .expect("operation dependency lock poisoned")
            .push(other.subscribe_terminal());
    }

    /// A receiver that observes the terminal transition.
    pub(crate) fn subscribe_terminal(&self) -> watch::Receiver<bool> {
        self.inner.terminal_tx.subscribe()
    }

    /// Wait until every prerequisite is terminal.
    pub async fn wait_dependencies(&self) {
        let deps: Vec<watch::Receiver<bool>> = self
            .inner
            .dependencies
            .lock()
            .expect("operation dependency lock poisoned")
            .clone();
        for mut rx in deps {
            while !*rx.borrow_and_update() {
                // A dropped sender means the prerequisite is gone; treat
                // it as satisfied rather than waiting forever.
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    /// Wait until this operation is terminal.
    pub async fn wait_terminal(&self) {
        let mut rx = self.subscribe_terminal();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Register a hook to run on the terminal transition. Hooks run in
    /// registration order; a hook registered after the operation is
    /// already terminal runs immediately.
    pub fn on_terminal(&self, hook: impl FnOnce(OperationState) + Send + 'static) {
        // Holding the state lock across the push keeps the registration
        // ordered against the terminal transition: if the state is not yet
        // terminal here, the eventual drain must include this hook.
        let state = self.inner.state.lock().expect("operation state lock poisoned");
        if state.is_terminal() {
            let s = *state;
            drop(state);
            hook(s);
        } else {
            self.inner
                .hooks
                .lock()
                .expect("operation hook lock poisoned")
                .push(Box::new(hook));
        }
    }

    /// Ready→Executing. Returns `false` when the operation was already
    /// canceled (or finished), in which case it must not run.
    pub(crate) fn begin(&self) -> bool {
        let mut state = self.inner.state.lock().expect("operation state lock poisoned");
        if *state == OperationState::Ready {
            *state = OperationState::Executing;
            true
        } else {
            false
        }
    }

    /// Transition to `Finished`. No-op if already terminal.
    pub fn finish(&self) {
        {
            let mut state = self.inner.state.lock().expect("operation state lock poisoned");
            if state.is_terminal() {
                return;
            }
            *state = OperationState::Finished;
        }
        self.fire_terminal(OperationState::Finished);
    }

    /// First phase of cancellation: transition to `Canceled` and return
    /// the prior state so the caller can run compensation when the
    /// operation was executing. Returns `None` if already terminal.
    ///
    /// The caller must follow up with [`complete_cancel`](Self::complete_cancel)
    /// once compensation is done; terminal hooks and the terminal signal
    /// fire there, so barriers observe compensated state.
    pub(crate) fn begin_cancel(&self) -> Option<OperationState> {
        let mut state = self.inner.state.lock().expect("operation state lock poisoned");
        if state.is_terminal() {
            return None;
        }
        let prior = *state;
        *state = OperationState::Canceled;
        Some(prior)
    }

    /// Second phase of cancellation: fire terminal hooks and wake waiters.
    pub(crate) fn complete_cancel(&self) {
        self.fire_terminal(OperationState::Canceled);
    }

    fn fire_terminal(&self, state: OperationState) {
        let hooks: Vec<TerminalHook> = std::mem::take(
            &mut *self.inner.hooks.lock().expect("operation hook lock poisoned"),
        );
        for hook in hooks {
            hook(state);
        }
        self.inner.terminal_tx.send_replace(true);
    }
}

impl Default for Operation {
    fn default() -> Self {
        Self::new()
    }
}
