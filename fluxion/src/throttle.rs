//! Per-action-id minimum-delay gating with cancel-of-previous semantics.

use fluxion_core::ActionId;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

type Execute = Pin<Box<dyn std::future::Future<Output = ()> + Send>>;
type Supersede = Box<dyn FnOnce() + Send>;

/// Registry of throttlers keyed by action id.
///
/// A throttler is registered lazily on the first submission of an action
/// id with a positive delay, stamping `last_run` with the registration
/// instant. The very first submission is therefore itself delayed by the
/// window, and a burst of submissions coalesces into a single execution
/// roughly one window after the first.
///
/// Within any window of `min_delay` at most one execution runs; a pending
/// execution superseded by a newer submission receives its cancellation
/// callback instead of running.
#[derive(Clone)]
pub(crate) struct ThrottlerRegistry {
    inner: Arc<Mutex<HashMap<ActionId, Throttler>>>,
}

struct Throttler {
    min_delay: Duration,
    last_run: Instant,
    pending: Option<Pending>,
    next_token: u64,
}

struct Pending {
    token: u64,
    cancel: oneshot::Sender<()>,
}

impl ThrottlerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Submit work for `action`. Either runs `execute` (immediately when
    /// the window has elapsed, otherwise after `delay`) or hands the slot
    /// to a newer submission, in which case `on_supersede` is called.
    pub fn submit(&self, action: &ActionId, delay: Duration, execute: Execute, on_supersede: Supersede) {
        let now = Instant::now();
        let mut map = self.inner.lock().expect("throttler registry lock poisoned");
        let entry = map.entry(action.clone()).or_insert_with(|| Throttler {
            min_delay: delay,
            last_run: now,
            pending: None,
            next_token: 0,
        });
        entry.min_delay = delay;

        if let Some(previous) = entry.pending.take() {
            let _ = previous.cancel.send(());
        }

        if now.duration_since(entry.last_run) >= entry.min_delay {
            entry.last_run = now;
            drop(map);
            tokio::spawn(execute);
            return;
        }

        entry.next_token += 1;
        let token = entry.next_token;
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        entry.pending = Some(Pending {
            token,
            cancel: cancel_tx,
        });
        let wait = entry.min_delay;
        drop(map);

        let registry = self.clone();
        let action = action.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx => {
                    on_supersede();
                }
                _ = tokio::time::sleep(wait) => {
                    registry.mark_ran(&action, token);
                    execute.await;
                }
            }
        });
    }

    fn mark_ran(&self, action: &ActionId, token: u64) {
        let mut map = self.inner.lock().expect("throttler registry lock poisoned");
        if let Some(entry) = map.get_mut(action) {
            if entry.pending.as_ref().map(|p| p.token) == Some(token) {
                entry.pending = None;
            }
            entry.last_run = Instant::now();
        }
    }
}
