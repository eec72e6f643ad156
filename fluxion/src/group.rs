//! Shared error state for transactions submitted together.

use fluxion_core::TransactionError;
use std::collections::HashMap;
use std::sync::Mutex;

/// A shared, mutex-protected cell visible to every transaction of one
/// `run` batch.
///
/// The first recorded error wins; later errors are dropped. Subsequent
/// actions short-circuit idiomatically at the head of their reducer:
///
/// ```ignore
/// if ctx.reject_on_previous() {
///     return;
/// }
/// ```
///
/// `user_info` is a free-form side channel between actions of one batch.
pub struct GroupError {
    inner: Mutex<GroupState>,
}

struct GroupState {
    first_error: Option<TransactionError>,
    user_info: HashMap<String, serde_json::Value>,
}

impl GroupError {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GroupState {
                first_error: None,
                user_info: HashMap::new(),
            }),
        }
    }

    /// Record `error` iff no error is recorded yet. Returns whether this
    /// call recorded it.
    pub fn record(&self, error: TransactionError) -> bool {
        let mut state = self.inner.lock().expect("group error lock poisoned");
        if state.first_error.is_none() {
            state.first_error = Some(error);
            true
        } else {
            false
        }
    }

    /// The first recorded error, if any.
    pub fn first_error(&self) -> Option<TransactionError> {
        self.inner
            .lock()
            .expect("group error lock poisoned")
            .first_error
            .clone()
    }

    /// Whether an error has been recorded.
    pub fn has_error(&self) -> bool {
        self.inner
            .lock()
            .expect("group error lock poisoned")
            .first_error
            .is_some()
    }

    /// Read a `user_info` entry.
    pub fn user_info(&self, key: &str) -> Option<serde_json::Value> {
        self.inner
            .lock()
            .expect("group error lock poisoned")
            .user_info
            .get(key)
            .cloned()
    }

    /// Write a `user_info` entry.
    pub fn set_user_info(&self, key: impl Into<String>, value: serde_json::Value) {
        self.inner
            .lock()
            .expect("group error lock poisoned")
            .user_info
            .insert(key.into(), value);
    }
}

impl Default for GroupError {
    fn default() -> Self {
        Self::new()
    }
}
