//! The transaction state machine and the snapshot record middleware sees.

use crate::id::{ActionId, QueueName, TransactionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one transaction.
///
/// Transitions are monotonic: `Pending → Started → Completed`, except that
/// `Canceled` is reachable from both `Pending` and `Started`. Once a
/// transaction is `Completed` or `Canceled` it never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Created but not yet started by the executor.
    Pending,
    /// The reducer is running (or deferred work is still outstanding).
    Started,
    /// The reducer fulfilled and the operation finished.
    Completed,
    /// The transaction was canceled before or during execution.
    Canceled,
}

impl TransactionState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// How the executor schedules a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Execute on the main serial queue. If the caller is already on the
    /// main queue the operation runs inline; either way the caller awaits
    /// the finish.
    Main,
    /// Execute inline in the calling task and await the finish. Ignores
    /// queues entirely.
    Inline,
    /// Enqueue on a named background queue (the default queue when `None`)
    /// and return without awaiting.
    Background(Option<QueueName>),
}

impl ExecutionMode {
    /// The default background queue.
    pub fn background() -> Self {
        Self::Background(None)
    }
}

/// Immutable snapshot of a transaction at one state transition, delivered
/// to every registered [`Middleware`](crate::middleware::Middleware).
///
/// The record carries ids rather than live handles: middleware may retain
/// it beyond the transaction's lifetime (the logging middleware keys its
/// start-time map on `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// The transaction's push id.
    pub id: TransactionId,
    /// The action the transaction executes.
    pub action_id: ActionId,
    /// The state just entered.
    pub state: TransactionState,
    /// The scheduling mode the transaction was submitted with.
    pub mode: ExecutionMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!TransactionState::Pending.is_terminal());
        assert!(!TransactionState::Started.is_terminal());
        assert!(TransactionState::Completed.is_terminal());
        assert!(TransactionState::Canceled.is_terminal());
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&TransactionState::Started).unwrap();
        assert_eq!(json, "\"started\"");
    }
}
