//! Error types shared across the engine.

use std::sync::Arc;
use thiserror::Error;

/// Errors that flow through the group error cell.
///
/// These are clonable by design: every transaction submitted in one batch
/// shares the same cell, and the first recorded error is handed to the
/// completion handler, to `reject_on_previous` callers, and to anyone
/// reading the cell mid-flight. Payloads are `Arc`-wrapped so cloning is
/// cheap and the source error survives.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum TransactionError {
    /// The transaction was canceled. Set automatically on cancellation if
    /// the group cell held no prior error.
    #[error("transaction canceled")]
    Canceled,

    /// An action rejected with a message.
    #[error("{0}")]
    Rejected(Arc<str>),

    /// Catch-all for user error types passed to `reject`.
    #[error("{0}")]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransactionError {
    /// Build a rejection from a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(Arc::from(message.into()))
    }

    /// Whether this error is the cancellation kind.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for TransactionError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(Arc::from(err))
    }
}

impl From<&str> for TransactionError {
    fn from(message: &str) -> Self {
        Self::rejected(message)
    }
}

impl From<String> for TransactionError {
    fn from(message: String) -> Self {
        Self::rejected(message)
    }
}

/// A flat key path failed to parse.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    /// A segment was empty (leading, trailing, or doubled separator).
    #[error("empty path segment in {0:?}")]
    EmptySegment(String),

    /// A segment contained a character outside `[A-Za-z0-9]`.
    #[error("invalid character {1:?} in path segment {0:?}")]
    InvalidCharacter(String, char),
}
