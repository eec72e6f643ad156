#![deny(missing_docs)]
//! # fluxion — a unidirectional state container
//!
//! A store owns a single value-type model; actions mutate it through
//! transactions; observers hear about every change on the main serial
//! queue. On top of that Flux-shaped core sit three engines:
//!
//! - an **executor** scheduling transactions across three modes
//!   (cooperative main queue, synchronous inline, named background
//!   queues), with dependency DAGs, per-action throttling, and structured
//!   group cancellation sharing one error cell;
//! - a **store graph** projecting a parent model's subtree into child
//!   stores through [`Lens`] values, with a single source of truth and
//!   ordered notifications on both sides;
//! - a **diffing layer** publishing a flat path→value delta of every
//!   mutation of a serializable model, synchronously or on a serial diff
//!   queue.
//!
//! ```ignore
//! let executor = Executor::new();
//! let store = Store::with_executor(Counter { count: 0 }, executor);
//! store.run(Increase { amount: 42 }, ExecutionMode::Inline).await;
//! assert_eq!(store.model().count, 42);
//! ```
//!
//! Value types (ids, states, errors, paths, diffs) live in
//! [`fluxion_core`] and are re-exported here; the flat-encoding codec
//! lives in [`fluxion_diff`].

pub mod action;
pub mod context;
pub mod diffing;
pub mod dsl;
pub mod executor;
pub mod group;
pub mod logging;
pub mod operation;
pub mod queue;
pub mod storage;
pub mod store;
mod throttle;
pub mod transaction;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use action::{Action, BoxFuture, InlineAction};
pub use context::TransactionContext;
pub use diffing::DiffStrategy;
pub use dsl::{concurrent, sequential, throttled, TransactionGroup};
pub use executor::{CompletionHandler, Executor};
pub use group::GroupError;
pub use logging::LoggingMiddleware;
pub use operation::{Operation, OperationState};
pub use queue::{is_main, Queue};
pub use storage::Lens;
pub use store::{ObserverHandle, Store};
pub use transaction::{Transaction, TransactionHandle};

// Re-export the shared vocabulary so downstream crates can depend on
// `fluxion` alone.
pub use fluxion_core::{
    signpost, ActionId, ExecutionMode, FlatKeyPath, FlatModel, Middleware, PropertyDiff,
    QueueName, Segment, TransactionDiff, TransactionError, TransactionId, TransactionRecord,
    TransactionState,
};
