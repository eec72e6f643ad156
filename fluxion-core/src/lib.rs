//! # fluxion-core — value types and protocol surface for fluxion
//!
//! This crate defines the vocabulary shared by every fluxion crate: ids,
//! the transaction state machine, the error taxonomy, flat key paths, diff
//! value types, and the [`Middleware`] trait. It carries no scheduling or
//! storage machinery — those live in `fluxion` (the engine) and
//! `fluxion-diff` (the codec).
//!
//! | Concern | Types |
//! |---------|-------|
//! | Identity | [`TransactionId`], [`ActionId`], [`QueueName`], [`PushIdGenerator`] |
//! | Lifecycle | [`TransactionState`], [`ExecutionMode`], [`TransactionRecord`] |
//! | Errors | [`TransactionError`], [`PathParseError`] |
//! | Paths | [`FlatKeyPath`], [`Segment`] |
//! | Diffs | [`FlatModel`], [`PropertyDiff`], [`TransactionDiff`] |
//! | Observation | [`Middleware`], [`signpost`] constants |
//!
//! ## Dependency notes
//!
//! Extension payloads (group-error `user_info`, diff values) are
//! `serde_json::Value`. JSON is the interchange format the rest of the
//! stack already speaks, and `Value` keeps the traits object-safe where a
//! generic `T: Serialize` would not.

#![deny(missing_docs)]

pub mod diff;
pub mod error;
pub mod id;
pub mod middleware;
pub mod path;
pub mod state;

pub use diff::{FlatModel, PropertyDiff, TransactionDiff};
pub use error::{PathParseError, TransactionError};
pub use id::{ActionId, PushIdGenerator, QueueName, TransactionId, PUSH_ID_ALPHABET};
pub use middleware::{signpost, Middleware};
pub use path::{FlatKeyPath, Segment};
pub use state::{ExecutionMode, TransactionRecord, TransactionState};
