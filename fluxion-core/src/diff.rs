//! Diff value types — what the diff engine produces and the store publishes.

use crate::id::{ActionId, TransactionId};
use crate::path::FlatKeyPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A flat encoding: one entry per leaf of a nested map, keyed by path.
pub type FlatModel = BTreeMap<FlatKeyPath, serde_json::Value>;

/// How one leaf changed between two flat encodings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyDiff {
    /// The path exists only in the new encoding.
    Added {
        /// The new value.
        new: serde_json::Value,
    },
    /// The path exists in both encodings with different values.
    Changed {
        /// The previous value.
        old: serde_json::Value,
        /// The new value.
        new: serde_json::Value,
    },
    /// The path exists only in the old encoding.
    Removed,
}

/// The delta produced by one transaction against a diffing store.
///
/// Carries ids rather than a live transaction handle: a diff outlives its
/// transaction (the executor drops its strong reference at terminal state)
/// and the ids are the stable part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDiff {
    /// Id of the transaction that performed the mutation.
    pub transaction_id: TransactionId,
    /// Id of the action behind the transaction.
    pub action_id: ActionId,
    /// Per-path deltas, deterministically ordered.
    pub changes: BTreeMap<FlatKeyPath, PropertyDiff>,
}

impl TransactionDiff {
    /// Whether the mutation changed nothing.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changed paths.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Paths that were added.
    pub fn added(&self) -> impl Iterator<Item = &FlatKeyPath> {
        self.changes
            .iter()
            .filter(|(_, d)| matches!(d, PropertyDiff::Added { .. }))
            .map(|(p, _)| p)
    }

    /// Paths whose value changed.
    pub fn changed(&self) -> impl Iterator<Item = &FlatKeyPath> {
        self.changes
            .iter()
            .filter(|(_, d)| matches!(d, PropertyDiff::Changed { .. }))
            .map(|(p, _)| p)
    }

    /// Paths that were removed.
    pub fn removed(&self) -> impl Iterator<Item = &FlatKeyPath> {
        self.changes
            .iter()
            .filter(|(_, d)| matches!(d, PropertyDiff::Removed))
            .map(|(p, _)| p)
    }
}
