//! Combinators for composing transactions into dependency-wired groups.
//!
//! Sequencing is the default; concurrency is explicit:
//!
//! ```ignore
//! store
//!     .run_group(
//!         sequential([
//!             fetch.into(),
//!             concurrent([decode_a.into(), decode_b.into()]),
//!             throttled(Duration::from_millis(250), persist.into()),
//!         ]),
//!         None,
//!     )
//!     .await;
//! ```

use crate::transaction::{Transaction, TransactionHandle};
use std::sync::Arc;
use std::time::Duration;

/// A composable group of transactions.
///
/// Flattening wires dependencies: in a [`sequential`] group, every
/// transaction of an element depends on every transaction of the
/// preceding element; in a [`concurrent`] group the elements share the
/// predecessor set without depending on each other; [`throttled`] applies
/// its delay to every contained transaction.
pub enum TransactionGroup {
    /// One transaction.
    Single(Arc<dyn TransactionHandle>),
    /// Elements run one after another.
    Sequential(Vec<TransactionGroup>),
    /// Elements run side by side.
    Concurrent(Vec<TransactionGroup>),
    /// A group with a throttle delay applied to every transaction in it.
    Throttle(Duration, Box<TransactionGroup>),
}

/// Group elements to run one after another.
pub fn sequential(items: impl IntoIterator<Item = TransactionGroup>) -> TransactionGroup {
    TransactionGroup::Sequential(items.into_iter().collect())
}

/// Group elements to run side by side.
pub fn concurrent(items: impl IntoIterator<Item = TransactionGroup>) -> TransactionGroup {
    TransactionGroup::Concurrent(items.into_iter().collect())
}

/// Apply `delay` as the throttle of every transaction in `group`.
pub fn throttled(delay: Duration, group: TransactionGroup) -> TransactionGroup {
    TransactionGroup::Throttle(delay, Box::new(group))
}

impl<M: Clone + Send + Sync + 'static> From<Transaction<M>> for TransactionGroup {
    fn from(transaction: Transaction<M>) -> Self {
        Self::Single(transaction.handle())
    }
}

impl<M: Clone + Send + Sync + 'static> From<&Transaction<M>> for TransactionGroup {
    fn from(transaction: &Transaction<M>) -> Self {
        Self::Single(transaction.handle())
    }
}

impl TransactionGroup {
    /// Flatten into a submission list with dependencies pre-wired.
    /// Submitting the list to the executor yields the declared partial
    /// order.
    pub fn flatten(self) -> Vec<Arc<dyn TransactionHandle>> {
        let mut out = Vec::new();
        self.wire(&[], &mut out);
        out
    }

    /// Wire this element against `predecessors` and return every
    /// transaction it contains (the dependency surface seen by the next
    /// sequential element).
    fn wire(
        self,
        predecessors: &[Arc<dyn TransactionHandle>],
        out: &mut Vec<Arc<dyn TransactionHandle>>,
    ) -> Vec<Arc<dyn TransactionHandle>> {
        match self {
            Self::Single(transaction) => {
                for predecessor in predecessors {
                    transaction
                        .operation()
                        .add_dependency(&predecessor.operation());
                }
                out.push(Arc::clone(&transaction));
                vec![transaction]
            }
            Self::Sequential(items) => {
                let mut all = Vec::new();
                let mut preds = predecessors.to_vec();
                for item in items {
                    let transactions = item.wire(&preds, out);
                    preds = transactions.clone();
                    all.extend(transactions);
                }
                all
            }
            Self::Concurrent(items) => {
                let mut all = Vec::new();
                for item in items {
                    all.extend(item.wire(predecessors, out));
                }
                all
            }
            Self::Throttle(delay, inner) => {
                let transactions = inner.wire(predecessors, out);
                for transaction in &transactions {
                    transaction.set_throttle(Some(delay));
                }
                transactions
            }
        }
    }
}
