//! The Action capability — what user types supply to describe one state
//! change.

use crate::context::TransactionContext;
use async_trait::async_trait;
use fluxion_core::ActionId;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a pinned, boxed, Send future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A declarative description of one state change against a model `M`.
///
/// The reducer is called once per transaction. It may mutate the store
/// through the context, defer work (by awaiting, or by cloning the
/// context into a spawned task), and must eventually settle the
/// transaction with [`fulfill`](TransactionContext::fulfill) or
/// [`reject`](TransactionContext::reject); until then the operation
/// stays executing.
///
/// `cancel` is the compensation path, called at most once when the
/// transaction is canceled. It is expected to roll back or record the
/// interruption synchronously (through `ctx.mutate`); work that must
/// happen elsewhere can be spawned. The engine finishes the cancellation
/// after it returns, so completion handlers observe compensated state.
#[async_trait]
pub trait Action<M>: Send + Sync {
    /// Stable identifier for this action kind. Throttling and middleware
    /// key on it.
    fn id(&self) -> ActionId;

    /// The body: apply the state change.
    async fn reduce(&self, ctx: &TransactionContext<M>);

    /// Compensation when the transaction is canceled while executing.
    fn cancel(&self, ctx: &TransactionContext<M>) {
        let _ = ctx;
    }
}

/// Blanket implementation: shared actions are actions. Lets one action
/// value be submitted many times (`run_all`, repeated throttled runs).
#[async_trait]
impl<M: Send + Sync, A: Action<M> + ?Sized> Action<M> for Arc<A> {
    fn id(&self) -> ActionId {
        (**self).id()
    }

    async fn reduce(&self, ctx: &TransactionContext<M>) {
        (**self).reduce(ctx).await
    }

    fn cancel(&self, ctx: &TransactionContext<M>) {
        (**self).cancel(ctx)
    }
}

type InlineFn<M> =
    dyn for<'a> Fn(&'a TransactionContext<M>) -> BoxFuture<'a, ()> + Send + Sync;

type InlineCancelFn<M> = dyn Fn(&TransactionContext<M>) + Send + Sync;

/// A closure-based [`Action`] for call sites that don't warrant a named
/// type.
///
/// ```ignore
/// let increase = InlineAction::new("increase", |ctx| {
///     Box::pin(async move {
///         ctx.mutate(|m: &mut Counter| m.count += 1);
///         ctx.fulfill();
///     })
/// });
/// ```
pub struct InlineAction<M> {
    id: ActionId,
    reduce: Arc<InlineFn<M>>,
    cancel: Option<Arc<InlineCancelFn<M>>>,
}

impl<M: Send + Sync> InlineAction<M> {
    /// Create an action from an id and a reducer closure.
    pub fn new<F>(id: impl Into<ActionId>, reduce: F) -> Self
    where
        F: for<'a> Fn(&'a TransactionContext<M>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            reduce: Arc::new(reduce),
            cancel: None,
        }
    }

    /// Attach a compensation closure.
    pub fn on_cancel<F>(mut self, cancel: F) -> Self
    where
        F: Fn(&TransactionContext<M>) + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(cancel));
        self
    }
}

#[async_trait]
impl<M: Send + Sync> Action<M> for InlineAction<M> {
    fn id(&self) -> ActionId {
        self.id.clone()
    }

    async fn reduce(&self, ctx: &TransactionContext<M>) {
        (self.reduce)(ctx).await;
    }

    fn cancel(&self, ctx: &TransactionContext<M>) {
        if let Some(cancel) = &self.cancel {
            cancel(ctx);
        }
    }
}
