//! Model storage — root ownership or child projection through a lens.

use fluxion_core::TransactionRecord;
use std::sync::{Arc, RwLock};

/// A value projecting a child model out of a parent model: a getter/setter
/// pair.
///
/// Lenses are how a parent store's subtree becomes a child store. The
/// getter clones the subtree out; the setter writes a replacement back.
///
/// ```ignore
/// let todo = Lens::new(|app: &App| app.todo.clone(), |app, todo| app.todo = todo);
/// let child = store.child(todo);
/// ```
pub struct Lens<P, C> {
    get: Arc<dyn Fn(&P) -> C + Send + Sync>,
    set: Arc<dyn Fn(&mut P, C) + Send + Sync>,
}

impl<P, C> Lens<P, C> {
    /// Create a lens from a getter and a setter.
    pub fn new(
        get: impl Fn(&P) -> C + Send + Sync + 'static,
        set: impl Fn(&mut P, C) + Send + Sync + 'static,
    ) -> Self {
        Self {
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// Read the child value out of the parent.
    pub fn get(&self, parent: &P) -> C {
        (self.get)(parent)
    }

    /// Write a child value into the parent.
    pub fn set(&self, parent: &mut P, value: C) {
        (self.set)(parent, value)
    }
}

impl<P, C> Clone for Lens<P, C> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

/// A boxed in-place mutation of a model.
pub(crate) type MutateFn<M> = Box<dyn FnOnce(&mut M) + Send>;

type ChildRead<M> = Box<dyn Fn() -> M + Send + Sync>;
type ChildWrite<M> = Box<dyn Fn(Option<TransactionRecord>, MutateFn<M>) + Send + Sync>;

/// Where a store's model lives.
///
/// `Root` owns the model under an exclusive lock. `Child` owns nothing:
/// reads delegate to the parent through a lens and writes execute inside
/// the parent's own mutation path, so at any instant the logical value of
/// a child equals the projected subtree of its parent. There is no
/// caching copy.
pub(crate) enum ModelStorage<M> {
    Root(RwLock<M>),
    Child {
        read: ChildRead<M>,
        write: ChildWrite<M>,
    },
}

impl<M: Clone> ModelStorage<M> {
    pub fn root(model: M) -> Self {
        Self::Root(RwLock::new(model))
    }

    pub fn child(read: ChildRead<M>, write: ChildWrite<M>) -> Self {
        Self::Child { read, write }
    }

    /// A snapshot of the current model.
    pub fn read(&self) -> M {
        match self {
            Self::Root(lock) => lock.read().expect("model lock poisoned").clone(),
            Self::Child { read, .. } => read(),
        }
    }

    /// Atomic read-modify-write. For a child this routes through the
    /// parent's mutation path, carrying the attribution record along.
    pub fn mutate(&self, record: Option<TransactionRecord>, f: MutateFn<M>) {
        match self {
            Self::Root(lock) => {
                let mut model = lock.write().expect("model lock poisoned");
                f(&mut model);
            }
            Self::Child { write, .. } => write(record, f),
        }
    }
}
