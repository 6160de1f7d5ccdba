//! Owner Contexts
//!
//! Every Computation belongs to an Owner. The owner is the receiver handed
//! to getters and callbacks, keeps the registry of its live Computations,
//! and holds the root data value. Root data is observed with `as_root`, which
//! makes `set`/`delete` refuse late property additions on it.
//!
//! Computations keep their owner alive and the owner keeps its Computations
//! alive; `destroy()` (or tearing down every Computation) breaks the cycle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::computation::{CallbackFn, Computation, WatchOptions, WatchSource};
use super::computed::Computed;
use crate::error::{BoxError, Result};
use crate::observer::{self, observe};
use crate::value::Value;

struct OwnerInner {
    name: String,
    data: Value,
    computations: Mutex<Vec<Computation>>,
    being_destroyed: AtomicBool,
}

/// Owner of a group of Computations. Clones share the same owner.
#[derive(Clone)]
pub struct Owner {
    inner: Arc<OwnerInner>,
}

impl Owner {
    /// Create an owner whose root data is `data`, observing it as root data.
    pub fn new(name: impl Into<String>, data: impl Into<Value>) -> Self {
        let data = data.into();
        observe(&data, true);
        Self::with_data(name.into(), data)
    }

    /// An owner without root data, for Computations that only read values
    /// they capture themselves.
    pub fn detached(name: impl Into<String>) -> Self {
        Self::with_data(name.into(), Value::Undefined)
    }

    fn with_data(name: String, data: Value) -> Self {
        Self {
            inner: Arc::new(OwnerInner {
                name,
                data,
                computations: Mutex::new(Vec::new()),
                being_destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The root data value. Path watches start walking here.
    pub fn data(&self) -> Value {
        self.inner.data.clone()
    }

    pub(crate) fn register(&self, computation: Computation) {
        self.inner.computations.lock().push(computation);
    }

    pub(crate) fn unregister(&self, computation: &Computation) {
        let mut computations = self.inner.computations.lock();
        if let Some(index) = computations.iter().position(|c| c.ptr_eq(computation)) {
            computations.remove(index);
        }
    }

    /// Live Computations, in creation order.
    pub fn computations(&self) -> Vec<Computation> {
        self.inner.computations.lock().clone()
    }

    /// Number of live Computations.
    pub fn computation_count(&self) -> usize {
        self.inner.computations.lock().len()
    }

    /// Set once `destroy()` has started.
    pub fn is_being_destroyed(&self) -> bool {
        self.inner.being_destroyed.load(Ordering::SeqCst)
    }

    /// Watch a path or getter with a user callback.
    ///
    /// The Computation is always created in `user` mode, so getter and
    /// callback errors are reported instead of returned. With
    /// `options.immediate` the callback fires once right away with the
    /// current value and `Undefined` as the old value.
    pub fn watch(
        &self,
        source: impl Into<WatchSource>,
        callback: CallbackFn,
        options: WatchOptions,
    ) -> Result<Computation> {
        let options = options.user();
        let computation = Computation::new(self, source, Some(callback), options)?;
        if options.immediate {
            computation.invoke_callback(&computation.value(), &Value::Undefined)?;
        }
        Ok(computation)
    }

    /// Create a lazily computed value owned by this owner.
    pub fn computed<F>(&self, getter: F) -> Result<Computed>
    where
        F: Fn(&Owner) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        Computed::new(self, getter)
    }

    /// Tear down every Computation and release the root data. Idempotent.
    pub fn destroy(&self) {
        if self.inner.being_destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let computations = std::mem::take(&mut *self.inner.computations.lock());
        for computation in &computations {
            computation.teardown();
        }
        if let Some(observer) = observer::observer_of(&self.inner.data) {
            observer.release_root();
        }
        tracing::debug!(owner = %self.inner.name, torn_down = computations.len(), "owner destroyed");
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("name", &self.inner.name)
            .field("computation_count", &self.computation_count())
            .field("being_destroyed", &self.is_being_destroyed())
            .finish()
    }
}
