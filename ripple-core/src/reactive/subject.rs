//! Subject Implementation
//!
//! A Subject is the publish point of one observable slot: a reactive
//! property, or the "self" slot of an observed object or array. It keeps an
//! ordered list of the Computations that read the slot during their last run.
//!
//! # How Subjects Work
//!
//! 1. When a reactive slot is read while a Computation is active, the slot
//!    calls `depend()`, which hands the Subject to the Computation's
//!    recording protocol (`Computation::add_dep`). The Computation decides
//!    whether to subscribe, which keeps the list free of duplicates.
//!
//! 2. When the slot changes, `notify()` snapshots the list and calls
//!    `update()` on every entry in order. Subscribers added or removed while
//!    the cycle runs do not affect it.
//!
//! # Memory Layout
//!
//! Each subject consists of:
//! - A unique ID (8 bytes)
//! - The subscriber list (grows with number of dependents)

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;

use super::computation::Computation;
use super::context::ReactiveContext;
use super::subscriber::SubjectId;
use crate::error::Result;

struct SubjectInner {
    id: SubjectId,
    subs: Mutex<Vec<Computation>>,
}

/// Publisher for a single observable slot.
///
/// Clones share the same subscriber list.
#[derive(Clone)]
pub struct Subject {
    inner: Arc<SubjectInner>,
}

impl Subject {
    /// Create a Subject with a fresh id and no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                id: SubjectId::new(),
                subs: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Unique id, used to deduplicate dependencies.
    pub fn id(&self) -> SubjectId {
        self.inner.id
    }

    /// Append a subscriber. Uniqueness is the caller's job.
    pub fn add_sub(&self, computation: Computation) {
        self.inner.subs.lock().push(computation);
    }

    /// Remove a subscriber by identity. No-op if absent.
    pub fn remove_sub(&self, computation: &Computation) {
        let mut subs = self.inner.subs.lock();
        if let Some(index) = subs.iter().position(|c| c.ptr_eq(computation)) {
            subs.remove(index);
        }
    }

    /// Record this Subject as a dependency of the active Computation.
    pub fn depend(&self) {
        if let Some(target) = ReactiveContext::current() {
            target.add_dep(self);
        }
    }

    /// Call `update()` on every subscriber of a snapshot of the list.
    ///
    /// An error from an internal Computation stops the cycle and is returned
    /// to the writer, the same way an exception would unwind the setter.
    pub fn notify(&self) -> Result<()> {
        let subs = self.inner.subs.lock().clone();
        for sub in &subs {
            sub.update()?;
        }
        Ok(())
    }

    /// Number of entries in the subscriber list.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subs.lock().len()
    }

    /// Whether `computation` is subscribed.
    pub fn has_subscriber(&self, computation: &Computation) -> bool {
        self.inner.subs.lock().iter().any(|c| c.ptr_eq(computation))
    }

    /// Number of times `computation` appears in the list.
    pub fn subscription_count(&self, computation: &Computation) -> usize {
        self.inner
            .subs
            .lock()
            .iter()
            .filter(|c| c.ptr_eq(computation))
            .count()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Subject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("id", &self.inner.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
