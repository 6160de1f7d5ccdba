//! Observable Graph
//!
//! This module turns plain value trees into reactive ones.
//!
//! # Overview
//!
//! `observe` attaches an [`Observer`] to an object or array, at most once:
//!
//! - Objects: every enumerable own property is converted into a reactive
//!   accessor (see [`define_reactive`]), recursively observing its value.
//! - Arrays: the mutating operations of [`ArrayRef`] start notifying, and
//!   every element is observed.
//!
//! The observer carries a "self" Subject used for whole-object notifications:
//! array mutations, and properties added or removed through [`set`] and
//! [`delete`]. A reactive property whose value is an observed object also
//! depends on that object's self Subject when read.
//!
//! # Design Decisions
//!
//! 1. The "already observed" tag lives in a private once-cell inside the
//!    shared object, not in its property table, so tagging never changes the
//!    visible shape of the object.
//!
//! 2. The tag is set before the children are walked. Cyclic graphs therefore
//!    terminate: the walk finds the tag on the way back up.
//!
//! 3. No observer is created for frozen or non-extensible values, internal
//!    framework objects, or while observation is disabled on this thread.

mod mutation;
mod property;
mod traverse;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::reactive::{Runtime, Subject};
use crate::value::{ArrayRef, ObjectRef, Value};

pub use mutation::{delete, set, Key};
pub use property::{define_reactive, define_reactive_with, WriteHook};
pub(crate) use property::ReactiveProperty;
pub use traverse::traverse;

/// Bookkeeping record attached once to every observed object or array.
#[derive(Debug)]
pub struct Observer {
    subject: Subject,
    /// Number of owners using the value as their root data.
    root_count: AtomicUsize,
}

impl Observer {
    fn new() -> Self {
        Self {
            subject: Subject::new(),
            root_count: AtomicUsize::new(0),
        }
    }

    /// The Subject notified on whole-object changes.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Number of owners using the value as root data.
    pub fn root_count(&self) -> usize {
        self.root_count.load(Ordering::SeqCst)
    }

    /// Whether some owner uses this value as its root data.
    pub fn is_root_data(&self) -> bool {
        self.root_count() > 0
    }

    fn retain_root(&self) {
        self.root_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release_root(&self) {
        let _ = self
            .root_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

/// Attach an observer to `value`, or return the one it already has.
///
/// Returns `None` for primitives and for values that cannot be observed
/// (non-extensible, internal, or observation disabled). With `as_root`, the
/// value is counted as root data of one more owner.
pub fn observe(value: &Value, as_root: bool) -> Option<Arc<Observer>> {
    let (cell, extensible, internal) = match value {
        Value::Object(obj) => (obj.observer_cell(), obj.is_extensible(), obj.is_internal()),
        Value::Array(arr) => (arr.observer_cell(), arr.is_extensible(), false),
        _ => return None,
    };

    let observer = match cell.get() {
        Some(existing) => existing.clone(),
        None if extensible && !internal && Runtime::is_observation_enabled() => {
            let mut created = false;
            let observer = cell
                .get_or_init(|| {
                    created = true;
                    Arc::new(Observer::new())
                })
                .clone();
            if created {
                tracing::trace!(kind = value.type_name(), subject = observer.subject.id().raw(), "observing value");
                match value {
                    Value::Object(obj) => walk(obj),
                    Value::Array(arr) => observe_array(arr),
                    _ => {}
                }
            }
            observer
        }
        None => return None,
    };

    if as_root {
        observer.retain_root();
    }
    Some(observer)
}

/// The observer of an object or array, if it has one.
pub fn observer_of(value: &Value) -> Option<Arc<Observer>> {
    match value {
        Value::Object(obj) => obj.observer(),
        Value::Array(arr) => arr.observer(),
        _ => None,
    }
}

/// Convert every enumerable own property of `obj` into a reactive accessor.
fn walk(obj: &ObjectRef) {
    for key in obj.keys() {
        let value = obj.get(&key);
        if let Err(err) = define_reactive(obj, &key, value, false) {
            tracing::trace!(key = %key, %err, "property left as-is");
        }
    }
}

fn observe_array(arr: &ArrayRef) {
    for item in arr.to_vec() {
        observe(&item, false);
    }
}

/// Depend on the self Subject of every observed element, recursing into
/// nested arrays. Array elements have no accessors of their own, so this is
/// how reading an array subscribes to mutations of its members.
pub(crate) fn depend_array(arr: &ArrayRef) {
    for item in arr.to_vec() {
        if let Some(observer) = observer_of(&item) {
            observer.subject().depend();
        }
        if let Value::Array(nested) = &item {
            depend_array(nested);
        }
    }
}
