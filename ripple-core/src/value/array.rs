//! Shared array handles with intercepted mutation.
//!
//! Arrays cannot install accessors on their elements, so observation works
//! at the level of the whole array: the mutating operations below are the
//! interception points. Once an array is observed, each call
//!
//! 1. performs the native effect,
//! 2. observes any newly inserted elements,
//! 3. notifies the array's own Subject exactly once.
//!
//! Before observation they behave like plain vector operations.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::Value;
use crate::error::{Error, Result};
use crate::observer::{observe, Observer};

struct ArrayInner {
    items: RwLock<Vec<Value>>,
    extensible: AtomicBool,
    observer: OnceLock<Arc<Observer>>,
}

/// Handle to a shared, ordered list of values.
#[derive(Clone)]
pub struct ArrayRef {
    inner: Arc<ArrayInner>,
}

impl ArrayRef {
    /// Create an empty array.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Wrap `items` without observing them.
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                items: RwLock::new(items),
                extensible: AtomicBool::new(true),
                observer: OnceLock::new(),
            }),
        }
    }

    /// Number of elements. Not tracked.
    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    /// Read an element. Element reads are not tracked individually; a
    /// computation depends on an array through the property that holds it.
    pub fn get(&self, index: usize) -> Value {
        self.inner.items.read().get(index).cloned().unwrap_or_default()
    }

    /// Snapshot of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// Append one element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        self.push_all([value.into()])
    }

    /// Append every element of `values` in order, notifying once. Returns the
    /// new length.
    pub fn push_all<I>(&self, values: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.ensure_extensible()?;
        let inserted: Vec<Value> = values.into_iter().map(Into::into).collect();
        let len = {
            let mut items = self.inner.items.write();
            items.extend(inserted.iter().cloned());
            items.len()
        };
        self.intercepted(&inserted)?;
        Ok(len)
    }

    /// Remove the last element. Returns `Undefined` on an empty array.
    pub fn pop(&self) -> Result<Value> {
        self.ensure_extensible()?;
        let removed = self.inner.items.write().pop().unwrap_or_default();
        self.intercepted(&[])?;
        Ok(removed)
    }

    /// Remove the first element.
    pub fn shift(&self) -> Result<Value> {
        self.ensure_extensible()?;
        let removed = {
            let mut items = self.inner.items.write();
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        };
        self.intercepted(&[])?;
        Ok(removed)
    }

    /// Prepend one element. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        self.unshift_all([value.into()])
    }

    /// Prepend `values`, keeping their order, notifying once. Returns the new
    /// length.
    pub fn unshift_all<I>(&self, values: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.ensure_extensible()?;
        let inserted: Vec<Value> = values.into_iter().map(Into::into).collect();
        let len = {
            let mut items = self.inner.items.write();
            items.splice(0..0, inserted.iter().cloned());
            items.len()
        };
        self.intercepted(&inserted)?;
        Ok(len)
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place. Out-of-range arguments are clamped. Returns the removed
    /// elements.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Result<Vec<Value>> {
        self.ensure_extensible()?;
        let removed = {
            let mut current = self.inner.items.write();
            let start = start.min(current.len());
            let end = start + delete_count.min(current.len() - start);
            current.splice(start..end, items.iter().cloned()).collect()
        };
        self.intercepted(&items)?;
        Ok(removed)
    }

    /// Sort by string conversion, `Undefined` last.
    pub fn sort(&self) -> Result<()> {
        self.sort_by(|a, b| match (a, b) {
            (Value::Undefined, Value::Undefined) => CmpOrdering::Equal,
            (Value::Undefined, _) => CmpOrdering::Greater,
            (_, Value::Undefined) => CmpOrdering::Less,
            _ => a.to_string().cmp(&b.to_string()),
        })
    }

    /// Stable sort with a comparator.
    ///
    /// The comparator runs without the array locked, so it may read other
    /// reactive values (or this array) freely.
    pub fn sort_by<F>(&self, mut compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> CmpOrdering,
    {
        self.ensure_extensible()?;
        let mut items = self.to_vec();
        items.sort_by(&mut compare);
        *self.inner.items.write() = items;
        self.intercepted(&[])
    }

    /// Reverse the elements in place.
    pub fn reverse(&self) -> Result<()> {
        self.ensure_extensible()?;
        self.inner.items.write().reverse();
        self.intercepted(&[])
    }

    /// Grow to at least `len` elements, filling with `Undefined`. Like
    /// assigning `length`, this is not an intercepted operation.
    pub(crate) fn grow_to(&self, len: usize) -> Result<()> {
        self.ensure_extensible()?;
        let mut items = self.inner.items.write();
        if items.len() < len {
            items.resize(len, Value::Undefined);
        }
        Ok(())
    }

    fn ensure_extensible(&self) -> Result<()> {
        if self.is_extensible() {
            Ok(())
        } else {
            Err(Error::NotExtensible)
        }
    }

    /// Post-mutation hook of the intercepted operations.
    fn intercepted(&self, inserted: &[Value]) -> Result<()> {
        let Some(observer) = self.observer() else {
            return Ok(());
        };
        for value in inserted {
            observe(value, false);
        }
        observer.subject().notify()
    }

    /// Arrays have no per-property flags; both calls simply clear the
    /// extensible flag.
    pub fn prevent_extensions(&self) {
        self.inner.extensible.store(false, Ordering::SeqCst);
    }

    /// Same as [`ArrayRef::prevent_extensions`].
    pub fn freeze(&self) {
        self.prevent_extensions();
    }

    /// `false` once frozen.
    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.load(Ordering::SeqCst)
    }

    /// The observer attached by [`crate::observe`], if any.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        self.inner.observer.get().cloned()
    }

    pub(crate) fn observer_cell(&self) -> &OnceLock<Arc<Observer>> {
        &self.inner.observer
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address of the shared storage, for visited sets.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl Default for ArrayRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .field("len", &self.len())
            .field("observed", &self.inner.observer.get().is_some())
            .finish()
    }
}
