//! Computed Values
//!
//! A computed value is a lazy Computation read through the standard
//! protocol:
//!
//! 1. If the Computation is dirty, `evaluate()` it.
//! 2. If another Computation is active, `depend()` so the reader subscribes
//!    to everything the computed value depends on.
//! 3. Return the cached value.
//!
//! Nothing is computed until the first read, and a change to a dependency
//! only marks the value dirty.

use std::fmt;

use super::computation::{Computation, WatchOptions, WatchSource};
use super::context::ReactiveContext;
use super::owner::Owner;
use crate::error::{BoxError, Result};
use crate::value::Value;

/// A cached derived value. Clones share the same Computation.
#[derive(Clone)]
pub struct Computed {
    computation: Computation,
}

impl Computed {
    /// Create a computed value. The getter does not run until the first read.
    pub fn new<F>(owner: &Owner, getter: F) -> Result<Self>
    where
        F: Fn(&Owner) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        let computation = Computation::new(owner, WatchSource::getter(getter), None, WatchOptions::default().lazy())?;
        Ok(Self { computation })
    }

    /// Read the value, recomputing if a dependency changed since the last
    /// read.
    pub fn get(&self) -> Result<Value> {
        if self.computation.is_dirty() {
            self.computation.evaluate()?;
        }
        if ReactiveContext::is_active() {
            self.computation.depend();
        }
        Ok(self.computation.value())
    }

    /// Whether the next read recomputes.
    pub fn is_dirty(&self) -> bool {
        self.computation.is_dirty()
    }

    /// The underlying lazy Computation.
    pub fn computation(&self) -> &Computation {
        &self.computation
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("computation", &self.computation)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
