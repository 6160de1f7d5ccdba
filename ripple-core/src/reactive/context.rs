//! Reactive Context
//!
//! The reactive context tracks which Computation is currently running, so
//! that reactive reads can attribute themselves to it without a context
//! parameter threaded through every accessor.
//!
//! # Implementation
//!
//! Each thread has an `active` slot plus a stack of suspended Computations.
//! `push` parks the previous active Computation on the stack and activates
//! the new one; `pop` reactivates whatever is on top of the stack (or
//! nothing). This supports nested evaluation, e.g. a render computation that
//! reads a lazily computed value: reads during the nested run attribute to
//! the nested Computation, and attribution reverts to the outer one when it
//! completes.
//!
//! The stack must stay balanced on every exit path, including panics.
//! `ReactiveContext::enter` returns a guard that pops on drop.

use std::cell::RefCell;

use super::computation::Computation;

thread_local! {
    static ACTIVE: RefCell<Option<Computation>> = const { RefCell::new(None) };
    static STACK: RefCell<Vec<Computation>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    computation: Computation,
}

impl ReactiveContext {
    /// Make `computation` the active one until the guard is dropped.
    pub fn enter(computation: Computation) -> Self {
        Self::push(computation.clone());
        Self { computation }
    }

    /// Activate `computation`, parking the previous one.
    pub fn push(computation: Computation) {
        let previous = ACTIVE.with(|active| active.borrow_mut().replace(computation));
        if let Some(previous) = previous {
            STACK.with(|stack| stack.borrow_mut().push(previous));
        }
    }

    /// Reactivate the most recently parked Computation, or none.
    pub fn pop() {
        let restored = STACK.with(|stack| stack.borrow_mut().pop());
        ACTIVE.with(|active| *active.borrow_mut() = restored);
    }

    /// The active Computation, if any.
    pub fn current() -> Option<Computation> {
        ACTIVE.with(|active| active.borrow().clone())
    }

    /// Check if there is an active Computation.
    pub fn is_active() -> bool {
        ACTIVE.with(|active| active.borrow().is_some())
    }

    /// Number of Computations on this thread, active one included.
    pub fn depth() -> usize {
        let parked = STACK.with(|stack| stack.borrow().len());
        parked + usize::from(Self::is_active())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Verify we're popping the right context.
        debug_assert!(
            Self::current().is_some_and(|c| c.ptr_eq(&self.computation)),
            "ReactiveContext mismatch for computation {}",
            self.computation.id()
        );
        Self::pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Owner, WatchOptions, WatchSource};
    use crate::value::Value;

    fn lazy(owner: &Owner) -> Computation {
        Computation::new(
            owner,
            WatchSource::getter(|_| Ok(Value::Undefined)),
            None,
            WatchOptions::default().lazy(),
        )
        .unwrap()
    }

    #[test]
    fn context_tracks_computation() {
        let owner = Owner::detached("context-test");
        let computation = lazy(&owner);

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current().is_none());

        {
            let _ctx = ReactiveContext::enter(computation.clone());
            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(computation.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        let owner = Owner::detached("context-test");
        let outer = lazy(&owner);
        let inner = lazy(&owner);

        {
            let _outer = ReactiveContext::enter(outer.clone());
            assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(outer.id()));

            {
                let _inner = ReactiveContext::enter(inner.clone());
                assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(inner.id()));
                assert_eq!(ReactiveContext::depth(), 2);
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current().map(|c| c.id()), Some(outer.id()));
        }

        assert!(ReactiveContext::current().is_none());
    }

    #[test]
    fn pop_on_empty_stack_clears_active() {
        let owner = Owner::detached("context-test");
        ReactiveContext::push(lazy(&owner));
        ReactiveContext::pop();
        assert!(!ReactiveContext::is_active());

        ReactiveContext::pop();
        assert!(!ReactiveContext::is_active());
    }
}
