//! Reactive Runtime
//!
//! The runtime holds the per-thread hooks the core calls out to:
//!
//! - the [`Scheduler`] that receives deferred Computations,
//! - the [`ErrorReporter`] that receives failures of `user` Computations,
//! - the global "observation enabled" toggle consulted by `observe`.
//!
//! # Thread Safety
//!
//! Like the active-computation stack, these hooks are thread-local. Each
//! logical evaluation thread configures its own scheduler and reporter;
//! shared values can still move between threads.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use super::owner::Owner;
use super::scheduler::BatchScheduler;
use super::Computation;
use crate::error::Error;

/// Receives Computations whose execution is deferred.
///
/// Implementations must run each queued Computation at most once per batch
/// by calling [`Computation::run`]. `run` itself refuses to execute torn-down
/// Computations.
pub trait Scheduler: Send + Sync {
    fn enqueue(&self, computation: Computation);
}

/// Receives errors raised by `user` Computations.
pub trait ErrorReporter: Send + Sync {
    /// `phase` describes where the error happened, e.g.
    /// `getter for watcher "a.b"`.
    fn report(&self, error: &Error, owner: &Owner, phase: &str);
}

/// Reporter that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &Error, owner: &Owner, phase: &str) {
        tracing::error!(owner = %owner.name(), phase, %error, "error in {}", phase);
    }
}

struct RuntimeState {
    scheduler: RefCell<Arc<dyn Scheduler>>,
    reporter: RefCell<Arc<dyn ErrorReporter>>,
    observing: Cell<bool>,
}

thread_local! {
    static STATE: RuntimeState = RuntimeState {
        scheduler: RefCell::new(Arc::new(BatchScheduler::unattended())),
        reporter: RefCell::new(Arc::new(LogReporter)),
        observing: Cell::new(true),
    };
}

/// Access point for the per-thread runtime hooks.
pub struct Runtime;

impl Runtime {
    /// Install the scheduler for this thread, returning the previous one.
    ///
    /// The default is a [`BatchScheduler`] that nobody flushes. It releases
    /// torn-down Computations and logs at debug level when work is queued;
    /// hosts that use deferred Computations install their own.
    pub fn set_scheduler(scheduler: Arc<dyn Scheduler>) -> Arc<dyn Scheduler> {
        STATE.with(|state| state.scheduler.replace(scheduler))
    }

    /// The scheduler installed for this thread.
    pub fn scheduler() -> Arc<dyn Scheduler> {
        STATE.with(|state| state.scheduler.borrow().clone())
    }

    /// Install the error reporter for this thread, returning the previous one.
    pub fn set_error_reporter(reporter: Arc<dyn ErrorReporter>) -> Arc<dyn ErrorReporter> {
        STATE.with(|state| state.reporter.replace(reporter))
    }

    /// The error reporter installed for this thread.
    pub fn error_reporter() -> Arc<dyn ErrorReporter> {
        STATE.with(|state| state.reporter.borrow().clone())
    }

    /// Hand `computation` to the installed scheduler.
    pub(crate) fn enqueue(computation: Computation) {
        // Clone the handle out first: enqueue may re-enter the runtime.
        let scheduler = Self::scheduler();
        scheduler.enqueue(computation);
    }

    pub(crate) fn report(error: &Error, owner: &Owner, phase: &str) {
        let reporter = Self::error_reporter();
        reporter.report(error, owner, phase);
    }

    /// Globally enable or disable creation of new observers on this thread.
    pub fn set_observation_enabled(enabled: bool) {
        STATE.with(|state| state.observing.set(enabled));
    }

    /// Whether `observe` may create new observers on this thread.
    pub fn is_observation_enabled() -> bool {
        STATE.with(|state| state.observing.get())
    }

    /// Run `f` with observation disabled, restoring the previous setting
    /// afterwards. Values assigned inside are stored as-is.
    pub fn without_observation<R>(f: impl FnOnce() -> R) -> R {
        struct Restore(bool);
        impl Drop for Restore {
            fn drop(&mut self) {
                Runtime::set_observation_enabled(self.0);
            }
        }

        let _restore = Restore(Self::is_observation_enabled());
        Self::set_observation_enabled(false);
        f()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Reporter that records every phase it receives.
    #[derive(Default)]
    pub(crate) struct RecordingReporter {
        pub(crate) phases: Mutex<Vec<String>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, _error: &Error, _owner: &Owner, phase: &str) {
            self.phases.lock().push(phase.to_string());
        }
    }
}
