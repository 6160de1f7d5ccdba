//! Reactive Primitives
//!
//! This module implements the subscriber side of the system: Subjects,
//! Computations, the active-computation context and the hooks the core
//! calls out to.
//!
//! # Concepts
//!
//! ## Subjects
//!
//! A Subject is the publish point of one observable slot. Reactive
//! properties and observed objects/arrays each own one. Reading the slot
//! while a Computation is active subscribes that Computation; writing it
//! notifies every subscriber.
//!
//! ## Computations
//!
//! A Computation runs a getter, remembers which Subjects it read, and reacts
//! when one of them notifies: lazily (mark dirty), synchronously (re-run
//! now) or deferred (hand to the scheduler).
//!
//! ## Computed Values
//!
//! A Computed wraps a lazy Computation so that reading it inside another
//! Computation forwards the dependencies to the reader.
//!
//! # Implementation Notes
//!
//! The system uses a thread-local context stack to detect dependencies.
//! When a reactive slot is read, we check if there is an active Computation
//! and, if so, record the dependency in both directions.

mod subscriber;
mod subject;
mod context;
mod computation;
mod computed;
mod owner;
mod runtime;
mod scheduler;

pub use subscriber::{SubjectId, SubscriberId};
pub use subject::Subject;
pub use context::ReactiveContext;
pub use computation::{callback, CallbackFn, Computation, GetterFn, WatchOptions, WatchSource};
pub use computed::Computed;
pub use owner::Owner;
pub use runtime::{ErrorReporter, LogReporter, Runtime, Scheduler};
pub use scheduler::{BatchScheduler, MAX_ROUNDS};
