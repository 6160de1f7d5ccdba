//! Ripple Core
//!
//! Fine-grained dependency tracking over plain value trees. Observing a
//! value converts its properties into reactive accessors; Computations that
//! read them are re-run (or marked dirty) when they are written.
//!
//! The crate implements:
//!
//! - A shared, JavaScript-like value model (`value`)
//! - Observation of object and array trees, reactive add/remove and deep
//!   traversal (`observer`)
//! - Subjects, Computations, computed values, owners and scheduling hooks
//!   (`reactive`)
//!
//! # Architecture
//!
//! - `value`: `Value`, shared `ObjectRef`/`ArrayRef` handles and property flags
//! - `observer`: `observe`, `define_reactive`, `set`, `delete`, `traverse`
//! - `reactive`: dependency tracking and the Computation lifecycle
//! - `error`: the crate-wide error type
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{callback, Owner, WatchOptions};
//! use ripple_core::Value;
//!
//! let owner = Owner::new("counter", Value::from(serde_json::json!({ "count": 1 })));
//! owner
//!     .watch(
//!         "count",
//!         callback(|_, new, old| {
//!             println!("count: {} -> {}", old, new);
//!             Ok(())
//!         }),
//!         WatchOptions::default().sync(),
//!     )
//!     .unwrap();
//!
//! // Prints "count: 1 -> 2"
//! owner.data().as_object().unwrap().set("count", 2).unwrap();
//! ```

pub mod error;
pub mod observer;
pub mod reactive;
pub mod value;

pub use error::{BoxError, Error, Result};
pub use observer::{
    define_reactive, define_reactive_with, delete, observe, observer_of, set, traverse, Key, Observer, WriteHook,
};
pub use reactive::{Computation, Computed, Owner, WatchOptions, WatchSource};
pub use value::{ArrayRef, ObjectRef, PropertyFlags, Value};
