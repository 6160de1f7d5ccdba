//! Computation Implementation
//!
//! A Computation is a reactive subscriber: a getter whose reads are
//! recorded, plus an optional callback fired when the getter's value
//! changes. It backs watches, lazily computed values and render-style
//! functions alike; the mode flags decide how it reacts to notifications.
//!
//! # How Computations Work
//!
//! 1. `get()` activates the Computation on the [`ReactiveContext`], runs the
//!    getter with the owner, and deactivates it again. Every reactive read
//!    in between lands in `add_dep`.
//!
//! 2. Dependencies are double-buffered. `add_dep` records into the pending
//!    buffer and subscribes to a Subject only when the previous run did not
//!    already depend on it, so re-reading a slot never duplicates a
//!    subscription.
//!
//! 3. `cleanup_deps` runs at the end of every `get()`: Subjects from the
//!    previous run that were not read this time drop the subscription, and
//!    the buffers are swapped. After a run the dependency set is exactly
//!    what that run read.
//!
//! 4. `update()` is the notification entry point:
//!    - `lazy`: only mark dirty; `evaluate()` recomputes on demand.
//!    - `sync`: `run()` inline.
//!    - otherwise: hand off to the installed [`Scheduler`](super::Scheduler).
//!
//! # Error Policy
//!
//! Errors from `user` Computations come from third-party code and are
//! reported through the installed [`ErrorReporter`](super::ErrorReporter).
//! Errors from internal Computations indicate a bug in the host and
//! propagate to whoever triggered the run.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::owner::Owner;
use super::runtime::Runtime;
use super::subject::Subject;
use super::subscriber::{SubjectId, SubscriberId};
use crate::error::{BoxError, Error, Result};
use crate::observer::traverse;
use crate::value::Value;

/// The tracked function of a Computation. Receives the owner.
pub type GetterFn = Arc<dyn Fn(&Owner) -> std::result::Result<Value, BoxError> + Send + Sync>;

/// Change callback, invoked with `(owner, new, old)`.
pub type CallbackFn = Arc<dyn Fn(&Owner, &Value, &Value) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Wrap a closure as a [`CallbackFn`].
pub fn callback<F>(f: F) -> CallbackFn
where
    F: Fn(&Owner, &Value, &Value) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// What a Computation tracks.
#[derive(Clone)]
pub enum WatchSource {
    /// Dot-delimited property path, walked from the owner's root data.
    Path(String),
    Getter(GetterFn),
}

impl WatchSource {
    /// Watch a dot-delimited path.
    pub fn path(path: impl Into<String>) -> Self {
        WatchSource::Path(path.into())
    }

    /// Watch whatever `f` reads.
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn(&Owner) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        WatchSource::Getter(Arc::new(f))
    }
}

impl From<&str> for WatchSource {
    fn from(path: &str) -> Self {
        WatchSource::path(path)
    }
}

impl From<String> for WatchSource {
    fn from(path: String) -> Self {
        WatchSource::Path(path)
    }
}

impl fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            WatchSource::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

/// Mode flags of a Computation.
///
/// Deserializable so hosts can keep watch definitions in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Depend on every nested slot of the produced value.
    pub deep: bool,
    /// Created through a public watch API; errors are reported, not raised.
    pub user: bool,
    /// Compute on demand only.
    pub lazy: bool,
    /// Run inline on notification instead of through the scheduler.
    pub sync: bool,
    /// Only used by [`Owner::watch`]: fire the callback once right away.
    pub immediate: bool,
}

impl WatchOptions {
    /// Set `deep`.
    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    /// Set `user`.
    pub fn user(mut self) -> Self {
        self.user = true;
        self
    }

    /// Set `lazy`.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Set `sync`.
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Set `immediate`.
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }
}

struct State {
    /// Dependencies of the last completed run.
    deps: IndexMap<SubjectId, Subject>,
    /// Dependencies recorded by the run in progress.
    new_deps: IndexMap<SubjectId, Subject>,
    value: Value,
    dirty: bool,
    active: bool,
}

struct ComputationInner {
    id: SubscriberId,
    owner: Owner,
    expression: String,
    getter: GetterFn,
    callback: Option<CallbackFn>,
    options: WatchOptions,
    state: Mutex<State>,
}

/// A reactive subscriber. Clones share the same Computation.
#[derive(Clone)]
pub struct Computation {
    inner: Arc<ComputationInner>,
}

/// Pops the context and re-collects dependencies when an evaluation ends,
/// whichever way it ends.
struct Collecting<'a> {
    computation: &'a Computation,
}

impl<'a> Collecting<'a> {
    fn start(computation: &'a Computation) -> Self {
        ReactiveContext::push(computation.clone());
        Self { computation }
    }
}

impl Drop for Collecting<'_> {
    fn drop(&mut self) {
        ReactiveContext::pop();
        self.computation.cleanup_deps();
    }
}

impl Computation {
    /// Create a Computation bound to `owner`.
    ///
    /// Unless `options.lazy` is set, the getter runs once immediately to
    /// collect the initial dependencies and value. If that first run fails
    /// for an internal Computation the error is returned and the Computation
    /// is torn down.
    pub fn new(
        owner: &Owner,
        source: impl Into<WatchSource>,
        callback: Option<CallbackFn>,
        options: WatchOptions,
    ) -> Result<Self> {
        let (expression, getter) = match source.into() {
            WatchSource::Getter(getter) => ("<getter>".to_string(), getter),
            WatchSource::Path(path) => {
                let getter = match parse_path(&path) {
                    Ok(segments) => path_getter(segments),
                    Err(err) => {
                        tracing::warn!(owner = %owner.name(), %err, "invalid watch path, use a getter instead");
                        noop_getter()
                    }
                };
                (path, getter)
            }
        };

        let computation = Self {
            inner: Arc::new(ComputationInner {
                id: SubscriberId::new(),
                owner: owner.clone(),
                expression,
                getter,
                callback,
                options,
                state: Mutex::new(State {
                    deps: IndexMap::new(),
                    new_deps: IndexMap::new(),
                    value: Value::Undefined,
                    dirty: options.lazy,
                    active: true,
                }),
            }),
        };
        owner.register(computation.clone());

        if !options.lazy {
            match computation.get() {
                Ok(value) => computation.inner.state.lock().value = value,
                Err(err) => {
                    computation.teardown();
                    return Err(err);
                }
            }
        }
        Ok(computation)
    }

    /// Unique id; the scheduler runs lower ids first.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// The owner passed to the getter and callback.
    pub fn owner(&self) -> &Owner {
        &self.inner.owner
    }

    /// The watched path, or `<getter>` for function sources.
    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// The mode flags this Computation was created with.
    pub fn options(&self) -> WatchOptions {
        self.inner.options
    }

    /// Value produced by the last run.
    pub fn value(&self) -> Value {
        self.inner.state.lock().value.clone()
    }

    /// Only meaningful for lazy Computations.
    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    /// `false` once torn down.
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// Subjects read during the last completed run, in first-read order.
    pub fn dependency_ids(&self) -> Vec<SubjectId> {
        self.inner.state.lock().deps.keys().copied().collect()
    }

    /// Whether the last completed run read `subject`.
    pub fn depends_on(&self, subject: &Subject) -> bool {
        self.inner.state.lock().deps.contains_key(&subject.id())
    }

    /// Evaluate the getter and re-collect dependencies.
    pub fn get(&self) -> Result<Value> {
        let outcome = {
            let _collecting = Collecting::start(self);
            let outcome = (self.inner.getter)(&self.inner.owner);
            // "touch" every nested slot so they are all tracked as
            // dependencies for deep watching
            if self.inner.options.deep {
                if let Ok(value) = &outcome {
                    traverse(value);
                }
            }
            outcome
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(source) => {
                let error = Error::Getter {
                    expression: self.inner.expression.clone(),
                    source,
                };
                if self.inner.options.user {
                    let phase = format!("getter for watcher \"{}\"", self.inner.expression);
                    Runtime::report(&error, &self.inner.owner, &phase);
                    Ok(Value::Undefined)
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Record `subject` as a dependency of the run in progress.
    pub fn add_dep(&self, subject: &Subject) {
        let subscribe = {
            let mut state = self.inner.state.lock();
            let id = subject.id();
            if !state.active || state.new_deps.contains_key(&id) {
                false
            } else {
                state.new_deps.insert(id, subject.clone());
                !state.deps.contains_key(&id)
            }
        };
        if subscribe {
            subject.add_sub(self.clone());
        }
    }

    /// Drop subscriptions that the last run no longer needed and make its
    /// dependencies the baseline for the next run.
    fn cleanup_deps(&self) {
        let stale: Vec<Subject> = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let stale = state
                .deps
                .iter()
                .filter(|(id, _)| !state.new_deps.contains_key(*id))
                .map(|(_, subject)| subject.clone())
                .collect();
            std::mem::swap(&mut state.deps, &mut state.new_deps);
            state.new_deps.clear();
            stale
        };
        for subject in stale {
            subject.remove_sub(self);
        }
    }

    /// Subscriber interface, called when a dependency changes.
    pub fn update(&self) -> Result<()> {
        let options = self.inner.options;
        {
            let mut state = self.inner.state.lock();
            if !state.active {
                return Ok(());
            }
            if options.lazy {
                state.dirty = true;
                return Ok(());
            }
        }

        if options.sync {
            self.run()
        } else {
            Runtime::enqueue(self.clone());
            Ok(())
        }
    }

    /// Scheduler job interface: recompute and fire the callback on change.
    ///
    /// Objects and arrays always count as changed because their contents
    /// may have been mutated in place; deep Computations always fire.
    pub fn run(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        let value = self.get()?;
        let old = {
            let mut state = self.inner.state.lock();
            let changed = !value.strict_eq(&state.value) || value.is_object() || self.inner.options.deep;
            if !changed {
                return Ok(());
            }
            std::mem::replace(&mut state.value, value.clone())
        };
        self.invoke_callback(&value, &old)
    }

    pub(crate) fn invoke_callback(&self, value: &Value, old: &Value) -> Result<()> {
        let Some(callback) = &self.inner.callback else {
            return Ok(());
        };
        match callback(&self.inner.owner, value, old) {
            Ok(()) => Ok(()),
            Err(source) => {
                let error = Error::Callback {
                    expression: self.inner.expression.clone(),
                    source,
                };
                if self.inner.options.user {
                    let phase = format!("callback for watcher \"{}\"", self.inner.expression);
                    Runtime::report(&error, &self.inner.owner, &phase);
                    Ok(())
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Recompute a lazy Computation and clear its dirty flag.
    pub fn evaluate(&self) -> Result<()> {
        let value = self.get()?;
        let mut state = self.inner.state.lock();
        state.value = value;
        state.dirty = false;
        Ok(())
    }

    /// Make the active Computation depend on everything this one depends on.
    pub fn depend(&self) {
        let deps: Vec<Subject> = self.inner.state.lock().deps.values().cloned().collect();
        for subject in deps {
            subject.depend();
        }
    }

    /// Unsubscribe from every dependency and deactivate. Idempotent.
    pub fn teardown(&self) {
        let deps: Vec<Subject> = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if !state.active {
                return;
            }
            state.active = false;
            // A teardown from inside the getter leaves fresh subscriptions
            // in the pending buffer; drop those too.
            state
                .deps
                .drain(..)
                .chain(state.new_deps.drain(..))
                .map(|(_, subject)| subject)
                .collect()
        };

        // Removing from the owner is a linear scan, skipped when the whole
        // owner is going away.
        if !self.inner.owner.is_being_destroyed() {
            self.inner.owner.unregister(self);
        }
        for subject in &deps {
            subject.remove_sub(self);
        }
        tracing::trace!(computation = %self.inner.id, expression = %self.inner.expression, "computation torn down");
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Computation) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.expression)
            .field("options", &self.inner.options)
            .field("dependency_count", &state.deps.len())
            .field("dirty", &state.dirty)
            .field("active", &state.active)
            .finish()
    }
}

type PathSegments = SmallVec<[String; 4]>;

/// Split a watch path into segments. Only `[A-Za-z0-9_.$]` is accepted.
pub(crate) fn parse_path(path: &str) -> Result<PathSegments> {
    let valid = path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$');
    if !valid {
        return Err(Error::PathParse { path: path.to_string() });
    }
    Ok(path.split('.').map(str::to_string).collect())
}

fn path_getter(segments: PathSegments) -> GetterFn {
    Arc::new(move |owner: &Owner| {
        let mut current = owner.data();
        for segment in &segments {
            current = match &current {
                Value::Object(obj) => obj.get(segment),
                Value::Array(arr) if segment == "length" => Value::from(arr.len()),
                Value::Array(arr) => match segment.parse::<usize>() {
                    Ok(index) => arr.get(index),
                    Err(_) => Value::Undefined,
                },
                _ => return Ok(Value::Undefined),
            };
        }
        Ok(current)
    })
}

fn noop_getter() -> GetterFn {
    Arc::new(|_: &Owner| Ok(Value::Undefined))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
