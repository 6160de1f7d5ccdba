//! Reactive Accessors
//!
//! A reactive property replaces a plain slot of an object with a get/set
//! pair backed by its own Subject. The value is kept inside the accessor;
//! a custom getter/setter that was already installed on the property is
//! captured and keeps working.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{depend_array, observe, Observer};
use crate::error::{Error, Result};
use crate::reactive::{ReactiveContext, Subject};
use crate::value::{GetterFn, ObjectRef, Property, PropertyFlags, SetterFn, Slot, Value};

/// The accessor pair installed by [`define_reactive`].
pub(crate) struct ReactiveProperty {
    subject: Subject,
    value: Mutex<Value>,
    /// Observer of the current value, unless shallow.
    child: Mutex<Option<Arc<Observer>>>,
    getter: Option<GetterFn>,
    setter: Option<SetterFn>,
    on_write: Option<WriteHook>,
    shallow: bool,
}

/// Diagnostic hook called with the new value on every genuine write, before
/// it is stored. Hosts use it to warn about assignments they disallow.
pub type WriteHook = Arc<dyn Fn(&Value) + Send + Sync>;

impl ReactiveProperty {
    pub(crate) fn subject(&self) -> &Subject {
        &self.subject
    }

    fn current(&self, obj: &ObjectRef) -> Value {
        match &self.getter {
            Some(getter) => getter(obj),
            None => self.value.lock().clone(),
        }
    }

    pub(crate) fn get(&self, obj: &ObjectRef) -> Value {
        let value = self.current(obj);
        if ReactiveContext::is_active() {
            self.subject.depend();
            let child = self.child.lock().clone();
            if let Some(child) = child {
                child.subject().depend();
                if let Value::Array(arr) = &value {
                    depend_array(arr);
                }
            }
        }
        value
    }

    pub(crate) fn set(&self, obj: &ObjectRef, new_value: Value) -> Result<()> {
        let old = self.current(obj);
        if is_noop_write(&new_value, &old) {
            return Ok(());
        }
        if let Some(hook) = &self.on_write {
            hook(&new_value);
        }
        match &self.setter {
            Some(setter) => setter(obj, new_value.clone())?,
            None => *self.value.lock() = new_value.clone(),
        }
        let child = if self.shallow { None } else { observe(&new_value, false) };
        *self.child.lock() = child;
        self.subject.notify()
    }
}

/// Writes of an identical value, or of NaN over NaN, are not changes.
fn is_noop_write(new_value: &Value, old: &Value) -> bool {
    new_value.strict_eq(old) || (new_value.is_nan() && old.is_nan())
}

/// Install a reactive accessor for `key` on `obj`, starting at `value`.
///
/// Unless `shallow`, the value is observed right away so nested structures
/// are reactive too, and every later assignment is observed before
/// subscribers are notified.
///
/// Fails with [`Error::NonConfigurable`] when the existing property cannot be
/// redefined, and with [`Error::NotExtensible`] when `key` is new and the
/// object is not extensible. The property is left untouched in both cases.
pub fn define_reactive(obj: &ObjectRef, key: &str, value: impl Into<Value>, shallow: bool) -> Result<()> {
    define_reactive_with(obj, key, value, shallow, None)
}

/// [`define_reactive`] with a [`WriteHook`] attached to the new accessor.
pub fn define_reactive_with(
    obj: &ObjectRef,
    key: &str,
    value: impl Into<Value>,
    shallow: bool,
    on_write: Option<WriteHook>,
) -> Result<()> {
    let existing = obj.property(key);
    let (getter, setter) = match existing {
        Some(Property { flags, .. }) if !flags.configurable => {
            return Err(Error::NonConfigurable { key: key.to_string() });
        }
        Some(Property {
            slot: Slot::Accessor { get, set },
            ..
        }) => (get, set),
        Some(Property {
            slot: Slot::Reactive(previous),
            ..
        }) => chain(previous),
        Some(_) => (None, None),
        None if !obj.is_extensible() => return Err(Error::NotExtensible),
        None => (None, None),
    };

    let value = value.into();
    let child = if shallow { None } else { observe(&value, false) };
    let property = ReactiveProperty {
        subject: Subject::new(),
        value: Mutex::new(value),
        child: Mutex::new(child),
        getter,
        setter,
        on_write,
        shallow,
    };

    let installed = obj.install(
        key,
        Property {
            slot: Slot::Reactive(Arc::new(property)),
            flags: PropertyFlags::default(),
        },
    );
    if installed {
        Ok(())
    } else {
        Err(Error::NonConfigurable { key: key.to_string() })
    }
}

/// Delegate to a previously installed reactive accessor.
fn chain(previous: Arc<ReactiveProperty>) -> (Option<GetterFn>, Option<SetterFn>) {
    let read = previous.clone();
    let getter: GetterFn = Arc::new(move |obj: &ObjectRef| read.get(obj));
    let setter: SetterFn = Arc::new(move |obj: &ObjectRef, value: Value| previous.set(obj, value));
    (Some(getter), Some(setter))
}
