//! Reactive Add/Remove
//!
//! Accessors can only intercept writes to keys that already exist. Adding
//! a brand-new key to an observed object, or removing one, therefore goes
//! through [`set`] and [`delete`], which install or drop the reactive slot
//! and notify the object's self Subject.
//!
//! Root data is the exception: its shape must be declared upfront, so late
//! additions and removals are refused with a warning.

use std::fmt;

use super::define_reactive;
use crate::error::{Error, Result};
use crate::value::{ObjectRef, Value};

/// A property name or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    /// The key as an array index. Names qualify only in canonical decimal
    /// form (`"3"`, not `"03"` or `"3.0"`).
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(name) => name
                .parse::<usize>()
                .ok()
                .filter(|index| index.to_string() == *name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{}", index),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// Set a property or array element so that the change is observable, even
/// when the key does not exist yet. Returns the assigned value.
///
/// - Arrays: the array is grown to reach `key` and the element is replaced
///   through `splice`, which notifies.
/// - Existing keys: plain assignment; a reactive accessor notifies.
/// - Root data or internal objects: refused with a warning.
/// - Unobserved objects: plain assignment, nothing to notify.
/// - Otherwise a new reactive accessor is installed and the object's self
///   Subject is notified.
pub fn set(target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Result<Value> {
    let key = key.into();
    let value = value.into();
    match target {
        Value::Array(arr) => {
            let Some(index) = key.as_index() else {
                tracing::warn!(key = %key, "arrays only accept index keys, ignoring set");
                return Ok(value);
            };
            arr.grow_to(index)?;
            arr.splice(index, 1, vec![value.clone()])?;
            Ok(value)
        }
        Value::Object(obj) => set_property(obj, &key.to_string(), value),
        other => {
            tracing::warn!(key = %key, kind = other.type_name(), "cannot set reactive property on a primitive value");
            Ok(value)
        }
    }
}

fn set_property(obj: &ObjectRef, key: &str, value: Value) -> Result<Value> {
    if obj.has_own(key) {
        obj.set(key, value.clone())?;
        return Ok(value);
    }

    let observer = obj.observer();
    if obj.is_internal() || observer.as_ref().is_some_and(|ob| ob.is_root_data()) {
        let err = Error::InvalidMutation {
            message: "avoid adding reactive properties to an internal instance or its root data at runtime, declare them upfront".to_string(),
        };
        tracing::warn!(key, %err, "ignoring set");
        return Ok(value);
    }

    let Some(observer) = observer else {
        obj.set(key, value.clone())?;
        return Ok(value);
    };
    define_reactive(obj, key, value.clone(), false)?;
    observer.subject().notify()?;
    Ok(value)
}

/// Remove a property or array element and notify if the target is
/// observed.
///
/// Root data and internal objects are refused with a warning, missing keys
/// are ignored, and non-configurable properties stay in place.
pub fn delete(target: &Value, key: impl Into<Key>) -> Result<()> {
    let key = key.into();
    match target {
        Value::Array(arr) => {
            let Some(index) = key.as_index() else {
                tracing::warn!(key = %key, "arrays only accept index keys, ignoring delete");
                return Ok(());
            };
            arr.splice(index, 1, Vec::new())?;
            Ok(())
        }
        Value::Object(obj) => delete_property(obj, &key.to_string()),
        other => {
            tracing::warn!(key = %key, kind = other.type_name(), "cannot delete reactive property of a primitive value");
            Ok(())
        }
    }
}

fn delete_property(obj: &ObjectRef, key: &str) -> Result<()> {
    let observer = obj.observer();
    if obj.is_internal() || observer.as_ref().is_some_and(|ob| ob.is_root_data()) {
        let err = Error::InvalidMutation {
            message: "avoid deleting properties on an internal instance or its root data, set them to null instead".to_string(),
        };
        tracing::warn!(key, %err, "ignoring delete");
        return Ok(());
    }
    if !obj.has_own(key) {
        return Ok(());
    }
    if !obj.remove(key) {
        tracing::trace!(key, "property is not configurable, left in place");
        return Ok(());
    }
    match observer {
        Some(observer) => observer.subject().notify(),
        None => Ok(()),
    }
}
