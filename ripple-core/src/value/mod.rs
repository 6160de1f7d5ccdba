//! Dynamic Values
//!
//! The reactive core observes a tree of dynamic values rather than Rust
//! structs. A `Value` is either a primitive or a shared handle to an object
//! or array. Cloning a handle is cheap and both clones refer to the same
//! underlying storage, so identity comparisons (`strict_eq`) behave like
//! reference comparisons.
//!
//! # Mutation Contract
//!
//! There is no runtime property interception in Rust. Every read and write
//! therefore goes through the methods on [`ObjectRef`] and [`ArrayRef`]:
//!
//! - `ObjectRef::get` / `ObjectRef::set` dispatch to reactive accessors once
//!   the object has been observed.
//! - The seven mutating array operations are the only way to change an
//!   array, and they notify once the array has been observed.
//!
//! Code that keeps values outside of these handles is invisible to the
//! dependency tracker.

mod array;
mod object;

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

pub use array::ArrayRef;
pub use object::{ObjectRef, PropertyFlags};
pub(crate) use object::{GetterFn, Property, SetterFn, Slot};

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    /// No value at all. Missing properties read as `Undefined`.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
}

impl Value {
    /// `true` for `Undefined` and `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// `true` for objects and arrays, the values that can carry an observer.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Strict equality: primitives compare by value, objects and arrays by
    /// identity. `NaN` is not equal to itself.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Whether the extensibility flag of an object or array is still set.
    /// Primitives report `false`.
    pub(crate) fn is_extensible_object(&self) -> bool {
        match self {
            Value::Object(obj) => obj.is_extensible(),
            Value::Array(arr) => arr.is_extensible(),
            _ => false,
        }
    }

    /// Type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        f.write_str("0")
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{:.0}", n)
    } else {
        write!(f, "{}", n)
    }
}

/// String conversion with the usual dynamic-language rules. Used by the
/// default array sort.
///
/// Arrays join their elements with `,`. An array reached again while it is
/// being joined contributes an empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(self, f, &mut HashSet::new())
    }
}

fn write_value(value: &Value, f: &mut fmt::Formatter<'_>, joining: &mut HashSet<usize>) -> fmt::Result {
    match value {
        Value::Undefined => f.write_str("undefined"),
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Number(n) => format_number(*n, f),
        Value::String(s) => f.write_str(s),
        Value::Array(arr) => {
            if !joining.insert(arr.addr()) {
                return Ok(());
            }
            for (i, item) in arr.to_vec().iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                if !item.is_nullish() {
                    write_value(item, f, joining)?;
                }
            }
            joining.remove(&arr.addr());
            Ok(())
        }
        Value::Object(_) => f.write_str("[object Object]"),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(arr) => fmt::Debug::fmt(arr, f),
            Value::Object(obj) => fmt::Debug::fmt(obj, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<ArrayRef> for Value {
    fn from(arr: ArrayRef) -> Self {
        Value::Array(arr)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::from_vec(items))
    }
}

/// Builds a fresh, unobserved value tree.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Array(ArrayRef::from_vec(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(ObjectRef::from_entries(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

/// Serializes through the public getters, so serializing inside a running
/// computation records dependencies like any other read. `Undefined`
/// properties are skipped and `Undefined` elements become `null`.
///
/// A value that contains itself fails with a "cyclic value" error.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let ancestors = RefCell::new(HashSet::new());
        Guarded {
            value: self,
            ancestors: &ancestors,
        }
        .serialize(serializer)
    }
}

/// A value being serialized, plus the addresses of the containers that
/// enclose it.
struct Guarded<'a> {
    value: &'a Value,
    ancestors: &'a RefCell<HashSet<usize>>,
}

impl Guarded<'_> {
    fn child<'b>(&'b self, value: &'b Value) -> Guarded<'b> {
        Guarded {
            value,
            ancestors: self.ancestors,
        }
    }

    fn enter<E: ser::Error>(&self, addr: usize) -> std::result::Result<(), E> {
        if self.ancestors.borrow_mut().insert(addr) {
            Ok(())
        } else {
            Err(E::custom("cyclic value"))
        }
    }

    fn leave(&self, addr: usize) {
        self.ancestors.borrow_mut().remove(&addr);
    }
}

impl Serialize for Guarded<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.value {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(arr) => {
                self.enter(arr.addr())?;
                let items = arr.to_vec();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(&self.child(item))?;
                }
                self.leave(arr.addr());
                seq.end()
            }
            Value::Object(obj) => {
                self.enter(obj.addr())?;
                let mut map = serializer.serialize_map(None)?;
                for key in obj.keys() {
                    let value = obj.get(&key);
                    if !matches!(value, Value::Undefined) {
                        map.serialize_entry(&key, &self.child(&value))?;
                    }
                }
                self.leave(obj.addr());
                map.end()
            }
        }
    }
}
