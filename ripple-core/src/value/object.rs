//! Shared object handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Value;
use crate::error::Result;
use crate::observer::{Observer, ReactiveProperty};
use crate::reactive::Subject;

/// Custom getter installed with [`ObjectRef::define_accessor`].
pub(crate) type GetterFn = Arc<dyn Fn(&ObjectRef) -> Value + Send + Sync>;

/// Custom setter installed with [`ObjectRef::define_accessor`].
pub(crate) type SetterFn = Arc<dyn Fn(&ObjectRef, Value) -> Result<()> + Send + Sync>;

/// Attribute flags of a single property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFlags {
    /// Enumerable properties are visited by observation and deep traversal.
    pub enumerable: bool,
    /// Non-configurable properties can neither be removed nor converted.
    pub configurable: bool,
    /// Only consulted for data properties.
    pub writable: bool,
}

impl Default for PropertyFlags {
    fn default() -> Self {
        Self {
            enumerable: true,
            configurable: true,
            writable: true,
        }
    }
}

impl PropertyFlags {
    /// A hidden property: skipped by observation and traversal.
    pub fn hidden() -> Self {
        Self {
            enumerable: false,
            ..Self::default()
        }
    }

    /// A property that can never be converted or removed.
    pub fn locked() -> Self {
        Self {
            configurable: false,
            ..Self::default()
        }
    }
}

/// What a property slot holds.
#[derive(Clone)]
pub(crate) enum Slot {
    Data(Value),
    Accessor {
        get: Option<GetterFn>,
        set: Option<SetterFn>,
    },
    Reactive(Arc<ReactiveProperty>),
}

#[derive(Clone)]
pub(crate) struct Property {
    pub(crate) slot: Slot,
    pub(crate) flags: PropertyFlags,
}

struct ObjectInner {
    props: RwLock<IndexMap<String, Property>>,
    extensible: AtomicBool,
    /// Framework-owned instance, never observed.
    internal: bool,
    observer: OnceLock<Arc<Observer>>,
}

/// Handle to a shared object with insertion-ordered properties.
///
/// Clones share the same object. See the module docs of [`crate::value`]
/// for the mutation contract.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Arc<ObjectInner>,
}

impl ObjectRef {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::with_internal(false)
    }

    /// Create an object that belongs to the framework itself.
    ///
    /// Internal objects are never observed, and `set`/`delete` refuse to add
    /// or remove their properties.
    pub fn new_internal() -> Self {
        Self::with_internal(true)
    }

    fn with_internal(internal: bool) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                props: RwLock::new(IndexMap::new()),
                extensible: AtomicBool::new(true),
                internal,
                observer: OnceLock::new(),
            }),
        }
    }

    /// Create an object from key/value pairs, in order.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let obj = Self::new();
        {
            let mut props = obj.inner.props.write();
            for (key, value) in entries {
                props.insert(key.into(), Property::data(value.into(), PropertyFlags::default()));
            }
        }
        obj
    }

    /// Read a property. Missing properties read as `Undefined`.
    ///
    /// Reactive properties record a dependency of the active computation.
    pub fn get(&self, key: &str) -> Value {
        let slot = self.inner.props.read().get(key).map(|p| p.slot.clone());
        match slot {
            None => Value::Undefined,
            Some(Slot::Data(value)) => value,
            Some(Slot::Accessor { get, .. }) => get.map(|g| g(self)).unwrap_or_default(),
            Some(Slot::Reactive(prop)) => prop.get(self),
        }
    }

    /// Plain assignment.
    ///
    /// Reactive properties notify their subscribers. Writes to non-writable
    /// data properties, setter-less accessors and new keys on
    /// non-extensible objects are silently dropped. Assigning a key that does
    /// not exist yet creates a plain, non-reactive property; use
    /// [`crate::set`] to add a reactive one.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let existing = self
            .inner
            .props
            .read()
            .get(key)
            .map(|p| (p.slot.clone(), p.flags));

        match existing {
            Some((Slot::Data(_), flags)) => {
                if flags.writable {
                    if let Some(prop) = self.inner.props.write().get_mut(key) {
                        if let Slot::Data(slot) = &mut prop.slot {
                            *slot = value;
                        }
                    }
                }
                Ok(())
            }
            Some((Slot::Accessor { set: Some(setter), .. }, _)) => setter(self, value),
            Some((Slot::Accessor { set: None, .. }, _)) => Ok(()),
            Some((Slot::Reactive(prop), _)) => prop.set(self, value),
            None => {
                if self.is_extensible() {
                    self.inner
                        .props
                        .write()
                        .insert(key.to_string(), Property::data(value, PropertyFlags::default()));
                }
                Ok(())
            }
        }
    }

    /// Define (or redefine) a data property with explicit flags.
    ///
    /// Returns `false` when the existing property is not configurable or the
    /// object is not extensible.
    pub fn define_property(&self, key: &str, value: impl Into<Value>, flags: PropertyFlags) -> bool {
        self.install(key, Property::data(value.into(), flags))
    }

    /// Define an accessor property backed by custom closures.
    pub fn define_accessor<G, S>(&self, key: &str, get: Option<G>, set: Option<S>, flags: PropertyFlags) -> bool
    where
        G: Fn(&ObjectRef) -> Value + Send + Sync + 'static,
        S: Fn(&ObjectRef, Value) -> Result<()> + Send + Sync + 'static,
    {
        let slot = Slot::Accessor {
            get: get.map(|g| Arc::new(g) as GetterFn),
            set: set.map(|s| Arc::new(s) as SetterFn),
        };
        self.install(key, Property { slot, flags })
    }

    pub(crate) fn install(&self, key: &str, property: Property) -> bool {
        let mut props = self.inner.props.write();
        match props.get_mut(key) {
            Some(existing) if !existing.flags.configurable => false,
            Some(existing) => {
                *existing = property;
                true
            }
            None if self.is_extensible() => {
                props.insert(key.to_string(), property);
                true
            }
            None => false,
        }
    }

    pub(crate) fn property(&self, key: &str) -> Option<Property> {
        self.inner.props.read().get(key).cloned()
    }

    /// Whether `key` is an own property, hidden or not.
    pub fn has_own(&self, key: &str) -> bool {
        self.inner.props.read().contains_key(key)
    }

    /// Enumerable own keys, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .props
            .read()
            .iter()
            .filter(|(_, p)| p.flags.enumerable)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Number of own properties, hidden ones included.
    pub fn len(&self) -> usize {
        self.inner.props.read().len()
    }

    /// Whether the object has no own properties.
    pub fn is_empty(&self) -> bool {
        self.inner.props.read().is_empty()
    }

    /// The `delete` operator: removes an own property. Returns `false` only
    /// when the property exists and is not configurable.
    ///
    /// Does not notify; [`crate::delete`] is the reactive variant.
    pub fn remove(&self, key: &str) -> bool {
        let mut props = self.inner.props.write();
        match props.get(key) {
            Some(prop) if !prop.flags.configurable => false,
            Some(_) => {
                props.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// The Subject of a reactive property, if `key` has been converted.
    pub fn property_subject(&self, key: &str) -> Option<Subject> {
        match self.inner.props.read().get(key).map(|p| &p.slot) {
            Some(Slot::Reactive(prop)) => Some(prop.subject().clone()),
            _ => None,
        }
    }

    /// Refuse new keys from now on.
    pub fn prevent_extensions(&self) {
        self.inner.extensible.store(false, Ordering::SeqCst);
    }

    /// Make the object non-extensible and every property non-configurable;
    /// data properties also become read-only.
    pub fn freeze(&self) {
        self.prevent_extensions();
        for prop in self.inner.props.write().values_mut() {
            prop.flags.configurable = false;
            prop.flags.writable = false;
        }
    }

    /// `false` after `prevent_extensions` or `freeze`.
    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.load(Ordering::SeqCst)
    }

    /// Whether no property can change any more.
    pub fn is_frozen(&self) -> bool {
        !self.is_extensible()
            && self
                .inner
                .props
                .read()
                .values()
                .all(|p| !p.flags.configurable && (!p.flags.writable || !matches!(p.slot, Slot::Data(_))))
    }

    /// Whether the object was created with [`ObjectRef::new_internal`].
    pub fn is_internal(&self) -> bool {
        self.inner.internal
    }

    /// The observer attached by [`crate::observe`], if any.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        self.inner.observer.get().cloned()
    }

    pub(crate) fn observer_cell(&self) -> &OnceLock<Arc<Observer>> {
        &self.inner.observer
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address of the shared storage, for visited sets.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl Property {
    pub(crate) fn data(value: Value, flags: PropertyFlags) -> Self {
        Self {
            slot: Slot::Data(value),
            flags,
        }
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRef {
    // Does not go through getters: printing must neither track nor recurse
    // into cycles.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .field("keys", &self.keys())
            .field("observed", &self.inner.observer.get().is_some())
            .finish()
    }
}
