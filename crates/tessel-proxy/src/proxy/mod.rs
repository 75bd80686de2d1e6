//! Live instances and their shared behavioral contract.
//!
//! Every composite instance, whatever its shape or storage, implements
//! [`ProxyOps`]: merge-assign, defaulting assign, change extraction,
//! clean marking and JSON snapshots. [`Proxy`] is the type-erased handle
//! pools hand out.

mod array;
mod map;
mod object;

use std::fmt;
use std::rc::Weak;

use tessel_core::{Key, Value};

use crate::property::Property;
use crate::schema::Decorator;

pub use array::ArrayProxy;
pub use map::MapProxy;
pub use object::ObjectProxy;

use array::ArrayInner;
use map::MapInner;

/// Operations shared by every composite instance.
pub trait ProxyOps {
    /// Merge `value` into this instance. Keys absent from `value` keep
    /// their current contents; keys the shape does not declare are
    /// ignored. Arrays given a list and maps are replaced wholesale.
    fn assign(&self, value: &Value);

    /// Assign every declared key, taking each from `value`, else from the
    /// schema-level default, else from the field's own default, and seed
    /// every dirty bit in this instance's span. `None` applies defaults
    /// only.
    fn assign_with_defaults(&self, value: Option<&Value>);

    /// Everything changed since the last [`mark_clean`](Self::mark_clean),
    /// or `None` when tracking is off or, for objects, nothing changed.
    fn diff(&self) -> Option<Value>;

    /// Clear all dirty state in this subtree.
    fn mark_clean(&self);

    /// Full structural snapshot.
    fn to_json(&self) -> Value;

    /// Snapshot omitting every key whose value equals its default
    /// (`defaults[key]` if given, else the declared default). `None` if
    /// everything was omitted.
    fn to_json_without_defaults(&self, defaults: Option<&Value>) -> Option<Value>;
}

/// A handle to a composite instance.
///
/// Cloning is cheap and yields the same instance; compare identity with
/// [`ptr_eq`](Self::ptr_eq).
#[derive(Clone)]
pub enum Proxy {
    /// An object instance.
    Object(ObjectProxy),
    /// An array instance.
    Array(ArrayProxy),
    /// A map instance.
    Map(MapProxy),
}

impl Proxy {
    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Map(a), Self::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// The pool slot this instance (or its root) is bound to.
    pub fn slot(&self) -> usize {
        match self {
            Self::Object(p) => p.slot(),
            Self::Array(p) => p.slot(),
            Self::Map(p) => p.slot(),
        }
    }

    /// The property this instance was generated from.
    pub fn property(&self) -> Property {
        match self {
            Self::Object(p) => Property::Object(p.property().clone()),
            Self::Array(p) => Property::Array(p.property().clone()),
            Self::Map(p) => Property::Map(p.property().clone()),
        }
    }

    /// Borrow as an object.
    pub fn as_object(&self) -> Option<&ObjectProxy> {
        match self {
            Self::Object(p) => Some(p),
            _ => None,
        }
    }

    /// Borrow as an array.
    pub fn as_array(&self) -> Option<&ArrayProxy> {
        match self {
            Self::Array(p) => Some(p),
            _ => None,
        }
    }

    /// Borrow as a map.
    pub fn as_map(&self) -> Option<&MapProxy> {
        match self {
            Self::Map(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn wrapper(&self) -> Option<Decorator> {
        match self {
            Self::Object(p) => p.property().wrapper.clone(),
            Self::Array(p) => p.property().wrapper.clone(),
            Self::Map(p) => p.property().wrapper.clone(),
        }
    }

    /// Empty every array and map in this tree without reporting the
    /// removals, so a recycled slot starts from a blank container state.
    pub(crate) fn reset(&self) {
        match self {
            Self::Object(p) => {
                for child in p.children() {
                    child.reset();
                }
            }
            Self::Array(p) => p.reset(),
            Self::Map(p) => p.reset(),
        }
    }

    pub(crate) fn set_owner(&self, link: OwnerLink) {
        let owner = match self {
            Self::Object(p) => &p.0.owner,
            Self::Array(p) => &p.0.owner,
            Self::Map(p) => &p.0.owner,
        };
        *owner.borrow_mut() = Some(link);
    }

    /// Route a change inside a pooled element up to the container that
    /// owns it.
    pub(crate) fn touch_owner(&self) {
        let owner = match self {
            Self::Object(p) => &p.0.owner,
            Self::Array(p) => &p.0.owner,
            Self::Map(p) => &p.0.owner,
        };
        let link = owner.borrow().clone();
        if let Some(link) = link {
            link.touch();
        }
    }
}

impl ProxyOps for Proxy {
    fn assign(&self, value: &Value) {
        match self {
            Self::Object(p) => p.assign(value),
            Self::Array(p) => p.assign(value),
            Self::Map(p) => p.assign(value),
        }
    }

    fn assign_with_defaults(&self, value: Option<&Value>) {
        match self {
            Self::Object(p) => p.assign_with_defaults(value),
            Self::Array(p) => p.assign_with_defaults(value),
            Self::Map(p) => p.assign_with_defaults(value),
        }
    }

    fn diff(&self) -> Option<Value> {
        match self {
            Self::Object(p) => p.diff(),
            Self::Array(p) => p.diff(),
            Self::Map(p) => p.diff(),
        }
    }

    fn mark_clean(&self) {
        match self {
            Self::Object(p) => p.mark_clean(),
            Self::Array(p) => p.mark_clean(),
            Self::Map(p) => p.mark_clean(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Object(p) => p.to_json(),
            Self::Array(p) => p.to_json(),
            Self::Map(p) => p.to_json(),
        }
    }

    fn to_json_without_defaults(&self, defaults: Option<&Value>) -> Option<Value> {
        match self {
            Self::Object(p) => p.to_json_without_defaults(defaults),
            Self::Array(p) => p.to_json_without_defaults(defaults),
            Self::Map(p) => p.to_json_without_defaults(defaults),
        }
    }
}

impl From<&Proxy> for Value {
    fn from(proxy: &Proxy) -> Self {
        proxy.to_json()
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(p) => fmt::Debug::fmt(p, f),
            Self::Array(p) => fmt::Debug::fmt(p, f),
            Self::Map(p) => fmt::Debug::fmt(p, f),
        }
    }
}

/// Back-reference from a pooled element to the container slot holding it.
#[derive(Clone)]
pub(crate) enum OwnerLink {
    Array { array: Weak<ArrayInner>, index: usize },
    Map { map: Weak<MapInner>, key: Key },
}

impl OwnerLink {
    fn touch(&self) {
        match self {
            Self::Array { array, index } => {
                if let Some(inner) = array.upgrade() {
                    ArrayProxy(inner).mark_dirty(*index);
                }
            }
            Self::Map { map, key } => {
                if let Some(inner) = map.upgrade() {
                    MapProxy(inner).mark_dirty(key.clone());
                }
            }
        }
    }
}
