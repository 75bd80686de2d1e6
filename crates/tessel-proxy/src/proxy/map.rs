//! Dynamic-key-set instances.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use tessel_core::{Key, Value};

use super::array::Element;
use super::object::ObjectInner;
use super::{ObjectProxy, OwnerLink, Proxy, ProxyOps};
use crate::class::{Elements, MapClass};
use crate::pool::{allocate_pooled, Pool};
use crate::property::MapProperty;

pub(crate) struct MapInner {
    class: Rc<MapClass>,
    slot: usize,
    entries: RefCell<IndexMap<Key, Element>>,
    /// Changed keys in first-change order; deleted keys stay as tombstones
    /// until the next clean.
    dirty: RefCell<IndexSet<Key>>,
    this: Weak<MapInner>,
    parent: Option<Weak<ObjectInner>>,
    pub(crate) owner: RefCell<Option<OwnerLink>>,
}

/// An instance of a map property.
///
/// Keys are coerced through the key leaf kind. Composite values follow
/// the same pooling and identity rules as array elements.
#[derive(Clone)]
pub struct MapProxy(pub(crate) Rc<MapInner>);

impl MapProxy {
    pub(crate) fn construct(
        class: &Rc<MapClass>,
        slot: usize,
        parent: Option<Weak<ObjectInner>>,
    ) -> Self {
        Self(Rc::new_cyclic(|this| MapInner {
            class: Rc::clone(class),
            slot,
            entries: RefCell::new(IndexMap::new()),
            dirty: RefCell::new(IndexSet::new()),
            this: this.clone(),
            parent,
            owner: RefCell::new(None),
        }))
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &MapProxy) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The pool slot this instance's root is bound to.
    pub fn slot(&self) -> usize {
        self.0.slot
    }

    /// The map property.
    pub fn property(&self) -> &Rc<MapProperty> {
        &self.0.class.property
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }

    /// Whether the map has no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys in insertion order.
    pub fn keys(&self) -> Vec<Value> {
        self.0.entries.borrow().keys().map(Key::to_value).collect()
    }

    /// Whether `key` has a live entry.
    pub fn contains_key(&self, key: impl Into<Value>) -> bool {
        let key = self.key(&key.into());
        self.0.entries.borrow().contains_key(&key)
    }

    /// Snapshot of the value at `key`.
    pub fn get(&self, key: impl Into<Value>) -> Option<Value> {
        let key = self.key(&key.into());
        self.0.entries.borrow().get(&key).map(|element| match element {
            Element::Leaf(value) => value.clone(),
            Element::Proxy(proxy) => proxy.to_json(),
        })
    }

    /// The composite value at `key`.
    pub fn at(&self, key: impl Into<Value>) -> Option<Proxy> {
        let key = self.key(&key.into());
        let entries = self.0.entries.borrow();
        match entries.get(&key) {
            Some(Element::Proxy(proxy)) => Some(proxy.clone()),
            _ => None,
        }
    }

    /// Write `key`. `Null` deletes. A composite already at `key` is merged
    /// into rather than replaced.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) {
        let key = self.key(&key.into());
        let value = value.into();
        if value.is_null() {
            self.remove(key);
            return;
        }
        match &self.0.class.elements {
            Elements::Leaf(kind) => {
                let next = kind.coerce(&value);
                let changed = {
                    let mut entries = self.0.entries.borrow_mut();
                    match entries.get(&key) {
                        Some(Element::Leaf(current)) if *current == next => false,
                        _ => {
                            entries.insert(key.clone(), Element::Leaf(next));
                            true
                        }
                    }
                };
                if changed {
                    self.mark_dirty(key);
                }
            }
            Elements::Pooled(pool) => self.set_composite(pool, key, &value),
        }
    }

    /// Remove `key`, returning whether it was present. A removed composite
    /// goes back to the pool and the key stays in the diff as a tombstone.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = self.key(&key.into());
        self.remove(key)
    }

    /// Delete every key.
    pub fn clear(&self) {
        let keys: Vec<Key> = self.0.entries.borrow().keys().cloned().collect();
        for key in keys {
            self.remove(key);
        }
    }

    /// Keys changed since the last clean, in first-change order.
    pub fn dirty_keys(&self) -> Vec<Value> {
        self.0.dirty.borrow().iter().map(Key::to_value).collect()
    }

    /// The pool composite values are drawn from.
    pub fn element_pool(&self) -> Option<Rc<RefCell<Pool>>> {
        self.0.class.element_pool().cloned()
    }

    /// Record `key` as changed and report its position in the dirty set.
    pub(crate) fn mark_dirty(&self, key: Key) {
        if !self.0.class.views.tracking.is_enabled() {
            return;
        }
        let (position, _) = self.0.dirty.borrow_mut().insert_full(key);
        self.0.class.views.notify(position, &self.root());
    }

    fn insert_dirty(&self, key: Key) {
        if self.0.class.views.tracking.is_enabled() {
            self.0.dirty.borrow_mut().insert(key);
        }
    }

    /// Drop every entry without reporting it, returning composites to the
    /// element pool. Used when a pool slot is handed to a new occupant.
    pub(crate) fn reset(&self) {
        let entries = std::mem::take(&mut *self.0.entries.borrow_mut());
        self.0.dirty.borrow_mut().clear();
        if let Some(pool) = self.0.class.element_pool() {
            for element in entries.into_values() {
                if let Element::Proxy(proxy) = element {
                    pool.borrow_mut().free(&proxy);
                }
            }
        }
    }

    fn root(&self) -> Proxy {
        if let Some(parent) = self.0.parent.as_ref().and_then(Weak::upgrade) {
            return Proxy::Object(ObjectProxy(parent));
        }
        Proxy::Map(self.clone())
    }

    fn key(&self, raw: &Value) -> Key {
        let coerced = self.0.class.property.key.kind.coerce(raw);
        Key::from_value(&coerced).unwrap_or(Key::Null)
    }

    fn remove(&self, key: Key) -> bool {
        let removed = self.0.entries.borrow_mut().shift_remove(&key);
        let Some(element) = removed else {
            return false;
        };
        if let Element::Proxy(proxy) = element {
            if let Some(pool) = self.0.class.element_pool() {
                pool.borrow_mut().free(&proxy);
            }
        }
        self.mark_dirty(key);
        true
    }

    fn set_composite(&self, pool: &Rc<RefCell<Pool>>, key: Key, value: &Value) {
        let existing = match self.0.entries.borrow().get(&key) {
            Some(Element::Proxy(proxy)) => Some(proxy.clone()),
            _ => None,
        };
        if let Some(proxy) = existing {
            proxy.assign(value);
        } else {
            let map = self.0.this.clone();
            let owner_key = key.clone();
            let proxy = allocate_pooled(pool, Some(value), move |proxy| {
                proxy.set_owner(OwnerLink::Map {
                    map,
                    key: owner_key,
                });
            });
            self.0
                .entries
                .borrow_mut()
                .insert(key.clone(), Element::Proxy(proxy));
        }
        self.insert_dirty(key);
    }

    /// `(key, value)` pairs from entries, a list of `[key, value]` lists or
    /// an object, with keys coerced.
    fn pairs(&self, value: &Value) -> Vec<(Key, Value)> {
        match value {
            Value::Entries(entries) => entries
                .iter()
                .map(|(k, v)| (self.key(k), v.clone()))
                .collect(),
            Value::List(items) => items
                .iter()
                .filter_map(|item| match item.as_list() {
                    Some([k, v]) => Some((self.key(k), v.clone())),
                    _ => None,
                })
                .collect(),
            Value::Object(fields) => fields
                .iter()
                .map(|(k, v)| (self.key(&Value::from(k.as_str())), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl ProxyOps for MapProxy {
    fn assign(&self, value: &Value) {
        let pairs = self.pairs(value);
        self.clear();
        for (key, value) in pairs {
            self.set(key.to_value(), value);
        }
    }

    fn assign_with_defaults(&self, value: Option<&Value>) {
        match value.filter(|v| !v.is_null()) {
            Some(value) => self.assign(value),
            None => {
                self.clear();
                if let Some(default) = self.0.class.property.default_value.clone() {
                    self.assign(&default);
                }
            }
        }
    }

    fn diff(&self) -> Option<Value> {
        if !self.0.class.views.tracking.is_enabled() {
            return None;
        }
        let changed: Vec<(Key, Option<Element>)> = {
            let entries = self.0.entries.borrow();
            self.0
                .dirty
                .borrow()
                .iter()
                .map(|key| (key.clone(), entries.get(key).cloned()))
                .collect()
        };
        let out = changed
            .into_iter()
            .map(|(key, element)| {
                let value = match element {
                    Some(Element::Leaf(value)) => value,
                    Some(Element::Proxy(proxy)) => proxy.diff().unwrap_or_default(),
                    None => Value::Null,
                };
                (key.to_value(), value)
            })
            .collect();
        Some(Value::Entries(out))
    }

    fn mark_clean(&self) {
        self.0.dirty.borrow_mut().clear();
        let live: Vec<Proxy> = self
            .0
            .entries
            .borrow()
            .values()
            .filter_map(|element| match element {
                Element::Proxy(proxy) => Some(proxy.clone()),
                Element::Leaf(_) => None,
            })
            .collect();
        for proxy in live {
            proxy.mark_clean();
        }
    }

    fn to_json(&self) -> Value {
        Value::Entries(
            self.0
                .entries
                .borrow()
                .iter()
                .map(|(key, element)| {
                    let value = match element {
                        Element::Leaf(value) => value.clone(),
                        Element::Proxy(proxy) => proxy.to_json(),
                    };
                    (key.to_value(), value)
                })
                .collect(),
        )
    }

    fn to_json_without_defaults(&self, defaults: Option<&Value>) -> Option<Value> {
        let json = self.to_json();
        let default = defaults
            .or(self.0.class.property.default_value.as_ref())
            .map(|d| self.pairs(d))
            .unwrap_or_default();
        let default = Value::Entries(
            default
                .into_iter()
                .map(|(key, value)| (key.to_value(), value))
                .collect(),
        );
        (json != default).then_some(json)
    }
}

impl fmt::Debug for MapProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapProxy")
            .field("type_name", &self.0.class.property.type_name)
            .field("slot", &self.0.slot)
            .field("value", &self.to_json())
            .finish()
    }
}
