//! Fixed-key-set instances.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tessel_core::{Codec, PrimitiveKind, Value};

use super::{ArrayProxy, MapProxy, OwnerLink, Proxy, ProxyOps};
use crate::class::{ObjectClass, ProxyClass, Storage};
use crate::property::{FieldLayout, ObjectProperty};

/// Storage for one declared field.
enum FieldCell {
    /// Concrete leaf held on the instance.
    Value(RefCell<Value>),
    /// Leaf encoded in the data memory.
    Mapped(PrimitiveKind),
    /// Nested composite, constructed with its parent.
    Child(Proxy),
}

pub(crate) struct ObjectInner {
    class: Rc<ObjectClass>,
    slot: usize,
    data_offset: usize,
    dirty_offset: usize,
    fields: SmallVec<[FieldCell; 8]>,
    /// The outermost object of this instance tree (itself for roots).
    root: Weak<ObjectInner>,
    pub(crate) owner: RefCell<Option<OwnerLink>>,
}

/// An instance of an object property.
///
/// Leaves are read and written by key; nested composites are reached with
/// [`child`](Self::child) and friends and keep their identity for the
/// lifetime of the parent.
#[derive(Clone)]
pub struct ObjectProxy(pub(crate) Rc<ObjectInner>);

impl ObjectProxy {
    pub(crate) fn construct(class: &Rc<ObjectClass>, slot: usize) -> Self {
        reserve_record(class, slot);
        let data_offset = match class.storage {
            Storage::Mapped => slot * class.property.data_width,
            Storage::Concrete => 0,
        };
        let dirty_offset = slot * class.property.dirty_width;
        Self(Rc::new_cyclic(|root| {
            build_inner(class, slot, data_offset, dirty_offset, root.clone())
        }))
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &ObjectProxy) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The pool slot this instance's root is bound to.
    pub fn slot(&self) -> usize {
        self.0.slot
    }

    /// The object property.
    pub fn property(&self) -> &Rc<ObjectProperty> {
        &self.0.class.property
    }

    /// Storage strategy of this instance's class.
    pub fn storage(&self) -> Storage {
        self.0.class.storage
    }

    /// Declared field names, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.layouts().keys().map(String::as_str)
    }

    /// Current value of `key`: the leaf value, or a snapshot of a nested
    /// composite. `None` for undeclared keys.
    pub fn get(&self, key: &str) -> Option<Value> {
        let (index, _, layout) = self.layouts().get_full(key)?;
        Some(match &self.0.fields[index] {
            FieldCell::Child(child) => child.to_json(),
            _ => self.read_leaf(index, layout),
        })
    }

    /// Write `key`. Leaves are coerced and marked dirty if the stored value
    /// changes; composites merge `value` via [`ProxyOps::assign`].
    /// Undeclared keys are ignored.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        if let Some(index) = self.layouts().get_index_of(key) {
            self.set_field(index, &value.into());
        }
    }

    /// The nested composite at `key`.
    pub fn child(&self, key: &str) -> Option<&Proxy> {
        match &self.0.fields[self.layouts().get_index_of(key)?] {
            FieldCell::Child(child) => Some(child),
            _ => None,
        }
    }

    /// The nested object at `key`.
    pub fn object(&self, key: &str) -> Option<&ObjectProxy> {
        self.child(key).and_then(Proxy::as_object)
    }

    /// The nested array at `key`.
    pub fn array(&self, key: &str) -> Option<&ArrayProxy> {
        self.child(key).and_then(Proxy::as_array)
    }

    /// The nested map at `key`.
    pub fn map(&self, key: &str) -> Option<&MapProxy> {
        self.child(key).and_then(Proxy::as_map)
    }

    /// Whether the leaf at `key` has changed since the last clean.
    pub fn is_dirty(&self, key: &str) -> bool {
        self.layouts()
            .get(key)
            .filter(|layout| !layout.property.is_composite())
            .is_some_and(|layout| self.test_bit(self.0.dirty_offset + layout.dirty_offset))
    }

    pub(crate) fn children(&self) -> impl Iterator<Item = &Proxy> {
        self.0.fields.iter().filter_map(|cell| match cell {
            FieldCell::Child(child) => Some(child),
            _ => None,
        })
    }

    fn layouts(&self) -> &IndexMap<String, FieldLayout> {
        &self.0.class.property.fields
    }

    fn root(&self) -> Proxy {
        let root = self.0.root.upgrade().unwrap_or_else(|| Rc::clone(&self.0));
        Proxy::Object(ObjectProxy(root))
    }

    fn set_field(&self, index: usize, value: &Value) {
        match &self.0.fields[index] {
            FieldCell::Child(child) => child.assign(value),
            _ => {
                if let Some((_, layout)) = self.layouts().get_index(index) {
                    self.write_leaf(index, layout, value);
                }
            }
        }
    }

    // ── Leaves ──────────────────────────────────────────────────

    fn read_leaf(&self, index: usize, layout: &FieldLayout) -> Value {
        match &self.0.fields[index] {
            FieldCell::Value(cell) => cell.borrow().clone(),
            FieldCell::Mapped(kind) => self.decode(*kind, layout),
            FieldCell::Child(child) => child.to_json(),
        }
    }

    fn decode(&self, kind: PrimitiveKind, layout: &FieldLayout) -> Value {
        let Some(data) = &self.0.class.views.data else {
            return kind.zero();
        };
        let offset = self.0.data_offset + layout.data_offset;
        match kind.decode(data.borrow().bytes(), offset) {
            Ok((value, _)) => value,
            Err(err) => {
                log::warn!("read of {} at byte {offset} failed: {err}", layout.property.path());
                kind.zero()
            }
        }
    }

    /// Store a leaf, returning whether the stored value changed. Marks the
    /// field's bit and notifies on change.
    fn write_leaf(&self, index: usize, layout: &FieldLayout, value: &Value) -> bool {
        let changed = match &self.0.fields[index] {
            FieldCell::Value(cell) => {
                let kind = match layout.property.as_primitive() {
                    Some(leaf) => leaf.kind,
                    None => return false,
                };
                let next = kind.coerce(value);
                let mut current = cell.borrow_mut();
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            }
            FieldCell::Mapped(kind) => self.encode(*kind, layout, value),
            FieldCell::Child(_) => false,
        };
        if changed {
            self.mark_bit(self.0.dirty_offset + layout.dirty_offset);
        }
        changed
    }

    fn encode(&self, kind: PrimitiveKind, layout: &FieldLayout, value: &Value) -> bool {
        let next = kind.coerce(value);
        if self.decode(kind, layout) == next {
            return false;
        }
        let Some(data) = &self.0.class.views.data else {
            return false;
        };
        let offset = self.0.data_offset + layout.data_offset;
        if let Err(err) = kind.encode(&next, data.borrow_mut().bytes_mut(), offset) {
            log::warn!("write of {} at byte {offset} failed: {err}", layout.property.path());
            return false;
        }
        true
    }

    // ── Dirty bits ──────────────────────────────────────────────

    fn test_bit(&self, bit: usize) -> bool {
        self.0
            .class
            .dirty()
            .is_some_and(|dirty| dirty.borrow().test_bit(bit))
    }

    fn mark_bit(&self, bit: usize) {
        let Some(dirty) = self.0.class.dirty() else {
            return;
        };
        dirty.borrow_mut().set_bit(bit);
        self.0.class.views.notify(bit, &self.root());
    }

    fn span(&self) -> std::ops::Range<usize> {
        let start = self.0.dirty_offset;
        start..start + self.0.class.property.dirty_width
    }
}

/// Make sure the memories cover `slot`'s record.
fn reserve_record(class: &ObjectClass, slot: usize) {
    let property = &class.property;
    if class.storage == Storage::Mapped {
        if let Some(data) = &class.views.data {
            if let Err(err) = data.borrow_mut().ensure_len((slot + 1) * property.data_width) {
                log::warn!("data memory for '{}' slot {slot}: {err}", property.type_name);
            }
        }
    }
    if let Some(dirty) = class.dirty() {
        let bytes = ((slot + 1) * property.dirty_width).div_ceil(8);
        if let Err(err) = dirty.borrow_mut().ensure_len(bytes) {
            log::warn!("dirty memory for '{}' slot {slot}: {err}", property.type_name);
        }
    }
}

fn build_inner(
    class: &Rc<ObjectClass>,
    slot: usize,
    data_offset: usize,
    dirty_offset: usize,
    root: Weak<ObjectInner>,
) -> ObjectInner {
    let fields = class
        .property
        .fields
        .values()
        .zip(&class.children)
        .map(|(layout, child)| match child {
            Some(ProxyClass::Object(nested)) => {
                FieldCell::Child(Proxy::Object(ObjectProxy(Rc::new(build_inner(
                    nested,
                    slot,
                    data_offset + layout.data_offset,
                    dirty_offset + layout.dirty_offset,
                    root.clone(),
                )))))
            }
            Some(ProxyClass::Array(nested)) => FieldCell::Child(Proxy::Array(
                ArrayProxy::construct(nested, slot, Some(root.clone())),
            )),
            Some(ProxyClass::Map(nested)) => FieldCell::Child(Proxy::Map(MapProxy::construct(
                nested,
                slot,
                Some(root.clone()),
            ))),
            None => match (&layout.property.as_primitive(), class.storage) {
                (Some(leaf), Storage::Mapped) => FieldCell::Mapped(leaf.kind),
                (Some(leaf), Storage::Concrete) => FieldCell::Value(RefCell::new(leaf.default.clone())),
                (None, _) => FieldCell::Value(RefCell::new(Value::Null)),
            },
        })
        .collect();
    ObjectInner {
        class: Rc::clone(class),
        slot,
        data_offset,
        dirty_offset,
        fields,
        root,
        owner: RefCell::new(None),
    }
}

impl ProxyOps for ObjectProxy {
    fn assign(&self, value: &Value) {
        let Some(input) = value.as_object() else {
            return;
        };
        for (key, v) in input {
            if let Some(index) = self.layouts().get_index_of(key.as_str()) {
                self.set_field(index, v);
            }
        }
    }

    fn assign_with_defaults(&self, value: Option<&Value>) {
        let property = Rc::clone(&self.0.class.property);
        for (index, (key, layout)) in property.fields.iter().enumerate() {
            let resolved = property.resolve(key, value, &layout.property);
            match &self.0.fields[index] {
                FieldCell::Child(child) => {
                    child.assign_with_defaults((!resolved.is_null()).then_some(&resolved));
                }
                _ => {
                    self.write_leaf(index, layout, &resolved);
                }
            }
        }
        // Stale contents from a previous occupant are indistinguishable
        // from fresh writes, so every bit in the span is seeded.
        let Some(dirty) = self.0.class.dirty() else {
            return;
        };
        let root = self.root();
        for bit in self.span() {
            let was = dirty.borrow_mut().set_bit(bit);
            if !was {
                self.0.class.views.notify(bit, &root);
            }
        }
    }

    fn diff(&self) -> Option<Value> {
        if !self.0.class.views.tracking.is_enabled() {
            return None;
        }
        let mut out = IndexMap::new();
        for (index, (key, layout)) in self.layouts().iter().enumerate() {
            match &self.0.fields[index] {
                FieldCell::Child(child) => {
                    if let Some(diff) = child.diff() {
                        out.insert(key.clone(), diff);
                    }
                }
                _ => {
                    if self.test_bit(self.0.dirty_offset + layout.dirty_offset) {
                        out.insert(key.clone(), self.read_leaf(index, layout));
                    }
                }
            }
        }
        (!out.is_empty()).then_some(Value::Object(out))
    }

    fn mark_clean(&self) {
        if let Some(dirty) = self.0.class.dirty() {
            let mut dirty = dirty.borrow_mut();
            for bit in self.span() {
                dirty.clear_bit(bit);
            }
        }
        for child in self.children() {
            child.mark_clean();
        }
    }

    fn to_json(&self) -> Value {
        Value::Object(
            self.layouts()
                .iter()
                .enumerate()
                .map(|(index, (key, layout))| (key.clone(), self.read_leaf(index, layout)))
                .collect(),
        )
    }

    fn to_json_without_defaults(&self, defaults: Option<&Value>) -> Option<Value> {
        let property = &self.0.class.property;
        let mut out = IndexMap::new();
        for (index, (key, layout)) in property.fields.iter().enumerate() {
            let default = property.resolve(key, defaults, &layout.property);
            match (&self.0.fields[index], layout.property.as_primitive()) {
                (FieldCell::Child(child), _) => {
                    let default = (!default.is_null()).then_some(&default);
                    if let Some(json) = child.to_json_without_defaults(default) {
                        out.insert(key.clone(), json);
                    }
                }
                (_, Some(leaf)) => {
                    let value = self.read_leaf(index, layout);
                    if value != leaf.kind.coerce(&default) {
                        out.insert(key.clone(), value);
                    }
                }
                (_, None) => {}
            }
        }
        (!out.is_empty()).then_some(Value::Object(out))
    }
}

impl fmt::Debug for ObjectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProxy")
            .field("type_name", &self.0.class.property.type_name)
            .field("slot", &self.0.slot)
            .field("storage", &self.0.class.storage)
            .field("value", &self.to_json())
            .finish()
    }
}
