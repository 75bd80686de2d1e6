//! Ordered, dynamically sized instances.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

use tessel_core::Value;

use super::object::ObjectInner;
use super::{ObjectProxy, OwnerLink, Proxy, ProxyOps};
use crate::class::{ArrayClass, Elements};
use crate::pool::{allocate_pooled, Pool};
use crate::property::ArrayProperty;

/// One occupied array position.
#[derive(Clone)]
pub(crate) enum Element {
    Leaf(Value),
    Proxy(Proxy),
}

impl Element {
    fn to_json(&self) -> Value {
        match self {
            Self::Leaf(value) => value.clone(),
            Self::Proxy(proxy) => proxy.to_json(),
        }
    }
}

pub(crate) struct ArrayInner {
    class: Rc<ArrayClass>,
    slot: usize,
    items: RefCell<Vec<Option<Element>>>,
    dirty: RefCell<BTreeSet<usize>>,
    this: Weak<ArrayInner>,
    parent: Option<Weak<ObjectInner>>,
    pub(crate) owner: RefCell<Option<OwnerLink>>,
}

/// An instance of an array property.
///
/// Leaf elements are stored by value. Composite elements are proxies drawn
/// from the array class's element pool; an element keeps its identity
/// until it is removed, and removed elements go back to the pool.
#[derive(Clone)]
pub struct ArrayProxy(pub(crate) Rc<ArrayInner>);

impl ArrayProxy {
    /// Upper bound on an array's length. Indices at or past it are
    /// ignored, as are lengths above it.
    pub const MAX_LENGTH: usize = u32::MAX as usize;

    pub(crate) fn construct(
        class: &Rc<ArrayClass>,
        slot: usize,
        parent: Option<Weak<ObjectInner>>,
    ) -> Self {
        Self(Rc::new_cyclic(|this| ArrayInner {
            class: Rc::clone(class),
            slot,
            items: RefCell::new(Vec::new()),
            dirty: RefCell::new(BTreeSet::new()),
            this: this.clone(),
            parent,
            owner: RefCell::new(None),
        }))
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &ArrayProxy) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The pool slot this instance's root is bound to.
    pub fn slot(&self) -> usize {
        self.0.slot
    }

    /// The array property.
    pub fn property(&self) -> &Rc<ArrayProperty> {
        &self.0.class.property
    }

    /// Number of positions, holes included.
    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    /// Whether the array has no positions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the element at `index`; `None` for holes and positions
    /// past the end.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0
            .items
            .borrow()
            .get(index)
            .and_then(Option::as_ref)
            .map(Element::to_json)
    }

    /// The composite element at `index`.
    pub fn at(&self, index: usize) -> Option<Proxy> {
        match self.0.items.borrow().get(index) {
            Some(Some(Element::Proxy(proxy))) => Some(proxy.clone()),
            _ => None,
        }
    }

    /// Write position `index`, growing the array if needed.
    ///
    /// `Null` leaves a hole; for composite elements it also returns the
    /// element to the pool. A composite already at `index` is merged into
    /// rather than replaced.
    ///
    /// Indices at or past [`MAX_LENGTH`](Self::MAX_LENGTH), or ones the
    /// array cannot grow to hold, are ignored with a warning.
    pub fn set_at(&self, index: usize, value: impl Into<Value>) {
        if !self.cover(index) {
            return;
        }
        let value = value.into();
        match &self.0.class.elements {
            Elements::Leaf(kind) => {
                let next = (!value.is_null()).then(|| kind.coerce(&value));
                if self.store(index, next.map(Element::Leaf)) {
                    self.mark_dirty(index);
                }
            }
            Elements::Pooled(pool) => self.set_composite(pool, index, &value),
        }
    }

    /// Truncate or extend to `len` positions.
    ///
    /// Truncation returns removed composites to the pool and marks every
    /// removed position dirty. Extension adds holes. Lengths above
    /// [`MAX_LENGTH`](Self::MAX_LENGTH) are ignored with a warning.
    pub fn set_length(&self, len: usize) {
        let removed = {
            let mut items = self.0.items.borrow_mut();
            if len >= items.len() {
                grow(&mut items, len, &self.0.class.property.path);
                return;
            }
            items.split_off(len)
        };
        for (offset, element) in removed.into_iter().enumerate().rev() {
            if let Some(Element::Proxy(proxy)) = element {
                self.release(&proxy);
            }
            self.mark_dirty(len + offset);
        }
    }

    /// Positions changed since the last clean, ascending.
    pub fn dirty_indices(&self) -> Vec<usize> {
        self.0.dirty.borrow().iter().copied().collect()
    }

    /// The pool composite elements are drawn from.
    pub fn element_pool(&self) -> Option<Rc<RefCell<Pool>>> {
        self.0.class.element_pool().cloned()
    }

    /// Record `index` as changed and report it.
    pub(crate) fn mark_dirty(&self, index: usize) {
        if !self.0.class.views.tracking.is_enabled() {
            return;
        }
        self.0.dirty.borrow_mut().insert(index);
        self.0.class.views.notify(index, &self.root());
    }

    fn insert_dirty(&self, index: usize) {
        if self.0.class.views.tracking.is_enabled() {
            self.0.dirty.borrow_mut().insert(index);
        }
    }

    /// Make sure position `index` exists, returning `false` if it cannot.
    fn cover(&self, index: usize) -> bool {
        let path = &self.0.class.property.path;
        match index.checked_add(1) {
            Some(len) if len <= Self::MAX_LENGTH => {
                grow(&mut self.0.items.borrow_mut(), len, path)
            }
            _ => {
                log::warn!("array '{path}': index {index} out of range, ignored");
                false
            }
        }
    }

    /// Drop every element without reporting it, returning composites to
    /// the element pool. Used when a pool slot is handed to a new occupant.
    pub(crate) fn reset(&self) {
        let items = std::mem::take(&mut *self.0.items.borrow_mut());
        self.0.dirty.borrow_mut().clear();
        for item in items {
            if let Some(Element::Proxy(proxy)) = item {
                self.release(&proxy);
            }
        }
    }

    fn root(&self) -> Proxy {
        if let Some(parent) = self.0.parent.as_ref().and_then(Weak::upgrade) {
            return Proxy::Object(ObjectProxy(parent));
        }
        Proxy::Array(self.clone())
    }

    /// Replace position `index`, returning whether its value changed.
    fn store(&self, index: usize, next: Option<Element>) -> bool {
        let mut items = self.0.items.borrow_mut();
        let Some(current) = items.get_mut(index) else {
            return false;
        };
        let same = match (&*current, &next) {
            (None, None) => true,
            (Some(Element::Leaf(a)), Some(Element::Leaf(b))) => a == b,
            _ => false,
        };
        if !same {
            *current = next;
        }
        !same
    }

    fn set_composite(&self, pool: &Rc<RefCell<Pool>>, index: usize, value: &Value) {
        let existing = self.at(index);
        if value.is_null() {
            let Some(proxy) = existing else {
                self.store(index, None);
                return;
            };
            self.store(index, None);
            self.release(&proxy);
            self.mark_dirty(index);
            return;
        }
        if let Some(proxy) = existing {
            proxy.assign(value);
        } else {
            let array = self.0.this.clone();
            let proxy = allocate_pooled(pool, Some(value), |proxy| {
                proxy.set_owner(OwnerLink::Array { array, index });
            });
            self.store(index, Some(Element::Proxy(proxy)));
        }
        self.insert_dirty(index);
    }

    fn release(&self, proxy: &Proxy) {
        if let Some(pool) = self.0.class.element_pool() {
            pool.borrow_mut().free(proxy);
        }
    }

    fn live_elements(&self) -> Vec<Proxy> {
        self.0
            .items
            .borrow()
            .iter()
            .filter_map(|item| match item {
                Some(Element::Proxy(proxy)) => Some(proxy.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Extend `items` with holes up to `len`, returning `false` (and leaving
/// `items` untouched) if the memory cannot be reserved or `len` is past
/// [`ArrayProxy::MAX_LENGTH`].
fn grow(items: &mut Vec<Option<Element>>, len: usize, path: &str) -> bool {
    if len <= items.len() {
        return true;
    }
    if len > ArrayProxy::MAX_LENGTH {
        log::warn!("array '{path}': length {len} out of range, ignored");
        return false;
    }
    if let Err(err) = items.try_reserve(len - items.len()) {
        log::warn!("array '{path}': cannot grow to {len}: {err}");
        return false;
    }
    items.resize_with(len, || None);
    true
}

/// Positions addressed by `value`: a list positionally, an indexed map or
/// an object with numeric keys sparsely.
fn sparse_entries(value: &Value) -> Vec<(usize, Value)> {
    match value {
        Value::Indexed(entries) => entries.iter().map(|(i, v)| (*i, v.clone())).collect(),
        Value::Object(fields) => fields
            .iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v.clone())))
            .collect(),
        _ => Vec::new(),
    }
}

impl ProxyOps for ArrayProxy {
    fn assign(&self, value: &Value) {
        if let Some(items) = value.as_list() {
            self.set_length(0);
            for (index, item) in items.iter().enumerate() {
                self.set_at(index, item);
            }
            return;
        }
        for (index, item) in sparse_entries(value) {
            self.set_at(index, item);
        }
    }

    fn assign_with_defaults(&self, value: Option<&Value>) {
        match value.filter(|v| !v.is_null()) {
            Some(value) => self.assign(value),
            None => {
                self.set_length(0);
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
        let changed: Vec<(usize, Option<Element>)> = {
            let items = self.0.items.borrow();
            self.0
                .dirty
                .borrow()
                .iter()
                .map(|&index| (index, items.get(index).cloned().flatten()))
                .collect()
        };
        let out: BTreeMap<usize, Value> = changed
            .into_iter()
            .map(|(index, element)| {
                let value = match element {
                    Some(Element::Leaf(value)) => value,
                    Some(Element::Proxy(proxy)) => proxy.diff().unwrap_or_default(),
                    None => Value::Null,
                };
                (index, value)
            })
            .collect();
        Some(Value::Indexed(out))
    }

    fn mark_clean(&self) {
        self.0.dirty.borrow_mut().clear();
        for proxy in self.live_elements() {
            proxy.mark_clean();
        }
    }

    fn to_json(&self) -> Value {
        Value::List(
            self.0
                .items
                .borrow()
                .iter()
                .map(|item| item.as_ref().map(Element::to_json).unwrap_or_default())
                .collect(),
        )
    }

    fn to_json_without_defaults(&self, defaults: Option<&Value>) -> Option<Value> {
        let json = self.to_json();
        let default = defaults
            .cloned()
            .or_else(|| self.0.class.property.default_value.clone())
            .unwrap_or_else(|| Value::List(Vec::new()));
        (json != default).then_some(json)
    }
}

impl fmt::Debug for ArrayProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayProxy")
            .field("type_name", &self.0.class.property.type_name)
            .field("slot", &self.0.slot)
            .field("value", &self.to_json())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::property::Property;
    use crate::schema::Schema;
    use crate::views::{Tracking, Views};

    fn leaf_array(tracking: Tracking) -> ArrayProxy {
        let views = Views::new().with_tracking(tracking);
        let class = Property::from_schema(&Schema::array(Schema::primitive("uint8")))
            .unwrap()
            .concrete(&views)
            .unwrap();
        class.construct(0).as_array().cloned().unwrap()
    }

    #[test]
    fn leaf_writes_notify_on_change_only() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let array = leaf_array(Tracking::notify(move |_, _| seen.set(seen.get() + 1)));
        array.assign_with_defaults(Some(&Value::list([1, 2, 3])));
        assert_eq!(calls.get(), 3);
        array.set_at(1, 2);
        assert_eq!(calls.get(), 3);
        array.set_at(1, 258);
        assert_eq!(array.get(1), Some(Value::UInt(2)));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn truncation_marks_removed_positions() {
        let array = leaf_array(Tracking::On);
        array.assign(&Value::list([1, 2, 3]));
        array.mark_clean();
        array.set_length(1);
        assert_eq!(array.dirty_indices(), [1, 2]);
        assert_eq!(
            array.diff(),
            Some(Value::indexed([(1, Value::Null), (2, Value::Null)]))
        );
        assert_eq!(array.to_json(), Value::list([1]));
    }

    #[test]
    fn growing_adds_holes() {
        let array = leaf_array(Tracking::On);
        array.set_length(2);
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(0), None);
        assert_eq!(array.to_json(), Value::list([Value::Null, Value::Null]));
        assert!(array.dirty_indices().is_empty());
    }

    #[test]
    fn sparse_assign_keeps_length() {
        let array = leaf_array(Tracking::On);
        array.assign(&Value::list([1, 2, 3]));
        array.assign(&Value::indexed([(1, 7)]));
        assert_eq!(array.to_json(), Value::list([1, 7, 3]));
        array.assign(&Value::object([("2", 9)]));
        assert_eq!(array.to_json(), Value::list([1, 7, 9]));
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let array = leaf_array(Tracking::On);
        array.assign(&Value::object([("18446744073709551615", 1)]));
        array.assign(&Value::indexed([(usize::MAX, 1)]));
        array.set_at(ArrayProxy::MAX_LENGTH, 1);
        array.set_length(usize::MAX);
        assert!(array.is_empty());
        assert!(array.dirty_indices().is_empty());

        array.assign(&Value::indexed([(1, 4), (usize::MAX, 5)]));
        assert_eq!(array.to_json(), Value::list([Value::Null, Value::from(4u8)]));
    }

    #[test]
    fn tracking_off_has_no_diff() {
        let array = leaf_array(Tracking::Off);
        array.set_at(0, 1);
        assert_eq!(array.diff(), None);
        assert!(array.dirty_indices().is_empty());
    }

    #[test]
    fn equal_to_default_is_omitted() {
        let array = leaf_array(Tracking::On);
        assert_eq!(array.to_json_without_defaults(None), None);
        array.assign(&Value::list([4]));
        assert_eq!(array.to_json_without_defaults(None), Some(Value::list([4])));
        assert_eq!(array.to_json_without_defaults(Some(&Value::list([4]))), None);
    }
}
