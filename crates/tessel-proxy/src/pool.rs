//! Recycling arena for composite instances.
//!
//! A [`Pool`] owns a data memory and a dirty memory and hands out proxies
//! bound to consecutive slots. Freed slots go on a LIFO free list; the
//! next allocation pops one and gets back the *same* proxy object, with
//! its stale contents overwritten by defaulting assignment.
//!
//! ```text
//!   data   [ slot 0 record | slot 1 record | slot 2 record | ...pages ]
//!   dirty  [ slot 0 bits   | slot 1 bits   | ...                      ]
//!   free   [ 1 ]            (slot 1 recycled next)
//! ```
//!
//! Fixed-width object schemas get buffer-mapped proxies over the data
//! memory; shapeless schemas, arrays and maps get concrete proxies and
//! leave the data memory unused.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tessel_arena::{ArenaError, Global, Memory, MemoryConfig, SharedMemory};
use tessel_core::{ConfigError, Value};

use crate::class::{ProxyClass, Storage};
use crate::property::Property;
use crate::proxy::{Proxy, ProxyOps};
use crate::registry::Registry;
use crate::schema::Schema;
use crate::views::{Tracking, Views};

/// Construction options for a [`Pool`].
#[derive(Clone, Debug, Default)]
pub struct PoolOptions {
    /// Dirty-tracking mode for every instance.
    pub tracking: Tracking,
    /// Growth parameters for both memories.
    pub memory: MemoryConfig,
}

impl PoolOptions {
    /// Options with the given tracking mode and default memory growth.
    pub fn with_tracking(tracking: Tracking) -> Self {
        Self {
            tracking,
            ..Self::default()
        }
    }
}

/// Raw handles exported for an external consumer of the pool's memories.
///
/// Writes through these bypass dirty tracking. Handles stay valid across
/// growth; byte views taken from them must be re-fetched after it.
#[derive(Clone, Debug)]
pub struct PoolImports {
    /// Record memory.
    pub data: SharedMemory,
    /// Dirty bit memory.
    pub dirty: SharedMemory,
    /// Number of materialized slots.
    pub length: Global,
}

struct PoolSlot {
    proxy: Proxy,
    live: bool,
}

/// A recycling arena of proxies for one composite property.
pub struct Pool {
    property: Property,
    class: ProxyClass,
    data: SharedMemory,
    dirty: SharedMemory,
    mapped: bool,
    tracking: bool,
    /// Whether instances keep index sets that the dirty memory does not
    /// cover.
    containers: bool,
    slots: Vec<PoolSlot>,
    free_list: Vec<usize>,
    length: Global,
    config: MemoryConfig,
}

impl Pool {
    /// Compile `schema` with the built-in registry and create a pool for it.
    pub fn new(schema: &Schema, options: PoolOptions) -> Result<Self, ConfigError> {
        Self::with_registry(schema, &Registry::default(), options)
    }

    /// Compile `schema` against `registry` and create a pool for it.
    pub fn with_registry(
        schema: &Schema,
        registry: &Registry,
        options: PoolOptions,
    ) -> Result<Self, ConfigError> {
        Self::from_property(registry.build(schema, "")?, options)
    }

    /// Create a pool for an already compiled property.
    ///
    /// Fails with [`ConfigError::NotComposite`] for leaves and with
    /// [`ConfigError::InvalidMemoryConfig`] for a zero page size or limit.
    pub fn from_property(property: Property, options: PoolOptions) -> Result<Self, ConfigError> {
        if !property.is_composite() {
            return Err(ConfigError::NotComposite {
                type_name: property.type_name().to_owned(),
            });
        }
        options.memory.validate()?;
        let data = Memory::new(&options.memory).into_shared();
        let dirty = Memory::new(&options.memory).into_shared();
        let mapped = property.data_width() > 0;
        let tracking = options.tracking.is_enabled();

        let mut views = Views::new().with_tracking(options.tracking);
        if mapped {
            views = views.with_data(Rc::clone(&data));
        }
        if tracking {
            views = views.with_dirty(Rc::clone(&dirty));
        }
        let storage = if mapped {
            Storage::Mapped
        } else {
            Storage::Concrete
        };
        let class = ProxyClass::build(&property, &views, storage, &options.memory)?;
        log::debug!(
            "pool for '{}' created: {:?} storage, {} data bytes and {} dirty bits per slot",
            property.type_name(),
            class.storage(),
            property.data_width(),
            property.dirty_width(),
        );
        Ok(Self {
            containers: has_containers(&property),
            property,
            class,
            data,
            dirty,
            mapped,
            tracking,
            slots: Vec::new(),
            free_list: Vec::new(),
            length: Global::new(0),
            config: options.memory,
        })
    }

    // ── Allocation ──────────────────────────────────────────────

    /// Allocate an instance and populate it from `value` with defaults.
    ///
    /// # Panics
    ///
    /// Panics if the backing memories cannot grow.
    pub fn allocate(&mut self, value: Option<&Value>) -> Proxy {
        self.allocate_with(value, |_| {})
    }

    /// Like [`allocate`](Self::allocate), running `init` on the proxy
    /// before its fields are populated.
    ///
    /// # Panics
    ///
    /// Panics if the backing memories cannot grow.
    pub fn allocate_with(&mut self, value: Option<&Value>, init: impl FnOnce(&Proxy)) -> Proxy {
        match self.try_allocate_with(value, init) {
            Ok(proxy) => proxy,
            Err(err) => panic!("pool for '{}' exhausted: {err}", self.property.type_name()),
        }
    }

    /// Fallible form of [`allocate_with`](Self::allocate_with).
    pub fn try_allocate_with(
        &mut self,
        value: Option<&Value>,
        init: impl FnOnce(&Proxy),
    ) -> Result<Proxy, ArenaError> {
        let proxy = self.acquire(init)?;
        proxy.assign_with_defaults(value);
        Ok(proxy)
    }

    /// Pop a free slot or materialize a new one, then run `init`. Leaves
    /// are left as they are; a reused slot's containers are emptied quietly
    /// so the new occupant's diff carries no tombstones from the old one.
    pub(crate) fn acquire(&mut self, init: impl FnOnce(&Proxy)) -> Result<Proxy, ArenaError> {
        let proxy = match self.free_list.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot];
                entry.live = true;
                log::trace!("'{}' slot {slot} reused", self.property.type_name());
                let proxy = entry.proxy.clone();
                if self.containers {
                    proxy.reset();
                }
                proxy
            }
            None => {
                let slot = self.slots.len();
                self.reserve(slot + 1)?;
                let proxy = self.class.construct(slot);
                self.slots.push(PoolSlot {
                    proxy: proxy.clone(),
                    live: true,
                });
                self.length.increment();
                log::trace!("'{}' slot {slot} allocated", self.property.type_name());
                proxy
            }
        };
        init(&proxy);
        Ok(proxy)
    }

    /// Return `proxy` to the free list.
    ///
    /// The proxy's dirty state is cleared but its contents persist until
    /// the slot is reallocated. Double frees and proxies from another pool
    /// are ignored with a warning.
    pub fn free(&mut self, proxy: &Proxy) {
        let slot = proxy.slot();
        match self.slots.get_mut(slot) {
            Some(entry) if entry.proxy.ptr_eq(proxy) => {
                if !entry.live {
                    log::warn!("'{}' slot {slot} freed twice", self.property.type_name());
                    return;
                }
                entry.live = false;
                proxy.mark_clean();
                self.free_list.push(slot);
                log::trace!("'{}' slot {slot} freed", self.property.type_name());
            }
            _ => log::warn!(
                "'{}' pool asked to free a proxy it does not own (slot {slot})",
                self.property.type_name()
            ),
        }
    }

    /// Clear every instance's dirty state at once by zeroing the dirty
    /// memory.
    pub fn mark_clean(&self) {
        self.dirty.borrow_mut().fill(0);
        if self.containers {
            for proxy in self.proxies() {
                proxy.mark_clean();
            }
        }
    }

    fn reserve(&mut self, count: usize) -> Result<(), ArenaError> {
        if self.mapped {
            let before = self.data.borrow().pages();
            self.data
                .borrow_mut()
                .ensure_len(count * self.property.data_width())?;
            let after = self.data.borrow().pages();
            if after != before {
                log::debug!(
                    "'{}' data memory grew from {before} to {after} pages",
                    self.property.type_name()
                );
            }
        }
        if self.tracking {
            let bits = count * self.property.dirty_width();
            self.dirty.borrow_mut().ensure_len(bits.div_ceil(8))?;
        }
        Ok(())
    }

    // ── Introspection ───────────────────────────────────────────

    /// Slots materialized so far, live or free.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot has been materialized.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots currently allocated.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Slots waiting on the free list.
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// The live proxy at `slot`.
    pub fn proxy(&self, slot: usize) -> Option<&Proxy> {
        self.slots
            .get(slot)
            .filter(|entry| entry.live)
            .map(|entry| &entry.proxy)
    }

    /// Every live proxy, by slot.
    pub fn proxies(&self) -> impl Iterator<Item = &Proxy> {
        self.slots
            .iter()
            .filter(|entry| entry.live)
            .map(|entry| &entry.proxy)
    }

    /// Diffs of every live instance with changes, keyed by slot.
    pub fn diff(&self) -> BTreeMap<usize, Value> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.live)
            .filter_map(|(slot, entry)| entry.proxy.diff().map(|diff| (slot, diff)))
            .filter(|(_, diff)| !is_empty_diff(diff))
            .collect()
    }

    /// Raw memory handles and the materialized-slot counter.
    pub fn imports(&self) -> PoolImports {
        PoolImports {
            data: Rc::clone(&self.data),
            dirty: Rc::clone(&self.dirty),
            length: self.length.clone(),
        }
    }

    /// The pooled property.
    pub fn property(&self) -> &Property {
        &self.property
    }

    /// The class instances are constructed from.
    pub fn class(&self) -> &ProxyClass {
        &self.class
    }

    /// Storage strategy of the pooled instances.
    pub fn storage(&self) -> Storage {
        self.class.storage()
    }

    /// Memory growth parameters.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("type_name", &self.property.type_name())
            .field("storage", &self.storage())
            .field("len", &self.len())
            .field("free", &self.free_count())
            .finish()
    }
}

/// Acquire from a shared element pool and populate outside the borrow, so
/// that dirty notifications raised while populating may reach the pool.
///
/// # Panics
///
/// Panics if the pool's memories cannot grow.
pub(crate) fn allocate_pooled(
    pool: &Rc<RefCell<Pool>>,
    value: Option<&Value>,
    init: impl FnOnce(&Proxy),
) -> Proxy {
    let acquired = pool.borrow_mut().acquire(init);
    let proxy = match acquired {
        Ok(proxy) => proxy,
        Err(err) => panic!("element pool exhausted: {err}"),
    };
    proxy.assign_with_defaults(value);
    proxy
}

fn has_containers(property: &Property) -> bool {
    match property {
        Property::Primitive(_) => false,
        Property::Array(_) | Property::Map(_) => true,
        Property::Object(object) => object
            .fields
            .values()
            .any(|field| has_containers(&field.property)),
    }
}

fn is_empty_diff(diff: &Value) -> bool {
    match diff {
        Value::Indexed(entries) => entries.is_empty(),
        Value::Entries(entries) => entries.is_empty(),
        Value::Object(fields) => fields.values().all(is_empty_diff),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Schema {
        Schema::object([
            ("x", Schema::primitive("uint8")),
            ("y", Schema::primitive("uint8")),
        ])
    }

    #[test]
    fn leaves_are_rejected() {
        let err = Pool::new(&Schema::primitive("uint8"), PoolOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not a proxy type"));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let options = PoolOptions {
            memory: MemoryConfig {
                page_size: 0,
                ..MemoryConfig::default()
            },
            ..PoolOptions::default()
        };
        assert!(matches!(
            Pool::new(&point(), options),
            Err(ConfigError::InvalidMemoryConfig { .. })
        ));
    }

    #[test]
    fn free_slots_are_reused_lifo() {
        let mut pool = Pool::new(&point(), PoolOptions::default()).unwrap();
        let a = pool.allocate(None);
        let b = pool.allocate(None);
        pool.free(&a);
        pool.free(&b);
        assert_eq!(pool.free_count(), 2);
        assert!(pool.allocate(None).ptr_eq(&b));
        assert!(pool.allocate(None).ptr_eq(&a));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.imports().length.get(), 2);
    }

    #[test]
    fn double_free_is_ignored() {
        let mut pool = Pool::new(&point(), PoolOptions::default()).unwrap();
        let a = pool.allocate(None);
        pool.free(&a);
        pool.free(&a);
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn growth_is_bounded_by_the_page_limit() {
        let options = PoolOptions {
            memory: MemoryConfig {
                page_size: 2,
                max_pages: 1,
            },
            ..PoolOptions::default()
        };
        let mut pool = Pool::new(&point(), options).unwrap();
        assert!(pool.try_allocate_with(None, |_| {}).is_ok());
        assert!(matches!(
            pool.try_allocate_with(None, |_| {}),
            Err(ArenaError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn shapeless_schemas_are_concrete() {
        let schema = Schema::object([("name", Schema::primitive("string"))]);
        let pool = Pool::new(&schema, PoolOptions::default()).unwrap();
        assert_eq!(pool.storage(), Storage::Concrete);
        let pool = Pool::new(&point(), PoolOptions::default()).unwrap();
        assert_eq!(pool.storage(), Storage::Mapped);
    }
}
