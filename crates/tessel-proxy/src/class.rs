//! Proxy classes: a property bound to views and a storage strategy.
//!
//! A [`ProxyClass`] is generated once per (property, views) pair and then
//! stamps out any number of instances. Objects interpret their property's
//! field table at runtime: each leaf either lives on the instance
//! ([`Storage::Concrete`]) or at `slot × data_width + field offset` in the
//! shared data memory ([`Storage::Mapped`]). Arrays and maps carry a
//! class-level element pool when their elements are composite.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tessel_arena::{MemoryConfig, SharedMemory};
use tessel_core::{ConfigError, PrimitiveKind};

use crate::pool::{Pool, PoolOptions};
use crate::property::{ArrayProperty, MapProperty, ObjectProperty, Property};
use crate::proxy::{ArrayProxy, MapProxy, ObjectProxy, Proxy, ProxyOps};
use crate::views::{Tracking, Views};

/// Where an object's leaves are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Storage {
    /// Leaves are held on each instance.
    Concrete,
    /// Leaves are encoded at fixed offsets in the data memory.
    Mapped,
}

/// A generated class for one composite property.
#[derive(Clone)]
pub enum ProxyClass {
    /// Object class.
    Object(Rc<ObjectClass>),
    /// Array class.
    Array(Rc<ArrayClass>),
    /// Map class.
    Map(Rc<MapClass>),
}

impl ProxyClass {
    /// Generate the class for `property`. Element pools of nested arrays
    /// and maps grow according to `memory`.
    pub(crate) fn build(
        property: &Property,
        views: &Views,
        storage: Storage,
        memory: &MemoryConfig,
    ) -> Result<Self, ConfigError> {
        match property {
            Property::Primitive(p) => Err(ConfigError::NotComposite {
                type_name: p.type_name.clone(),
            }),
            Property::Object(p) => Ok(Self::Object(Rc::new(ObjectClass::build(
                p, views, storage, memory,
            )?))),
            Property::Array(p) => Ok(Self::Array(Rc::new(ArrayClass::build(p, views, memory)?))),
            Property::Map(p) => Ok(Self::Map(Rc::new(MapClass::build(p, views, memory)?))),
        }
    }

    /// Construct an instance bound to `slot` without touching dirty state.
    ///
    /// Leaves hold their declared defaults (concrete) or whatever the
    /// data memory already contains (mapped). Decorators run here.
    pub fn construct(&self, slot: usize) -> Proxy {
        let proxy = match self {
            Self::Object(class) => Proxy::Object(ObjectProxy::construct(class, slot)),
            Self::Array(class) => Proxy::Array(ArrayProxy::construct(class, slot, None)),
            Self::Map(class) => Proxy::Map(MapProxy::construct(class, slot, None)),
        };
        decorate(&proxy);
        proxy
    }

    /// Construct an instance bound to `slot` and seed it with defaults,
    /// marking its whole dirty span.
    pub fn instantiate(&self, slot: usize) -> Proxy {
        let proxy = self.construct(slot);
        proxy.assign_with_defaults(None);
        proxy
    }

    /// The property this class was generated from.
    pub fn property(&self) -> Property {
        match self {
            Self::Object(class) => Property::Object(class.property.clone()),
            Self::Array(class) => Property::Array(class.property.clone()),
            Self::Map(class) => Property::Map(class.property.clone()),
        }
    }

    /// Storage strategy of the class (arrays and maps are always concrete).
    pub fn storage(&self) -> Storage {
        match self {
            Self::Object(class) => class.storage,
            Self::Array(_) | Self::Map(_) => Storage::Concrete,
        }
    }

    /// The views the class is bound to.
    pub fn views(&self) -> &Views {
        match self {
            Self::Object(class) => &class.views,
            Self::Array(class) => &class.views,
            Self::Map(class) => &class.views,
        }
    }
}

impl fmt::Debug for ProxyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let property = self.property();
        f.debug_struct("ProxyClass")
            .field("type_name", &property.type_name())
            .field("storage", &self.storage())
            .finish()
    }
}

/// Decorators run children first, so a parent's hook sees decorated
/// children.
fn decorate(proxy: &Proxy) {
    if let Proxy::Object(object) = proxy {
        for child in object.children() {
            decorate(child);
        }
    }
    if let Some(wrapper) = proxy.wrapper() {
        wrapper.apply(proxy);
    }
}

// ── Object ──────────────────────────────────────────────────────

/// Generated class for an object property.
pub struct ObjectClass {
    pub(crate) property: Rc<ObjectProperty>,
    pub(crate) views: Views,
    pub(crate) storage: Storage,
    /// One entry per field; `Some` for composite fields.
    pub(crate) children: Vec<Option<ProxyClass>>,
}

impl ObjectClass {
    fn build(
        property: &Rc<ObjectProperty>,
        views: &Views,
        storage: Storage,
        memory: &MemoryConfig,
    ) -> Result<Self, ConfigError> {
        if storage == Storage::Mapped {
            if property.data_width == 0 {
                return Err(ConfigError::Shapeless {
                    path: property.path.clone(),
                });
            }
            if views.data.is_none() {
                return Err(ConfigError::InvalidMemoryConfig {
                    reason: format!(
                        "mapped storage for '{}' requires a data memory",
                        property.type_name
                    ),
                });
            }
        }
        let children = property
            .fields
            .values()
            .map(|layout| {
                layout
                    .property
                    .is_composite()
                    .then(|| ProxyClass::build(&layout.property, views, storage, memory))
                    .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            property: Rc::clone(property),
            views: views.clone(),
            storage,
            children,
        })
    }

    /// The object property.
    pub fn property(&self) -> &Rc<ObjectProperty> {
        &self.property
    }

    /// The storage strategy.
    pub fn storage(&self) -> Storage {
        self.storage
    }

    /// The dirty memory, if the class tracks leaf bits.
    pub(crate) fn dirty(&self) -> Option<&SharedMemory> {
        if self.views.tracking.is_enabled() {
            self.views.dirty.as_ref()
        } else {
            None
        }
    }
}

// ── Containers ──────────────────────────────────────────────────

/// How a container stores its elements.
pub(crate) enum Elements {
    /// Scalars, coerced through the element kind.
    Leaf(PrimitiveKind),
    /// Composite instances drawn from a class-level pool shared by every
    /// instance of the container class.
    Pooled(Rc<RefCell<Pool>>),
}

impl Elements {
    fn build(
        element: &Property,
        views: &Views,
        memory: &MemoryConfig,
    ) -> Result<Self, ConfigError> {
        if let Property::Primitive(leaf) = element {
            return Ok(Self::Leaf(leaf.kind));
        }
        let tracking = if views.tracking.is_enabled() {
            Tracking::notify(|_, proxy| proxy.touch_owner())
        } else {
            Tracking::Off
        };
        let pool = Pool::from_property(
            element.clone(),
            PoolOptions {
                tracking,
                memory: memory.clone(),
            },
        )?;
        Ok(Self::Pooled(Rc::new(RefCell::new(pool))))
    }

    fn pool(&self) -> Option<&Rc<RefCell<Pool>>> {
        match self {
            Self::Pooled(pool) => Some(pool),
            Self::Leaf(_) => None,
        }
    }
}

/// Generated class for an array property.
pub struct ArrayClass {
    pub(crate) property: Rc<ArrayProperty>,
    pub(crate) views: Views,
    pub(crate) elements: Elements,
}

impl ArrayClass {
    fn build(
        property: &Rc<ArrayProperty>,
        views: &Views,
        memory: &MemoryConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            property: Rc::clone(property),
            views: views.clone(),
            elements: Elements::build(&property.element, views, memory)?,
        })
    }

    /// The array property.
    pub fn property(&self) -> &Rc<ArrayProperty> {
        &self.property
    }

    /// The pool composite elements are drawn from.
    pub fn element_pool(&self) -> Option<&Rc<RefCell<Pool>>> {
        self.elements.pool()
    }
}

/// Generated class for a map property.
pub struct MapClass {
    pub(crate) property: Rc<MapProperty>,
    pub(crate) views: Views,
    pub(crate) elements: Elements,
}

impl MapClass {
    fn build(
        property: &Rc<MapProperty>,
        views: &Views,
        memory: &MemoryConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            property: Rc::clone(property),
            views: views.clone(),
            elements: Elements::build(&property.value, views, memory)?,
        })
    }

    /// The map property.
    pub fn property(&self) -> &Rc<MapProperty> {
        &self.property
    }

    /// The pool composite values are drawn from.
    pub fn element_pool(&self) -> Option<&Rc<RefCell<Pool>>> {
        self.elements.pool()
    }
}
