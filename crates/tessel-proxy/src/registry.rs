//! Type-name → property-constructor table.
//!
//! Schema nodes name their type as a string; the registry resolves that
//! name to a constructor. The built-ins cover every primitive kind plus
//! `object`, `array` and `map`. Callers may register further names, for
//! example aliases or pre-shaped composites.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tessel_core::{ConfigError, PrimitiveKind};

use crate::property::{ArrayProperty, MapProperty, ObjectProperty, PrimitiveProperty, Property};
use crate::schema::Schema;

/// Builds a property from a schema node. Receives the registry so that
/// composite constructors can resolve their children, and the node's
/// dotted path for error reporting.
pub type Constructor = Rc<dyn Fn(&Schema, &Registry, &str) -> Result<Property, ConfigError>>;

/// A mapping from type name to property constructor.
#[derive(Clone)]
pub struct Registry {
    constructors: IndexMap<String, Constructor>,
}

impl Registry {
    /// A registry with no entries.
    pub fn empty() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// Add or replace the constructor for `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: impl Fn(&Schema, &Registry, &str) -> Result<Property, ConfigError> + 'static,
    ) {
        self.constructors.insert(name.into(), Rc::new(constructor));
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered type names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Compile `schema` (found at `path`) into a property.
    pub fn build(&self, schema: &Schema, path: &str) -> Result<Property, ConfigError> {
        let constructor =
            self.constructors
                .get(&schema.type_name)
                .ok_or_else(|| ConfigError::UnknownType {
                    type_name: schema.type_name.clone(),
                    path: path.to_owned(),
                })?;
        constructor(schema, self, path)
    }
}

impl Default for Registry {
    /// The built-in types.
    fn default() -> Self {
        let mut registry = Self::empty();
        for kind in PrimitiveKind::ALL {
            registry.register(kind.name(), move |schema, _, path| {
                Ok(Property::Primitive(PrimitiveProperty::new(kind, schema, path)))
            });
        }
        registry.register("object", |schema, registry, path| {
            ObjectProperty::build(schema, registry, path).map(|p| Property::Object(Rc::new(p)))
        });
        registry.register("array", |schema, registry, path| {
            ArrayProperty::build(schema, registry, path).map(|p| Property::Array(Rc::new(p)))
        });
        registry.register("map", |schema, registry, path| {
            MapProperty::build(schema, registry, path).map(|p| Property::Map(Rc::new(p)))
        });
        registry
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = Registry::default();
        for name in ["bool", "varint", "string", "object", "array", "map"] {
            assert!(registry.contains(name), "{name}");
        }
        assert_eq!(registry.names().count(), 17);
    }

    #[test]
    fn aliases_resolve_through_register() {
        let mut registry = Registry::default();
        registry.register("vec2", |_, registry, path| {
            let shape = Schema::object([
                ("x", Schema::primitive("float32")),
                ("y", Schema::primitive("float32")),
            ]);
            registry.build(&shape, path)
        });
        let schema = Schema::object([("position", Schema::new("vec2"))]);
        let property = registry.build(&schema, "").unwrap();
        assert_eq!(property.data_width(), 8);
        assert_eq!(property.dirty_width(), 2);
    }

    #[test]
    fn unknown_names_fail() {
        let err = Registry::empty()
            .build(&Schema::primitive("uint8"), "")
            .unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }
}
