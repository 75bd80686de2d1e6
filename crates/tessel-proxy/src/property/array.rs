use tessel_core::{ConfigError, Value};

use super::{child_path, Property};
use crate::registry::Registry;
use crate::schema::{Decorator, Schema};

/// An array node: an ordered, dynamically sized sequence of one element
/// type.
#[derive(Clone, Debug)]
pub struct ArrayProperty {
    /// Registry type name.
    pub type_name: String,
    /// Dotted schema path.
    pub path: String,
    /// The element property.
    pub element: Property,
    /// Contents a fresh instance starts with.
    pub default_value: Option<Value>,
    /// Decorator from the schema.
    pub wrapper: Option<Decorator>,
}

impl ArrayProperty {
    /// Compile an array schema node.
    pub fn build(schema: &Schema, registry: &Registry, path: &str) -> Result<Self, ConfigError> {
        let element = schema
            .element
            .as_deref()
            .ok_or_else(|| ConfigError::MissingChild {
                type_name: schema.type_name.clone(),
                child: "element",
                path: path.to_owned(),
            })?;
        Ok(Self {
            type_name: schema.type_name.clone(),
            path: path.to_owned(),
            element: registry.build(element, &child_path(path, "element"))?,
            default_value: schema.default_value.clone(),
            wrapper: schema.wrapper.clone(),
        })
    }
}
