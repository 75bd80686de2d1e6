use tessel_core::{ConfigError, Value};

use super::{child_path, PrimitiveProperty, Property};
use crate::registry::Registry;
use crate::schema::{Decorator, Schema};

/// A map node: a dynamic set of scalar keys, each holding one value type.
#[derive(Clone, Debug)]
pub struct MapProperty {
    /// Registry type name.
    pub type_name: String,
    /// Dotted schema path.
    pub path: String,
    /// The key leaf; keys are coerced through it.
    pub key: PrimitiveProperty,
    /// The value property.
    pub value: Property,
    /// Entries a fresh instance starts with.
    pub default_value: Option<Value>,
    /// Decorator from the schema.
    pub wrapper: Option<Decorator>,
}

impl MapProperty {
    /// Compile a map schema node.
    pub fn build(schema: &Schema, registry: &Registry, path: &str) -> Result<Self, ConfigError> {
        let missing = |child| ConfigError::MissingChild {
            type_name: schema.type_name.clone(),
            child,
            path: path.to_owned(),
        };
        let key_schema = schema.key.as_deref().ok_or_else(|| missing("key"))?;
        let value_schema = schema.value.as_deref().ok_or_else(|| missing("value"))?;
        let key_path = child_path(path, "key");
        let key = match registry.build(key_schema, &key_path)? {
            Property::Primitive(key) => key,
            other => {
                return Err(ConfigError::InvalidKey {
                    type_name: other.type_name().to_owned(),
                    path: key_path,
                })
            }
        };
        Ok(Self {
            type_name: schema.type_name.clone(),
            path: path.to_owned(),
            key,
            value: registry.build(value_schema, &child_path(path, "value"))?,
            default_value: schema.default_value.clone(),
            wrapper: schema.wrapper.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_keys_are_rejected() {
        let schema = Schema::map(
            Schema::object([("x", Schema::primitive("uint8"))]),
            Schema::primitive("uint8"),
        );
        let err = MapProperty::build(&schema, &Registry::default(), "m").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidKey {
                type_name: "object".into(),
                path: "m.key".into(),
            }
        );
    }

    #[test]
    fn missing_value_is_reported() {
        let mut schema = Schema::new("map");
        schema.key = Some(Box::new(Schema::primitive("uint8")));
        let err = MapProperty::build(&schema, &Registry::default(), "").unwrap_err();
        assert!(matches!(err, ConfigError::MissingChild { child: "value", .. }));
    }
}
