//! Declarative data-shape descriptions.
//!
//! A [`Schema`] is plain, immutable input: a type name plus whichever
//! children that type needs (`properties` for objects, `element` for
//! arrays, `key`/`value` for maps), an optional default and an optional
//! decorator. It is resolved against a [`Registry`](crate::Registry)
//! to build a [`Property`](crate::Property) tree.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Deserialize;
use tessel_core::{ConfigError, Value};

use crate::proxy::Proxy;

/// A hook run once on every newly constructed instance of a schema node.
///
/// Recycled instances are not decorated again.
#[derive(Clone)]
pub struct Decorator(Rc<dyn Fn(&Proxy)>);

impl Decorator {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&Proxy) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Run the hook.
    pub fn apply(&self, proxy: &Proxy) {
        (self.0)(proxy);
    }
}

impl fmt::Debug for Decorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Decorator")
    }
}

/// A declarative description of one node of a data shape.
#[derive(Clone, Debug)]
pub struct Schema {
    /// Registry type name (`uint8`, `string`, `object`, `array`, `map`, ...).
    pub type_name: String,
    /// Object fields, in declaration order.
    pub properties: IndexMap<String, Schema>,
    /// Array element schema.
    pub element: Option<Box<Schema>>,
    /// Map key schema; must resolve to a primitive.
    pub key: Option<Box<Schema>>,
    /// Map value schema.
    pub value: Option<Box<Schema>>,
    /// Schema-level default, overriding the type's implicit default.
    pub default_value: Option<Value>,
    /// Post-construction decorator.
    pub wrapper: Option<Decorator>,
}

impl Schema {
    /// A bare schema node of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: IndexMap::new(),
            element: None,
            key: None,
            value: None,
            default_value: None,
            wrapper: None,
        }
    }

    /// A leaf of the given primitive type.
    pub fn primitive(type_name: impl Into<String>) -> Self {
        Self::new(type_name)
    }

    /// An object with the given fields, in order.
    pub fn object<K, I>(properties: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        let mut schema = Self::new("object");
        schema.properties = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        schema
    }

    /// An array of `element`.
    pub fn array(element: Schema) -> Self {
        let mut schema = Self::new("array");
        schema.element = Some(Box::new(element));
        schema
    }

    /// A map from `key` to `value`.
    pub fn map(key: Schema, value: Schema) -> Self {
        let mut schema = Self::new("map");
        schema.key = Some(Box::new(key));
        schema.value = Some(Box::new(value));
        schema
    }

    /// Append an object field.
    pub fn with_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Set the schema-level default.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Attach a decorator.
    pub fn with_wrapper(mut self, wrapper: impl Fn(&Proxy) + 'static) -> Self {
        self.wrapper = Some(Decorator::new(wrapper));
        self
    }

    /// Parse a JSON schema document.
    ///
    /// Field names follow the wire convention: `type`, `properties`,
    /// `element`, `key`, `value`, `defaultValue`.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawSchema = serde_json::from_str(json).map_err(invalid)?;
        Ok(raw.into())
    }

    /// Convert an already-parsed JSON schema document.
    pub fn from_json(json: serde_json::Value) -> Result<Self, ConfigError> {
        let raw: RawSchema = serde_json::from_value(json).map_err(invalid)?;
        Ok(raw.into())
    }
}

fn invalid(err: serde_json::Error) -> ConfigError {
    ConfigError::InvalidSchema {
        reason: err.to_string(),
    }
}

#[derive(Deserialize)]
struct RawSchema {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    properties: IndexMap<String, RawSchema>,
    #[serde(default)]
    element: Option<Box<RawSchema>>,
    #[serde(default)]
    key: Option<Box<RawSchema>>,
    #[serde(default)]
    value: Option<Box<RawSchema>>,
    #[serde(default, rename = "defaultValue")]
    default_value: Option<serde_json::Value>,
}

impl From<RawSchema> for Schema {
    fn from(raw: RawSchema) -> Self {
        let boxed = |child: Option<Box<RawSchema>>| child.map(|c| Box::new(Schema::from(*c)));
        Self {
            type_name: raw.type_name,
            properties: raw
                .properties
                .into_iter()
                .map(|(k, v)| (k, Schema::from(v)))
                .collect(),
            element: boxed(raw.element),
            key: boxed(raw.key),
            value: boxed(raw.value),
            default_value: raw.default_value.map(Value::from),
            wrapper: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_preserves_declaration_order() {
        let schema = Schema::from_json_str(
            r#"{
                "type": "object",
                "properties": {
                    "z": {"type": "uint8", "defaultValue": 123},
                    "a": {"type": "array", "element": {"type": "string"}},
                    "m": {"type": "map", "key": {"type": "uint8"}, "value": {"type": "bool"}}
                }
            }"#,
        )
        .unwrap();
        let keys: Vec<_> = schema.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
        assert_eq!(
            schema.properties["z"].default_value,
            Some(Value::UInt(123))
        );
        assert_eq!(
            schema.properties["a"].element.as_ref().unwrap().type_name,
            "string"
        );
        assert!(schema.properties["m"].key.is_some());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Schema::from_json_str(r#"{"properties": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchema { .. }));
    }

    #[test]
    fn builders_compose() {
        let schema = Schema::object([("x", Schema::primitive("uint8"))])
            .with_property("y", Schema::primitive("float32").with_default(1.5))
            .with_default(Value::object([("x", 3u8)]));
        assert_eq!(schema.properties.len(), 2);
        assert_eq!(schema.default_value.unwrap().get("x"), Some(&Value::UInt(3)));
    }
}
