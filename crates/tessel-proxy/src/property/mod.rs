//! The compiled property tree.
//!
//! One [`Property`] node exists per schema node. Each reports a fixed
//! byte width (`data_width`, 0 when anything beneath it is variable
//! width) and a dirty-bit count (`dirty_width`). The tree is built once
//! and shared read-only by every instance of the schema.

mod array;
mod map;
mod object;

use std::rc::Rc;

use tessel_arena::MemoryConfig;
use tessel_core::{Codec, ConfigError, PrimitiveKind, Value};

use crate::class::{ProxyClass, Storage};
use crate::registry::Registry;
use crate::schema::{Decorator, Schema};
use crate::views::Views;

pub use array::ArrayProperty;
pub use map::MapProperty;
pub use object::{FieldLayout, ObjectProperty};

/// A compiled schema node.
#[derive(Clone, Debug)]
pub enum Property {
    /// A scalar leaf.
    Primitive(PrimitiveProperty),
    /// A fixed key set.
    Object(Rc<ObjectProperty>),
    /// An ordered, dynamically sized sequence.
    Array(Rc<ArrayProperty>),
    /// A dynamic key set.
    Map(Rc<MapProperty>),
}

impl Property {
    /// Compile `schema` against the built-in registry.
    pub fn from_schema(schema: &Schema) -> Result<Self, ConfigError> {
        Registry::default().build(schema, "")
    }

    /// The registry type name this node was built from.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Primitive(p) => &p.type_name,
            Self::Object(p) => &p.type_name,
            Self::Array(p) => &p.type_name,
            Self::Map(p) => &p.type_name,
        }
    }

    /// Fixed byte width, or 0 if shapeless.
    pub fn data_width(&self) -> usize {
        match self {
            Self::Primitive(p) => p.data_width(),
            Self::Object(p) => p.data_width,
            Self::Array(_) | Self::Map(_) => 0,
        }
    }

    /// Number of dirty bits this node occupies in its parent's span.
    ///
    /// Arrays and maps track dirtiness in their own index sets and so
    /// occupy no bits.
    pub fn dirty_width(&self) -> usize {
        match self {
            Self::Primitive(_) => 1,
            Self::Object(p) => p.dirty_width,
            Self::Array(_) | Self::Map(_) => 0,
        }
    }

    /// The value an instance takes when nothing else is supplied.
    ///
    /// `Null` for composites without a schema-level default.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Primitive(p) => p.default.clone(),
            Self::Object(p) => p.default_value.clone().unwrap_or_default(),
            Self::Array(p) => p.default_value.clone().unwrap_or_default(),
            Self::Map(p) => p.default_value.clone().unwrap_or_default(),
        }
    }

    /// Whether this node is an object, array or map.
    pub fn is_composite(&self) -> bool {
        !matches!(self, Self::Primitive(_))
    }

    /// The leaf behind this node, if it is one.
    pub fn as_primitive(&self) -> Option<&PrimitiveProperty> {
        match self {
            Self::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// The decorator attached to this node's schema.
    pub fn wrapper(&self) -> Option<&Decorator> {
        match self {
            Self::Primitive(_) => None,
            Self::Object(p) => p.wrapper.as_ref(),
            Self::Array(p) => p.wrapper.as_ref(),
            Self::Map(p) => p.wrapper.as_ref(),
        }
    }

    /// Dotted schema path of this node (`""` for a root).
    pub fn path(&self) -> &str {
        match self {
            Self::Primitive(p) => &p.path,
            Self::Object(p) => &p.path,
            Self::Array(p) => &p.path,
            Self::Map(p) => &p.path,
        }
    }

    /// Generate a proxy class whose leaves live on the instances.
    pub fn concrete(&self, views: &Views) -> Result<ProxyClass, ConfigError> {
        ProxyClass::build(self, views, Storage::Concrete, &MemoryConfig::default())
    }

    /// Generate a proxy class whose leaves live at fixed offsets in
    /// `views.data`.
    ///
    /// Arrays and maps have no buffer layout of their own; for them this
    /// is the same as [`concrete`](Self::concrete).
    pub fn map(&self, views: &Views) -> Result<ProxyClass, ConfigError> {
        ProxyClass::build(self, views, Storage::Mapped, &MemoryConfig::default())
    }
}

/// A scalar leaf.
#[derive(Clone, Debug)]
pub struct PrimitiveProperty {
    /// The leaf kind and codec.
    pub kind: PrimitiveKind,
    /// Registry type name.
    pub type_name: String,
    /// Coerced default value.
    pub default: Value,
    /// Dotted schema path.
    pub path: String,
}

impl PrimitiveProperty {
    /// Build a leaf of `kind` from its schema node.
    pub fn new(kind: PrimitiveKind, schema: &Schema, path: &str) -> Self {
        let default = schema
            .default_value
            .as_ref()
            .map_or_else(|| kind.zero(), |v| kind.coerce(v));
        Self {
            kind,
            type_name: schema.type_name.clone(),
            default,
            path: path.to_owned(),
        }
    }

    /// Encoded width in bytes, 0 for variable-width kinds.
    pub fn data_width(&self) -> usize {
        self.kind.size().unwrap_or(0)
    }
}

pub(crate) fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{path}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf(name: &str) -> Schema {
        Schema::primitive(name)
    }

    #[test]
    fn primitive_widths() {
        let p = Property::from_schema(&leaf("uint16")).unwrap();
        assert_eq!(p.data_width(), 2);
        assert_eq!(p.dirty_width(), 1);
        let p = Property::from_schema(&leaf("string")).unwrap();
        assert_eq!(p.data_width(), 0);
        assert_eq!(p.default_value(), Value::from(""));
    }

    #[test]
    fn schema_default_is_coerced() {
        let p = Property::from_schema(&leaf("uint8").with_default(300)).unwrap();
        assert_eq!(p.default_value(), Value::UInt(44));
    }

    #[test]
    fn unknown_type_reports_path() {
        let schema = Schema::object([(
            "o",
            Schema::object([("x", leaf("nope"))]),
        )]);
        assert_eq!(
            Property::from_schema(&schema).unwrap_err(),
            ConfigError::UnknownType {
                type_name: "nope".into(),
                path: "o.x".into(),
            }
        );
    }

    #[test]
    fn shapeless_child_makes_object_shapeless() {
        let schema = Schema::object([("a", leaf("uint32")), ("s", leaf("string"))]);
        let p = Property::from_schema(&schema).unwrap();
        assert_eq!(p.data_width(), 0);
        assert_eq!(p.dirty_width(), 2);
    }

    #[test]
    fn containers_occupy_no_bits() {
        let schema = Schema::object([
            ("n", leaf("uint8")),
            ("list", Schema::array(leaf("uint8"))),
            ("m", Schema::map(leaf("string"), leaf("bool"))),
        ]);
        let p = Property::from_schema(&schema).unwrap();
        assert_eq!(p.dirty_width(), 1);
        assert_eq!(p.data_width(), 0);
    }

    const FIXED: [&str; 11] = [
        "bool", "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64", "uint64",
        "float32", "float64",
    ];

    fn arb_schema() -> impl Strategy<Value = Schema> {
        let leaf = prop_oneof![
            (0..FIXED.len()).prop_map(|i| Schema::primitive(FIXED[i])),
            Just(Schema::primitive("string")),
            Just(Schema::primitive("varuint")),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            proptest::collection::vec(inner, 1..4).prop_map(|children| {
                Schema::object(
                    children
                        .into_iter()
                        .enumerate()
                        .map(|(i, s)| (format!("f{i}"), s)),
                )
            })
        })
    }

    proptest! {
        #[test]
        fn widths_are_sums_of_children(schema in arb_schema()) {
            let property = Property::from_schema(&schema).unwrap();
            if let Property::Object(object) = &property {
                let dirty: usize = object.fields.values().map(|f| f.property.dirty_width()).sum();
                prop_assert_eq!(object.dirty_width, dirty);
                let widths: Vec<usize> =
                    object.fields.values().map(|f| f.property.data_width()).collect();
                let expected = if widths.contains(&0) { 0 } else { widths.iter().sum() };
                prop_assert_eq!(object.data_width, expected);
            }
        }
    }
}
