use indexmap::IndexMap;
use tessel_core::{ConfigError, Value};

use super::{child_path, Property};
use crate::registry::Registry;
use crate::schema::{Decorator, Schema};

/// Where one object field sits inside its parent's record.
#[derive(Clone, Debug)]
pub struct FieldLayout {
    /// The field's compiled property.
    pub property: Property,
    /// Byte offset from the start of the parent's record (prefix sum of
    /// preceding siblings' data widths).
    pub data_offset: usize,
    /// Bit offset from the start of the parent's dirty span (prefix sum
    /// of preceding siblings' dirty widths).
    pub dirty_offset: usize,
}

/// An object node: a fixed, ordered key set.
#[derive(Clone, Debug)]
pub struct ObjectProperty {
    /// Registry type name.
    pub type_name: String,
    /// Dotted schema path.
    pub path: String,
    /// Fields in declaration order.
    pub fields: IndexMap<String, FieldLayout>,
    /// Sum of field data widths, or 0 if any field is shapeless.
    pub data_width: usize,
    /// Sum of field dirty widths.
    pub dirty_width: usize,
    /// Object-level default; its keys override field defaults.
    pub default_value: Option<Value>,
    /// Decorator from the schema.
    pub wrapper: Option<Decorator>,
}

impl ObjectProperty {
    /// Compile an object schema node, resolving each field through
    /// `registry` in declaration order.
    pub fn build(schema: &Schema, registry: &Registry, path: &str) -> Result<Self, ConfigError> {
        let mut fields = IndexMap::with_capacity(schema.properties.len());
        let mut data_width = 0;
        let mut dirty_width = 0;
        let mut shapeless = false;
        for (key, child) in &schema.properties {
            let property = registry.build(child, &child_path(path, key))?;
            let width = property.data_width();
            shapeless |= width == 0;
            let layout = FieldLayout {
                data_offset: data_width,
                dirty_offset: dirty_width,
                property,
            };
            data_width += width;
            dirty_width += layout.property.dirty_width();
            fields.insert(key.clone(), layout);
        }
        Ok(Self {
            type_name: schema.type_name.clone(),
            path: path.to_owned(),
            fields,
            data_width: if shapeless { 0 } else { data_width },
            dirty_width,
            default_value: schema.default_value.clone(),
            wrapper: schema.wrapper.clone(),
        })
    }

    /// Resolve the value a field takes during defaulting: `input[key]`,
    /// else this object's default for `key`, else the field's own default.
    /// `Null` counts as absent at every step.
    pub(crate) fn resolve(&self, key: &str, input: Option<&Value>, field: &Property) -> Value {
        let pick = |source: Option<&Value>| {
            source
                .and_then(|v| v.get(key))
                .filter(|v| !v.is_null())
                .cloned()
        };
        pick(input)
            .or_else(|| pick(self.default_value.as_ref()))
            .unwrap_or_else(|| field.default_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_prefix_sums() {
        let schema = Schema::object([
            ("a", Schema::primitive("uint8")),
            ("b", Schema::primitive("float64")),
            (
                "o",
                Schema::object([("x", Schema::primitive("uint16")), ("y", Schema::primitive("bool"))]),
            ),
            ("c", Schema::primitive("int32")),
        ]);
        let property = ObjectProperty::build(&schema, &Registry::default(), "").unwrap();
        let offsets: Vec<_> = property
            .fields
            .values()
            .map(|f| (f.data_offset, f.dirty_offset))
            .collect();
        assert_eq!(offsets, [(0, 0), (1, 1), (9, 2), (12, 4)]);
        assert_eq!(property.data_width, 16);
        assert_eq!(property.dirty_width, 5);
    }

    #[test]
    fn resolve_prefers_input_then_object_default() {
        let schema = Schema::object([
            ("x", Schema::primitive("uint8").with_default(1)),
            ("y", Schema::primitive("uint8")),
        ])
        .with_default(Value::object([("y", 2u8)]));
        let property = ObjectProperty::build(&schema, &Registry::default(), "").unwrap();
        let x = &property.fields["x"].property;
        let y = &property.fields["y"].property;
        assert_eq!(property.resolve("x", None, x), Value::UInt(1));
        assert_eq!(property.resolve("y", None, y), Value::UInt(2));
        let input = Value::object([("y", Value::from(9u8)), ("x", Value::Null)]);
        assert_eq!(property.resolve("y", Some(&input), y), Value::UInt(9));
        assert_eq!(property.resolve("x", Some(&input), x), Value::UInt(1));
    }
}
