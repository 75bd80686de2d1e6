//! Reusable schemas.
//!
//! - [`point`]: two `uint8` leaves, fixed width.
//! - [`four_bytes`]: four `uint8` leaves, one dirty byte per slot.
//! - [`nested`]: a leaf plus a nested object, fixed width.
//! - [`labelled`]: [`nested`] plus a string, shapeless.
//! - [`churn`]: a leaf with a non-zero default, for slot reuse.
//! - [`points`] / [`point_map`]: containers of [`point`].

use tessel_core::Value;
use tessel_proxy::Schema;

pub fn uint8() -> Schema {
    Schema::primitive("uint8")
}

/// `{x: uint8, y: uint8}`
pub fn point() -> Schema {
    Schema::object([("x", uint8()), ("y", uint8())])
}

/// `{a, b, c, d: uint8}`
pub fn four_bytes() -> Schema {
    Schema::object([("a", uint8()), ("b", uint8()), ("c", uint8()), ("d", uint8())])
}

/// `{x: uint8, o: {x: uint8}}`
pub fn nested() -> Schema {
    Schema::object([("x", uint8()), ("o", Schema::object([("x", uint8())]))])
}

/// `{x: uint8, o: {x: uint8}, s: string}`
pub fn labelled() -> Schema {
    nested().with_property("s", Schema::primitive("string"))
}

/// `{z: uint8 = 123, a: uint8}`
pub fn churn() -> Schema {
    Schema::object([("z", uint8().with_default(123)), ("a", uint8())])
}

/// An array of [`point`].
pub fn points() -> Schema {
    Schema::array(point())
}

/// A `uint8`-keyed map of [`point`].
pub fn point_map() -> Schema {
    Schema::map(uint8(), point())
}

/// A point value.
pub fn xy(x: u8, y: u8) -> Value {
    Value::object([("x", x), ("y", y)])
}
