//! Benchmark profiles for the Tessel workspace.
//!
//! - [`entity_schema`]: a fixed-width entity (mapped storage)
//! - [`named_entity_schema`]: the same entity plus a string (concrete storage)
//! - [`random_updates`]: seeded partial updates for either schema

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessel_core::Value;
use tessel_proxy::Schema;

/// `{hp: uint16, team: uint8, alive: bool, position: {x, y: float32}}`,
/// 12 bytes and 5 dirty bits per slot.
pub fn entity_schema() -> Schema {
    Schema::object([
        ("hp", Schema::primitive("uint16").with_default(100)),
        ("team", Schema::primitive("uint8")),
        ("alive", Schema::primitive("bool").with_default(true)),
        (
            "position",
            Schema::object([
                ("x", Schema::primitive("float32")),
                ("y", Schema::primitive("float32")),
            ]),
        ),
    ])
}

/// [`entity_schema`] plus a `name` string, which makes it shapeless.
pub fn named_entity_schema() -> Schema {
    entity_schema().with_property("name", Schema::primitive("string"))
}

/// Generate `n` deterministic partial updates touching one to three
/// fields each.
pub fn random_updates(seed: u64, n: usize) -> Vec<Value> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let roll = rng.next_u32();
            let mut fields = Vec::new();
            if roll & 1 != 0 {
                fields.push(("hp", Value::from(rng.next_u32() % 200)));
            }
            if roll & 2 != 0 {
                fields.push(("alive", Value::from(rng.next_u32() & 1 == 1)));
            }
            if roll & 4 != 0 || fields.is_empty() {
                let x = (rng.next_u32() % 1024) as f32 / 4.0;
                let y = (rng.next_u32() % 1024) as f32 / 4.0;
                fields.push(("position", Value::object([("x", x), ("y", y)])));
            }
            Value::object(fields)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_proxy::Property;

    #[test]
    fn entity_is_fixed_width() {
        let property = Property::from_schema(&entity_schema()).unwrap();
        assert_eq!(property.data_width(), 12);
        assert_eq!(property.dirty_width(), 5);
        let named = Property::from_schema(&named_entity_schema()).unwrap();
        assert_eq!(named.data_width(), 0);
    }

    #[test]
    fn updates_are_deterministic() {
        assert_eq!(random_updates(42, 16), random_updates(42, 16));
        assert!(random_updates(7, 32).iter().all(|u| !u.as_object().unwrap().is_empty()));
    }
}
