//! Tessel: schema-compiled property trees with bit-packed dirty tracking.
//!
//! This is the facade crate that re-exports the public API of the Tessel
//! sub-crates. Describe a data shape with a [`Schema`](proxy::Schema),
//! allocate instances from a [`Pool`](proxy::Pool), mutate them, and read
//! back only what changed.
//!
//! # Quick start
//!
//! ```rust
//! use tessel::prelude::*;
//!
//! let schema = Schema::object([
//!     ("hp", Schema::primitive("uint16").with_default(100)),
//!     ("name", Schema::primitive("string")),
//!     ("position", Schema::object([
//!         ("x", Schema::primitive("float32")),
//!         ("y", Schema::primitive("float32")),
//!     ])),
//! ]);
//! let mut pool = Pool::new(&schema, PoolOptions::default()).unwrap();
//!
//! let entity = pool.allocate(Some(&Value::object([("name", "orc")])));
//! pool.mark_clean();
//!
//! let object = entity.as_object().unwrap();
//! object.set("hp", 75);
//! object.object("position").unwrap().set("x", 1.5);
//!
//! assert_eq!(
//!     entity.diff(),
//!     Some(Value::object([
//!         ("hp", Value::from(75u16)),
//!         ("position", Value::object([("x", 1.5)])),
//!     ])),
//! );
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tessel-core` | `Value`, `Key`, leaf codecs, `ConfigError` |
//! | [`arena`] | `tessel-arena` | Growable memories, `MemoryConfig`, `ArenaError` |
//! | [`proxy`] | `tessel-proxy` | Schemas, properties, proxies and pools |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Values, keys, leaf codecs and configuration errors (`tessel-core`).
pub use tessel_core as types;

/// Page-growable memories backing pools (`tessel-arena`).
///
/// Most users only touch these through [`proxy::PoolImports`].
pub use tessel_arena as arena;

/// Schemas, property trees, proxies and pools (`tessel-proxy`).
pub use tessel_proxy as proxy;

/// Common imports for typical Tessel usage.
///
/// ```rust
/// use tessel::prelude::*;
/// ```
pub mod prelude {
    // Values
    pub use tessel_core::{Key, PrimitiveKind, Value};

    // Errors
    pub use tessel_arena::ArenaError;
    pub use tessel_core::ConfigError;

    // Memory
    pub use tessel_arena::MemoryConfig;

    // Schemas and proxies
    pub use tessel_proxy::{
        ArrayProxy, MapProxy, ObjectProxy, Pool, PoolOptions, Property, Proxy, ProxyClass,
        ProxyOps, Registry, Schema, Storage, Tracking, Views,
    };
}
