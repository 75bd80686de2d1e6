//! Schema-compiled property trees with dirty-tracked proxies.
//!
//! A [`Schema`] describes a data shape. Resolving it through a
//! [`Registry`] yields a [`Property`] tree that knows every node's byte
//! width and dirty-bit count. A property generates a [`ProxyClass`] bound
//! to a set of [`Views`], either concrete (leaves on the instance) or
//! buffer-mapped (leaves encoded in a shared data memory), and a [`Pool`]
//! recycles instances of one class over growable memories.
//!
//! Every instance implements [`ProxyOps`]: merge-assign, defaulting
//! assign, `diff` of everything changed since the last `mark_clean`, and
//! JSON snapshots with or without defaults.
//!
//! The whole crate is single-threaded; instances, classes and pools are
//! `Rc`-shared and not `Send`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod class;
pub mod pool;
pub mod property;
pub mod proxy;
pub mod registry;
pub mod schema;
pub mod views;

pub use class::{ArrayClass, MapClass, ObjectClass, ProxyClass, Storage};
pub use pool::{Pool, PoolImports, PoolOptions};
pub use property::{
    ArrayProperty, FieldLayout, MapProperty, ObjectProperty, PrimitiveProperty, Property,
};
pub use proxy::{ArrayProxy, MapProxy, ObjectProxy, Proxy, ProxyOps};
pub use registry::{Constructor, Registry};
pub use schema::{Decorator, Schema};
pub use views::{DirtyCallback, Tracking, Views};
