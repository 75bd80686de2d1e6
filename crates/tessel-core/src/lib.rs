//! Core types for the Tessel property-tree workspace.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! dynamic [`Value`] that flows through every proxy operation, the
//! hashable map [`Key`], the leaf [`PrimitiveKind`]s with their binary
//! [`Codec`], and the construction-time [`ConfigError`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod value;

pub use codec::{Codec, PrimitiveKind};
pub use error::{CodecError, ConfigError};
pub use value::{Key, Value};
