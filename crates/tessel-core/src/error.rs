//! Error types shared across the Tessel workspace.
//!
//! Organized by subsystem: schema/property construction (fatal,
//! surfaced before any instance exists) and the leaf codec.

use std::error::Error;
use std::fmt;

/// Errors raised while compiling a schema into a property tree or
/// while configuring a pool.
///
/// All of these are construction-time failures; none can occur once a
/// pool has been built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A schema node names a type that is not in the registry.
    UnknownType {
        /// The unregistered type name.
        type_name: String,
        /// Dotted path of the offending schema node (`""` for the root).
        path: String,
    },
    /// A pool was asked to manage a leaf type.
    NotComposite {
        /// The leaf type name.
        type_name: String,
    },
    /// A composite schema node is missing a required child schema
    /// (`element` for arrays, `key`/`value` for maps).
    MissingChild {
        /// The composite type name.
        type_name: String,
        /// Name of the missing child (`element`, `key` or `value`).
        child: &'static str,
        /// Dotted path of the offending schema node.
        path: String,
    },
    /// A map key schema resolved to a composite type.
    InvalidKey {
        /// The key's type name.
        type_name: String,
        /// Dotted path of the offending schema node.
        path: String,
    },
    /// Buffer-mapped storage was requested for a property that has no
    /// fixed byte width.
    Shapeless {
        /// Dotted path of the shapeless node.
        path: String,
    },
    /// A JSON schema document could not be parsed.
    InvalidSchema {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// Backing-memory configuration is out of range.
    InvalidMemoryConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

fn at(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { type_name, path } => {
                write!(f, "type '{type_name}' at {} not registered", at(path))
            }
            Self::NotComposite { type_name } => {
                write!(f, "type '{type_name}' not a proxy type")
            }
            Self::MissingChild {
                type_name,
                child,
                path,
            } => write!(
                f,
                "{type_name} at {} is missing its '{child}' schema",
                at(path)
            ),
            Self::InvalidKey { type_name, path } => write!(
                f,
                "map key type '{type_name}' at {} is not a primitive",
                at(path)
            ),
            Self::Shapeless { path } => write!(
                f,
                "property at {} has no fixed width and cannot be buffer-mapped",
                at(path)
            ),
            Self::InvalidSchema { reason } => write!(f, "invalid schema: {reason}"),
            Self::InvalidMemoryConfig { reason } => {
                write!(f, "invalid memory config: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Errors from encoding or decoding a single leaf value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before the value did.
    Truncated {
        /// Bytes required from the start offset.
        needed: usize,
        /// Bytes available from the start offset.
        available: usize,
    },
    /// A variable-length integer ran past 64 bits.
    Overlong,
    /// String bytes were not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, available } => {
                write!(f, "buffer truncated: need {needed} bytes, have {available}")
            }
            Self::Overlong => write!(f, "variable-length integer exceeds 64 bits"),
            Self::InvalidUtf8 => write!(f, "string is not valid UTF-8"),
        }
    }
}

impl Error for CodecError {}
