//! Arena-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur while growing backing memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The memory would exceed its configured page ceiling.
    CapacityExceeded {
        /// Total pages the growth would have required.
        requested_pages: u64,
        /// The configured ceiling.
        max_pages: u32,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                requested_pages,
                max_pages,
            } => {
                write!(
                    f,
                    "memory capacity exceeded: requested {requested_pages} pages, max {max_pages} pages"
                )
            }
        }
    }
}

impl Error for ArenaError {}
