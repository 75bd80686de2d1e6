//! Backing memory for Tessel pools.
//!
//! A pool owns two growable byte regions: `data` (one fixed-width record
//! per slot, used by buffer-mapped proxies) and `dirty` (one bit per leaf
//! per slot). Both are [`Memory`] instances that grow in whole pages and
//! never shrink, so byte offsets handed out earlier stay valid.
//!
//! ```text
//! Pool
//! ├── data:  SharedMemory ── slot × data_width bytes
//! ├── dirty: SharedMemory ── slot × dirty_width bits
//! └── length: Global ─────── slots ever materialized
//! ```
//!
//! Everything here is single-threaded: handles are `Rc`-shared between
//! the pool and the proxy classes it generates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod global;
pub mod memory;

pub use config::MemoryConfig;
pub use error::ArenaError;
pub use global::Global;
pub use memory::{Memory, SharedMemory};
