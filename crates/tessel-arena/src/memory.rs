//! Page-growable byte buffers.
//!
//! [`Memory`] stands in for a host growable-memory primitive: it starts
//! empty, grows by whole pages up to a ceiling, and never shrinks. The
//! same type backs both the data region (byte records) and the dirty
//! region (bit vector), so it also carries the bit helpers used for
//! dirty tracking.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::MemoryConfig;
use crate::error::ArenaError;

/// A memory shared between a pool and the proxy classes it generates.
pub type SharedMemory = Rc<RefCell<Memory>>;

/// A zero-initialised byte buffer that grows in whole pages.
#[derive(Clone, Debug)]
pub struct Memory {
    bytes: Vec<u8>,
    page_size: usize,
    max_pages: u32,
}

impl Memory {
    /// Create an empty memory (zero pages).
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            bytes: Vec::new(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages,
        }
    }

    /// Create a memory of exactly `len` zeroed bytes with default growth
    /// parameters. Useful for driving a proxy class directly over a
    /// caller-sized region.
    pub fn with_len(len: usize) -> Self {
        let mut memory = Self::new(&MemoryConfig::default());
        memory.bytes.resize(len, 0);
        memory
    }

    /// Wrap this memory in a shared handle.
    pub fn into_shared(self) -> SharedMemory {
        Rc::new(RefCell::new(self))
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the memory holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Growth increment in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Current size in pages (rounded up).
    pub fn pages(&self) -> u64 {
        self.bytes.len().div_ceil(self.page_size) as u64
    }

    /// Grow by `pages` zeroed pages, returning the previous page count.
    ///
    /// Existing contents and offsets are preserved.
    pub fn grow(&mut self, pages: u32) -> Result<u64, ArenaError> {
        let previous = self.pages();
        let requested = previous + u64::from(pages);
        if requested > u64::from(self.max_pages) {
            return Err(ArenaError::CapacityExceeded {
                requested_pages: requested,
                max_pages: self.max_pages,
            });
        }
        let new_len = self.bytes.len() + pages as usize * self.page_size;
        self.bytes.resize(new_len, 0);
        log::debug!(
            "memory grew from {previous} to {requested} pages ({new_len} bytes)"
        );
        Ok(previous)
    }

    /// Grow by as many pages as needed to hold at least `len` bytes.
    /// A no-op if the memory is already large enough.
    pub fn ensure_len(&mut self, len: usize) -> Result<(), ArenaError> {
        if len <= self.bytes.len() {
            return Ok(());
        }
        let missing = len - self.bytes.len();
        let pages = missing.div_ceil(self.page_size);
        let pages = u32::try_from(pages).map_err(|_| ArenaError::CapacityExceeded {
            requested_pages: self.pages() + pages as u64,
            max_pages: self.max_pages,
        })?;
        self.grow(pages).map(|_| ())
    }

    /// Borrow the raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow the raw bytes mutably.
    ///
    /// Writes through this view bypass dirty tracking.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Overwrite every byte with `value`.
    pub fn fill(&mut self, value: u8) {
        self.bytes.fill(value);
    }

    // ── Bit vector ──────────────────────────────────────────────

    /// Whether `bit` is set. Bits past the end read as clear.
    pub fn test_bit(&self, bit: usize) -> bool {
        self.bytes
            .get(bit >> 3)
            .is_some_and(|byte| byte & (1 << (bit & 7)) != 0)
    }

    /// Set `bit`, returning whether it was already set.
    pub fn set_bit(&mut self, bit: usize) -> bool {
        debug_assert!(bit >> 3 < self.bytes.len(), "dirty bit {bit} out of range");
        match self.bytes.get_mut(bit >> 3) {
            Some(byte) => {
                let mask = 1 << (bit & 7);
                let was = *byte & mask != 0;
                *byte |= mask;
                was
            }
            None => false,
        }
    }

    /// Clear `bit`.
    pub fn clear_bit(&mut self, bit: usize) {
        if let Some(byte) = self.bytes.get_mut(bit >> 3) {
            *byte &= !(1 << (bit & 7));
        }
    }
}
