//! Backing-memory configuration.

use tessel_core::ConfigError;

/// Growth parameters for a pool's backing memories.
///
/// Validated at pool construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Growth increment in bytes.
    ///
    /// Default: 65 536, the page size of a WebAssembly linear memory, so
    /// an external module importing the buffer sees page-aligned growth.
    pub page_size: usize,

    /// Upper bound on the number of pages a single memory may hold.
    ///
    /// Default: 65 536 (4 GiB at the default page size).
    pub max_pages: u32,
}

impl MemoryConfig {
    /// Default page size in bytes.
    pub const DEFAULT_PAGE_SIZE: usize = 65_536;

    /// Default page ceiling.
    pub const DEFAULT_MAX_PAGES: u32 = 65_536;

    /// Check that both parameters are non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidMemoryConfig {
                reason: "page_size must be at least 1 byte".into(),
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidMemoryConfig {
                reason: "max_pages must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Largest byte length a memory may reach.
    pub fn max_bytes(&self) -> usize {
        self.page_size.saturating_mul(self.max_pages as usize)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            page_size: Self::DEFAULT_PAGE_SIZE,
            max_pages: Self::DEFAULT_MAX_PAGES,
        }
    }
}
