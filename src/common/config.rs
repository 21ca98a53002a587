//! Configuration for pagedb.
//!
//! Layout constants live next to the page formats that use them
//! (see [`crate::storage::page`]); this module holds the sizes every layer
//! agrees on plus the tunables a caller may override.

/// Size of a page in bytes (4KB).
///
/// Every store file is a sequence of pages of exactly this size. Page 0 is
/// the store's meta page; pages 1.. hold records.
///
/// # Addressing
/// Record addresses are byte offsets into the store file, so the page index
/// of an address is simply `address / PAGE_SIZE`.
pub const PAGE_SIZE: usize = 4096;

/// Default number of frames in a store's buffer pool.
///
/// A B+-tree mutation pins one node page per tree level, plus the meta page
/// and one record page while allocating.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Fewest frames a store can work with: `insert` and `remove` hold the
/// meta page and one record page at the same time.
pub const MIN_POOL_SIZE: usize = 2;

/// Tunables for a single [`PagedStore`](crate::store::PagedStore).
///
/// # Example
/// ```
/// use pagedb::common::config::StoreConfig;
///
/// let config = StoreConfig::default().with_pool_size(16);
/// assert_eq!(config.pool_size, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of frames in the store's buffer pool.
    pub pool_size: usize,
}

impl StoreConfig {
    /// Override the buffer pool size.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}
