//! Buffer pool management.
//!
//! Every store file gets its own buffer pool: a fixed set of frames caching
//! that file's pages, with pin counts deciding what may be evicted.
//!
//! # Components
//! - [`BufferPoolManager`] - The page cache
//! - [`Frame`] - A slot holding one page + metadata
//! - [`PageReadGuard`] / [`PageWriteGuard`] / [`PagePin`] - RAII pins
//! - [`BufferPoolStats`] - Hit/miss/eviction counters
//! - [`replacer`] - Eviction policy

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::Frame;
pub use page_guard::{PagePin, PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
