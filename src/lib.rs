//! pagedb - a disk-backed B+-tree index over paged record stores.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            pagedb                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/)                        │   │
//! │  │   BPlusIndex<K, V>: split / borrow / merge, path stack   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                  ↓ nodes       ↓ keys       ↓ values            │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Record Stores (store/)                         │   │
//! │  │   PagedStore<V>: slot bitmap + page free list            │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Buffer Pool (buffer/)                          │   │
//! │  │   BufferPoolManager + Frame + FIFO replacer + guards     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │   DiskManager + Page + PageHeader + page formats         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Address, Error, config)
//! - [`storage`] - Disk I/O, page formats and the `Record` codec
//! - [`buffer`] - Buffer pool management and eviction
//! - [`store`] - Fixed-size record stores
//! - [`index`] - The B+-tree
//! - [`workload`] - Random operation streams and replay
//!
//! # Quick Start
//! ```no_run
//! use pagedb::BPlusIndex;
//!
//! let mut index: BPlusIndex<i32, i64> =
//!     BPlusIndex::open("data.nodes", "data.keys", "data.values")?;
//!
//! index.insert(1, 100)?;
//! index.update(&1, &200)?;
//! assert_eq!(index.get(&1)?, 200);
//! # Ok::<(), pagedb::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;
pub mod store;
pub mod workload;

// Re-export commonly used items at crate root for convenience
pub use common::config::{StoreConfig, PAGE_SIZE};
pub use common::{Address, Error, PageId, Result};

pub use buffer::StatsSnapshot;
pub use index::{BPlusIndex, TreeShape};
pub use storage::Record;
pub use store::PagedStore;
