//! Eviction policy for the buffer pool.
//!
//! - [`FifoReplacer`] - evicts the longest-resident unpinned frame

mod fifo;

pub use fifo::FifoReplacer;
