//! Storage layer - disk I/O, page formats and record encoding.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level file I/O
//! - [`page`] - Page types and layouts
//! - [`Record`] - Fixed-size encoding of stored values

mod disk_manager;
pub mod page;
mod record;

pub use disk_manager::DiskManager;
pub use record::Record;
