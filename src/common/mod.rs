//! Common types and utilities shared across pagedb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants
//! - Error types
//! - Identifiers (PageId, FrameId, Address)

mod address;
pub mod config;
pub mod error;
mod frame_id;
mod page_id;

pub use address::Address;
pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use page_id::PageId;
