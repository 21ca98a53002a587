//! Record stores: one file of fixed-size records per store.
//!
//! # Components
//! - [`PagedStore`] - slot allocation, lookup and the page free list
//! - [`PinnedPage`] - a resident record page for repeated access

mod paged_store;
mod pinned_page;

pub use paged_store::PagedStore;
pub use pinned_page::PinnedPage;
