//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`PageHeader`] - Type and checksum at the start of every page
//! - [`MetaPage`] - The store header on page 0
//! - [`SlotLayout`] - Bitmap-tracked fixed-size slots on record pages

mod meta_page;
#[allow(clippy::module_inception)]
mod page;
mod page_header;
mod slot_page;

pub use meta_page::MetaPage;
pub use page::Page;
pub use page_header::{PageHeader, PageType};
pub use slot_page::{SlotLayout, BITMAP_WORDS, MAX_RECORD_SIZE, SLOT_REGION_OFFSET};
