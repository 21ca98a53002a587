//! Store header kept on page 0.

use crate::common::{Error, PageId, Result};

use super::page::Page;
use super::page_header::{PageHeader, PageType};

/// Decoded contents of a store's meta page.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       5     PageHeader (type = Meta)
/// 5       8     total_pages (i64, next unallocated page index)
/// 13      8     free_page_head (i64, 0 = empty free list)
/// 21      4     record_size (i32, fixed when the store is created)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaPage {
    /// Number of pages in the file, meta page included.
    pub total_pages: i64,
    /// First page of the free-page list.
    pub free_page_head: Option<PageId>,
    /// Byte size of every record in the store.
    pub record_size: i32,
}

impl MetaPage {
    pub const OFFSET_TOTAL_PAGES: usize = PageHeader::SIZE;
    pub const OFFSET_FREE_PAGE_HEAD: usize = PageHeader::SIZE + 8;
    pub const OFFSET_RECORD_SIZE: usize = PageHeader::SIZE + 16;

    /// Header of a freshly created store: only the meta page exists.
    pub fn new(record_size: usize) -> Self {
        Self {
            total_pages: 1,
            free_page_head: None,
            record_size: record_size as i32,
        }
    }

    /// Decode the meta page.
    ///
    /// # Errors
    /// `PageCorrupted` if the page is not typed as a meta page.
    pub fn from_page(page: &Page) -> Result<Self> {
        if page.page_type() != PageType::Meta {
            return Err(Error::PageCorrupted {
                page_id: PageId::META.0,
                reason: format!("expected meta page, found {:?}", page.page_type()),
            });
        }

        let head = page.read_i64(Self::OFFSET_FREE_PAGE_HEAD);
        Ok(Self {
            total_pages: page.read_i64(Self::OFFSET_TOTAL_PAGES),
            free_page_head: (head != 0).then(|| PageId::new(head as u32)),
            record_size: page.read_i32(Self::OFFSET_RECORD_SIZE),
        })
    }

    /// Encode into `page`, setting its type to `Meta`.
    pub fn write_to(&self, page: &mut Page) {
        page.set_header(&PageHeader::new(PageType::Meta));
        page.write_i64(Self::OFFSET_TOTAL_PAGES, self.total_pages);
        page.write_i64(
            Self::OFFSET_FREE_PAGE_HEAD,
            self.free_page_head.map_or(0, |p| p.0 as i64),
        );
        page.write_i32(Self::OFFSET_RECORD_SIZE, self.record_size);
    }
}
