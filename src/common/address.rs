//! Record address type.

use std::fmt;

use crate::common::config::PAGE_SIZE;
use crate::common::PageId;
use crate::storage::page::SLOT_REGION_OFFSET;

/// Location of one record inside a store file.
///
/// An address is the byte offset of the record's slot within the file:
/// ```text
/// page_index * PAGE_SIZE + SLOT_REGION_OFFSET + slot_index * record_size
/// ```
/// It stays valid for exactly as long as the record is live. Once the
/// record is removed the slot can be handed out again by a later insert.
///
/// # Example
/// ```
/// use pagedb::{Address, PageId};
///
/// let addr = Address::from_slot(PageId::new(2), 3, 8);
/// assert_eq!(addr.page_id(), PageId::new(2));
/// assert_eq!(addr.slot(8), Some(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub u64);

impl Address {
    /// Placeholder stored in unused node entries. Never a valid record
    /// address since page 0 is the meta page.
    pub const NULL: Address = Address(0);

    /// Address of `slot` on `page` for records of `record_size` bytes.
    #[inline]
    pub fn from_slot(page: PageId, slot: usize, record_size: usize) -> Self {
        Address(page.file_offset() + (SLOT_REGION_OFFSET + slot * record_size) as u64)
    }

    /// Page containing the record, or `None` if the page index does not fit
    /// a [`PageId`].
    #[inline]
    pub fn checked_page_id(&self) -> Option<PageId> {
        u32::try_from(self.0 / PAGE_SIZE as u64).ok().map(PageId::new)
    }

    /// Page containing the record. Out-of-range addresses map to
    /// `PageId(u32::MAX)`, which no store ever allocates.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.checked_page_id().unwrap_or(PageId::new(u32::MAX))
    }

    /// Slot index within the page, or `None` if the address does not fall
    /// on a slot boundary for `record_size`.
    pub fn slot(&self, record_size: usize) -> Option<usize> {
        let in_page = (self.0 % PAGE_SIZE as u64) as usize;
        let rel = in_page.checked_sub(SLOT_REGION_OFFSET)?;
        if record_size == 0 || rel % record_size != 0 {
            return None;
        }
        Some(rel / record_size)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Addr({}+{})", self.page_id().0, self.0 % PAGE_SIZE as u64)
    }
}
