//! Page identifier type.

use std::fmt;

use crate::common::config::PAGE_SIZE;

/// Identifies a page within one store file.
///
/// Page 0 is always the store's meta page ([`PageId::META`]); record pages
/// start at 1. A page id is also the high part of every record
/// [`Address`](crate::common::Address): `address / PAGE_SIZE`.
///
/// # Example
/// ```
/// use pagedb::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_data());
/// assert!(!PageId::META.is_data());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// The meta page holding the store header.
    pub const META: PageId = PageId(0);

    /// The first page that can hold records.
    pub const FIRST_DATA: PageId = PageId(1);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Whether this page can hold records (anything but the meta page).
    #[inline]
    pub fn is_data(&self) -> bool {
        *self != Self::META
    }

    /// Byte offset of the page within the store file.
    #[inline]
    pub fn file_offset(&self) -> u64 {
        (self.0 as u64) * (PAGE_SIZE as u64)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::META {
            write!(f, "Page(META)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_page() {
        assert_eq!(PageId::META.0, 0);
        assert!(!PageId::META.is_data());
        assert!(PageId::FIRST_DATA.is_data());
    }

    #[test]
    fn test_file_offset() {
        assert_eq!(PageId::new(0).file_offset(), 0);
        assert_eq!(PageId::new(3).file_offset(), 3 * 4096);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageId::META), "Page(META)");
    }
}
