//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between a store file and its buffer pool. The typed views in
//! [`super::meta_page`] and [`super::slot_page`] interpret its bytes.

use crate::common::config::PAGE_SIZE;

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` outside tests; copying 4KB should be
/// explicit, see [`Page::copy_from`].
///
/// # Example
/// ```
/// use pagedb::storage::page::Page;
///
/// let mut page = Page::new();
/// page.write_i32(8, -7);
/// assert_eq!(page.read_i32(8), -7);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Overwrite this page with the bytes of `other`.
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Page type from the header.
    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[PageHeader::OFFSET_PAGE_TYPE])
    }

    /// Write a page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the page are complete.
    pub fn update_checksum(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.data[PageHeader::OFFSET_CHECKSUM..PageHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// Verify the page checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }

    // ========================================================================
    // Little-endian field access
    // ========================================================================

    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(buf)
    }

    #[inline]
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn read_i32(&self, offset: usize) -> i32 {
        self.read_u32(offset) as i32
    }

    #[inline]
    pub fn write_i32(&mut self, offset: usize, value: i32) {
        self.write_u32(offset, value as u32);
    }

    #[inline]
    pub fn read_i64(&self, offset: usize) -> i64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[offset..offset + 8]);
        i64::from_le_bytes(buf)
    }

    #[inline]
    pub fn write_i64(&mut self, offset: usize, value: i64) {
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.copy_from(self);
        new_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_and_alignment() {
        assert_eq!(std::mem::size_of::<Page>(), PAGE_SIZE);
        assert_eq!(std::mem::align_of::<Page>(), 4096);
    }

    #[test]
    fn test_field_access_little_endian() {
        let mut page = Page::new();
        page.write_i64(16, 0x0102_0304_0506_0708);
        assert_eq!(page.as_slice()[16], 0x08);
        assert_eq!(page.read_i64(16), 0x0102_0304_0506_0708);

        page.write_i32(40, -1);
        assert_eq!(page.read_u32(40), u32::MAX);
        assert_eq!(page.read_i32(40), -1);
    }

    #[test]
    fn test_checksum_roundtrip() {
        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::Data));
        page.as_mut_slice()[2048] = 0x5A;
        page.update_checksum();
        assert!(page.verify_checksum());

        let mut copy = page.clone();
        copy.as_mut_slice()[2048] = 0x5B;
        assert!(!copy.verify_checksum());
    }

    #[test]
    fn test_copy_and_reset() {
        let mut a = Page::new();
        a.as_mut_slice()[10] = 9;
        let mut b = Page::new();
        b.copy_from(&a);
        assert_eq!(b.as_slice()[10], 9);

        b.reset();
        assert_eq!(b.as_slice()[10], 0);
        assert_eq!(b.page_type(), PageType::Invalid);
    }
}
