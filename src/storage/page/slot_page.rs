//! Record page layout: free-list link, occupancy bitmap, slot region.
//!
//! ```text
//! ┌────────────┬────────────────┬─────────────────┬──────────────┬────────────────────┐
//! │ PageHeader │ next_free_page │ first_free_slot │ bitmap       │ slot region        │
//! │ (5)        │ i32            │ i32 (-1 = full) │ 128 × u32    │ capacity × size    │
//! └────────────┴────────────────┴─────────────────┴──────────────┴────────────────────┘
//! ```
//!
//! A bitmap bit is set iff its slot holds a live record. `first_free_slot`
//! is the lowest clear bit, or -1 once the page is full. `next_free_page`
//! is only meaningful while the page is linked into the store's free list.

use crate::common::config::PAGE_SIZE;
use crate::common::{Address, Error, PageId, Result};

use super::page::Page;
use super::page_header::{PageHeader, PageType};

pub const OFFSET_NEXT_FREE_PAGE: usize = PageHeader::SIZE;
pub const OFFSET_FIRST_FREE_SLOT: usize = PageHeader::SIZE + 4;
pub const OFFSET_BITMAP: usize = PageHeader::SIZE + 8;

/// Number of 32-bit occupancy words reserved on every record page.
pub const BITMAP_WORDS: usize = 128;

/// Offset of slot 0 within a record page.
pub const SLOT_REGION_OFFSET: usize = OFFSET_BITMAP + BITMAP_WORDS * 4;

/// Largest record a page can hold.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - SLOT_REGION_OFFSET;

/// Slot geometry for one record size.
///
/// All accessors take the page they operate on, so the same layout serves
/// pages borrowed from any guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    record_size: usize,
    capacity: usize,
}

impl SlotLayout {
    /// Layout for records of `record_size` bytes.
    ///
    /// # Errors
    /// `Configuration` if the record is empty or larger than a page payload.
    pub fn new(record_size: usize) -> Result<Self> {
        if record_size == 0 {
            return Err(Error::Configuration(
                "record size must be at least one byte".to_string(),
            ));
        }
        if record_size > MAX_RECORD_SIZE {
            return Err(Error::Configuration(format!(
                "record size {} exceeds page payload of {} bytes",
                record_size, MAX_RECORD_SIZE
            )));
        }

        let capacity = MAX_RECORD_SIZE / record_size;
        debug_assert!(capacity <= BITMAP_WORDS * 32);

        Ok(Self {
            record_size,
            capacity,
        })
    }

    #[inline]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Number of slots per page.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bitmap words actually covering slots.
    #[inline]
    pub fn bitmap_words_used(&self) -> usize {
        self.capacity.div_ceil(32)
    }

    /// Format `page` as an empty record page.
    pub fn init(&self, page: &mut Page) {
        page.reset();
        page.set_header(&PageHeader::new(PageType::Data));
        page.write_i32(OFFSET_NEXT_FREE_PAGE, 0);
        page.write_i32(OFFSET_FIRST_FREE_SLOT, 0);
    }

    // ========================================================================
    // Addressing
    // ========================================================================

    /// Address of `slot` on `page_id`.
    #[inline]
    pub fn address(&self, page_id: PageId, slot: usize) -> Address {
        Address::from_slot(page_id, slot, self.record_size)
    }

    /// Slot index of `addr`, validated against this layout.
    pub fn slot_of(&self, addr: Address) -> Result<usize> {
        match addr.checked_page_id() {
            Some(page_id) if page_id.is_data() => {}
            _ => return Err(Error::InvalidAddress(addr.0)),
        }
        match addr.slot(self.record_size) {
            Some(slot) if slot < self.capacity => Ok(slot),
            _ => Err(Error::InvalidAddress(addr.0)),
        }
    }

    // ========================================================================
    // Free-list fields
    // ========================================================================

    pub fn next_free_page(&self, page: &Page) -> Option<PageId> {
        let next = page.read_i32(OFFSET_NEXT_FREE_PAGE);
        (next > 0).then(|| PageId::new(next as u32))
    }

    pub fn set_next_free_page(&self, page: &mut Page, next: Option<PageId>) {
        page.write_i32(OFFSET_NEXT_FREE_PAGE, next.map_or(0, |p| p.0 as i32));
    }

    pub fn first_free_slot(&self, page: &Page) -> Option<usize> {
        let slot = page.read_i32(OFFSET_FIRST_FREE_SLOT);
        (slot >= 0).then_some(slot as usize)
    }

    pub fn set_first_free_slot(&self, page: &mut Page, slot: Option<usize>) {
        page.write_i32(OFFSET_FIRST_FREE_SLOT, slot.map_or(-1, |s| s as i32));
    }

    // ========================================================================
    // Occupancy bitmap
    // ========================================================================

    #[inline]
    fn word_offset(slot: usize) -> usize {
        OFFSET_BITMAP + (slot >> 5) * 4
    }

    pub fn is_occupied(&self, page: &Page, slot: usize) -> bool {
        page.read_u32(Self::word_offset(slot)) & (1 << (slot & 31)) != 0
    }

    pub fn set_occupied(&self, page: &mut Page, slot: usize, occupied: bool) {
        let offset = Self::word_offset(slot);
        let word = page.read_u32(offset);
        let bit = 1u32 << (slot & 31);
        page.write_u32(offset, if occupied { word | bit } else { word & !bit });
    }

    /// Lowest free slot strictly after `slot`, skipping full words.
    pub fn next_free_after(&self, page: &Page, slot: usize) -> Option<usize> {
        let start = slot + 1;
        if start >= self.capacity {
            return None;
        }

        let mut word_idx = start >> 5;
        // Mask off the bits below `start` in the first word.
        let mut word = page.read_u32(OFFSET_BITMAP + word_idx * 4) | ((1u32 << (start & 31)) - 1);
        loop {
            if word != u32::MAX {
                let candidate = (word_idx << 5) + (!word).trailing_zeros() as usize;
                return (candidate < self.capacity).then_some(candidate);
            }
            word_idx += 1;
            if word_idx >= self.bitmap_words_used() {
                return None;
            }
            word = page.read_u32(OFFSET_BITMAP + word_idx * 4);
        }
    }

    /// Number of occupied slots on `page`.
    pub fn occupied_count(&self, page: &Page) -> usize {
        (0..self.bitmap_words_used())
            .map(|w| page.read_u32(OFFSET_BITMAP + w * 4).count_ones() as usize)
            .sum()
    }

    // ========================================================================
    // Slot bytes
    // ========================================================================

    #[inline]
    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = SLOT_REGION_OFFSET + slot * self.record_size;
        start..start + self.record_size
    }

    pub fn record<'p>(&self, page: &'p Page, slot: usize) -> &'p [u8] {
        &page.as_slice()[self.slot_range(slot)]
    }

    pub fn record_mut<'p>(&self, page: &'p mut Page, slot: usize) -> &'p mut [u8] {
        let range = self.slot_range(slot);
        &mut page.as_mut_slice()[range]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_page(layout: &SlotLayout) -> Page {
        let mut page = Page::new();
        layout.init(&mut page);
        page
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(SLOT_REGION_OFFSET, 525);
        assert_eq!(MAX_RECORD_SIZE, 3571);
    }

    #[test]
    fn test_record_size_limits() {
        assert!(matches!(SlotLayout::new(0), Err(Error::Configuration(_))));
        assert!(matches!(
            SlotLayout::new(MAX_RECORD_SIZE + 1),
            Err(Error::Configuration(_))
        ));

        let largest = SlotLayout::new(MAX_RECORD_SIZE).unwrap();
        assert_eq!(largest.capacity(), 1);

        let smallest = SlotLayout::new(1).unwrap();
        assert_eq!(smallest.capacity(), MAX_RECORD_SIZE);
        assert!(smallest.bitmap_words_used() <= BITMAP_WORDS);
    }

    #[test]
    fn test_init_page() {
        let layout = SlotLayout::new(8).unwrap();
        let page = fresh_page(&layout);
        assert_eq!(page.page_type(), PageType::Data);
        assert_eq!(layout.first_free_slot(&page), Some(0));
        assert_eq!(layout.next_free_page(&page), None);
        assert_eq!(layout.occupied_count(&page), 0);
    }

    #[test]
    fn test_bitmap_set_clear() {
        let layout = SlotLayout::new(8).unwrap();
        let mut page = fresh_page(&layout);

        layout.set_occupied(&mut page, 0, true);
        layout.set_occupied(&mut page, 33, true);
        assert!(layout.is_occupied(&page, 0));
        assert!(layout.is_occupied(&page, 33));
        assert!(!layout.is_occupied(&page, 32));
        assert_eq!(layout.occupied_count(&page), 2);

        layout.set_occupied(&mut page, 0, false);
        assert!(!layout.is_occupied(&page, 0));
        assert_eq!(layout.occupied_count(&page), 1);
    }

    #[test]
    fn test_next_free_after_skips_full_words() {
        let layout = SlotLayout::new(8).unwrap();
        let mut page = fresh_page(&layout);

        for slot in 0..70 {
            layout.set_occupied(&mut page, slot, true);
        }
        assert_eq!(layout.next_free_after(&page, 0), Some(70));

        // A hole below the scan start is not reported.
        layout.set_occupied(&mut page, 5, false);
        assert_eq!(layout.next_free_after(&page, 10), Some(70));
        assert_eq!(layout.next_free_after(&page, 4), Some(5));
    }

    #[test]
    fn test_next_free_after_full_page() {
        let layout = SlotLayout::new(1000).unwrap();
        let mut page = fresh_page(&layout);
        assert_eq!(layout.capacity(), 3);

        for slot in 0..3 {
            layout.set_occupied(&mut page, slot, true);
        }
        assert_eq!(layout.next_free_after(&page, 0), None);
        assert_eq!(layout.next_free_after(&page, 2), None);
    }

    #[test]
    fn test_slot_of_validates() {
        let layout = SlotLayout::new(1000).unwrap();
        let addr = layout.address(PageId::new(1), 2);
        assert_eq!(layout.slot_of(addr).unwrap(), 2);

        // Slot 3 would overflow the page.
        let beyond = Address::from_slot(PageId::new(1), 3, 1000);
        assert!(matches!(layout.slot_of(beyond), Err(Error::InvalidAddress(_))));

        // Meta page never holds records.
        let meta = Address::from_slot(PageId::META, 0, 1000);
        assert!(matches!(layout.slot_of(meta), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_record_bytes_are_disjoint() {
        let layout = SlotLayout::new(4).unwrap();
        let mut page = fresh_page(&layout);
        layout.record_mut(&mut page, 0).copy_from_slice(&[1, 2, 3, 4]);
        layout.record_mut(&mut page, 1).copy_from_slice(&[5, 6, 7, 8]);
        assert_eq!(layout.record(&page, 0), &[1, 2, 3, 4]);
        assert_eq!(layout.record(&page, 1), &[5, 6, 7, 8]);
    }

    #[test]
    fn test_free_list_fields() {
        let layout = SlotLayout::new(16).unwrap();
        let mut page = fresh_page(&layout);

        layout.set_next_free_page(&mut page, Some(PageId::new(9)));
        layout.set_first_free_slot(&mut page, None);
        assert_eq!(layout.next_free_page(&page), Some(PageId::new(9)));
        assert_eq!(layout.first_free_slot(&page), None);
        assert_eq!(page.read_i32(OFFSET_FIRST_FREE_SLOT), -1);
    }
}
