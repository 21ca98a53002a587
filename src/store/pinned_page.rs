//! A pinned record page handed out by [`PagedStore::pin`](super::PagedStore::pin).

use std::marker::PhantomData;

use crate::buffer::PagePin;
use crate::common::{Address, Error, PageId, Result};
use crate::storage::page::SlotLayout;
use crate::storage::Record;

/// Keeps one record page resident while its records are read and written.
///
/// Every access validates that the address lies on this page and that its
/// slot is occupied. Dropping the handle (or calling [`unpin`](Self::unpin))
/// releases the pin.
pub struct PinnedPage<'a, V> {
    pin: PagePin<'a>,
    layout: SlotLayout,
    _marker: PhantomData<fn() -> V>,
}

impl<'a, V: Record> PinnedPage<'a, V> {
    pub(super) fn new(pin: PagePin<'a>, layout: SlotLayout) -> Self {
        Self {
            pin,
            layout,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id()
    }

    /// Whether `addr` lies on this page.
    #[inline]
    pub fn contains(&self, addr: Address) -> bool {
        addr.page_id() == self.pin.page_id()
    }

    /// Copy of the record at `addr`.
    pub fn get(&self, addr: Address) -> Result<V> {
        let slot = self.slot(addr)?;
        let page = self.pin.read();
        if !self.layout.is_occupied(&page, slot) {
            return Err(Error::SlotNotOccupied(addr.0));
        }
        Ok(V::from_bytes(self.layout.record(&page, slot)))
    }

    /// Overwrite the record at `addr`.
    pub fn set(&self, addr: Address, value: &V) -> Result<()> {
        let slot = self.slot(addr)?;
        let mut page = self.pin.write();
        if !self.layout.is_occupied(&page, slot) {
            return Err(Error::SlotNotOccupied(addr.0));
        }
        value.write_to(self.layout.record_mut(&mut page, slot));
        Ok(())
    }

    /// Release the pin.
    pub fn unpin(self) {}

    fn slot(&self, addr: Address) -> Result<usize> {
        if !self.contains(addr) {
            return Err(Error::InvalidAddress(addr.0));
        }
        self.layout.slot_of(addr)
    }
}
