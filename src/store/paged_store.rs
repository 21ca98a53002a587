//! Free-list managed store of fixed-size records.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::buffer::{BufferPoolManager, PageWriteGuard, StatsSnapshot};
use crate::common::config::{StoreConfig, MIN_POOL_SIZE};
use crate::common::{Address, Error, PageId, Result};
use crate::storage::page::{MetaPage, Page, PageType, SlotLayout};
use crate::storage::{DiskManager, Record};

use super::pinned_page::PinnedPage;

/// A file of fixed-size records of type `V`, addressed by [`Address`].
///
/// # Allocation
/// Pages with at least one free slot form a singly linked free list whose
/// head lives in the meta page. `insert` always fills the lowest free slot
/// of the head page, growing the file by one page when the list is empty.
/// A page that fills up is unlinked; a full page that gets a slot back is
/// pushed onto the head of the list again. The file never shrinks.
///
/// # Concurrency
/// All methods take `&self` and may be called from several threads.
/// `insert` and `remove` change the free list, so they lock the meta page
/// before the record page and serialize on it. `update`, `get_value`,
/// `compare` and `pin` lock only the record page they touch. Two calls on
/// one page share its single buffer frame, so each record access is
/// atomic. A sequence of calls is not.
///
/// # Example
/// ```no_run
/// use pagedb::store::PagedStore;
///
/// let store: PagedStore<u64> = PagedStore::open("values.db")?;
/// let addr = store.insert(&7)?;
/// assert_eq!(store.get_value(addr)?, 7);
/// store.remove(addr)?;
/// # Ok::<(), pagedb::Error>(())
/// ```
pub struct PagedStore<V> {
    bpm: BufferPoolManager,
    layout: SlotLayout,
    path: PathBuf,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Record> PagedStore<V> {
    /// Open or create the store at `path` with default settings.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, &StoreConfig::default())
    }

    /// Open or create the store at `path`.
    ///
    /// # Errors
    /// `Configuration` if `V` cannot fit in a page, if `config` asks for an
    /// empty buffer pool, or if the file was created for records of a
    /// different size.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self> {
        let layout = SlotLayout::new(V::SIZE)?;
        if config.pool_size < MIN_POOL_SIZE {
            return Err(Error::Configuration(format!(
                "pool size {} is below the minimum of {MIN_POOL_SIZE} frames",
                config.pool_size
            )));
        }
        let path = path.as_ref().to_path_buf();

        let dm = DiskManager::open_or_create(&path)?;
        let fresh = dm.page_count() == 0;
        let bpm = BufferPoolManager::new(config.pool_size, dm);

        if fresh {
            {
                let mut guard = bpm.new_page()?;
                debug_assert_eq!(guard.page_id(), PageId::META);
                MetaPage::new(V::SIZE).write_to(&mut guard);
            }
            bpm.flush_all_pages()?;
            info!(path = %path.display(), record_size = V::SIZE, "created store");
        } else {
            let meta = {
                let guard = bpm.fetch_page_read(PageId::META)?;
                MetaPage::from_page(&guard)?
            };
            if meta.record_size as usize != V::SIZE {
                return Err(Error::Configuration(format!(
                    "{} holds {}-byte records, opened with {}-byte records",
                    path.display(),
                    meta.record_size,
                    V::SIZE
                )));
            }
            if meta.total_pages != bpm.disk_page_count() as i64 {
                warn!(
                    path = %path.display(),
                    header = meta.total_pages,
                    file = bpm.disk_page_count(),
                    "page count in header disagrees with file size"
                );
            }
            info!(path = %path.display(), pages = meta.total_pages, "opened store");
        }

        Ok(Self {
            bpm,
            layout,
            path,
            _marker: PhantomData,
        })
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Store `value` in the lowest free slot of the free-list head page and
    /// return its address. May grow the file by one page.
    pub fn insert(&self, value: &V) -> Result<Address> {
        let mut meta_guard = self.bpm.fetch_page_write(PageId::META)?;
        let mut meta = MetaPage::from_page(&meta_guard)?;

        let mut page = match meta.free_page_head {
            Some(page_id) => self.fetch_data_page_write(page_id)?,
            None => {
                let mut guard = self.bpm.new_page()?;
                self.layout.init(&mut guard);
                meta.total_pages += 1;
                meta.free_page_head = Some(guard.page_id());
                debug!(page = guard.page_id().0, path = %self.path.display(), "allocated record page");
                guard
            }
        };
        let page_id = page.page_id();

        let slot = self
            .layout
            .first_free_slot(&page)
            .ok_or_else(|| Error::PageCorrupted {
                page_id: page_id.0,
                reason: "page on free list has no free slot".to_string(),
            })?;

        value.write_to(self.layout.record_mut(&mut page, slot));
        self.layout.set_occupied(&mut page, slot, true);

        match self.layout.next_free_after(&page, slot) {
            Some(next) => self.layout.set_first_free_slot(&mut page, Some(next)),
            None => {
                // Page is now full: unlink it from the free list.
                meta.free_page_head = self.layout.next_free_page(&page);
                self.layout.set_next_free_page(&mut page, None);
                self.layout.set_first_free_slot(&mut page, None);
            }
        }

        meta.write_to(&mut meta_guard);
        Ok(self.layout.address(page_id, slot))
    }

    /// Free the slot at `addr`. The address must not be used afterwards.
    pub fn remove(&self, addr: Address) -> Result<()> {
        let slot = self.layout.slot_of(addr)?;
        let mut meta_guard = self.bpm.fetch_page_write(PageId::META)?;
        let mut page = self.fetch_data_page_write(addr.page_id())?;

        if !self.layout.is_occupied(&page, slot) {
            return Err(Error::SlotNotOccupied(addr.0));
        }

        match self.layout.first_free_slot(&page) {
            None => {
                // Page was full: push it back onto the free list.
                let mut meta = MetaPage::from_page(&meta_guard)?;
                self.layout.set_next_free_page(&mut page, meta.free_page_head);
                meta.free_page_head = Some(page.page_id());
                meta.write_to(&mut meta_guard);
                self.layout.set_first_free_slot(&mut page, Some(slot));
            }
            Some(first) if slot < first => {
                self.layout.set_first_free_slot(&mut page, Some(slot));
            }
            Some(_) => {}
        }

        self.layout.set_occupied(&mut page, slot, false);
        Ok(())
    }

    /// Overwrite the record at `addr` in place.
    pub fn update(&self, addr: Address, value: &V) -> Result<()> {
        let slot = self.layout.slot_of(addr)?;
        let mut page = self.fetch_data_page_write(addr.page_id())?;
        self.check_occupied(&page, slot, addr)?;

        value.write_to(self.layout.record_mut(&mut page, slot));
        Ok(())
    }

    /// Copy of the record at `addr`.
    pub fn get_value(&self, addr: Address) -> Result<V> {
        let slot = self.layout.slot_of(addr)?;
        let page = self.bpm.fetch_page_read(addr.page_id())?;
        check_data_page(&page, addr.page_id())?;
        self.check_occupied(&page, slot, addr)?;

        Ok(V::from_bytes(self.layout.record(&page, slot)))
    }

    /// Order of the stored record relative to `value`.
    pub fn compare(&self, addr: Address, value: &V) -> Result<Ordering>
    where
        V: Ord,
    {
        Ok(self.get_value(addr)?.cmp(value))
    }

    /// Pin the page holding `addr` for repeated access to its records.
    ///
    /// The page stays resident until the returned handle is dropped.
    pub fn pin(&self, addr: Address) -> Result<PinnedPage<'_, V>> {
        self.layout.slot_of(addr)?;
        let pin = self.bpm.pin_page(addr.page_id())?;
        check_data_page(&pin.read(), addr.page_id())?;

        Ok(PinnedPage::new(pin, self.layout))
    }

    // ========================================================================
    // Maintenance and introspection
    // ========================================================================

    /// Write all dirty pages and fsync.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()
    }

    /// Current store header.
    pub fn meta(&self) -> Result<MetaPage> {
        let guard = self.bpm.fetch_page_read(PageId::META)?;
        MetaPage::from_page(&guard)
    }

    /// Pages on the free list, head first.
    pub fn free_pages(&self) -> Result<Vec<PageId>> {
        let mut pages = Vec::new();
        let mut next = self.meta()?.free_page_head;
        while let Some(page_id) = next {
            if pages.contains(&page_id) {
                return Err(Error::PageCorrupted {
                    page_id: page_id.0,
                    reason: "free list cycle".to_string(),
                });
            }
            let page = self.bpm.fetch_page_read(page_id)?;
            check_data_page(&page, page_id)?;
            next = self.layout.next_free_page(&page);
            pages.push(page_id);
        }
        Ok(pages)
    }

    /// Number of live records across all pages.
    pub fn record_count(&self) -> Result<usize> {
        let total = self.meta()?.total_pages as u32;
        let mut count = 0;
        for page_no in PageId::FIRST_DATA.0..total {
            let page_id = PageId::new(page_no);
            let page = self.bpm.fetch_page_read(page_id)?;
            check_data_page(&page, page_id)?;
            count += self.layout.occupied_count(&page);
        }
        Ok(count)
    }

    /// Pin count of a resident page (`None` if not resident).
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.bpm.pin_count(page_id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.bpm.stats().snapshot()
    }

    /// Slots per record page.
    pub fn capacity_per_page(&self) -> usize {
        self.layout.capacity()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn fetch_data_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let guard = self.bpm.fetch_page_write(page_id)?;
        check_data_page(&guard, page_id)?;
        Ok(guard)
    }

    fn check_occupied(&self, page: &Page, slot: usize, addr: Address) -> Result<()> {
        if self.layout.is_occupied(page, slot) {
            Ok(())
        } else {
            Err(Error::SlotNotOccupied(addr.0))
        }
    }
}

impl<V> Drop for PagedStore<V> {
    fn drop(&mut self) {
        if let Err(e) = self.bpm.flush_all_pages() {
            warn!(path = %self.path.display(), error = %e, "failed to flush store on close");
        }
    }
}

fn check_data_page(page: &Page, page_id: PageId) -> Result<()> {
    if page.page_type() == PageType::Data {
        Ok(())
    } else {
        Err(Error::PageCorrupted {
            page_id: page_id.0,
            reason: format!("expected record page, found {:?}", page.page_type()),
        })
    }
}
