//! Buffer Pool Manager - the page cache of one store file.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting through RAII guards
//! - Dirty page write-back with checksum stamping
//! - FIFO eviction of unpinned pages

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::{BufferPoolStats, Frame, PagePin, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::page::{Page, PageType};
use crate::storage::DiskManager;

/// Manages a pool of buffer frames for caching the pages of one file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ FifoReplacer │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// A page stays resident while any guard pins it. Once its pin count drops
/// to zero its frame becomes a candidate for eviction; a dirty victim is
/// written back (checksum stamped) before the frame is reused.
///
/// Misses, new pages and evictions run under the page table's write lock,
/// so a page is resident in at most one frame and a frame is never reused
/// while pinned.
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    page_table: RwLock<HashMap<PageId, FrameId>>,
    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,
    replacer: Mutex<FifoReplacer>,
    disk_manager: Mutex<DiskManager>,
    stats: BufferPoolStats,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(FifoReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
        }
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::PageCorrupted` if the page fails its checksum
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// The page is marked dirty when the guard drops.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Pin a page without locking it.
    pub fn pin_page(&self, page_id: PageId) -> Result<PagePin<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        Ok(PagePin::new(self, frame_id, page_id))
    }

    /// Extend the file by one page and load it into the pool, zeroed.
    ///
    /// Returns a write guard for the new page.
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let mut pt = self.page_table.write();
        let frame_id = self.get_free_frame(&mut pt)?;

        let page_id = match self.disk_manager.lock().allocate_page() {
            Ok(pid) => pid,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.set_page_id(Some(page_id));
        frame.pin();

        pt.insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }
        drop(pt);

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: Flush
    // ========================================================================

    /// Write every dirty page to disk, then fsync the file.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        for (page_id, frame_id) in pages {
            // Pin so the frame cannot be handed to another page mid-write.
            {
                let pt = self.page_table.read();
                if pt.get(&page_id) != Some(&frame_id) {
                    continue;
                }
                self.frames[frame_id.0].pin();
            }
            let flushed = self.flush_frame(frame_id, page_id);
            self.unpin_page_internal(frame_id, false);
            flushed?;
        }

        self.disk_manager.lock().sync()
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of pages currently resident in the pool.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Number of pages in the backing file.
    pub fn disk_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    /// Pin count of a resident page, or `None` if the page is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let pt = self.page_table.read();
        pt.get(&page_id).map(|fid| self.frames[fid.0].pin_count())
    }

    // ========================================================================
    // Internal: Called by guards
    // ========================================================================

    #[inline]
    pub(crate) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.0]
    }

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        if frame.unpin() == 0 {
            let mut replacer = self.replacer.lock();
            // A concurrent hit may have pinned it again.
            if !frame.is_pinned() {
                replacer.set_evictable(frame_id, true);
            }
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        {
            let pt = self.page_table.read();
            if let Some(&frame_id) = pt.get(&page_id) {
                self.handle_cache_hit(frame_id);
                return Ok(frame_id);
            }
        }

        self.handle_cache_miss(page_id)
    }

    fn handle_cache_hit(&self, frame_id: FrameId) {
        self.frames[frame_id.0].pin();
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        let mut pt = self.page_table.write();
        // Another thread may have loaded the page since the read lock was
        // released.
        if let Some(&frame_id) = pt.get(&page_id) {
            self.handle_cache_hit(frame_id);
            return Ok(frame_id);
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let frame_id = self.get_free_frame(&mut pt)?;

        let page_data = match self.read_verified(page_id) {
            Ok(page) => page,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        frame.page_mut().copy_from(&page_data);
        frame.set_page_id(Some(page_id));
        frame.pin();

        pt.insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(frame_id)
    }

    /// Read a page from disk and check its checksum.
    ///
    /// Pages that were allocated but never written back (type `Invalid`)
    /// carry no checksum and are returned as-is.
    fn read_verified(&self, page_id: PageId) -> Result<Box<Page>> {
        let page = Box::new(self.disk_manager.lock().read_page(page_id)?);

        if page.page_type() != PageType::Invalid && !page.verify_checksum() {
            return Err(Error::PageCorrupted {
                page_id: page_id.0,
                reason: "checksum mismatch".to_string(),
            });
        }

        Ok(page)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Called with the page table write-locked.
    fn get_free_frame(&self, pt: &mut HashMap<PageId, FrameId>) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page(pt)
    }

    fn evict_page(&self, pt: &mut HashMap<PageId, FrameId>) -> Result<FrameId> {
        let frame_id = loop {
            let candidate = self.replacer.lock().evict().ok_or(Error::NoFreeFrames)?;
            if !self.frames[candidate.0].is_pinned() {
                break candidate;
            }
            // Re-pinned after it was marked evictable.
            let mut replacer = self.replacer.lock();
            replacer.record_access(candidate);
            replacer.set_evictable(candidate, false);
        };

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        let old_page_id = frame.page_id();

        if let Some(pid) = old_page_id {
            if let Err(e) = self.flush_frame(frame_id, pid) {
                // The victim stays resident; hand it back to the replacer.
                let mut replacer = self.replacer.lock();
                replacer.record_access(frame_id);
                replacer.set_evictable(frame_id, true);
                return Err(e);
            }
            pt.remove(&pid);
        }

        frame.clear_dirty();
        frame.set_page_id(None);

        Ok(frame_id)
    }

    /// Write a frame back if dirty, stamping the checksum on the copy that
    /// goes to disk.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        // Writers mark the frame dirty while holding the page lock, so the
        // flag is cleared under the same lock as the copy is taken.
        let mut out = Box::new(Page::new());
        {
            let page = frame.page();
            if !frame.is_dirty() {
                return Ok(());
            }
            out.copy_from(&page);
            frame.clear_dirty();
        }
        out.update_checksum();

        if let Err(e) = self.disk_manager.lock().write_page(page_id, &out) {
            frame.mark_dirty();
            return Err(e);
        }
        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }
}
