//! RAII guards for page access.
//!
//! All guards hold one pin on their page and release it when dropped, so a
//! page can never be evicted while any guard for it is alive:
//! - [`PageReadGuard`] - pin + shared lock, for a single read
//! - [`PageWriteGuard`] - pin + exclusive lock, marks the page dirty
//! - [`PagePin`] - pin only; locks are taken per access
//!
//! `PagePin` is what long-lived holders use. A B+-tree operation keeps one
//! pin per level of its descent path, and several of those nodes may share
//! a page, so holding a lock for the pin's lifetime would self-deadlock.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;

/// Guard for read-only page access.
pub struct PageReadGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, false);
    }
}

/// Guard for exclusive write access to a page.
///
/// The page is marked dirty and unpinned when the guard is dropped.
pub struct PageWriteGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, true);
    }
}

/// A pin on a resident page without a held lock.
///
/// Each [`read`](PagePin::read) / [`write`](PagePin::write) takes the frame
/// lock for as long as the returned lock guard lives. Callers must not hold
/// one of those lock guards while taking another on the same page.
pub struct PagePin<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
}

impl<'a> PagePin<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame_id: FrameId, page_id: PageId) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Shared access to the pinned page.
    pub fn read(&self) -> RwLockReadGuard<'a, Page> {
        self.bpm.frame(self.frame_id).page()
    }

    /// Exclusive access to the pinned page. Marks the page dirty.
    pub fn write(&self) -> RwLockWriteGuard<'a, Page> {
        let frame = self.bpm.frame(self.frame_id);
        let page = frame.page_mut();
        frame.mark_dirty();
        page
    }
}

impl Drop for PagePin<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, false);
    }
}
