//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashSet, VecDeque};

use crate::common::FrameId;

/// Evicts the longest-resident unpinned frame.
///
/// Pinned frames keep their place in the queue and are skipped until their
/// pin count drops to zero.
pub struct FifoReplacer {
    /// Frame IDs in load order (front = oldest).
    queue: VecDeque<FrameId>,
    in_queue: HashSet<FrameId>,
    /// Frames whose pin count is zero.
    evictable: HashSet<FrameId>,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            in_queue: HashSet::new(),
            evictable: HashSet::new(),
        }
    }

    /// Record that a frame was accessed. Re-access does not reorder.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if self.in_queue.insert(frame_id) {
            self.queue.push_back(frame_id);
        }
    }

    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Remove and return the oldest evictable frame, or None if every
    /// tracked frame is pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        let pos = self
            .queue
            .iter()
            .position(|fid| self.evictable.contains(fid))?;
        let frame_id = self.queue.remove(pos)?;

        self.in_queue.remove(&frame_id);
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for FifoReplacer {
    fn default() -> Self {
        Self::new()
    }
}
