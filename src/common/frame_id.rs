//! Frame identifier type.

use std::fmt;

/// Index of a frame in a store's buffer pool.
///
/// Frames live in a `Vec<Frame>` sized once at startup, so the id is a
/// plain `usize` index: `frames[frame_id.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}
