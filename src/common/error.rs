//! Error types for pagedb.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in pagedb.
///
/// Configuration errors are raised while opening a store and are fatal for
/// that store. `KeyNotFound` and `EmptyIndex` are scoped to the single index
/// operation that returned them; the index is unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// A page read from disk failed its checksum or has an unexpected type.
    #[error("Page {page_id} corrupted: {reason}")]
    PageCorrupted { page_id: u32, reason: String },

    /// The store file and the record type disagree, or the record type
    /// cannot be stored at all.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An address that does not decode to a slot of this store.
    #[error("Invalid address: {0}")]
    InvalidAddress(u64),

    /// An address that points at a free slot.
    #[error("Slot at address {0} is not occupied")]
    SlotNotOccupied(u64),

    /// Lookup or update of a key the index does not hold.
    #[error("Key not found")]
    KeyNotFound,

    /// Lookup or update against an index with zero entries.
    #[error("Index is empty")]
    EmptyIndex,

    /// A structural invariant of the B+-tree does not hold.
    #[error("B+ tree corrupted: {0}")]
    TreeCorrupted(String),

    /// A workload file line that cannot be parsed.
    #[error("Workload line {line}: {reason}")]
    Workload { line: usize, reason: String },
}
