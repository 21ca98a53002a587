//! Disk-backed B+-tree index.
//!
//! # Components
//! - [`Node`] - fixed-size node record (`ORDER` entries of key / child addresses)
//! - [`BPlusIndex`] - insert, lookup, update and delete with split, borrow and merge
//! - [`TreeShape`] - result of a structural check
//!
//! A tree is spread over three record stores: nodes, keys and values. The
//! root lives at the fixed address [`ROOT`] of the node store.

mod check;
mod node;
mod tree;

pub use check::TreeShape;
pub use node::{Node, MIN_OCCUPANCY, ORDER, ROOT};
pub use tree::{BPlusIndex, SearchMode};
