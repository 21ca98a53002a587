//! Structural validation of a [`BPlusIndex`].

use std::fmt;

use crate::common::{Address, Error, Result};
use crate::storage::Record;

use super::node::{MIN_OCCUPANCY, ROOT};
use super::tree::{BPlusIndex, MAX_DEPTH};

/// Summary of a tree that passed [`BPlusIndex::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeShape {
    /// Levels from the root to the leaves, root included.
    pub depth: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub entries: usize,
}

impl fmt::Display for TreeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TreeShape {{ depth: {}, nodes: {}, leaves: {}, entries: {} }}",
            self.depth, self.nodes, self.leaves, self.entries
        )
    }
}

struct Walk<K> {
    shape: TreeShape,
    leaf_depth: Option<usize>,
    last_key: Option<K>,
}

impl<K: Record + Ord, V: Record> BPlusIndex<K, V> {
    /// Walk the whole tree and verify its invariants:
    /// - every leaf sits at the same depth
    /// - non-root nodes hold at least the minimum number of entries, and an
    ///   internal root holds at least two
    /// - keys are strictly increasing across the leaf level
    /// - every separator is the address of its subtree's maximum key
    /// - every key and value record is live
    ///
    /// # Errors
    /// `TreeCorrupted` naming the first violation found.
    pub fn check(&self) -> Result<TreeShape> {
        let mut walk = Walk {
            shape: TreeShape::default(),
            leaf_depth: None,
            last_key: None,
        };
        self.check_subtree(ROOT, 1, &mut walk)?;
        walk.shape.depth = walk.leaf_depth.unwrap_or(1);
        Ok(walk.shape)
    }

    /// Returns the address of the subtree's maximum key, if it has one.
    fn check_subtree(&self, addr: Address, depth: usize, walk: &mut Walk<K>) -> Result<Option<Address>> {
        if depth > MAX_DEPTH {
            return Err(corrupted(addr, format!("deeper than {MAX_DEPTH} levels")));
        }

        let node = self.load_node(addr)?;
        walk.shape.nodes += 1;
        let is_root = addr == ROOT;

        if !is_root && node.count < MIN_OCCUPANCY {
            return Err(corrupted(addr, format!("underfull with {} entries", node.count)));
        }

        if node.is_leaf {
            match walk.leaf_depth {
                Some(d) if d != depth => {
                    return Err(corrupted(addr, format!("leaf at depth {depth}, expected {d}")));
                }
                _ => walk.leaf_depth = Some(depth),
            }

            for (key_addr, value_addr) in node.entries() {
                let key = self.keys.get_value(key_addr)?;
                if walk.last_key.as_ref().is_some_and(|prev| *prev >= key) {
                    return Err(corrupted(addr, format!("key {key_addr} out of order")));
                }
                walk.last_key = Some(key);
                self.values.get_value(value_addr)?;
            }

            walk.shape.leaves += 1;
            walk.shape.entries += node.count;
            return Ok(node.last_key());
        }

        if is_root && node.count < 2 {
            return Err(corrupted(addr, format!("internal root with {} entries", node.count)));
        }

        for (separator, child) in node.entries() {
            let child_max = self.check_subtree(child, depth + 1, walk)?;
            if child_max != Some(separator) {
                return Err(corrupted(
                    addr,
                    format!("separator {separator} is not the maximum of child {child}"),
                ));
            }
        }

        Ok(node.last_key())
    }
}

fn corrupted(addr: Address, reason: String) -> Error {
    Error::TreeCorrupted(format!("node {addr}: {reason}"))
}
