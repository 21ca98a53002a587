//! B+-tree over three record stores.

use std::cmp::Ordering;
use std::path::Path;

use tracing::{debug, info};

use crate::common::config::StoreConfig;
use crate::common::{Address, Error, Result};
use crate::storage::Record;
use crate::store::{PagedStore, PinnedPage};

use super::node::{Node, MIN_OCCUPANCY, ORDER, ROOT};

/// Deepest descent accepted before the node graph is declared cyclic.
pub(super) const MAX_DEPTH: usize = 64;

/// How [`BPlusIndex::search_in_node`] interprets a search key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Index of the entry equal to the key, or `None`.
    Exact,
    /// `None` if the key is present, otherwise its insertion index.
    DuplicateCheck,
    /// Child to follow: the first entry not less than the key, clamped to
    /// the last entry. `None` only for an empty node.
    Descend,
}

/// A node on the descent path with the index taken at that level.
///
/// The page stays pinned while the operation unwinds. `node` is the working
/// copy; it is written back once its level is finished.
struct PathEntry<'a> {
    page: PinnedPage<'a, Node>,
    addr: Address,
    node: Node,
    position: usize,
}

impl PathEntry<'_> {
    fn write_back(&self) -> Result<()> {
        self.page.set(self.addr, &self.node)
    }
}

/// A persistent ordered map from `K` to `V`.
///
/// Keys and values live out of line in their own [`PagedStore`]s; tree
/// nodes hold only their addresses. The root is pinned at a fixed address
/// in the node store and never moves, so the three files are always opened
/// together.
///
/// Separators follow the max convention: each entry's key is the largest
/// key in the subtree it points to.
///
/// Mutating operations take `&mut self`; a multi-store update has no
/// rollback, so a failed write may leave the three files inconsistent.
///
/// # Example
/// ```no_run
/// use pagedb::BPlusIndex;
///
/// let mut index: BPlusIndex<i32, i64> =
///     BPlusIndex::open("idx.nodes", "idx.keys", "idx.values")?;
/// index.insert(5, 50)?;
/// assert_eq!(index.get(&5)?, 50);
/// index.remove(&5)?;
/// # Ok::<(), pagedb::Error>(())
/// ```
pub struct BPlusIndex<K, V> {
    pub(super) nodes: PagedStore<Node>,
    pub(super) keys: PagedStore<K>,
    pub(super) values: PagedStore<V>,
}

impl<K: Record + Ord, V: Record> BPlusIndex<K, V> {
    /// Open or create an index with default store settings.
    pub fn open<P: AsRef<Path>>(node_path: P, key_path: P, value_path: P) -> Result<Self> {
        Self::open_with_config(node_path, key_path, value_path, &StoreConfig::default())
    }

    /// Open or create an index; `config` applies to each of the three stores.
    pub fn open_with_config<P: AsRef<Path>>(
        node_path: P,
        key_path: P,
        value_path: P,
        config: &StoreConfig,
    ) -> Result<Self> {
        let nodes = PagedStore::<Node>::open_with_config(node_path, config)?;
        let keys = PagedStore::open_with_config(key_path, config)?;
        let values = PagedStore::open_with_config(value_path, config)?;

        if nodes.meta()?.total_pages == 1 {
            let root = nodes.insert(&Node::leaf())?;
            if root != ROOT {
                return Err(Error::TreeCorrupted(format!(
                    "fresh root landed at {root}, expected {ROOT}"
                )));
            }
            info!(path = %nodes.path().display(), "created empty index");
        } else {
            let root = nodes.get_value(ROOT)?;
            check_node(&root, ROOT)?;
        }

        Ok(Self {
            nodes,
            keys,
            values,
        })
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Value stored under `key`.
    ///
    /// # Errors
    /// `EmptyIndex` if the tree holds no entries, `KeyNotFound` if `key` is
    /// absent.
    pub fn get(&self, key: &K) -> Result<V> {
        let value_addr = self.find_value(key)?;
        self.values.get_value(value_addr)
    }

    /// Overwrite the value stored under `key`. Fails like [`get`](Self::get).
    pub fn update(&mut self, key: &K, value: &V) -> Result<()> {
        let value_addr = self.find_value(key)?;
        self.values.update(value_addr, value)
    }

    /// Whether `key` is present. An empty index holds no keys.
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        match self.find_value(key) {
            Ok(_) => Ok(true),
            Err(Error::KeyNotFound | Error::EmptyIndex) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Binary search of `node`'s entries for `key`, comparing against the
    /// key store in place.
    pub fn search_in_node(&self, node: &Node, key: &K, mode: SearchMode) -> Result<Option<usize>> {
        let mut lo = 0;
        let mut hi = node.count;
        let mut found = false;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.keys.compare(node.keys[mid], key)? {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    lo = mid;
                    found = true;
                    break;
                }
            }
        }

        Ok(match mode {
            SearchMode::Exact => found.then_some(lo),
            SearchMode::DuplicateCheck => (!found).then_some(lo),
            SearchMode::Descend => node.count.checked_sub(1).map(|last| lo.min(last)),
        })
    }

    fn find_value(&self, key: &K) -> Result<Address> {
        let mut node = self.load_node(ROOT)?;
        if node.count == 0 {
            return Err(Error::EmptyIndex);
        }

        let mut depth = 1;
        while !node.is_leaf {
            let child = self.descend_index(&node, key, ROOT)?;
            node = self.load_node(node.children[child])?;
            depth += 1;
            check_depth(depth)?;
        }

        let pos = self
            .search_in_node(&node, key, SearchMode::Exact)?
            .ok_or(Error::KeyNotFound)?;
        Ok(node.children[pos])
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert `key` with `value`. Does nothing if `key` is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        let mut path: Vec<PathEntry<'_>> = Vec::new();
        let mut addr = ROOT;

        loop {
            let (page, node) = self.pin_node(addr)?;
            let Some(pos) = self.search_in_node(&node, &key, SearchMode::DuplicateCheck)? else {
                return Ok(());
            };

            if node.is_leaf {
                path.push(PathEntry {
                    page,
                    addr,
                    node,
                    position: pos,
                });
                break;
            }

            let child = pos.min(node.count.checked_sub(1).ok_or_else(|| empty_internal(addr))?);
            let child_addr = node.children[child];
            path.push(PathEntry {
                page,
                addr,
                node,
                position: child,
            });
            addr = child_addr;
            check_depth(path.len())?;
        }

        let is_max = path
            .last()
            .is_some_and(|leaf| leaf.position == leaf.node.count);
        let key_addr = self.keys.insert(&key)?;
        let value_addr = self.values.insert(&value)?;

        // Entry waiting to be placed at the current level, and the split
        // handed up from the level below as (left max, new right sibling).
        let mut carry = Some((key_addr, value_addr));
        let mut split: Option<(Address, Address)> = None;

        while let Some(mut entry) = path.pop() {
            let mut pos = entry.position;

            if !entry.node.is_leaf {
                if is_max {
                    entry.node.keys[pos] = key_addr;
                }
                carry = split.take().map(|(left_max, sibling)| {
                    let right_max = entry.node.keys[pos];
                    entry.node.keys[pos] = left_max;
                    (right_max, sibling)
                });
                pos += 1;
            }

            let Some((k, c)) = carry.take() else {
                if is_max {
                    entry.write_back()?;
                    continue;
                }
                break;
            };

            if !entry.node.is_full() {
                entry.node.insert_at(pos, k, c);
                entry.write_back()?;
                if is_max {
                    continue;
                }
                break;
            }

            let right = entry.node.split_insert(pos, k, c);
            if path.is_empty() {
                self.grow_root(&entry, &right)?;
                break;
            }

            let left_max = max_key(&entry.node, entry.addr)?;
            let sibling = self.nodes.insert(&right)?;
            entry.write_back()?;
            debug!(node = %entry.addr, sibling = %sibling, leaf = entry.node.is_leaf, "split node");
            split = Some((left_max, sibling));
        }

        Ok(())
    }

    /// Replace a full root by two children holding its split halves.
    fn grow_root(&self, root: &PathEntry<'_>, right: &Node) -> Result<()> {
        let left_addr = self.nodes.insert(&root.node)?;
        let right_addr = self.nodes.insert(right)?;

        let mut new_root = Node::internal();
        new_root.push(max_key(&root.node, left_addr)?, left_addr);
        new_root.push(max_key(right, right_addr)?, right_addr);
        root.page.set(ROOT, &new_root)?;

        debug!(left = %left_addr, right = %right_addr, "grew root");
        Ok(())
    }

    // ========================================================================
    // Remove
    // ========================================================================

    /// Remove `key` and its value. Does nothing if `key` is absent.
    pub fn remove(&mut self, key: &K) -> Result<()> {
        let mut path: Vec<PathEntry<'_>> = Vec::new();
        let mut addr = ROOT;

        loop {
            let (page, node) = self.pin_node(addr)?;

            if node.is_leaf {
                let Some(pos) = self.search_in_node(&node, key, SearchMode::Exact)? else {
                    return Ok(());
                };
                path.push(PathEntry {
                    page,
                    addr,
                    node,
                    position: pos,
                });
                break;
            }

            let child = self.descend_index(&node, key, addr)?;
            let child_addr = node.children[child];
            path.push(PathEntry {
                page,
                addr,
                node,
                position: child,
            });
            addr = child_addr;
            check_depth(path.len())?;
        }

        let Some(mut leaf) = path.pop() else {
            return Ok(());
        };
        let (removed_key, removed_value) = leaf.node.remove_at(leaf.position);
        self.keys.remove(removed_key)?;
        self.values.remove(removed_value)?;
        leaf.write_back()?;

        // Separators naming the removed key now name the leaf's new maximum.
        let replacement = leaf.node.last_key();
        let mut child_count = leaf.node.count;
        drop(leaf);

        while let Some(mut entry) = path.pop() {
            let pos = entry.position;
            let mut changed = false;

            if entry.node.keys[pos] == removed_key {
                if let Some(new_max) = replacement {
                    entry.node.keys[pos] = new_max;
                    changed = true;
                }
            }
            if child_count < MIN_OCCUPANCY {
                self.rebalance(&mut entry.node, pos)?;
                changed = true;
            }
            if !changed {
                break;
            }

            entry.write_back()?;
            child_count = entry.node.count;
        }

        self.collapse_root()
    }

    /// Fix an underflowed child at `pos` of `parent`, either by borrowing
    /// one entry from a sibling above minimum occupancy or by merging with
    /// a sibling. Siblings are written here; `parent` is left to the caller.
    fn rebalance(&self, parent: &mut Node, pos: usize) -> Result<()> {
        let child_addr = parent.children[pos];
        let mut child = self.load_node(child_addr)?;

        let left = match pos.checked_sub(1) {
            Some(l) => Some((parent.children[l], self.load_node(parent.children[l])?)),
            None => None,
        };
        let right = if pos + 1 < parent.count {
            Some((parent.children[pos + 1], self.load_node(parent.children[pos + 1])?))
        } else {
            None
        };

        let left_spare = left.as_ref().map_or(0, |(_, n)| n.count.saturating_sub(MIN_OCCUPANCY));
        let right_spare = right.as_ref().map_or(0, |(_, n)| n.count.saturating_sub(MIN_OCCUPANCY));

        match (left, right) {
            // Borrow from whichever sibling has more to give; ties go left.
            (Some((left_addr, mut left)), _) if left_spare > 0 && left_spare >= right_spare => {
                let (k, c) = left.remove_at(left.count - 1);
                child.insert_at(0, k, c);
                parent.keys[pos - 1] = max_key(&left, left_addr)?;

                self.nodes.update(left_addr, &left)?;
                self.nodes.update(child_addr, &child)?;
                debug!(node = %child_addr, from = %left_addr, "borrowed from left sibling");
            }
            (_, Some((right_addr, mut right))) if right_spare > 0 => {
                let (k, c) = right.remove_at(0);
                child.push(k, c);
                parent.keys[pos] = k;

                self.nodes.update(right_addr, &right)?;
                self.nodes.update(child_addr, &child)?;
                debug!(node = %child_addr, from = %right_addr, "borrowed from right sibling");
            }
            (Some((left_addr, mut left)), _) => {
                left.append(&child);
                parent.keys[pos - 1] = parent.keys[pos];
                parent.remove_at(pos);

                self.nodes.update(left_addr, &left)?;
                self.nodes.remove(child_addr)?;
                debug!(node = %child_addr, into = %left_addr, "merged into left sibling");
            }
            (None, Some((right_addr, right))) => {
                child.append(&right);
                parent.keys[pos] = parent.keys[pos + 1];
                parent.remove_at(pos + 1);

                self.nodes.update(child_addr, &child)?;
                self.nodes.remove(right_addr)?;
                debug!(node = %child_addr, absorbed = %right_addr, "merged right sibling");
            }
            // An only child: only the root can be here, and collapse handles it.
            (None, None) => {}
        }

        Ok(())
    }

    /// Shrink the tree while the root is internal with a single child.
    fn collapse_root(&self) -> Result<()> {
        loop {
            let root = self.load_node(ROOT)?;
            if root.is_leaf || root.count != 1 {
                return Ok(());
            }

            let child_addr = root.children[0];
            let child = self.load_node(child_addr)?;
            self.nodes.update(ROOT, &child)?;
            self.nodes.remove(child_addr)?;
            debug!(child = %child_addr, "collapsed root");
        }
    }

    // ========================================================================
    // Whole-tree access
    // ========================================================================

    /// All entries in key order.
    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        let mut out = Vec::new();
        self.for_each_leaf(|leaf| {
            for (k, v) in leaf.entries() {
                out.push((self.keys.get_value(k)?, self.values.get_value(v)?));
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Number of entries.
    pub fn len(&self) -> Result<usize> {
        let mut total = 0;
        self.for_each_leaf(|leaf| {
            total += leaf.count;
            Ok(())
        })?;
        Ok(total)
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.load_node(ROOT)?.count == 0)
    }

    /// Write every dirty page of all three stores to disk.
    pub fn flush(&self) -> Result<()> {
        self.nodes.flush()?;
        self.keys.flush()?;
        self.values.flush()
    }

    /// Visit leaves left to right.
    fn for_each_leaf<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&Node) -> Result<()>,
    {
        let mut stack = vec![(ROOT, 1)];
        while let Some((addr, depth)) = stack.pop() {
            check_depth(depth)?;
            let node = self.load_node(addr)?;
            if node.is_leaf {
                f(&node)?;
            } else {
                stack.extend(node.children[..node.count].iter().rev().map(|&c| (c, depth + 1)));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Internal
    // ========================================================================

    pub(super) fn load_node(&self, addr: Address) -> Result<Node> {
        let node = self.nodes.get_value(addr)?;
        check_node(&node, addr)?;
        Ok(node)
    }

    fn pin_node(&self, addr: Address) -> Result<(PinnedPage<'_, Node>, Node)> {
        let page = self.nodes.pin(addr)?;
        let node = page.get(addr)?;
        check_node(&node, addr)?;
        Ok((page, node))
    }

    fn descend_index(&self, node: &Node, key: &K, addr: Address) -> Result<usize> {
        self.search_in_node(node, key, SearchMode::Descend)?
            .ok_or_else(|| empty_internal(addr))
    }
}

fn check_node(node: &Node, addr: Address) -> Result<()> {
    if node.count > ORDER {
        return Err(Error::TreeCorrupted(format!(
            "node {addr} has {} entries, more than {ORDER}",
            node.count
        )));
    }
    Ok(())
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::TreeCorrupted(format!(
            "descent exceeded {MAX_DEPTH} levels"
        )));
    }
    Ok(())
}

fn max_key(node: &Node, addr: Address) -> Result<Address> {
    node.last_key()
        .ok_or_else(|| Error::TreeCorrupted(format!("node {addr} is empty")))
}

fn empty_internal(addr: Address) -> Error {
    Error::TreeCorrupted(format!("internal node {addr} has no entries"))
}
