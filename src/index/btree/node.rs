//! Tree node record.

use crate::common::config::PAGE_SIZE;
use crate::common::{Address, PageId};
use crate::storage::page::SLOT_REGION_OFFSET;
use crate::storage::Record;

/// Maximum number of (key, child) entries per node.
pub const ORDER: usize = 4;

/// Fewest entries a non-root node may hold once an operation completes.
pub const MIN_OCCUPANCY: usize = (ORDER + 1) / 2;

/// Address of the root node: slot 0 of the first record page of the node
/// store. The root never moves.
pub const ROOT: Address =
    Address(PageId::FIRST_DATA.0 as u64 * PAGE_SIZE as u64 + SLOT_REGION_OFFSET as u64);

/// One B+-tree node, stored as a fixed-size record in the node store.
///
/// `keys[i]` is the address of the largest key reachable through
/// `children[i]`. In a leaf `children[i]` is the value address of `keys[i]`;
/// in an internal node it is the address of a child node. Only the first
/// `count` entries are meaningful; the rest hold [`Address::NULL`].
///
/// # Layout
/// ```text
/// Offset  Size        Field
/// ------  ----        -----
/// 0       4           count (i32)
/// 4       1           is_leaf
/// 5       8 × ORDER   keys
/// 37      8 × ORDER   children
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub count: usize,
    pub is_leaf: bool,
    pub keys: [Address; ORDER],
    pub children: [Address; ORDER],
}

impl Node {
    const OFFSET_COUNT: usize = 0;
    const OFFSET_IS_LEAF: usize = 4;
    const OFFSET_KEYS: usize = 5;
    const OFFSET_CHILDREN: usize = Self::OFFSET_KEYS + 8 * ORDER;

    fn empty(is_leaf: bool) -> Self {
        Self {
            count: 0,
            is_leaf,
            keys: [Address::NULL; ORDER],
            children: [Address::NULL; ORDER],
        }
    }

    pub fn leaf() -> Self {
        Self::empty(true)
    }

    pub fn internal() -> Self {
        Self::empty(false)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count >= ORDER
    }

    /// Separator of the last entry, i.e. the node's maximum key.
    #[inline]
    pub fn last_key(&self) -> Option<Address> {
        self.count.checked_sub(1).map(|i| self.keys[i])
    }

    /// Live entries as (key, child) pairs.
    pub fn entries(&self) -> impl Iterator<Item = (Address, Address)> + '_ {
        self.keys[..self.count]
            .iter()
            .copied()
            .zip(self.children[..self.count].iter().copied())
    }

    /// Insert an entry at `pos`, shifting later entries right.
    ///
    /// # Panics
    /// Panics if the node is full or `pos > count`.
    pub fn insert_at(&mut self, pos: usize, key: Address, child: Address) {
        assert!(!self.is_full(), "insert into full node");
        assert!(pos <= self.count, "insert position out of range");

        self.keys.copy_within(pos..self.count, pos + 1);
        self.children.copy_within(pos..self.count, pos + 1);
        self.keys[pos] = key;
        self.children[pos] = child;
        self.count += 1;
    }

    pub fn push(&mut self, key: Address, child: Address) {
        self.insert_at(self.count, key, child);
    }

    /// Remove and return the entry at `pos`, shifting later entries left.
    ///
    /// # Panics
    /// Panics if `pos >= count`.
    pub fn remove_at(&mut self, pos: usize) -> (Address, Address) {
        assert!(pos < self.count, "remove position out of range");
        let removed = (self.keys[pos], self.children[pos]);

        self.keys.copy_within(pos + 1..self.count, pos);
        self.children.copy_within(pos + 1..self.count, pos);
        self.count -= 1;
        self.keys[self.count] = Address::NULL;
        self.children[self.count] = Address::NULL;
        removed
    }

    /// Append every entry of `other`.
    ///
    /// # Panics
    /// Panics if the combined count exceeds `ORDER`.
    pub fn append(&mut self, other: &Node) {
        assert!(self.count + other.count <= ORDER, "merged node overflows");
        for (key, child) in other.entries() {
            self.push(key, child);
        }
    }

    /// Insert into a full node by splitting it.
    ///
    /// The `ORDER` existing entries and the new one are laid out in order;
    /// `self` keeps the first `ORDER / 2` and the rest are returned as the
    /// new right sibling.
    pub fn split_insert(&mut self, pos: usize, key: Address, child: Address) -> Node {
        debug_assert!(self.is_full());

        let mut keys = [Address::NULL; ORDER + 1];
        let mut children = [Address::NULL; ORDER + 1];
        keys[..pos].copy_from_slice(&self.keys[..pos]);
        children[..pos].copy_from_slice(&self.children[..pos]);
        keys[pos] = key;
        children[pos] = child;
        keys[pos + 1..].copy_from_slice(&self.keys[pos..]);
        children[pos + 1..].copy_from_slice(&self.children[pos..]);

        let left_len = ORDER / 2;
        let mut right = Node::empty(self.is_leaf);

        *self = Node::empty(self.is_leaf);
        for (&k, &c) in keys.iter().zip(&children).take(left_len) {
            self.push(k, c);
        }
        for (&k, &c) in keys.iter().zip(&children).skip(left_len) {
            right.push(k, c);
        }
        right
    }
}

impl Record for Node {
    const SIZE: usize = Self::OFFSET_CHILDREN + 8 * ORDER;

    fn write_to(&self, buf: &mut [u8]) {
        buf[Self::OFFSET_COUNT..Self::OFFSET_IS_LEAF]
            .copy_from_slice(&(self.count as i32).to_le_bytes());
        buf[Self::OFFSET_IS_LEAF] = self.is_leaf as u8;
        for i in 0..ORDER {
            let k = Self::OFFSET_KEYS + i * 8;
            let c = Self::OFFSET_CHILDREN + i * 8;
            buf[k..k + 8].copy_from_slice(&self.keys[i].0.to_le_bytes());
            buf[c..c + 8].copy_from_slice(&self.children[i].0.to_le_bytes());
        }
    }

    /// Decode a node. A negative count decodes as `usize::MAX` so that the
    /// tree's bounds check rejects it.
    fn from_bytes(buf: &[u8]) -> Self {
        let read_u64 = |offset: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[offset..offset + 8]);
            u64::from_le_bytes(raw)
        };

        let mut raw_count = [0u8; 4];
        raw_count.copy_from_slice(&buf[Self::OFFSET_COUNT..Self::OFFSET_IS_LEAF]);
        let count = usize::try_from(i32::from_le_bytes(raw_count)).unwrap_or(usize::MAX);

        let mut node = Node::empty(buf[Self::OFFSET_IS_LEAF] != 0);
        node.count = count;
        for i in 0..ORDER {
            node.keys[i] = Address(read_u64(Self::OFFSET_KEYS + i * 8));
            node.children[i] = Address(read_u64(Self::OFFSET_CHILDREN + i * 8));
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(n: u64) -> Address {
        Address(n)
    }

    fn filled(n: u64) -> Node {
        let mut node = Node::leaf();
        for i in 0..n {
            node.push(a(10 * (i + 1)), a(100 * (i + 1)));
        }
        node
    }

    #[test]
    fn test_constants() {
        assert_eq!(Node::SIZE, 69);
        assert_eq!(MIN_OCCUPANCY, 2);
        assert_eq!(ROOT, Address::from_slot(PageId::FIRST_DATA, 0, Node::SIZE));
        assert_eq!(ROOT.0, 4621);
    }

    #[test]
    fn test_insert_and_remove_shift() {
        let mut node = filled(3);
        node.insert_at(1, a(15), a(150));
        assert_eq!(node.keys, [a(10), a(15), a(20), a(30)]);
        assert!(node.is_full());

        assert_eq!(node.remove_at(0), (a(10), a(100)));
        assert_eq!(node.keys, [a(15), a(20), a(30), Address::NULL]);
        assert_eq!(node.children[..3], [a(150), a(200), a(300)]);
        assert_eq!(node.last_key(), Some(a(30)));
    }

    #[test]
    #[should_panic(expected = "insert into full node")]
    fn test_insert_into_full_panics() {
        filled(4).push(a(50), a(500));
    }

    #[test]
    fn test_split_middle() {
        let mut left = filled(4);
        let right = left.split_insert(2, a(25), a(250));

        assert_eq!(left.count, 2);
        assert_eq!(left.keys[..2], [a(10), a(20)]);
        assert_eq!(left.keys[2..], [Address::NULL; 2]);
        assert_eq!(right.count, 3);
        assert_eq!(right.keys[..3], [a(25), a(30), a(40)]);
        assert_eq!(right.children[..3], [a(250), a(300), a(400)]);
        assert!(right.is_leaf);
    }

    #[test]
    fn test_split_at_ends() {
        let mut left = filled(4);
        let right = left.split_insert(4, a(50), a(500));
        assert_eq!(left.last_key(), Some(a(20)));
        assert_eq!(right.last_key(), Some(a(50)));

        let mut left = filled(4);
        let right = left.split_insert(0, a(5), a(50));
        assert_eq!(left.keys[..2], [a(5), a(10)]);
        assert_eq!(right.keys[..3], [a(20), a(30), a(40)]);
    }

    #[test]
    fn test_append() {
        let mut node = filled(1);
        let mut other = Node::leaf();
        other.push(a(70), a(700));
        other.push(a(80), a(800));
        node.append(&other);
        assert_eq!(node.entries().collect::<Vec<_>>(), vec![
            (a(10), a(100)),
            (a(70), a(700)),
            (a(80), a(800)),
        ]);
    }

    #[test]
    fn test_record_encoding() {
        let mut node = Node::internal();
        node.push(a(4621), a(8717));
        node.push(a(u64::MAX), a(1));

        let mut buf = [0u8; Node::SIZE];
        node.write_to(&mut buf);
        assert_eq!(&buf[..5], &[2, 0, 0, 0, 0]);
        assert_eq!(Node::from_bytes(&buf), node);
    }

    #[test]
    fn test_negative_count_decodes_out_of_range() {
        let mut buf = [0u8; Node::SIZE];
        buf[..4].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(Node::from_bytes(&buf).count > ORDER);
    }
}
