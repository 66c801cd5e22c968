//! Merkle tree over a partition's key space.
//!
//! The tree is an explicit owned hierarchy: every internal node owns its
//! `fanout` children, leaves own the `(key, content digest)` entries that
//! hash into their range. There are no parent pointers; all traversals go
//! top-down.
//!
//! Digests:
//!
//! - entry: `H(key, content_digest)`
//! - leaf: `H(entry digests in key order)`, or [`Digest::ZERO`] when empty
//! - internal: `H(child digests in range order)`, or [`Digest::ZERO`] when
//!   every child is empty
//!
//! A node's digest depends only on the entries below it, so any change to an
//! entry changes every digest on the path to the root and nothing else.

use std::collections::BTreeMap;

use corelib::hash::{Blake3Hasher, Digest, StrongHasher};

use crate::range::{key_position, KeyRange};
use crate::shape::TreeShape;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Internal(Vec<MerkleNode>),
    Leaf(BTreeMap<Vec<u8>, Digest>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleNode {
    digest: Digest,
    range: KeyRange,
    kind: NodeKind,
}

impl MerkleNode {
    /// Empty subtree over `range` with `levels` levels below it.
    fn empty(range: KeyRange, levels: u32, fanout: usize) -> Self {
        let kind = if levels == 0 {
            NodeKind::Leaf(BTreeMap::new())
        } else {
            NodeKind::Internal(
                range
                    .split(fanout)
                    .into_iter()
                    .map(|child| MerkleNode::empty(child, levels - 1, fanout))
                    .collect(),
            )
        };
        Self {
            digest: Digest::ZERO,
            range,
            kind,
        }
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    pub fn range(&self) -> KeyRange {
        self.range
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn children(&self) -> &[MerkleNode] {
        match &self.kind {
            NodeKind::Internal(children) => children,
            NodeKind::Leaf(_) => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// Index of the child whose range holds `position`.
    pub(crate) fn child_index(children: &[MerkleNode], position: u64) -> usize {
        let position = position as u128;
        children
            .partition_point(|child| child.range.high <= position)
            .min(children.len() - 1)
    }

    fn rehash<H: StrongHasher>(&mut self, hasher: &H) {
        self.digest = match &self.kind {
            NodeKind::Leaf(entries) => leaf_digest(hasher, entries.iter()),
            NodeKind::Internal(children) => {
                internal_digest(hasher, children.iter().map(|c| c.digest))
            }
        };
    }

    /// Recompute every digest in the subtree, children first.
    fn rehash_all<H: StrongHasher>(&mut self, hasher: &H) {
        if let NodeKind::Internal(children) = &mut self.kind {
            for child in children.iter_mut() {
                child.rehash_all(hasher);
            }
        }
        self.rehash(hasher);
    }

    /// Apply `edit` to the leaf holding `position`, then rehash the path
    /// back up. Returns what `edit` returned.
    fn edit_leaf<H, F, R>(&mut self, hasher: &H, position: u64, edit: F) -> R
    where
        H: StrongHasher,
        F: FnOnce(&mut BTreeMap<Vec<u8>, Digest>) -> R,
    {
        let result = match &mut self.kind {
            NodeKind::Leaf(entries) => edit(entries),
            NodeKind::Internal(children) => {
                let idx = Self::child_index(children, position);
                children[idx].edit_leaf(hasher, position, edit)
            }
        };
        self.rehash(hasher);
        result
    }

    pub(crate) fn leaf_for(&self, position: u64) -> &MerkleNode {
        match &self.kind {
            NodeKind::Leaf(_) => self,
            NodeKind::Internal(children) => {
                children[Self::child_index(children, position)].leaf_for(position)
            }
        }
    }
}

/// Digest of one `(key, content)` entry.
pub fn entry_digest<H: StrongHasher>(hasher: &H, key: &[u8], content: &Digest) -> Digest {
    hasher.digest_parts(&[key, content.as_bytes()])
}

/// Digest of a leaf from its entries, which must come in key order.
pub fn leaf_digest<'a, H, I>(hasher: &H, entries: I) -> Digest
where
    H: StrongHasher,
    I: Iterator<Item = (&'a Vec<u8>, &'a Digest)>,
{
    let digests: Vec<Digest> = entries
        .map(|(key, content)| entry_digest(hasher, key, content))
        .collect();
    if digests.is_empty() {
        return Digest::ZERO;
    }
    let parts: Vec<&[u8]> = digests.iter().map(|d| d.as_bytes().as_slice()).collect();
    hasher.digest_parts(&parts)
}

/// Digest of an internal node from its children's digests, in range order.
pub fn internal_digest<H, I>(hasher: &H, children: I) -> Digest
where
    H: StrongHasher,
    I: Iterator<Item = Digest>,
{
    let digests: Vec<Digest> = children.collect();
    if digests.iter().all(Digest::is_zero) {
        return Digest::ZERO;
    }
    let parts: Vec<&[u8]> = digests.iter().map(|d| d.as_bytes().as_slice()).collect();
    hasher.digest_parts(&parts)
}

/// Merkle tree over one partition.
#[derive(Debug, Clone)]
pub struct MerkleTree<H: StrongHasher = Blake3Hasher> {
    shape: TreeShape,
    root: MerkleNode,
    hasher: H,
    len: usize,
}

impl MerkleTree<Blake3Hasher> {
    /// Build from `(key, content digest)` pairs with the BLAKE3 hasher.
    ///
    /// A key given twice keeps its last digest.
    pub fn build<I>(shape: TreeShape, entries: I) -> Self
    where
        I: IntoIterator<Item = (Vec<u8>, Digest)>,
    {
        Self::build_with_hasher(shape, Blake3Hasher, entries)
    }

    pub fn empty(shape: TreeShape) -> Self {
        Self::build(shape, std::iter::empty())
    }
}

impl<H: StrongHasher> MerkleTree<H> {
    pub fn build_with_hasher<I>(shape: TreeShape, hasher: H, entries: I) -> Self
    where
        I: IntoIterator<Item = (Vec<u8>, Digest)>,
    {
        let mut root = MerkleNode::empty(KeyRange::full(), shape.depth(), shape.fanout());
        for (key, content) in entries {
            let position = key_position(&key);
            insert_unhashed(&mut root, position, key, content);
        }
        root.rehash_all(&hasher);
        let len = count_entries(&root);
        Self {
            shape,
            root,
            hasher,
            len,
        }
    }

    /// Insert or replace `key`. Only digests on the key's root path change.
    pub fn insert(&mut self, key: Vec<u8>, content: Digest) -> Option<Digest> {
        let position = key_position(&key);
        let previous = self
            .root
            .edit_leaf(&self.hasher, position, |entries| entries.insert(key, content));
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Digest> {
        let position = key_position(key);
        let removed = self
            .root
            .edit_leaf(&self.hasher, position, |entries| entries.remove(key));
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    pub fn get(&self, key: &[u8]) -> Option<Digest> {
        match self.root.leaf_for(key_position(key)).kind() {
            NodeKind::Leaf(entries) => entries.get(key).copied(),
            NodeKind::Internal(_) => None,
        }
    }

    /// Range of the leaf `key` falls into.
    pub fn leaf_range(&self, key: &[u8]) -> KeyRange {
        self.root.leaf_for(key_position(key)).range()
    }

    pub fn root(&self) -> &MerkleNode {
        &self.root
    }

    pub fn root_digest(&self) -> Digest {
        self.root.digest
    }

    pub fn shape(&self) -> TreeShape {
        self.shape
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn insert_unhashed(node: &mut MerkleNode, position: u64, key: Vec<u8>, content: Digest) {
    match &mut node.kind {
        NodeKind::Leaf(entries) => {
            entries.insert(key, content);
        }
        NodeKind::Internal(children) => {
            let idx = MerkleNode::child_index(children, position);
            insert_unhashed(&mut children[idx], position, key, content);
        }
    }
}

fn count_entries(node: &MerkleNode) -> usize {
    match &node.kind {
        NodeKind::Leaf(entries) => entries.len(),
        NodeKind::Internal(children) => children.iter().map(count_entries).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> TreeShape {
        TreeShape::new(4, 3).unwrap()
    }

    fn entries(n: usize) -> Vec<(Vec<u8>, Digest)> {
        (0..n)
            .map(|i| {
                let key = format!("key-{}", i).into_bytes();
                let content = Blake3Hasher.digest(format!("value-{}", i).as_bytes());
                (key, content)
            })
            .collect()
    }

    #[test]
    fn test_empty_tree_has_zero_root() {
        let tree = MerkleTree::empty(shape());
        assert!(tree.root_digest().is_zero());
        assert!(tree.is_empty());
        assert_eq!(tree.root().children().len(), 4);
    }

    #[test]
    fn test_build_is_order_independent() {
        let forward = MerkleTree::build(shape(), entries(100));
        let backward = MerkleTree::build(shape(), entries(100).into_iter().rev());
        assert_eq!(forward.root_digest(), backward.root_digest());
        assert_eq!(forward.len(), 100);
    }

    #[test]
    fn test_incremental_insert_matches_bulk_build() {
        let bulk = MerkleTree::build(shape(), entries(50));
        let mut incremental = MerkleTree::empty(shape());
        for (key, content) in entries(50) {
            assert!(incremental.insert(key, content).is_none());
        }
        assert_eq!(incremental.root_digest(), bulk.root_digest());
        assert_eq!(incremental.root(), bulk.root());
    }

    #[test]
    fn test_remove_restores_previous_root() {
        let mut tree = MerkleTree::build(shape(), entries(20));
        let before = tree.root_digest();
        tree.insert(b"extra".to_vec(), Digest([9; 32]));
        assert_ne!(tree.root_digest(), before);
        assert_eq!(tree.remove(b"extra"), Some(Digest([9; 32])));
        assert_eq!(tree.root_digest(), before);
        assert_eq!(tree.remove(b"extra"), None);
        assert_eq!(tree.len(), 20);
    }

    #[test]
    fn test_update_changes_only_the_root_path() {
        let original = MerkleTree::build(shape(), entries(200));
        let mut changed = original.clone();
        changed.insert(b"key-7".to_vec(), Digest([1; 32]));

        let position = key_position(b"key-7");
        let mut a = original.root();
        let mut b = changed.root();
        while !a.is_leaf() {
            assert_ne!(a.digest(), b.digest());
            let idx = MerkleNode::child_index(a.children(), position);
            for (i, (ca, cb)) in a.children().iter().zip(b.children()).enumerate() {
                if i != idx {
                    assert_eq!(ca.digest(), cb.digest());
                }
            }
            a = &a.children()[idx];
            b = &b.children()[idx];
        }
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_get_and_leaf_range() {
        let tree = MerkleTree::build(shape(), entries(10));
        let expected = Blake3Hasher.digest(b"value-3");
        assert_eq!(tree.get(b"key-3"), Some(expected));
        assert_eq!(tree.get(b"missing"), None);
        assert!(tree.leaf_range(b"key-3").contains_key(b"key-3"));
        assert_eq!(tree.leaf_range(b"key-3").width(), KeyRange::full().width() / 64);
    }
}
