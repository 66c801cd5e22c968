//! Inclusion proofs.
//!
//! A proof lets a peer that only knows a root digest check that one key
//! holds one content digest, without the rest of the tree.

use corelib::hash::{Digest, StrongHasher};
use serde::{Deserialize, Serialize};

use crate::range::key_position;
use crate::tree::{internal_digest, leaf_digest, MerkleNode, MerkleTree, NodeKind};

/// Sibling digests at one level of the path, leaf level first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofLevel {
    /// Position of the path node among `digests`.
    pub index: usize,
    /// Digests of every child of the parent at this level, path node included.
    pub digests: Vec<Digest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub key: Vec<u8>,
    /// All entries of the key's leaf, in key order.
    pub leaf_entries: Vec<(Vec<u8>, Digest)>,
    pub levels: Vec<ProofLevel>,
}

impl MerkleProof {
    /// True if the proof shows `key → content` under `root`.
    pub fn verify<H: StrongHasher>(&self, hasher: &H, root: &Digest, content: &Digest) -> bool {
        let listed = self
            .leaf_entries
            .iter()
            .any(|(key, digest)| key == &self.key && digest == content);
        let ordered = self
            .leaf_entries
            .windows(2)
            .all(|pair| pair[0].0 < pair[1].0);
        if !listed || !ordered {
            return false;
        }

        let mut current = leaf_digest(hasher, self.leaf_entries.iter().map(|(k, d)| (k, d)));
        for level in &self.levels {
            if level.digests.get(level.index) != Some(&current) {
                return false;
            }
            current = internal_digest(hasher, level.digests.iter().copied());
        }
        &current == root
    }
}

impl<H: StrongHasher> MerkleTree<H> {
    /// Inclusion proof for `key`, or `None` if the key is absent.
    pub fn proof(&self, key: &[u8]) -> Option<MerkleProof> {
        let position = key_position(key);
        let mut levels = Vec::with_capacity(self.shape().depth() as usize);
        let mut node: &MerkleNode = self.root();

        loop {
            match node.kind() {
                NodeKind::Internal(children) => {
                    let index = MerkleNode::child_index(children, position);
                    levels.push(ProofLevel {
                        index,
                        digests: children.iter().map(MerkleNode::digest).collect(),
                    });
                    node = &children[index];
                }
                NodeKind::Leaf(entries) => {
                    if !entries.contains_key(key) {
                        return None;
                    }
                    levels.reverse();
                    return Some(MerkleProof {
                        key: key.to_vec(),
                        leaf_entries: entries.iter().map(|(k, d)| (k.clone(), *d)).collect(),
                        levels,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::TreeShape;
    use corelib::hash::Blake3Hasher;

    fn tree() -> MerkleTree {
        MerkleTree::build(
            TreeShape::new(4, 3).unwrap(),
            (0..300).map(|i| {
                (
                    format!("k{}", i).into_bytes(),
                    Blake3Hasher.digest(format!("v{}", i).as_bytes()),
                )
            }),
        )
    }

    #[test]
    fn test_valid_proof_verifies() {
        let tree = tree();
        let proof = tree.proof(b"k17").unwrap();
        assert_eq!(proof.levels.len(), 3);
        let content = Blake3Hasher.digest(b"v17");
        assert!(proof.verify(&Blake3Hasher, &tree.root_digest(), &content));
    }

    #[test]
    fn test_wrong_content_fails() {
        let tree = tree();
        let proof = tree.proof(b"k17").unwrap();
        let wrong = Blake3Hasher.digest(b"v18");
        assert!(!proof.verify(&Blake3Hasher, &tree.root_digest(), &wrong));
    }

    #[test]
    fn test_stale_root_fails() {
        let mut tree = tree();
        let proof = tree.proof(b"k17").unwrap();
        let old_root = tree.root_digest();
        tree.insert(b"k200".to_vec(), Digest([1; 32]));
        let content = Blake3Hasher.digest(b"v17");
        assert!(proof.verify(&Blake3Hasher, &old_root, &content));
        assert_ne!(tree.proof(b"k17").unwrap(), proof);
        assert!(!proof.verify(&Blake3Hasher, &tree.root_digest(), &content));
    }

    #[test]
    fn test_tampered_sibling_fails() {
        let tree = tree();
        let mut proof = tree.proof(b"k3").unwrap();
        let sibling = (proof.levels[1].index + 1) % proof.levels[1].digests.len();
        proof.levels[1].digests[sibling] = Digest([0xff; 32]);
        let content = Blake3Hasher.digest(b"v3");
        assert!(!proof.verify(&Blake3Hasher, &tree.root_digest(), &content));
    }

    #[test]
    fn test_absent_key_has_no_proof() {
        assert!(tree().proof(b"nope").is_none());
    }
}
