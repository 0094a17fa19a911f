//! Binary Merkle tree over attestation leaves.
//!
//! Leaves are hashed as `H(0x00 ‖ leaf)` and interior nodes as
//! `H(0x01 ‖ left ‖ right)`. When a level has an odd number of nodes the last
//! one is carried up unchanged, so a path has no sibling for that level.

use sha2::{Digest as _, Sha256};

use zkbid_types::Digest;

use crate::error::CryptoError;

/// Paths longer than this cannot come from a tree with a `u64` leaf count.
const MAX_PATH_LEN: usize = 64;

pub fn hash_leaf(leaf: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(leaf);
    hasher.finalize().into()
}

pub fn hash_node(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// A fully materialised tree, built by the verification network per batch.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `levels[0]` holds hashed leaves, the last level holds the root
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    pub fn new(leaves: &[Digest]) -> Result<Self, CryptoError> {
        if leaves.is_empty() {
            return Err(CryptoError::EmptyTree);
        }

        let mut current: Vec<Digest> = leaves.iter().map(hash_leaf).collect();
        let mut levels = Vec::new();
        while current.len() > 1 {
            let next = current
                .chunks(2)
                .map(|pair| {
                    if pair.len() == 2 {
                        hash_node(&pair[0], &pair[1])
                    } else {
                        pair[0]
                    }
                })
                .collect();
            levels.push(std::mem::replace(&mut current, next));
        }
        levels.push(current);

        Ok(Self { levels })
    }

    pub fn root(&self) -> Digest {
        // `new` guarantees a non-empty top level.
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaf_count(&self) -> u64 {
        self.levels[0].len() as u64
    }

    /// Sibling path for the leaf at `index`, bottom-up.
    pub fn proof(&self, index: u64) -> Result<Vec<Digest>, CryptoError> {
        let leaf_count = self.leaf_count();
        if index >= leaf_count {
            return Err(CryptoError::IndexOutOfRange { index, leaf_count });
        }

        let mut pos = index as usize;
        let mut path = Vec::new();
        for level in &self.levels[..self.levels.len() - 1] {
            let carried = pos % 2 == 0 && pos + 1 == level.len();
            if !carried {
                path.push(level[pos ^ 1]);
            }
            pos /= 2;
        }
        Ok(path)
    }
}

/// Recompute the root from a leaf and its path.
///
/// Returns `None` for any structurally invalid input: zero leaves, an index
/// out of range, or a path with too few or too many siblings.
pub fn compute_root(leaf: &Digest, path: &[Digest], leaf_count: u64, index: u64) -> Option<Digest> {
    if leaf_count == 0 || index >= leaf_count || path.len() > MAX_PATH_LEN {
        return None;
    }

    let mut node = hash_leaf(leaf);
    let mut pos = index;
    let mut width = leaf_count;
    let mut siblings = path.iter();

    while width > 1 {
        let carried = pos % 2 == 0 && pos + 1 == width;
        if !carried {
            let sibling = siblings.next()?;
            node = if pos % 2 == 1 {
                hash_node(sibling, &node)
            } else {
                hash_node(&node, sibling)
            };
        }
        pos /= 2;
        width = width / 2 + width % 2;
    }

    if siblings.next().is_some() {
        return None;
    }
    Some(node)
}

/// Check that `leaf` sits at `index` in a tree of `leaf_count` leaves with `root`.
pub fn verify_inclusion(
    root: &Digest,
    leaf: &Digest,
    path: &[Digest],
    leaf_count: u64,
    index: u64,
) -> bool {
    compute_root(leaf, path, leaf_count, index).as_ref() == Some(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaves(n: usize) -> Vec<Digest> {
        (0..n)
            .map(|i| {
                let mut leaf = [0u8; 32];
                leaf[..8].copy_from_slice(&(i as u64).to_le_bytes());
                leaf
            })
            .collect()
    }

    #[test]
    fn test_every_leaf_verifies() {
        for n in 1..=17 {
            let leaves = leaves(n);
            let tree = MerkleTree::new(&leaves).unwrap();
            for (i, leaf) in leaves.iter().enumerate() {
                let path = tree.proof(i as u64).unwrap();
                assert!(
                    verify_inclusion(&tree.root(), leaf, &path, n as u64, i as u64),
                    "leaf {} of {} failed",
                    i,
                    n
                );
            }
        }
    }

    #[test]
    fn test_single_leaf_tree() {
        let leaves = leaves(1);
        let tree = MerkleTree::new(&leaves).unwrap();
        assert_eq!(tree.root(), hash_leaf(&leaves[0]));
        assert!(tree.proof(0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert_eq!(MerkleTree::new(&[]).unwrap_err(), CryptoError::EmptyTree);
    }

    #[test]
    fn test_tampered_path_fails() {
        let leaves = leaves(5);
        let tree = MerkleTree::new(&leaves).unwrap();
        let mut path = tree.proof(1).unwrap();
        path[0][0] ^= 0xff;
        assert!(!verify_inclusion(&tree.root(), &leaves[1], &path, 5, 1));
    }

    #[test]
    fn test_wrong_leaf_or_index_fails() {
        let leaves = leaves(8);
        let tree = MerkleTree::new(&leaves).unwrap();
        let path = tree.proof(3).unwrap();
        assert!(!verify_inclusion(&tree.root(), &leaves[2], &path, 8, 3));
        assert!(!verify_inclusion(&tree.root(), &leaves[3], &path, 8, 2));
        assert!(!verify_inclusion(&tree.root(), &leaves[3], &path, 8, 8));
    }

    #[test]
    fn test_path_length_must_match() {
        let leaves = leaves(6);
        let tree = MerkleTree::new(&leaves).unwrap();
        let mut path = tree.proof(0).unwrap();
        path.push([0u8; 32]);
        assert_eq!(compute_root(&leaves[0], &path, 6, 0), None);
        assert_eq!(compute_root(&leaves[0], &path[..1], 6, 0), None);
    }

    #[test]
    fn test_proof_index_out_of_range() {
        let tree = MerkleTree::new(&leaves(3)).unwrap();
        assert!(matches!(
            tree.proof(3),
            Err(CryptoError::IndexOutOfRange { index: 3, leaf_count: 3 })
        ));
    }

    proptest! {
        #[test]
        fn random_trees_verify(n in 1usize..200, pick in any::<prop::sample::Index>()) {
            let leaves = leaves(n);
            let tree = MerkleTree::new(&leaves).unwrap();
            let i = pick.index(n);
            let path = tree.proof(i as u64).unwrap();
            prop_assert_eq!(
                compute_root(&leaves[i], &path, n as u64, i as u64),
                Some(tree.root())
            );
        }
    }
}
