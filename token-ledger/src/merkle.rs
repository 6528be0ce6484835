//! Merkle tree over the mint-audit log
//!
//! Leaves are `hash_mint_record` digests in sequence-id order, so leaf
//! index `i` holds record `i + 1`. Binary SHA-256 tree; an odd node at any
//! level is paired with itself.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash a pair of hashes (used for internal nodes)
fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Direction of sibling in Merkle tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Sibling is on the left
    Left,
    /// Sibling is on the right
    Right,
}

/// Inclusion proof for one audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf hash being proven
    pub leaf_hash: [u8; 32],
    /// Sibling hashes along the path to root
    pub siblings: Vec<(Direction, [u8; 32])>,
    /// Root hash
    pub root_hash: [u8; 32],
}

impl MerkleProof {
    /// Verify proof against its root hash
    pub fn verify(&self) -> bool {
        let computed = self
            .siblings
            .iter()
            .fold(self.leaf_hash, |current, (direction, sibling)| match direction {
                Direction::Left => hash_pair(sibling, &current),
                Direction::Right => hash_pair(&current, sibling),
            });

        computed == self.root_hash
    }
}

/// Append-only Merkle tree
#[derive(Debug, Default, Clone)]
pub struct MerkleTree {
    leaves: Vec<[u8; 32]>,
    cached_root: Option<[u8; 32]>,
}

impl MerkleTree {
    /// Create empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new leaf
    pub fn append(&mut self, leaf_hash: [u8; 32]) {
        self.leaves.push(leaf_hash);
        self.cached_root = None;
    }

    /// Get number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Merkle root; all zeroes for an empty tree
    pub fn root(&mut self) -> [u8; 32] {
        if let Some(root) = self.cached_root {
            return root;
        }

        let root = match self.leaves.len() {
            0 => [0u8; 32],
            _ => {
                let mut level = self.leaves.clone();
                while level.len() > 1 {
                    level = Self::parent_level(&level);
                }
                level[0]
            }
        };
        self.cached_root = Some(root);
        root
    }

    /// Inclusion proof for the leaf at `leaf_index`
    pub fn generate_proof(&mut self, leaf_index: usize) -> Option<MerkleProof> {
        let leaf_hash = *self.leaves.get(leaf_index)?;
        let root_hash = self.root();

        let mut siblings = Vec::new();
        let mut level = self.leaves.clone();
        let mut index = leaf_index;

        while level.len() > 1 {
            let sibling = if index % 2 == 0 {
                let right = level.get(index + 1).copied().unwrap_or(level[index]);
                (Direction::Right, right)
            } else {
                (Direction::Left, level[index - 1])
            };
            siblings.push(sibling);

            level = Self::parent_level(&level);
            index /= 2;
        }

        Some(MerkleProof {
            leaf_hash,
            siblings,
            root_hash,
        })
    }

    fn parent_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
        level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                [single] => hash_pair(single, single),
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect()
    }
}
