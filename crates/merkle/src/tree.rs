//! The Merkle tree built over a fixed, ordered list of leaves.

use crate::proof::{hash_pair, MerkleProof, ProofNode, Side};
use alloy_primitives::{keccak256, Bytes, B256};
use thiserror::Error;

/// Errors raised while building or querying a [MerkleTree].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    /// A tree cannot be built over zero leaves.
    #[error("cannot build a merkle tree over zero leaves")]
    EmptyLeaves,
    /// The requested leaf index does not exist in the tree.
    #[error("leaf index {index} is out of range for {leaf_count} leaves")]
    IndexOutOfRange {
        /// The requested index.
        index: u64,
        /// The number of leaves in the tree.
        leaf_count: u64,
    },
}

/// The [MerkleTree] struct is a binary hash tree over an ordered list of leaf byte strings.
/// Leaves are hashed with keccak256 to form the bottom level; an odd node at the end of a level
/// carries up to the next level unchanged rather than being paired with a copy of itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    leaves: Vec<Bytes>,
    /// Every level of hashes, leaf hashes first, root level last.
    levels: Vec<Vec<B256>>,
}

impl MerkleTree {
    /// Builds a tree over `leaves`, in order. Fails with [MerkleError::EmptyLeaves] if the
    /// iterator yields nothing.
    pub fn from_leaves<I>(leaves: I) -> Result<Self, MerkleError>
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        let leaves: Vec<Bytes> = leaves.into_iter().map(Into::into).collect();
        if leaves.is_empty() {
            return Err(MerkleError::EmptyLeaves);
        }

        let mut levels: Vec<Vec<B256>> = Vec::new();
        let mut current: Vec<B256> = leaves.iter().map(keccak256).collect();
        while current.len() > 1 {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                match pair {
                    [left, right] => next.push(hash_pair(*left, *right)),
                    // Odd node at the end of the level carries up unchanged.
                    _ => next.push(pair[0]),
                }
            }
            levels.push(current);
            current = next;
        }
        levels.push(current);

        Ok(Self { leaves, levels })
    }

    /// Returns the tree's root hash.
    pub fn root(&self) -> B256 {
        self.levels[self.levels.len() - 1][0]
    }

    /// Returns the number of leaves in the tree.
    pub fn leaf_count(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Builds an inclusion proof for the leaf at `index`: one sibling per level that had one,
    /// leaf level first.
    pub fn prove(&self, index: u64) -> Result<MerkleProof, MerkleError> {
        let leaf_count = self.leaf_count();
        if index >= leaf_count {
            return Err(MerkleError::IndexOutOfRange { index, leaf_count });
        }

        let mut siblings = Vec::new();
        let mut position = index as usize;
        for level in &self.levels[..self.levels.len() - 1] {
            if position % 2 == 1 {
                siblings.push(ProofNode {
                    hash: level[position - 1],
                    side: Side::Left,
                });
            } else if position + 1 < level.len() {
                siblings.push(ProofNode {
                    hash: level[position + 1],
                    side: Side::Right,
                });
            }
            position /= 2;
        }

        Ok(MerkleProof {
            leaf: self.leaves[index as usize].clone(),
            leaf_index: index,
            siblings,
        })
    }
}
