//! Inclusion proofs and their verification.

use alloy_primitives::{keccak256, Bytes, B256};
use serde::{Deserialize, Serialize};

/// The [Side] enum records where a proof sibling sits relative to the node being authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// The sibling is the left input to the parent hash.
    Left,
    /// The sibling is the right input to the parent hash.
    Right,
}

/// The [ProofNode] struct is one step of an inclusion proof: a sibling hash and the side it
/// occupies. Levels where the authenticated node carried up without a sibling contribute no
/// [ProofNode] at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    /// The sibling's hash.
    pub hash: B256,
    /// The side of the parent hash the sibling occupies.
    pub side: Side,
}

/// The [MerkleProof] struct authenticates one leaf against a tree root. It carries the raw leaf
/// bytes rather than the leaf hash so that verifiers bind the proof to the leaf's content, not
/// to a hash the prover chose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// The raw bytes of the proven leaf.
    pub leaf: Bytes,
    /// The position of the leaf in the tree's leaf level.
    pub leaf_index: u64,
    /// One sibling per level that had one, leaf level first.
    pub siblings: Vec<ProofNode>,
}

impl MerkleProof {
    /// Verifies the proof against `root` by folding the siblings over the leaf hash. Returns
    /// `false` for any proof that does not reproduce the root.
    pub fn verify(&self, root: B256) -> bool {
        let mut node = keccak256(&self.leaf);
        for sibling in &self.siblings {
            node = match sibling.side {
                Side::Left => hash_pair(sibling.hash, node),
                Side::Right => hash_pair(node, sibling.hash),
            };
        }
        node == root
    }

    /// Verifies the proof against `root` for a tree of exactly `leaf_count` leaves. On top of
    /// reproducing the root, the siblings' sides must match the shape a tree of that size gives
    /// the claimed leaf index, so a proof cannot speak for a different position than it names.
    pub fn verify_at(&self, root: B256, leaf_count: u64) -> bool {
        let Some(expected) = expected_sides(self.leaf_index, leaf_count) else {
            return false;
        };
        if self.siblings.len() != expected.len()
            || self
                .siblings
                .iter()
                .zip(expected.iter())
                .any(|(node, side)| node.side != *side)
        {
            return false;
        }
        self.verify(root)
    }
}

/// Hashes an ordered pair of nodes into their parent.
pub(crate) fn hash_pair(left: B256, right: B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_slice());
    buf[32..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

/// Computes the sibling sides a leaf at `index` has in a tree of `leaf_count` leaves, leaf level
/// first. Returns [None] if the index is out of range.
fn expected_sides(mut index: u64, mut width: u64) -> Option<Vec<Side>> {
    if width == 0 || index >= width {
        return None;
    }
    let mut sides = Vec::new();
    while width > 1 {
        if index % 2 == 1 {
            sides.push(Side::Left);
        } else if index + 1 < width {
            sides.push(Side::Right);
        }
        index /= 2;
        width = width.div_ceil(2);
    }
    Some(sides)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shape_of_single_leaf_tree() {
        assert_eq!(expected_sides(0, 1), Some(vec![]));
        assert_eq!(expected_sides(1, 1), None);
        assert_eq!(expected_sides(0, 0), None);
    }

    #[test]
    fn shape_of_five_leaf_tree() {
        // Leaf 4 is odd-one-out at the leaf level and again one level up, so its only sibling
        // is the subtree root over leaves 0..4.
        assert_eq!(expected_sides(4, 5), Some(vec![Side::Left]));
        // Leaf 3 has a full path.
        assert_eq!(
            expected_sides(3, 5),
            Some(vec![Side::Left, Side::Left, Side::Right])
        );
    }

    #[test]
    fn empty_sibling_list_only_verifies_the_root_leaf() {
        let leaf = Bytes::from_static(b"lone leaf");
        let proof = MerkleProof {
            leaf: leaf.clone(),
            leaf_index: 0,
            siblings: vec![],
        };
        assert!(proof.verify(keccak256(&leaf)));
        assert!(!proof.verify(B256::ZERO));
    }
}
