#![doc = include_str!("../README.md")]

//! Merkle commitment trees for Balin, covering transaction batches and
//! withdrawal records.

mod tree;
pub use tree::{MerkleError, MerkleTree};

mod proof;
pub use proof::{MerkleProof, ProofNode, Side};
