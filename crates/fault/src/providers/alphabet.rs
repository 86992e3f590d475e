//! This module contains the mock alphabet execution engine. A block's transactions are single
//! letters and executing one folds it into the running state root, which is enough to play
//! whole disputes without a real rollup VM.

use crate::{BatchProvider, StepOracle, TraceOracle};
use alloy_primitives::keccak256;
use alloy_sol_types::{sol, SolType};
use anyhow::{anyhow, bail, Result};
use balin_merkle::{MerkleProof, MerkleTree};
use balin_primitives::{Claim, SequenceNumber};
use std::collections::HashMap;

type AlphabetStepEncoding = sol! { tuple(bytes32, uint8) };

/// Folds one letter into a state root the way the alphabet VM executes a transaction.
pub fn alphabet_step(pre_state: Claim, letter: u8) -> Claim {
    keccak256(AlphabetStepEncoding::abi_encode(&(pre_state, letter)))
}

/// The [AlphabetEngine] is the [StepOracle] of the alphabet VM.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphabetEngine;

#[async_trait::async_trait]
impl StepOracle for AlphabetEngine {
    async fn replay_one(&self, pre_state_root: Claim, transaction: &[u8]) -> Result<Claim> {
        let letter = transaction
            .first()
            .ok_or_else(|| anyhow!("empty alphabet transaction"))?;
        Ok(alphabet_step(pre_state_root, *letter))
    }
}

/// The [AlphabetBatch] struct is a [BatchProvider] over in-memory alphabet blocks, one Merkle
/// tree of single-letter transactions per commitment.
#[derive(Debug, Clone, Default)]
pub struct AlphabetBatch {
    blocks: HashMap<SequenceNumber, MerkleTree>,
}

impl AlphabetBatch {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the letters of one committed block.
    pub fn insert_block(&mut self, sequence: SequenceNumber, letters: &[u8]) -> Result<()> {
        let tree = MerkleTree::from_leaves(letters.iter().map(|letter| vec![*letter]))?;
        self.blocks.insert(sequence, tree);
        Ok(())
    }

    /// Returns the transactions root of a registered block.
    pub fn transactions_root(&self, sequence: SequenceNumber) -> Option<Claim> {
        self.blocks.get(&sequence).map(MerkleTree::root)
    }
}

#[async_trait::async_trait]
impl BatchProvider for AlphabetBatch {
    async fn transaction(&self, sequence: SequenceNumber, index: u64) -> Result<MerkleProof> {
        let tree = self
            .blocks
            .get(&sequence)
            .ok_or_else(|| anyhow!("no block registered for commitment {sequence}"))?;
        Ok(tree.prove(index)?)
    }
}

/// The [AlphabetTrace] struct is the honest [TraceOracle] for registered alphabet blocks: the
/// state root at boundary `i` is the block's pre-state with its first `i` letters folded in.
#[derive(Debug, Clone, Default)]
pub struct AlphabetTrace {
    blocks: HashMap<SequenceNumber, (Claim, Vec<u8>)>,
}

impl AlphabetTrace {
    /// Creates an empty oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one committed block and the state root it executes from.
    pub fn insert_block(&mut self, sequence: SequenceNumber, pre_state: Claim, letters: &[u8]) {
        self.blocks.insert(sequence, (pre_state, letters.to_vec()));
    }

    /// Returns the true post-state root of a whole registered block.
    pub fn final_state_root(&self, sequence: SequenceNumber) -> Option<Claim> {
        let (pre_state, letters) = self.blocks.get(&sequence)?;
        Some(fold_letters(*pre_state, letters))
    }
}

fn fold_letters(pre_state: Claim, letters: &[u8]) -> Claim {
    letters
        .iter()
        .fold(pre_state, |state, letter| alphabet_step(state, *letter))
}

#[async_trait::async_trait]
impl TraceOracle for AlphabetTrace {
    async fn state_root_at(&self, sequence: SequenceNumber, boundary: u64) -> Result<Claim> {
        let (pre_state, letters) = self
            .blocks
            .get(&sequence)
            .ok_or_else(|| anyhow!("no block registered for commitment {sequence}"))?;
        if boundary as usize > letters.len() {
            bail!("boundary {boundary} exceeds the block's {} transactions", letters.len());
        }
        Ok(fold_letters(*pre_state, &letters[..boundary as usize]))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::B256;

    const SEQ: SequenceNumber = 0;

    #[test]
    fn step_is_letter_and_state_sensitive() {
        let root = B256::with_last_byte(1);
        assert_ne!(alphabet_step(root, b'a'), alphabet_step(root, b'b'));
        assert_ne!(
            alphabet_step(root, b'a'),
            alphabet_step(B256::with_last_byte(2), b'a')
        );
        assert_eq!(alphabet_step(root, b'a'), alphabet_step(root, b'a'));
    }

    #[tokio::test]
    async fn trace_agrees_with_the_engine() {
        let pre_state = B256::with_last_byte(7);
        let mut trace = AlphabetTrace::new();
        trace.insert_block(SEQ, pre_state, b"abcd");

        assert_eq!(trace.state_root_at(SEQ, 0).await.unwrap(), pre_state);

        let engine = AlphabetEngine;
        let mut state = pre_state;
        for (index, letter) in b"abcd".iter().enumerate() {
            state = engine.replay_one(state, &[*letter]).await.unwrap();
            assert_eq!(
                trace.state_root_at(SEQ, index as u64 + 1).await.unwrap(),
                state
            );
        }
        assert_eq!(trace.final_state_root(SEQ).unwrap(), state);
    }

    #[tokio::test]
    async fn trace_rejects_out_of_range_boundaries() {
        let mut trace = AlphabetTrace::new();
        trace.insert_block(SEQ, B256::ZERO, b"ab");
        assert!(trace.state_root_at(SEQ, 3).await.is_err());
        assert!(trace.state_root_at(9, 0).await.is_err());
    }

    #[tokio::test]
    async fn batch_serves_provable_transactions() {
        let mut batch = AlphabetBatch::new();
        batch.insert_block(SEQ, b"abcd").unwrap();
        let root = batch.transactions_root(SEQ).unwrap();

        let proof = batch.transaction(SEQ, 2).await.unwrap();
        assert_eq!(proof.leaf.as_ref(), b"c");
        assert_eq!(proof.leaf_index, 2);
        assert!(proof.verify_at(root, 4));

        assert!(batch.transaction(SEQ, 4).await.is_err());
        assert!(batch.transaction(1, 0).await.is_err());
    }
}
