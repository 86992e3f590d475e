//! This module contains a trace oracle that mis-executes one transaction, standing in for a
//! party whose view of a block is wrong.

use crate::TraceOracle;
use alloy_primitives::keccak256;
use anyhow::Result;
use balin_primitives::{Claim, SequenceNumber};

/// The [ForkedTrace] struct wraps an honest [TraceOracle] and corrupts every boundary after
/// `fork_at` for one commitment, exactly as a party that mis-executed the transaction at index
/// `fork_at` would report. Boundaries up to and including the fork, and every other
/// commitment, pass through untouched.
#[derive(Debug, Clone)]
pub struct ForkedTrace<T> {
    inner: T,
    sequence: SequenceNumber,
    fork_at: u64,
}

impl<T> ForkedTrace<T> {
    /// Wraps `inner`, corrupting commitment `sequence` after boundary `fork_at`.
    pub fn new(inner: T, sequence: SequenceNumber, fork_at: u64) -> Self {
        Self {
            inner,
            sequence,
            fork_at,
        }
    }
}

#[async_trait::async_trait]
impl<T: TraceOracle + Sync> TraceOracle for ForkedTrace<T> {
    async fn state_root_at(&self, sequence: SequenceNumber, boundary: u64) -> Result<Claim> {
        let honest = self.inner.state_root_at(sequence, boundary).await?;
        if sequence == self.sequence && boundary > self.fork_at {
            Ok(keccak256(honest))
        } else {
            Ok(honest)
        }
    }
}
