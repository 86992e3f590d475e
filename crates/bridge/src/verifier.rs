//! This module contains the [WithdrawalVerifier], which accepts withdrawal claims early but
//! releases them only against an explicitly finalized commitment.

use crate::{ClaimId, ClaimStatus, TokenRegistry, WithdrawalClaim};
use alloy_primitives::{Address, U256};
use balin_chain::StateCommitmentChain;
use balin_primitives::{CommitmentStatus, SequenceNumber};
use std::collections::HashMap;
use thiserror::Error;

/// A stored claim and its current lifecycle status.
#[derive(Debug, Clone)]
struct StoredClaim {
    claim: WithdrawalClaim,
    status: ClaimStatus,
}

/// The [WithdrawalVerifier] struct indexes withdrawal claims by identifier and gates their
/// release on the referenced commitment. The ledger's explicit [CommitmentStatus::Finalized]
/// mark is required; logical finality reported by the status tracker is not a release
/// authority. Proofs are re-verified at release time, so a commitment invalidated after a
/// claim was stored can never pay out.
#[derive(Debug, Clone, Default)]
pub struct WithdrawalVerifier {
    registry: TokenRegistry,
    claims: HashMap<ClaimId, StoredClaim>,
}

impl WithdrawalVerifier {
    /// Creates a verifier releasing only tokens present in `registry`.
    pub fn new(registry: TokenRegistry) -> Self {
        Self {
            registry,
            claims: HashMap::new(),
        }
    }

    /// Returns the token registry.
    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Validates a claim against the ledger and stores it. The proof must verify against the
    /// referenced commitment's transactions root; a claim whose commitment has not finalized
    /// yet is stored as [ClaimStatus::Pending] rather than rejected. Returns the claim's
    /// identifier and initial status.
    pub fn submit_claim(
        &mut self,
        claim: WithdrawalClaim,
        chain: &StateCommitmentChain,
    ) -> Result<(ClaimId, ClaimStatus), ClaimError> {
        self.registry.check(claim.token, claim.amount)?;
        let commitment = chain
            .get(claim.sequence_number)
            .ok_or(ClaimError::UnknownCommitment(claim.sequence_number))?;
        if commitment.status == CommitmentStatus::Invalid {
            return Err(ClaimError::CommitmentInvalid(claim.sequence_number));
        }
        if !claim.proof.verify_at(
            commitment.header.transactions_root,
            commitment.header.transaction_count,
        ) {
            return Err(ClaimError::InvalidProof);
        }

        let id = claim.id();
        if self.claims.contains_key(&id) {
            return Err(ClaimError::DuplicateClaim(id));
        }
        let status = match commitment.status {
            CommitmentStatus::Finalized => ClaimStatus::Eligible,
            _ => ClaimStatus::Pending,
        };
        tracing::info!(
            id = %id,
            sequence = claim.sequence_number,
            owner = %claim.owner,
            amount = %claim.amount,
            "withdrawal claim submitted"
        );
        self.claims.insert(id, StoredClaim { claim, status });
        Ok((id, status))
    }

    /// Re-checks a claim against the ledger and returns its status. A pending claim becomes
    /// eligible once its commitment finalizes, and permanently rejected if the commitment is
    /// invalidated.
    pub fn claim_status(
        &mut self,
        id: ClaimId,
        chain: &StateCommitmentChain,
    ) -> Result<ClaimStatus, ClaimError> {
        let stored = self.claims.get_mut(&id).ok_or(ClaimError::UnknownClaim(id))?;
        if stored.status.is_terminal() {
            return Ok(stored.status);
        }
        let sequence = stored.claim.sequence_number;
        let commitment = chain
            .get(sequence)
            .ok_or(ClaimError::UnknownCommitment(sequence))?;
        stored.status = match commitment.status {
            CommitmentStatus::Invalid => {
                tracing::warn!(id = %id, sequence, "withdrawal claim rejected; commitment invalidated");
                ClaimStatus::Rejected
            }
            CommitmentStatus::Finalized => ClaimStatus::Eligible,
            _ => ClaimStatus::Pending,
        };
        Ok(stored.status)
    }

    /// Releases a claim. Succeeds only if the commitment holds the explicit finalized mark and
    /// the stored proof still verifies at the moment of the call. A claim against an
    /// invalidated commitment moves to [ClaimStatus::Rejected] and stays there.
    pub fn release(
        &mut self,
        id: ClaimId,
        chain: &StateCommitmentChain,
    ) -> Result<(), ClaimError> {
        let stored = self.claims.get_mut(&id).ok_or(ClaimError::UnknownClaim(id))?;
        if stored.status.is_terminal() {
            return Err(ClaimError::AlreadyResolved(id));
        }
        let sequence = stored.claim.sequence_number;
        let commitment = chain
            .get(sequence)
            .ok_or(ClaimError::UnknownCommitment(sequence))?;
        match commitment.status {
            CommitmentStatus::Invalid => {
                stored.status = ClaimStatus::Rejected;
                tracing::warn!(id = %id, sequence, "withdrawal refused; commitment invalidated");
                Err(ClaimError::CommitmentInvalid(sequence))
            }
            CommitmentStatus::Finalized => {
                if !stored.claim.proof.verify_at(
                    commitment.header.transactions_root,
                    commitment.header.transaction_count,
                ) {
                    return Err(ClaimError::InvalidProof);
                }
                stored.status = ClaimStatus::Released;
                tracing::info!(
                    id = %id,
                    sequence,
                    owner = %stored.claim.owner,
                    amount = %stored.claim.amount,
                    "withdrawal released"
                );
                Ok(())
            }
            _ => Err(ClaimError::NotFinal(sequence)),
        }
    }

    /// Returns a stored claim and its status as of the last check.
    pub fn claim(&self, id: ClaimId) -> Option<(&WithdrawalClaim, ClaimStatus)> {
        self.claims
            .get(&id)
            .map(|stored| (&stored.claim, stored.status))
    }

    /// Returns the identifiers of every claim currently in `status`, in identifier order.
    pub fn claims_by_status(&self, status: ClaimStatus) -> Vec<ClaimId> {
        let mut ids: Vec<ClaimId> = self
            .claims
            .iter()
            .filter(|(_, stored)| stored.status == status)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the number of stored claims.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if no claims are stored.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// An error raised while handling a withdrawal claim. Proof and timing failures are
/// recoverable by the caller; claims against an invalidated commitment fail permanently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// The token is not registered for withdrawal.
    #[error("token {0} is not registered for withdrawal")]
    UnsupportedToken(Address),
    /// The amount falls outside the token's registered bounds.
    #[error("amount {amount} is outside the withdrawal bounds for token {token}")]
    AmountOutOfBounds {
        /// The claimed token.
        token: Address,
        /// The claimed amount.
        amount: U256,
    },
    /// The referenced commitment does not exist.
    #[error("unknown commitment {0}")]
    UnknownCommitment(SequenceNumber),
    /// The referenced commitment was invalidated; the claim can never release.
    #[error("commitment {0} is invalid; the claim is permanently rejected")]
    CommitmentInvalid(SequenceNumber),
    /// The proof does not verify against the commitment's transactions root.
    #[error("withdrawal proof does not verify against the commitment's transactions root")]
    InvalidProof,
    /// A claim with the same identifier is already stored.
    #[error("withdrawal claim {0} already exists")]
    DuplicateClaim(ClaimId),
    /// No claim with this identifier is stored.
    #[error("unknown withdrawal claim {0}")]
    UnknownClaim(ClaimId),
    /// The commitment has not finalized yet; retry after finalization.
    #[error("commitment {0} is not final yet")]
    NotFinal(SequenceNumber),
    /// The claim already reached a terminal status.
    #[error("withdrawal claim {0} is already resolved")]
    AlreadyResolved(ClaimId),
}
