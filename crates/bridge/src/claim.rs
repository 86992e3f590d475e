//! Withdrawal claim types.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{sol, SolType};
use anyhow::bail;
use balin_merkle::MerkleProof;
use balin_primitives::SequenceNumber;
use serde::{Deserialize, Serialize};

/// A unique identifier for a withdrawal claim.
pub type ClaimId = B256;

/// The fields of a claim that participate in its identifier.
type ClaimIdEncoding = sol! {
    tuple(uint64, address, address, uint256)
};

/// The [WithdrawalClaim] struct is a request to release escrowed funds, carrying an inclusion
/// proof for the withdrawal record under the referenced commitment's transactions root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalClaim {
    /// The commitment whose block contains the withdrawal record.
    pub sequence_number: SequenceNumber,
    /// The address the released funds belong to.
    pub owner: Address,
    /// The token being withdrawn.
    pub token: Address,
    /// The amount being withdrawn.
    pub amount: U256,
    /// The inclusion proof into the commitment's transactions root.
    pub proof: MerkleProof,
}

impl WithdrawalClaim {
    /// Computes the claim's identifier from its economic fields. Two claims for the same
    /// withdrawal share one identifier no matter how their proofs are laid out.
    pub fn id(&self) -> ClaimId {
        keccak256(ClaimIdEncoding::abi_encode(&(
            self.sequence_number,
            self.owner,
            self.token,
            self.amount,
        )))
    }
}

/// The [ClaimStatus] enum describes the lifecycle of a withdrawal claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    /// The claim is stored and waiting for its commitment to finalize.
    Pending = 0,
    /// The claim's commitment is finalized; the claim may be released.
    Eligible = 1,
    /// The claim has been paid out. Terminal.
    Released = 2,
    /// The claim's commitment was invalidated. Terminal.
    Rejected = 3,
}

impl ClaimStatus {
    /// Returns `true` if the status can no longer change.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Rejected)
    }
}

impl TryFrom<u8> for ClaimStatus {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Eligible),
            2 => Ok(Self::Released),
            3 => Ok(Self::Rejected),
            _ => bail!("Invalid claim status"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use balin_merkle::MerkleTree;

    fn claim(amount: u64) -> WithdrawalClaim {
        let tree = MerkleTree::from_leaves([b"wd".to_vec()]).unwrap();
        WithdrawalClaim {
            sequence_number: 7,
            owner: Address::new([0x01; 20]),
            token: Address::new([0xAA; 20]),
            amount: U256::from(amount),
            proof: tree.prove(0).unwrap(),
        }
    }

    #[test]
    fn claim_id_tracks_economic_fields_only() {
        let a = claim(100);
        let mut b = claim(100);
        b.proof.leaf_index = 3;
        assert_eq!(a.id(), b.id());

        let mut c = claim(100);
        c.owner = Address::new([0x02; 20]);
        assert_ne!(a.id(), c.id());
        assert_ne!(a.id(), claim(101).id());
    }

    #[test]
    fn status_round_trips() {
        for status in [
            ClaimStatus::Pending,
            ClaimStatus::Eligible,
            ClaimStatus::Released,
            ClaimStatus::Rejected,
        ] {
            assert_eq!(ClaimStatus::try_from(status as u8).unwrap(), status);
        }
        assert!(ClaimStatus::try_from(4).is_err());
        assert!(!ClaimStatus::Pending.is_terminal());
        assert!(ClaimStatus::Rejected.is_terminal());
    }
}
