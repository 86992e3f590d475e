#![doc = include_str!("../README.md")]

//! Withdrawal claim verification for the Balin settlement core.

mod claim;
pub use self::claim::{ClaimId, ClaimStatus, WithdrawalClaim};

mod registry;
pub use self::registry::{TokenPolicy, TokenRegistry};

mod verifier;
pub use self::verifier::{ClaimError, WithdrawalVerifier};
