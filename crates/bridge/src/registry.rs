//! Supported-token policy for withdrawals.

use crate::ClaimError;
use alloy_primitives::{Address, U256};
use std::collections::HashMap;

/// Inclusive per-token withdrawal bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// The smallest releasable amount.
    pub min_amount: U256,
    /// The largest releasable amount.
    pub max_amount: U256,
}

/// The [TokenRegistry] struct holds the set of tokens the bridge will release, with per-token
/// amount bounds. Claims for unregistered tokens are rejected before any proof work happens.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    policies: HashMap<Address, TokenPolicy>,
}

impl TokenRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token with inclusive amount bounds.
    pub fn register(&mut self, token: Address, min_amount: U256, max_amount: U256) {
        self.policies.insert(
            token,
            TokenPolicy {
                min_amount,
                max_amount,
            },
        );
    }

    /// Returns the policy for `token`, if registered.
    pub fn policy(&self, token: &Address) -> Option<&TokenPolicy> {
        self.policies.get(token)
    }

    /// Checks `amount` against the bounds registered for `token`.
    pub fn check(&self, token: Address, amount: U256) -> Result<(), ClaimError> {
        let policy = self
            .policies
            .get(&token)
            .ok_or(ClaimError::UnsupportedToken(token))?;
        if amount < policy.min_amount || amount > policy.max_amount {
            return Err(ClaimError::AmountOutOfBounds { token, amount });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let token = Address::new([0xAA; 20]);
        let mut registry = TokenRegistry::new();
        registry.register(token, U256::from(10), U256::from(100));

        assert!(registry.check(token, U256::from(10)).is_ok());
        assert!(registry.check(token, U256::from(100)).is_ok());
        assert!(matches!(
            registry.check(token, U256::from(9)),
            Err(ClaimError::AmountOutOfBounds { .. })
        ));
        assert!(matches!(
            registry.check(token, U256::from(101)),
            Err(ClaimError::AmountOutOfBounds { .. })
        ));
    }

    #[test]
    fn unregistered_tokens_are_refused() {
        let registry = TokenRegistry::new();
        assert!(matches!(
            registry.check(Address::new([0xBB; 20]), U256::from(1)),
            Err(ClaimError::UnsupportedToken(_))
        ));
    }
}
