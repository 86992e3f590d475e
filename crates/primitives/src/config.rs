//! Protocol configuration shared across the settlement components.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// The default challenge window: seven days of settlement-chain time.
pub const DEFAULT_CHALLENGE_WINDOW: Timestamp = 7 * 24 * 60 * 60;

/// The default per-round declaration deadline inside a dispute game: twelve hours.
pub const DEFAULT_ROUND_TIMEOUT: Timestamp = 12 * 60 * 60;

/// The default bond each disputant escrows when a game opens, in the settlement chain's base
/// unit.
pub const DEFAULT_BOND: u128 = 1_000_000_000;

/// The [ProtocolConfig] struct carries the timing and bonding parameters the settlement
/// components share. All durations are in seconds of settlement-chain time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Seconds a commitment must survive undisputed before it may finalize.
    pub challenge_window: Timestamp,
    /// Seconds a disputant has to submit its midpoint declaration before forfeiting the game.
    pub round_timeout: Timestamp,
    /// Bond escrowed by each party when a dispute game opens. The loser's bond is awarded to the
    /// winner on resolution.
    pub bond: u128,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            challenge_window: DEFAULT_CHALLENGE_WINDOW,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            bond: DEFAULT_BOND,
        }
    }
}

impl ProtocolConfig {
    /// Overrides the challenge window.
    pub const fn with_challenge_window(mut self, seconds: Timestamp) -> Self {
        self.challenge_window = seconds;
        self
    }

    /// Overrides the per-round declaration deadline.
    pub const fn with_round_timeout(mut self, seconds: Timestamp) -> Self {
        self.round_timeout = seconds;
        self
    }

    /// Overrides the dispute bond.
    pub const fn with_bond(mut self, bond: u128) -> Self {
        self.bond = bond;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProtocolConfig::default();
        assert_eq!(config.challenge_window, 604_800);
        assert_eq!(config.round_timeout, 43_200);
        assert_eq!(config.bond, DEFAULT_BOND);
    }

    #[test]
    fn builder_overrides() {
        let config = ProtocolConfig::default()
            .with_challenge_window(60)
            .with_round_timeout(5)
            .with_bond(42);
        assert_eq!(config.challenge_window, 60);
        assert_eq!(config.round_timeout, 5);
        assert_eq!(config.bond, 42);
    }
}
