//! Types related to dispute games played over published state commitments.

use alloy_primitives::B256;
use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// The [Claim] type is an alias to [B256], used to distinguish a 32-byte state commitment from a
/// regular hash.
pub type Claim = B256;

/// The [Party] enum identifies one of the two sides of a dispute game. The defender stands behind
/// the published commitment; the challenger asserts that its state root is wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    /// The party that opened the dispute against the published commitment.
    Challenger = 0,
    /// The party defending the published commitment. In a game this is the original proposer.
    Defender = 1,
}

impl Party {
    /// Returns the opposing [Party].
    pub const fn opponent(&self) -> Self {
        match self {
            Party::Challenger => Party::Defender,
            Party::Defender => Party::Challenger,
        }
    }
}

impl TryFrom<u8> for Party {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Party::Challenger),
            1 => Ok(Party::Defender),
            _ => bail!("Invalid party"),
        }
    }
}

/// The [GameStatus] enum is used to indicate the status of a dispute game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// The [GameStatus::InProgress] variant is used to indicate that the dispute game is still in
    /// progress, either bisecting or awaiting the arbitration replay.
    InProgress = 0,
    /// The [GameStatus::ChallengerWins] variant is used to indicate that the challenger of the
    /// published commitment has won the dispute game.
    ChallengerWins = 1,
    /// The [GameStatus::DefenderWins] variant is used to indicate that the defender of the
    /// published commitment has won the dispute game.
    DefenderWins = 2,
}

impl GameStatus {
    /// Returns the winning [Party], or [None] while the game is in progress.
    pub const fn winner(&self) -> Option<Party> {
        match self {
            GameStatus::InProgress => None,
            GameStatus::ChallengerWins => Some(Party::Challenger),
            GameStatus::DefenderWins => Some(Party::Defender),
        }
    }

    /// Returns the terminal [GameStatus] for a win by `party`.
    pub const fn won_by(party: Party) -> Self {
        match party {
            Party::Challenger => GameStatus::ChallengerWins,
            Party::Defender => GameStatus::DefenderWins,
        }
    }
}

impl TryFrom<u8> for GameStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameStatus::InProgress),
            1 => Ok(GameStatus::ChallengerWins),
            2 => Ok(GameStatus::DefenderWins),
            _ => bail!("Invalid game status"),
        }
    }
}
