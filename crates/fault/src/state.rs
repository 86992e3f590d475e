//! This module contains the in-memory representation of a bisection dispute and its pure
//! transition function.

use crate::{Declaration, DisputePhase, Effect, GameError, GameEvent, Resolution, ResolutionKind};
use balin_primitives::{
    Claim, DisputeGame, GameStatus, Party, ProtocolConfig, SequenceNumber, Timestamp,
};

/// Whose declaration the game is waiting for. The challenger's turn carries the root the
/// defender just declared at the current midpoint, so a reply always has something to be
/// compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Defender,
    Challenger { defender_midpoint_root: Claim },
}

/// The [BisectionState] struct holds one dispute's full state: the interval still in question,
/// both parties' standing claims at its upper boundary, the agreed state at its lower boundary,
/// and the append-only declaration history.
///
/// Transitions happen only through [BisectionState::apply], which takes a [GameEvent] whose
/// order the settlement chain has already decided and returns the [Effect]s the caller must
/// carry out. The machine itself never touches the ledger or the execution engine, so a whole
/// game can be driven in a unit test with synthetic roots and timestamps.
#[derive(Debug, Clone)]
pub struct BisectionState {
    sequence: SequenceNumber,
    transaction_count: u64,
    /// Lower boundary of the disputed interval. Both parties agree on the state root here.
    low: u64,
    /// Upper boundary of the disputed interval. The parties disagree on the state root here.
    high: u64,
    agreed_pre_state: Claim,
    defender_claim: Claim,
    challenger_claim: Claim,
    root_claim: Claim,
    turn_state: TurnState,
    phase: DisputePhase,
    deadline: Timestamp,
    round_timeout: Timestamp,
    bond: u128,
    declarations: Vec<Declaration>,
    rounds_played: u32,
    resolution: Option<Resolution>,
}

impl BisectionState {
    /// Opens a dispute over commitment `sequence`, whose block holds `transaction_count`
    /// transactions (at least one). The defender stands behind `published_root`; the challenger
    /// asserts `claimed_root` instead; `pre_state_root` is the parent commitment's state root
    /// both sides build from. The defender declares first and must do so within the round
    /// timeout.
    ///
    /// A block of one transaction has nothing to bisect, so the game opens directly in
    /// arbitration and the returned effects already request the replay.
    pub fn open(
        sequence: SequenceNumber,
        published_root: Claim,
        claimed_root: Claim,
        pre_state_root: Claim,
        transaction_count: u64,
        now: Timestamp,
        config: ProtocolConfig,
    ) -> Result<(Self, Vec<Effect>), GameError> {
        if claimed_root == published_root {
            return Err(GameError::VacuousChallenge);
        }

        let single_step = transaction_count == 1;
        let state = Self {
            sequence,
            transaction_count,
            low: 0,
            high: transaction_count,
            agreed_pre_state: pre_state_root,
            defender_claim: published_root,
            challenger_claim: claimed_root,
            root_claim: published_root,
            turn_state: TurnState::Defender,
            phase: if single_step {
                DisputePhase::AwaitingArbitration
            } else {
                DisputePhase::Bisecting
            },
            deadline: now.saturating_add(config.round_timeout),
            round_timeout: config.round_timeout,
            bond: config.bond,
            declarations: Vec::new(),
            rounds_played: 0,
            resolution: None,
        };
        let effects = if single_step {
            vec![Effect::RequestReplay {
                sequence,
                index: 0,
                pre_state_root,
            }]
        } else {
            Vec::new()
        };
        Ok((state, effects))
    }

    /// Applies one event to the game and returns the effects the caller must carry out.
    /// Replayed events are absorbed without double-applying.
    pub fn apply(&mut self, event: GameEvent) -> Result<Vec<Effect>, GameError> {
        match event {
            GameEvent::Declare {
                party,
                midpoint,
                state_root,
                now,
            } => self.apply_declare(party, midpoint, state_root, now),
            GameEvent::Timeout { now } => Ok(self.apply_timeout(now)),
            GameEvent::EngineResult { state_root } => self.apply_engine_result(state_root),
        }
    }

    fn apply_declare(
        &mut self,
        party: Party,
        midpoint: u64,
        state_root: Claim,
        now: Timestamp,
    ) -> Result<Vec<Effect>, GameError> {
        let replayed = self.declarations.iter().any(|declaration| {
            declaration.party == party
                && declaration.midpoint == midpoint
                && declaration.state_root == state_root
        });
        if replayed {
            return Ok(Vec::new());
        }
        if self.phase != DisputePhase::Bisecting {
            return Err(GameError::InvalidPhase(self.phase));
        }
        if now >= self.deadline {
            // The round clock already ran out; whoever is on turn forfeits, and this
            // declaration is not recorded.
            return Ok(self.forfeit());
        }
        if party != self.turn() {
            return Err(GameError::WrongTurn {
                expected: self.turn(),
                actual: party,
            });
        }
        let expected = self.current_midpoint();
        if midpoint != expected {
            return Err(GameError::WrongMidpoint {
                expected,
                actual: midpoint,
            });
        }

        self.declarations.push(Declaration {
            party,
            midpoint,
            state_root,
            declared_at: now,
        });
        self.deadline = now.saturating_add(self.round_timeout);

        match self.turn_state {
            TurnState::Defender => {
                self.turn_state = TurnState::Challenger {
                    defender_midpoint_root: state_root,
                };
                Ok(Vec::new())
            }
            TurnState::Challenger {
                defender_midpoint_root,
            } => {
                self.turn_state = TurnState::Defender;
                Ok(self.narrow(midpoint, defender_midpoint_root, state_root))
            }
        }
    }

    /// Narrows the interval once both parties have declared at `midpoint`.
    fn narrow(
        &mut self,
        midpoint: u64,
        defender_root: Claim,
        challenger_root: Claim,
    ) -> Vec<Effect> {
        self.rounds_played += 1;
        if defender_root == challenger_root {
            // Agreement at the midpoint pushes the first disagreement into the upper half.
            self.low = midpoint;
            self.agreed_pre_state = defender_root;
        } else {
            // The parties already part ways in the lower half; their midpoint declarations
            // become the standing claims at the new upper boundary.
            self.high = midpoint;
            self.defender_claim = defender_root;
            self.challenger_claim = challenger_root;
        }

        if self.high - self.low == 1 {
            self.phase = DisputePhase::AwaitingArbitration;
            vec![Effect::RequestReplay {
                sequence: self.sequence,
                index: self.low,
                pre_state_root: self.agreed_pre_state,
            }]
        } else {
            Vec::new()
        }
    }

    fn apply_timeout(&mut self, now: Timestamp) -> Vec<Effect> {
        if self.phase != DisputePhase::Bisecting || now < self.deadline {
            return Vec::new();
        }
        self.forfeit()
    }

    fn apply_engine_result(&mut self, state_root: Claim) -> Result<Vec<Effect>, GameError> {
        match self.phase {
            DisputePhase::AwaitingArbitration => {}
            DisputePhase::Resolved => return Ok(Vec::new()),
            DisputePhase::Bisecting => return Err(GameError::InvalidPhase(self.phase)),
        }

        let (winner, kind) = if state_root == self.defender_claim {
            (Party::Defender, ResolutionKind::Arbitrated)
        } else if state_root == self.challenger_claim {
            (Party::Challenger, ResolutionKind::Arbitrated)
        } else {
            // The engine agrees with neither party, but it has still refuted the published
            // root at this step.
            (Party::Challenger, ResolutionKind::ExecutionMismatch)
        };
        Ok(self.settle(Resolution {
            winner,
            kind,
            step_index: Some(self.low),
            engine_root: Some(state_root),
        }))
    }

    fn forfeit(&mut self) -> Vec<Effect> {
        let winner = self.turn().opponent();
        self.settle(Resolution {
            winner,
            kind: ResolutionKind::TimeoutForfeit,
            step_index: None,
            engine_root: None,
        })
    }

    fn settle(&mut self, resolution: Resolution) -> Vec<Effect> {
        self.phase = DisputePhase::Resolved;
        self.resolution = Some(resolution);
        let ledger = match resolution.winner {
            Party::Challenger => Effect::MarkInvalid {
                sequence: self.sequence,
            },
            Party::Defender => Effect::RestoreSubmitted {
                sequence: self.sequence,
            },
        };
        vec![
            ledger,
            Effect::AwardBond {
                to: resolution.winner,
                amount: self.bond.saturating_mul(2),
            },
        ]
    }

    /// Returns the party whose declaration is due.
    pub fn turn(&self) -> Party {
        match self.turn_state {
            TurnState::Defender => Party::Defender,
            TurnState::Challenger { .. } => Party::Challenger,
        }
    }

    /// Returns the boundary index the next declaration must speak for. Meaningful only while
    /// the game is bisecting.
    pub fn current_midpoint(&self) -> u64 {
        self.low + (self.high - self.low) / 2
    }

    /// Returns the dispute's current phase.
    pub fn phase(&self) -> DisputePhase {
        self.phase
    }

    /// Returns the disputed interval as `(low, high)` boundary indices.
    pub fn interval(&self) -> (u64, u64) {
        (self.low, self.high)
    }

    /// Returns the state root both parties agree on at the interval's lower boundary.
    pub fn agreed_pre_state(&self) -> Claim {
        self.agreed_pre_state
    }

    /// Returns the defender's standing claim at the interval's upper boundary.
    pub fn defender_claim(&self) -> Claim {
        self.defender_claim
    }

    /// Returns the challenger's standing claim at the interval's upper boundary.
    pub fn challenger_claim(&self) -> Claim {
        self.challenger_claim
    }

    /// Returns the number of transactions in the disputed block.
    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }

    /// Returns the settlement-chain time by which the party on turn must declare.
    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    /// Returns every accepted declaration, oldest first.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Returns the number of completed bisection rounds.
    pub fn rounds_played(&self) -> u32 {
        self.rounds_played
    }

    /// Returns the terminal record, once the game has resolved.
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    /// Returns the replay request the game is waiting on while parked in
    /// [DisputePhase::AwaitingArbitration]. The request is derived from the game's own state,
    /// so a replay lost to a provider failure can always be issued again.
    pub fn pending_replay(&self) -> Option<Effect> {
        match self.phase {
            DisputePhase::AwaitingArbitration => Some(Effect::RequestReplay {
                sequence: self.sequence,
                index: self.low,
                pre_state_root: self.agreed_pre_state,
            }),
            _ => None,
        }
    }
}

impl DisputeGame for BisectionState {
    fn sequence_number(&self) -> SequenceNumber {
        self.sequence
    }

    fn root_claim(&self) -> Claim {
        self.root_claim
    }

    fn status(&self) -> GameStatus {
        match self.resolution {
            Some(resolution) => GameStatus::won_by(resolution.winner),
            None => GameStatus::InProgress,
        }
    }
}
