//! This module contains the [DisputeCoordinator], the async layer that drives bisection games
//! against the shared ledger, the execution engine, and the batch source.

use crate::{
    BatchProvider, BisectionState, DisputePhase, Effect, GameError, GameEvent, StepOracle,
};
use balin_chain::{ChainError, ChallengeWindow, StateCommitmentChain};
use balin_primitives::{
    ActiveDisputes, Claim, CommitmentStatus, DisputeGame, GameStatus, Party, ProtocolConfig,
    SequenceNumber, Timestamp,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// The [ActiveSet] struct is a point-in-time snapshot of the commitments with unresolved
/// disputes, usable as the [ActiveDisputes] view that finalization consults.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet(HashSet<SequenceNumber>);

impl ActiveDisputes for ActiveSet {
    fn has_active_dispute(&self, sequence: SequenceNumber) -> bool {
        self.0.contains(&sequence)
    }
}

/// The [DisputeCoordinator] struct owns the registry of active disputes. Each game sits behind
/// its own lock, so disputes against different commitments progress independently and an
/// arbitration replay pauses only the dispute awaiting it. A replay the provider fails to
/// serve leaves its game parked in arbitration until [DisputeCoordinator::retry_arbitrations]
/// re-issues it. Resolved games move to an archive and their commitment becomes challengeable
/// again if its window is still open.
pub struct DisputeCoordinator<S, B> {
    config: ProtocolConfig,
    chain: Arc<Mutex<StateCommitmentChain>>,
    engine: Arc<S>,
    batches: Arc<B>,
    disputes: RwLock<HashMap<SequenceNumber, Arc<Mutex<BisectionState>>>>,
    archived: RwLock<Vec<BisectionState>>,
}

impl<S, B> DisputeCoordinator<S, B>
where
    S: StepOracle + Send + Sync,
    B: BatchProvider + Send + Sync,
{
    /// Creates a coordinator over the shared ledger, execution engine, and batch source.
    pub fn new(
        config: ProtocolConfig,
        chain: Arc<Mutex<StateCommitmentChain>>,
        engine: Arc<S>,
        batches: Arc<B>,
    ) -> Self {
        Self {
            config,
            chain,
            engine,
            batches,
            disputes: RwLock::new(HashMap::new()),
            archived: RwLock::new(Vec::new()),
        }
    }

    /// Opens a dispute against commitment `sequence`, asserting `claimed_root` in place of its
    /// published state root. The commitment must still be challengeable at `now` and carry no
    /// other active dispute; on success it is marked challenged on the ledger and the game
    /// opens with the defender to declare first.
    pub async fn open_dispute(
        &self,
        sequence: SequenceNumber,
        claimed_root: Claim,
        now: Timestamp,
    ) -> Result<(), GameError> {
        let mut disputes = self.disputes.write().await;
        if disputes.contains_key(&sequence) {
            return Err(GameError::DoubleChallenge(sequence));
        }

        let (published_root, pre_state_root, transaction_count) = {
            let mut chain = self.chain.lock().await;
            let commitment = chain
                .get(sequence)
                .ok_or(GameError::Chain(ChainError::UnknownCommitment(sequence)))?;
            let window = ChallengeWindow::new(self.config.challenge_window);
            if !window.is_challengeable(commitment, now) {
                return Err(GameError::StaleChallenge(sequence));
            }
            let published_root = commitment.state_root();
            let transaction_count = commitment.header.transaction_count;
            if claimed_root == published_root {
                return Err(GameError::VacuousChallenge);
            }
            let pre_state_root = chain.pre_state_root(sequence)?;
            chain.mark_challenged(sequence)?;
            (published_root, pre_state_root, transaction_count)
        };

        let (state, effects) = BisectionState::open(
            sequence,
            published_root,
            claimed_root,
            pre_state_root,
            transaction_count,
            now,
            self.config,
        )?;
        disputes.insert(sequence, Arc::new(Mutex::new(state)));
        drop(disputes);

        tracing::info!(sequence, claimed = %claimed_root, "dispute opened");
        self.process_effects(effects).await
    }

    /// Submits one party's declaration at the current interval midpoint of an active dispute.
    pub async fn declare_midpoint(
        &self,
        sequence: SequenceNumber,
        party: Party,
        midpoint: u64,
        state_root: Claim,
        now: Timestamp,
    ) -> Result<(), GameError> {
        let game = self.active_game(sequence).await?;
        let effects = game.lock().await.apply(GameEvent::Declare {
            party,
            midpoint,
            state_root,
            now,
        })?;
        tracing::debug!(sequence, party = ?party, midpoint, "midpoint declared");
        self.process_effects(effects).await
    }

    /// Sweeps every active dispute against the settlement clock at `now`, forfeiting each game
    /// whose party on turn has missed its round deadline. Returns the forfeited sequence
    /// numbers.
    pub async fn check_timeouts(
        &self,
        now: Timestamp,
    ) -> Result<Vec<SequenceNumber>, GameError> {
        let games = self.active_games().await;
        let sweeps = games.into_iter().map(|(sequence, game)| async move {
            let effects = game.lock().await.apply(GameEvent::Timeout { now })?;
            Ok::<_, GameError>((sequence, effects))
        });

        let mut forfeited = Vec::new();
        for result in futures::future::join_all(sweeps).await {
            let (sequence, effects) = result?;
            if effects.is_empty() {
                continue;
            }
            tracing::warn!(sequence, "dispute forfeited on round timeout");
            forfeited.push(sequence);
            self.process_effects(effects).await?;
        }
        forfeited.sort_unstable();
        Ok(forfeited)
    }

    /// Re-issues the engine replay for every dispute parked in arbitration. The request is
    /// derived from each game's own state, so a replay lost to a provider failure is picked up
    /// again here once the provider recovers. Returns the sequence numbers settled by this
    /// sweep.
    pub async fn retry_arbitrations(&self) -> Result<Vec<SequenceNumber>, GameError> {
        let mut settled = Vec::new();
        for (sequence, game) in self.active_games().await {
            let Some(pending) = game.lock().await.pending_replay() else {
                continue;
            };
            self.process_effects(vec![pending]).await?;
            if game.lock().await.phase() == DisputePhase::Resolved {
                settled.push(sequence);
            }
        }
        settled.sort_unstable();
        Ok(settled)
    }

    /// Returns a snapshot of a dispute's state, consulting active games first and the archive
    /// after, most recent game first.
    pub async fn dispute_state(
        &self,
        sequence: SequenceNumber,
    ) -> Result<BisectionState, GameError> {
        if let Some(game) = self.disputes.read().await.get(&sequence) {
            return Ok(game.lock().await.clone());
        }
        self.archived
            .read()
            .await
            .iter()
            .rev()
            .find(|game| game.sequence_number() == sequence)
            .cloned()
            .ok_or(GameError::UnknownDispute(sequence))
    }

    /// Returns the sequence numbers with unresolved disputes, in order.
    pub async fn active_sequences(&self) -> Vec<SequenceNumber> {
        let mut sequences: Vec<SequenceNumber> =
            self.disputes.read().await.keys().copied().collect();
        sequences.sort_unstable();
        sequences
    }

    /// Returns a point-in-time [ActiveSet] snapshot for finalization checks.
    pub async fn active_set(&self) -> ActiveSet {
        ActiveSet(self.disputes.read().await.keys().copied().collect())
    }

    /// Returns every resolved game, oldest first.
    pub async fn archived_disputes(&self) -> Vec<BisectionState> {
        self.archived.read().await.clone()
    }

    /// Returns the `count` disputes with the highest target sequence numbers, active and
    /// archived alike, in sequence order.
    pub async fn latest_disputes(&self, count: usize) -> Vec<BisectionState> {
        let mut games = self.all_disputes().await;
        let skip = games.len().saturating_sub(count);
        games.split_off(skip)
    }

    /// Returns every dispute whose game currently reports `status`, in sequence order.
    pub async fn disputes_by_status(&self, status: GameStatus) -> Vec<BisectionState> {
        self.all_disputes()
            .await
            .into_iter()
            .filter(|game| game.status() == status)
            .collect()
    }

    async fn all_disputes(&self) -> Vec<BisectionState> {
        let mut games = self.archived.read().await.clone();
        let active: Vec<Arc<Mutex<BisectionState>>> =
            self.disputes.read().await.values().map(Arc::clone).collect();
        for game in active {
            games.push(game.lock().await.clone());
        }
        games.sort_by_key(|game| game.sequence_number());
        games
    }

    /// Finalizes every commitment that is ready at `now`, taking the current dispute registry
    /// into account. Returns the finalized sequence numbers.
    pub async fn finalize_ready(&self, now: Timestamp) -> Vec<SequenceNumber> {
        let active = self.active_set().await;
        self.chain.lock().await.finalize_ready(now, &active)
    }

    /// Carries out the effects a game transition asked for. An arbitration replay feeds its
    /// result straight back into the game, so the verdict's own effects join the queue.
    async fn process_effects(&self, effects: Vec<Effect>) -> Result<(), GameError> {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::MarkInvalid { sequence } => {
                    self.chain.lock().await.mark_invalid(sequence)?;
                    self.archive(sequence).await;
                }
                Effect::RestoreSubmitted { sequence } => {
                    let result = self.chain.lock().await.restore_submitted(sequence);
                    match result {
                        Ok(()) => {}
                        // An ancestor was refuted while this game ran; the descendant
                        // invalidation stands over the defender's win.
                        Err(ChainError::InvalidTransition {
                            from: CommitmentStatus::Invalid,
                            ..
                        }) => {}
                        Err(err) => return Err(err.into()),
                    }
                    self.archive(sequence).await;
                }
                Effect::AwardBond { to, amount } => {
                    tracing::info!(winner = ?to, amount, "dispute escrow awarded");
                }
                Effect::RequestReplay {
                    sequence,
                    index,
                    pre_state_root,
                } => {
                    let replayed = self.replay_step(sequence, index, pre_state_root).await;
                    let state_root = match replayed {
                        Ok(state_root) => state_root,
                        // The game stays parked in arbitration and keeps the request
                        // derivable, so a later retry_arbitrations sweep settles it.
                        Err(GameError::Provider(err)) => {
                            tracing::warn!(
                                sequence,
                                index,
                                %err,
                                "arbitration replay failed; dispute stays parked"
                            );
                            continue;
                        }
                        Err(err) => return Err(err),
                    };
                    let game = self.active_game(sequence).await?;
                    let verdict_effects = game
                        .lock()
                        .await
                        .apply(GameEvent::EngineResult { state_root })?;
                    queue.extend(verdict_effects);
                }
            }
        }
        Ok(())
    }

    /// Fetches the disputed transaction, checks its inclusion against the commitment's
    /// transactions root, and replays it on the execution engine.
    async fn replay_step(
        &self,
        sequence: SequenceNumber,
        index: u64,
        pre_state_root: Claim,
    ) -> Result<Claim, GameError> {
        let (transactions_root, transaction_count) = {
            let chain = self.chain.lock().await;
            let commitment = chain
                .get(sequence)
                .ok_or(GameError::Chain(ChainError::UnknownCommitment(sequence)))?;
            (
                commitment.header.transactions_root,
                commitment.header.transaction_count,
            )
        };

        let proof = self.batches.transaction(sequence, index).await?;
        if proof.leaf_index != index || !proof.verify_at(transactions_root, transaction_count) {
            return Err(GameError::Provider(anyhow::anyhow!(
                "batch provider returned an unprovable transaction for commitment {sequence} index {index}"
            )));
        }

        tracing::info!(sequence, index, "replaying disputed transaction");
        Ok(self.engine.replay_one(pre_state_root, &proof.leaf).await?)
    }

    /// Moves a resolved game out of the active registry and into the archive.
    async fn archive(&self, sequence: SequenceNumber) {
        let removed = self.disputes.write().await.remove(&sequence);
        if let Some(game) = removed {
            let snapshot = game.lock().await.clone();
            self.archived.write().await.push(snapshot);
            tracing::info!(sequence, "dispute archived");
        }
    }

    async fn active_game(
        &self,
        sequence: SequenceNumber,
    ) -> Result<Arc<Mutex<BisectionState>>, GameError> {
        self.disputes
            .read()
            .await
            .get(&sequence)
            .map(Arc::clone)
            .ok_or(GameError::UnknownDispute(sequence))
    }

    async fn active_games(&self) -> Vec<(SequenceNumber, Arc<Mutex<BisectionState>>)> {
        self.disputes
            .read()
            .await
            .iter()
            .map(|(sequence, game)| (*sequence, Arc::clone(game)))
            .collect()
    }
}
