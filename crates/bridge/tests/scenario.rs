//! An end-to-end settlement pass: five commitments published, the middle one refuted by a
//! dispute, and withdrawals gated on what survives.

use std::sync::Arc;

use alloy_primitives::{keccak256, Address, B256, U256};
use balin_bridge::{ClaimError, ClaimStatus, TokenRegistry, WithdrawalClaim, WithdrawalVerifier};
use balin_chain::{FinalityTracker, StateCommitmentChain};
use balin_fault::providers::{AlphabetBatch, AlphabetEngine, AlphabetTrace, ForkedTrace};
use balin_fault::{BatchProvider, DisputeCoordinator, DisputePhase, TraceOracle};
use balin_primitives::{
    CommitmentHeader, CommitmentStatus, Party, ProtocolConfig, SequenceNumber, Timestamp,
};
use tokio::sync::Mutex;

const WINDOW: Timestamp = 1_000;
const ROUND: Timestamp = 100;
const TOKEN: Address = Address::new([0xEE; 20]);

struct World {
    coordinator: DisputeCoordinator<AlphabetEngine, AlphabetBatch>,
    chain: Arc<Mutex<StateCommitmentChain>>,
    batches: Arc<AlphabetBatch>,
    honest: AlphabetTrace,
}

/// Publishes one commitment per block at time zero. A block with `Some(fork_at)` publishes
/// the state root a party mis-executing transaction `fork_at` would arrive at.
async fn world(blocks: &[(&[u8], Option<u64>)]) -> World {
    let config = ProtocolConfig::default()
        .with_challenge_window(WINDOW)
        .with_round_timeout(ROUND);
    let genesis_hash = B256::with_last_byte(0x11);
    let mut chain = StateCommitmentChain::new(config, genesis_hash, B256::ZERO);
    let mut batch = AlphabetBatch::new();
    let mut honest = AlphabetTrace::new();

    let mut pre_state = B256::ZERO;
    let mut parent_hash = genesis_hash;
    for (sequence, (letters, fork)) in blocks.iter().enumerate() {
        let sequence = sequence as u64;
        batch.insert_block(sequence, letters).unwrap();
        honest.insert_block(sequence, pre_state, letters);

        let state_root = match fork {
            Some(fork_at) => ForkedTrace::new(honest.clone(), sequence, *fork_at)
                .state_root_at(sequence, letters.len() as u64)
                .await
                .unwrap(),
            None => honest.final_state_root(sequence).unwrap(),
        };
        let block_hash = keccak256(parent_hash);
        let header = CommitmentHeader {
            sequence_number: sequence,
            block_hash,
            parent_block_hash: parent_hash,
            state_root,
            transactions_root: batch.transactions_root(sequence).unwrap(),
            transaction_count: letters.len() as u64,
        };
        chain.publish(header, 0).unwrap();
        parent_hash = block_hash;
        pre_state = state_root;
    }

    let chain = Arc::new(Mutex::new(chain));
    let batches = Arc::new(batch);
    let coordinator = DisputeCoordinator::new(
        config,
        Arc::clone(&chain),
        Arc::new(AlphabetEngine),
        Arc::clone(&batches),
    );
    World {
        coordinator,
        chain,
        batches,
        honest,
    }
}

fn registry() -> TokenRegistry {
    let mut registry = TokenRegistry::new();
    registry.register(TOKEN, U256::from(1), U256::from(1_000_000));
    registry
}

async fn withdrawal(
    world: &World,
    sequence: SequenceNumber,
    index: u64,
    owner_byte: u8,
    amount: u64,
) -> WithdrawalClaim {
    WithdrawalClaim {
        sequence_number: sequence,
        owner: Address::new([owner_byte; 20]),
        token: TOKEN,
        amount: U256::from(amount),
        proof: world.batches.transaction(sequence, index).await.unwrap(),
    }
}

/// Plays both parties' declarations from their oracles until bisection hands the game to
/// arbitration, which the coordinator then settles inline.
async fn drive_bisection(
    world: &World,
    sequence: SequenceNumber,
    defender: &impl TraceOracle,
    challenger: &impl TraceOracle,
) {
    let mut now = 1;
    loop {
        let state = world.coordinator.dispute_state(sequence).await.unwrap();
        if state.phase() != DisputePhase::Bisecting {
            break;
        }
        let midpoint = state.current_midpoint();
        let (party, root) = match state.turn() {
            Party::Defender => (
                Party::Defender,
                defender.state_root_at(sequence, midpoint).await.unwrap(),
            ),
            Party::Challenger => (
                Party::Challenger,
                challenger.state_root_at(sequence, midpoint).await.unwrap(),
            ),
        };
        world
            .coordinator
            .declare_midpoint(sequence, party, midpoint, root, now)
            .await
            .unwrap();
        now += 1;
    }
}

#[tokio::test]
async fn refuted_commitment_drags_descendants_and_blocks_their_withdrawals() {
    let world = world(&[
        (b"abcd", None),
        (b"efgh", None),
        (b"ijkl", Some(1)),
        (b"mnop", None),
        (b"qrst", None),
    ])
    .await;
    let mut verifier = WithdrawalVerifier::new(registry());

    // Claims land early, while everything still looks healthy.
    let early_claim = withdrawal(&world, 1, 2, 0x01, 250).await;
    let doomed_claim = withdrawal(&world, 4, 0, 0x02, 40).await;
    let (early, doomed) = {
        let guard = world.chain.lock().await;
        let (early, status) = verifier.submit_claim(early_claim, &guard).unwrap();
        assert_eq!(status, ClaimStatus::Pending);
        let (doomed, status) = verifier.submit_claim(doomed_claim, &guard).unwrap();
        assert_eq!(status, ClaimStatus::Pending);
        (early, doomed)
    };

    // An honest challenger refutes commitment #2; #3 and #4 fall with it.
    let claimed = world.honest.final_state_root(2).unwrap();
    world.coordinator.open_dispute(2, claimed, 10).await.unwrap();
    let defender = ForkedTrace::new(world.honest.clone(), 2, 1);
    drive_bisection(&world, 2, &defender, &world.honest).await;

    {
        let guard = world.chain.lock().await;
        for sequence in 2..=4 {
            assert_eq!(guard.get(sequence).unwrap().status, CommitmentStatus::Invalid);
        }
        assert_eq!(guard.get(0).unwrap().status, CommitmentStatus::Submitted);
        assert_eq!(guard.get(1).unwrap().status, CommitmentStatus::Submitted);
    }

    // The surviving prefix finalizes once the window closes.
    assert_eq!(world.coordinator.finalize_ready(WINDOW).await, vec![0, 1]);

    // The finality read surface agrees with the ledger.
    {
        let active = world.coordinator.active_set().await;
        let guard = world.chain.lock().await;
        let tracker = FinalityTracker::new(&guard, &active);
        assert!(tracker.is_final(1, WINDOW));
        assert!(!tracker.is_final(2, WINDOW));
        assert_eq!(
            tracker.status_of(3, WINDOW).unwrap(),
            CommitmentStatus::Invalid
        );
        assert_eq!(tracker.latest_finalized(WINDOW), Some(1));
    }

    // The claim on the finalized commitment releases; the descendant claim never does.
    {
        let guard = world.chain.lock().await;
        assert_eq!(
            verifier.claim_status(early, &guard).unwrap(),
            ClaimStatus::Eligible
        );
        verifier.release(early, &guard).unwrap();
        assert_eq!(verifier.claim(early).unwrap().1, ClaimStatus::Released);

        assert!(matches!(
            verifier.release(doomed, &guard),
            Err(ClaimError::CommitmentInvalid(4))
        ));
        assert_eq!(
            verifier.claim_status(doomed, &guard).unwrap(),
            ClaimStatus::Rejected
        );
    }

    // Fresh claims against the refuted range are refused at the door.
    let late_claim = withdrawal(&world, 3, 1, 0x03, 10).await;
    {
        let guard = world.chain.lock().await;
        assert!(matches!(
            verifier.submit_claim(late_claim, &guard),
            Err(ClaimError::CommitmentInvalid(3))
        ));
    }

    // A claim submitted after finalization is eligible immediately.
    let prompt_claim = withdrawal(&world, 0, 3, 0x04, 77).await;
    let guard = world.chain.lock().await;
    let (prompt, status) = verifier.submit_claim(prompt_claim, &guard).unwrap();
    assert_eq!(status, ClaimStatus::Eligible);
    verifier.release(prompt, &guard).unwrap();
}

#[tokio::test]
async fn failed_challenge_leaves_the_commitment_withdrawable() {
    let world = world(&[(b"abcd", None)]).await;
    let challenger_trace = ForkedTrace::new(world.honest.clone(), 0, 2);
    let claimed = challenger_trace.state_root_at(0, 4).await.unwrap();

    world.coordinator.open_dispute(0, claimed, 5).await.unwrap();
    drive_bisection(&world, 0, &world.honest, &challenger_trace).await;

    // The defender's win restores the commitment, so the sweep finalizes it.
    assert_eq!(world.coordinator.finalize_ready(WINDOW).await, vec![0]);

    let mut verifier = WithdrawalVerifier::new(registry());
    let claim = withdrawal(&world, 0, 1, 0x09, 5).await;
    let guard = world.chain.lock().await;
    let (id, status) = verifier.submit_claim(claim, &guard).unwrap();
    assert_eq!(status, ClaimStatus::Eligible);
    verifier.release(id, &guard).unwrap();
}
