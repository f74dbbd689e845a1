//! Property-based tests for the ledger invariants
//!
//! Uses proptest to generate arbitrary entities and check the codec
//! round-trips, digest stability and proof-evolution invariants.

use proptest::prelude::*;

use ezchain::prelude::*;
use ezchain_ledger::{digest_of, SealedBatch};

// =============================================================================
// PROPTEST STRATEGIES
// =============================================================================

fn arb_tx() -> impl Strategy<Value = Tx> {
    (0u64..10_000, 0u64..500, 0u64..64, 0u64..64, 0u64..100).prop_map(
        |(tx_id, value_id, owner, recipient, acb_height)| {
            let mut tx = Tx::new(tx_id, value_id, owner, recipient);
            tx.acb_height = acb_height;
            tx
        },
    )
}

fn arb_txs(max: usize) -> impl Strategy<Value = Vec<Tx>> {
    prop::collection::vec(arb_tx(), 1..=max)
}

/// A personal chain: sealed batches at strictly increasing heights.
fn arb_personal_chain() -> impl Strategy<Value = Vec<SealedBatch>> {
    prop::collection::vec((1u64..8, arb_txs(3)), 0..6).prop_map(|steps| {
        let mut height = 0;
        steps
            .into_iter()
            .map(|(gap, txs)| {
                height += gap;
                SealedBatch::new(height, txs)
            })
            .collect()
    })
}

fn arb_proof() -> impl Strategy<Value = Proof> {
    (0u64..16, 0u64..500, arb_personal_chain()).prop_map(|(owner, value_id, chain)| {
        let mut proof = Proof::new(Value::new(owner, value_id, 0));
        proof.add_batches(&chain);
        proof
    })
}

// =============================================================================
// CODEC ROUND-TRIPS (I4)
// =============================================================================

proptest! {
    #[test]
    fn tx_wire_round_trips(tx in arb_tx()) {
        prop_assert_eq!(Tx::from_wire_core(&tx.to_wire_core()).unwrap(), tx);
    }

    #[test]
    fn batch_wire_round_trips(author in 0u64..64, txs in arb_txs(5)) {
        let batch = Batch::seal(author, txs);
        prop_assert_eq!(Batch::from_wire(&batch.to_wire()).unwrap(), batch);
    }

    #[test]
    fn proof_wire_round_trips(proof in arb_proof()) {
        prop_assert_eq!(Proof::from_wire(&proof.to_wire()).unwrap(), proof);
    }

    #[test]
    fn receipt_wire_round_trips(
        txs in arb_txs(4),
        sender in 0u64..64,
        recipient in 0u64..64,
        height in 1u64..100,
        proof in arb_proof(),
    ) {
        let receipt = Receipt {
            sender,
            recipient,
            height,
            tx_index: 0,
            batch_txs: txs.clone(),
            tx: txs[0].clone(),
            proof_wire: proof.to_wire(),
        };
        prop_assert_eq!(Receipt::from_wire(&receipt.to_wire()).unwrap(), receipt);
    }

    #[test]
    fn ac_block_wire_round_trips(
        height in 1u64..100,
        id in 1u64..1000,
        miner in 0u64..64,
        txs in arb_txs(4),
    ) {
        let mut block = AcBlock::new(height, id, id.saturating_sub(1), miner, 12.25);
        block.push_batch(digest_of(&txs), miner);
        prop_assert_eq!(AcBlock::from_wire(&block.to_wire()).unwrap(), block);
    }

    #[test]
    fn cc_block_wire_round_trips(
        height in 0u64..10,
        acb_height in 1u64..100,
        missing in arb_txs(2),
        failed in arb_txs(3),
    ) {
        let mut block = CcBlock::new(height, 77, 3, 1, acb_height, 4, 99.5);
        block.mark_missing(digest_of(&missing));
        let failed_cores: Vec<Tx> = failed
            .iter()
            .map(|tx| {
                let mut core = tx.clone();
                core.proof_wire.clear();
                core
            })
            .collect();
        block.add_failed(digest_of(&failed), failed_cores);
        prop_assert_eq!(CcBlock::from_wire(&block.to_wire()).unwrap(), block);
    }
}

// =============================================================================
// DIGEST DEFINITION (I3)
// =============================================================================

proptest! {
    #[test]
    fn batch_digest_hashes_tx_cores(author in 0u64..64, txs in arb_txs(5)) {
        let batch = Batch::seal(author, txs.clone());
        prop_assert_eq!(batch.digest.clone(), digest_of(&txs));
        prop_assert!(batch.digest_matches());

        // Proof payloads never influence the name.
        let mut with_proofs = txs;
        for tx in &mut with_proofs {
            tx.proof_wire = "0,0,0,1;-0".to_string();
        }
        prop_assert_eq!(digest_of(&with_proofs), batch.digest);
    }
}

// =============================================================================
// PROOF EVOLUTION (I1, I2)
// =============================================================================

proptest! {
    /// I1: extending twice from the same chain changes nothing.
    #[test]
    fn add_batches_is_idempotent(chain in arb_personal_chain()) {
        let mut proof = Proof::new(Value::new(0, 7, 0));
        proof.add_batches(&chain);
        let once = proof.clone();
        proof.add_batches(&chain);
        prop_assert_eq!(proof, once);
    }

    /// I1 under growth: extending, growing the chain, extending again is
    /// the same as extending once from the grown chain.
    #[test]
    fn add_batches_commutes_with_growth(
        chain in arb_personal_chain(),
        extra in (1u64..8, arb_txs(2)),
    ) {
        let mut grown = chain.clone();
        let tip = grown.last().map(|b| b.height).unwrap_or(0);
        grown.push(SealedBatch::new(tip + extra.0, extra.1));

        let mut incremental = Proof::new(Value::new(0, 7, 0));
        incremental.add_batches(&chain);
        incremental.add_batches(&grown);

        let mut direct = Proof::new(Value::new(0, 7, 0));
        direct.add_batches(&grown);

        prop_assert_eq!(incremental, direct);
    }

    /// I2: after pruning, either nothing was below the checkpoint, or the
    /// head is the newest entry below it and everything after is at or
    /// above it.
    #[test]
    fn apply_checkpoint_retains_newest_anchor(proof in arb_proof(), to in 1u64..64) {
        let before = proof.clone();
        let mut pruned = proof;
        let removed = pruned.apply_checkpoint(to).unwrap();

        if before.entries.iter().all(|e| e.height >= to) {
            prop_assert_eq!(pruned, before);
            prop_assert_eq!(removed, 0);
        } else {
            let first = pruned.entries.first().unwrap();
            prop_assert!(first.height < to);
            for later in &pruned.entries[1..] {
                prop_assert!(later.height >= to);
            }
            // Idempotent once anchored.
            let again = pruned.clone();
            pruned.apply_checkpoint(to).unwrap();
            prop_assert_eq!(pruned, again);
        }
    }

    /// The derived count always matches the recorded entries.
    #[test]
    fn tx_count_tracks_entries(proof in arb_proof()) {
        let expected: u64 = proof.entries.iter().map(|e| e.txns.len() as u64).sum();
        prop_assert_eq!(proof.tx_count, expected);
    }
}
