//! Ownership proofs
//!
//! A proof accumulates the ordered list of transaction sets (one per
//! account-chain block that moved or may have moved the value) required to
//! verify the next spend. The sender must present every one of its own
//! batches since the last checkpoint, because a verifier cannot otherwise
//! rule out a second spend of the same value by the same owner.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::batch::{digest_of, SealedBatch};
use crate::codec::Cursor;
use crate::errors::{VerifyError, WireError};
use crate::transaction::Tx;
use crate::value::Value;
use crate::{Height, NodeId};

/// One proof link: the full batch published in some block at `height`,
/// authored by the then-current owner of the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEntry {
    /// Transaction cores of the batch
    pub txns: Vec<Tx>,
    /// Height of the sealing block
    pub height: Height,
}

impl ProofEntry {
    /// Author of the batch: the owner of its first transaction. `None` for
    /// an empty set, which verification rejects.
    pub fn owner(&self) -> Option<NodeId> {
        self.txns.first().map(|tx| tx.owner)
    }

    /// On-chain name of this batch.
    pub fn digest(&self) -> String {
        digest_of(&self.txns)
    }
}

/// Ownership proof for a single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Birth record of the value this proof covers
    pub value: Value,
    /// Batches ordered by ascending sealing height
    pub entries: Vec<ProofEntry>,
    /// Total transactions across all entries
    pub tx_count: u64,
}

impl Proof {
    /// Fresh proof anchored at the value's birth record.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            entries: Vec::new(),
            tx_count: 0,
        }
    }

    /// Height of the newest recorded entry, or the init anchor.
    pub fn last_height(&self) -> Height {
        self.entries
            .last()
            .map(|e| e.height)
            .unwrap_or(self.value.init_height)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn recount(&mut self) {
        self.tx_count = self.entries.iter().map(|e| e.txns.len() as u64).sum();
    }

    /// Right-extend with every personal-chain batch sealed at or above the
    /// proof's current last height. Idempotent: batches already recorded in
    /// the tail are never appended twice.
    pub fn add_batches(&mut self, chain: &[SealedBatch]) {
        if chain.is_empty() {
            return;
        }
        let last = self.last_height();
        let recorded: HashSet<(Height, String)> = self
            .entries
            .iter()
            .rev()
            .take_while(|e| e.height >= last)
            .map(|e| (e.height, e.digest()))
            .collect();

        for sealed in chain.iter().filter(|b| b.height >= last) {
            if sealed.txs.is_empty() {
                continue;
            }
            if recorded.contains(&(sealed.height, sealed.digest.clone())) {
                continue;
            }
            self.entries.push(ProofEntry {
                txns: sealed.txs.clone(),
                height: sealed.height,
            });
        }
        self.recount();
    }

    /// Append the sealing batch itself as the proof's final entry. Used by
    /// the recipient of a receipt, which is the only party that learns the
    /// batch together with its sealing height.
    pub fn push_entry(&mut self, txns: Vec<Tx>, height: Height) {
        self.entries.push(ProofEntry { txns, height });
        self.recount();
    }

    /// Discard every entry strictly older than the newest entry below the
    /// checkpoint height `to`; that entry anchors the retained chain. A
    /// proof with no entry below `to` is left unchanged. Returns the number
    /// of discarded entries.
    pub fn apply_checkpoint(&mut self, to: Height) -> Result<usize, VerifyError> {
        if self.entries.is_empty() {
            return Ok(0);
        }
        let anchor = match self.entries.iter().rposition(|e| e.height < to) {
            Some(idx) => idx,
            None => return Ok(0),
        };
        self.entries.drain(..anchor);
        self.recount();
        match self.entries.first() {
            Some(first) if first.height < to => Ok(anchor),
            other => Err(VerifyError::AfterCcInvariant {
                to,
                first: other.map(|e| e.height).unwrap_or(0),
            }),
        }
    }

    pub fn to_wire(&self) -> String {
        let mut s = format!(
            "{},{},{},{};",
            self.entries.len(),
            self.value.init_owner,
            self.value.init_height,
            self.value.id
        );
        for entry in &self.entries {
            for tx in &entry.txns {
                s.push_str(&tx.to_wire_core());
            }
            s.push('/');
            s.push_str(&entry.height.to_string());
            s.push('|');
        }
        s.push('-');
        s.push_str(&self.tx_count.to_string());
        s
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut c = Cursor::new("proof", s);
        let len = c.u64_field(',')? as usize;
        let init_owner = c.u64_field(',')?;
        let init_height = c.u64_field(',')?;
        let value_id = c.u64_field(';')?;

        let mut entries = Vec::with_capacity(len);
        for _ in 0..len {
            let segment = c.until('/')?;
            let mut txs = Vec::new();
            let mut tc = Cursor::new("proof", segment);
            while !tc.is_empty() {
                txs.push(Tx::from_cursor(&mut tc).map_err(|e| WireError::new("proof", e.detail))?);
            }
            let height = c.u64_field('|')?;
            entries.push(ProofEntry {
                txns: txs,
                height,
            });
        }
        c.until('-')?;
        let tx_count = c.u64_rest()?;

        let mut proof = Self {
            value: Value::new(init_owner, value_id, init_height),
            entries,
            tx_count: 0,
        };
        proof.recount();
        if proof.tx_count != tx_count {
            return Err(WireError::new(
                "proof",
                format!("tx count {} does not match entries {}", tx_count, proof.tx_count),
            ));
        }
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed(height: Height, tx_id: u64, value_id: u64, owner: NodeId, recipient: NodeId) -> SealedBatch {
        SealedBatch::new(height, vec![Tx::new(tx_id, value_id, owner, recipient)])
    }

    fn create_test_proof() -> Proof {
        let mut proof = Proof::new(Value::new(0, 7, 0));
        proof.add_batches(&[
            sealed(5, 1, 9, 0, 1),
            sealed(12, 2, 7, 0, 1),
            sealed(18, 3, 11, 0, 2),
            sealed(25, 4, 13, 0, 3),
        ]);
        proof
    }

    #[test]
    fn test_add_batches_extends_in_order() {
        let proof = create_test_proof();
        let heights: Vec<Height> = proof.entries.iter().map(|e| e.height).collect();
        assert_eq!(heights, vec![5, 12, 18, 25]);
        assert_eq!(proof.tx_count, 4);
        assert_eq!(proof.last_height(), 25);
    }

    #[test]
    fn test_add_batches_is_idempotent() {
        let chain = vec![sealed(5, 1, 9, 0, 1), sealed(12, 2, 7, 0, 1)];
        let mut proof = Proof::new(Value::new(0, 7, 0));
        proof.add_batches(&chain);
        let once = proof.clone();
        proof.add_batches(&chain);
        assert_eq!(proof, once);
    }

    #[test]
    fn test_add_batches_picks_up_new_suffix() {
        let mut chain = vec![sealed(5, 1, 9, 0, 1)];
        let mut proof = Proof::new(Value::new(0, 7, 0));
        proof.add_batches(&chain);

        chain.push(sealed(9, 2, 7, 0, 2));
        proof.add_batches(&chain);
        let heights: Vec<Height> = proof.entries.iter().map(|e| e.height).collect();
        assert_eq!(heights, vec![5, 9]);
    }

    #[test]
    fn test_add_batches_skips_empty_blocks() {
        let mut proof = Proof::new(Value::new(0, 7, 0));
        proof.add_batches(&[SealedBatch::new(3, vec![]), sealed(4, 1, 7, 0, 1)]);
        assert_eq!(proof.len(), 1);
        assert_eq!(proof.entries[0].height, 4);
    }

    #[test]
    fn test_apply_checkpoint_keeps_newest_anchor() {
        let mut proof = create_test_proof();
        let removed = proof.apply_checkpoint(20).unwrap();
        assert_eq!(removed, 2);
        let heights: Vec<Height> = proof.entries.iter().map(|e| e.height).collect();
        assert_eq!(heights, vec![18, 25]);
        assert_eq!(proof.tx_count, 2);
    }

    #[test]
    fn test_apply_checkpoint_noop_when_all_newer() {
        let mut proof = create_test_proof();
        assert_eq!(proof.apply_checkpoint(3).unwrap(), 0);
        assert_eq!(proof.len(), 4);
    }

    #[test]
    fn test_apply_checkpoint_on_empty_proof() {
        let mut proof = Proof::new(Value::new(0, 7, 0));
        assert_eq!(proof.apply_checkpoint(10).unwrap(), 0);
    }

    #[test]
    fn test_wire_round_trip() {
        let proof = create_test_proof();
        let back = Proof::from_wire(&proof.to_wire()).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn test_wire_round_trip_empty() {
        let proof = Proof::new(Value::new(4, 11, 2));
        let wire = proof.to_wire();
        assert_eq!(wire, "0,4,2,11;-0");
        assert_eq!(Proof::from_wire(&wire).unwrap(), proof);
    }

    #[test]
    fn test_wire_rejects_bad_count() {
        let proof = create_test_proof();
        let wire = proof.to_wire().replace("-4", "-9");
        assert!(Proof::from_wire(&wire).is_err());
    }
}
