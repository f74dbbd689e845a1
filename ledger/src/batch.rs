//! Batches: published bundles of (tx, proof) pairs
//!
//! A batch is named by the hash of its transaction cores only; the attached
//! proofs are carried alongside but do not contribute to the digest, so a
//! verifier can recompute the name from the transactions it saw on chain.

use serde::{Deserialize, Serialize};

use crate::codec::{hash_hex, Cursor};
use crate::errors::WireError;
use crate::transaction::Tx;
use crate::{Height, NodeId};

/// Digest over the concatenated core wire forms of `txs`.
pub fn digest_of(txs: &[Tx]) -> String {
    let mut bytes = String::new();
    for tx in txs {
        bytes.push_str(&tx.to_wire_core());
    }
    hash_hex(bytes.as_bytes())
}

/// A node's bundle of transactions for one round, broadcast once and indexed
/// by digest until its sealing block is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Authoring node
    pub author: NodeId,
    /// Sealing block height, set when the batch is packed into a block
    pub height: Option<Height>,
    /// Transactions, each carrying its ownership proof in `proof_wire`
    pub txs: Vec<Tx>,
    /// Content hash over the transaction cores
    pub digest: String,
}

impl Batch {
    /// Seal a bundle of transactions into a named batch.
    pub fn seal(author: NodeId, txs: Vec<Tx>) -> Self {
        let digest = digest_of(&txs);
        Self {
            author,
            height: None,
            txs,
            digest,
        }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Recompute the digest and compare with the stored name.
    pub fn digest_matches(&self) -> bool {
        digest_of(&self.txs) == self.digest
    }

    pub fn to_wire(&self) -> String {
        let mut s = format!(
            "{},{},{}$",
            self.author,
            self.height.unwrap_or(0),
            self.txs.len()
        );
        for tx in &self.txs {
            s.push_str(&tx.to_wire());
            s.push('$');
        }
        s.push_str(&self.digest);
        s
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut c = Cursor::new("batch", s);
        let author = c.u64_field(',')?;
        let height = c.u64_field(',')?;
        let count = c.u64_field('$')? as usize;
        let mut txs = Vec::with_capacity(count);
        for _ in 0..count {
            let item = c.until('$')?;
            txs.push(Tx::from_wire(item).map_err(|e| WireError::new("batch", e.detail))?);
        }
        let digest = c.rest().to_string();
        Ok(Self {
            author,
            height: if height == 0 { None } else { Some(height) },
            txs,
            digest,
        })
    }
}

/// A sealed batch as recorded on the author's personal chain: the
/// transaction cores plus the sealing height. This is the unit a proof is
/// right-extended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBatch {
    /// Height of the sealing account-chain block
    pub height: Height,
    /// Transaction cores (proofs stripped)
    pub txs: Vec<Tx>,
    /// Batch digest as it appears on chain
    pub digest: String,
}

impl SealedBatch {
    pub fn new(height: Height, txs: Vec<Tx>) -> Self {
        let digest = digest_of(&txs);
        Self {
            height,
            txs,
            digest,
        }
    }

    pub fn to_wire(&self) -> String {
        let mut s = format!("{},{}$", self.height, self.digest);
        for tx in &self.txs {
            s.push_str(&tx.to_wire_core());
            s.push('$');
        }
        s
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut c = Cursor::new("batch", s);
        let height = c.u64_field(',')?;
        let digest = c.until('$')?.to_string();
        let mut txs = Vec::new();
        while !c.is_empty() {
            let item = c.until('$')?;
            txs.push(Tx::from_wire_core(item).map_err(|e| WireError::new("batch", e.detail))?);
        }
        Ok(Self {
            height,
            txs,
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_txs() -> Vec<Tx> {
        vec![Tx::new(1, 7, 0, 1), Tx::new(2, 9, 0, 2)]
    }

    #[test]
    fn test_digest_over_cores_only() {
        let mut txs = create_test_txs();
        let named = digest_of(&txs);

        // Attaching proofs must not change the name.
        txs[0].proof_wire = "0,0,0,7;-0".to_string();
        assert_eq!(digest_of(&txs), named);
    }

    #[test]
    fn test_seal_and_verify() {
        let batch = Batch::seal(0, create_test_txs());
        assert!(batch.digest_matches());
        assert_eq!(batch.len(), 2);

        let mut tampered = batch.clone();
        tampered.txs[0].recipient = 5;
        assert!(!tampered.digest_matches());
    }

    #[test]
    fn test_batch_round_trip() {
        let mut txs = create_test_txs();
        txs[0].proof_wire = "0,0,0,7;-0".to_string();
        let mut batch = Batch::seal(3, txs);
        batch.height = Some(12);

        let back = Batch::from_wire(&batch.to_wire()).unwrap();
        assert_eq!(back, batch);
    }

    #[test]
    fn test_sealed_batch_round_trip() {
        let sealed = SealedBatch::new(4, create_test_txs());
        let back = SealedBatch::from_wire(&sealed.to_wire()).unwrap();
        assert_eq!(back, sealed);
        assert_eq!(back.digest, digest_of(&back.txs));
    }

    #[test]
    fn test_empty_batch_round_trip() {
        let batch = Batch::seal(1, vec![]);
        assert!(batch.is_empty());
        let back = Batch::from_wire(&batch.to_wire()).unwrap();
        assert_eq!(back, batch);
    }
}
