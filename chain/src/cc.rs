//! Checkpoint chain
//!
//! The slower epoch-granularity log. Each block records the verdicts of one
//! CC round: batches declared invalid or missing (`fail_set[digest] = -1`)
//! and the specific failed transactions of partially bad batches
//! (`fail_set[digest]` indexing into `fail_txn`). Finalising a checkpoint
//! lets every node prune its proof chains back to `acb_height`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ezchain_ledger::codec::Cursor;
use ezchain_ledger::{Height, NodeId, Tx, Verdict, WireError};

use crate::errors::{ChainError, ChainResult};

/// Marker for a batch declared invalid or missing in its entirety.
pub const WHOLE_BATCH_INVALID: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcBlock {
    /// Checkpoint height, starting at 0
    pub height: Height,
    /// Block identifier
    pub id: u64,
    /// Identifier of the predecessor checkpoint, 0 for the first
    pub prev_id: u64,
    /// Leader that assembled the block
    pub miner: NodeId,
    /// Height of the epoch's last account-chain block
    pub acb_height: Height,
    /// Number of account-chain blocks sealed in the epoch
    pub block_epoch: u64,
    /// Simulated creation time
    pub time: f64,
    /// Number of failed transactions recorded
    pub txn_count: u64,
    /// digest -> WHOLE_BATCH_INVALID, or an index into `fail_txn`
    pub fail_set: BTreeMap<String, i64>,
    /// Failed transactions, grouped per batch
    pub fail_txn: Vec<Vec<Tx>>,
}

impl CcBlock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        height: Height,
        id: u64,
        prev_id: u64,
        miner: NodeId,
        acb_height: Height,
        block_epoch: u64,
        time: f64,
    ) -> Self {
        Self {
            height,
            id,
            prev_id,
            miner,
            acb_height,
            block_epoch,
            time,
            txn_count: 0,
            fail_set: BTreeMap::new(),
            fail_txn: Vec::new(),
        }
    }

    /// Declare an entire batch invalid or missing. Overrides any partial
    /// verdict already recorded for the digest.
    pub fn mark_missing(&mut self, digest: String) {
        self.fail_set.insert(digest, WHOLE_BATCH_INVALID);
    }

    /// Record failed transactions of a partially bad batch.
    pub fn add_failed(&mut self, digest: String, txs: Vec<Tx>) {
        match self.fail_set.get(&digest) {
            Some(&WHOLE_BATCH_INVALID) => {}
            Some(&idx) => {
                self.txn_count += txs.len() as u64;
                self.fail_txn[idx as usize].extend(txs);
            }
            None => {
                self.txn_count += txs.len() as u64;
                self.fail_set.insert(digest, self.fail_txn.len() as i64);
                self.fail_txn.push(txs);
            }
        }
    }

    /// Remove a transaction whose author won its appeal. Indices into
    /// `fail_txn` stay stable; an emptied group loses its digest mapping.
    pub fn clear_verdict(&mut self, tx: &Tx) -> bool {
        let core = tx.to_wire_core();
        for (idx, group) in self.fail_txn.iter_mut().enumerate() {
            if let Some(at) = group.iter().position(|t| t.to_wire_core() == core) {
                group.remove(at);
                self.txn_count = self.txn_count.saturating_sub(1);
                if group.is_empty() {
                    self.fail_set.retain(|_, v| *v != idx as i64);
                }
                return true;
            }
        }
        false
    }

    /// Checkpoint verdict for one batch digest.
    pub fn verdict(&self, digest: &str) -> Verdict {
        match self.fail_set.get(digest) {
            None => Verdict::Clean,
            Some(&WHOLE_BATCH_INVALID) => Verdict::BatchInvalid,
            Some(&idx) => Verdict::Failed(
                self.fail_txn[idx as usize]
                    .iter()
                    .map(|tx| tx.to_wire_core())
                    .collect(),
            ),
        }
    }

    pub fn to_wire(&self) -> String {
        let mut s = format!(
            "{},{},{},{},{},{},{},{};",
            self.id,
            self.height,
            self.prev_id,
            self.miner,
            self.acb_height,
            self.block_epoch,
            self.time,
            self.txn_count
        );
        for (digest, idx) in &self.fail_set {
            s.push_str(digest);
            s.push(',');
            s.push_str(&idx.to_string());
            s.push('$');
        }
        for group in &self.fail_txn {
            s.push('%');
            for tx in group {
                s.push_str(&tx.to_wire_core());
                s.push('$');
            }
        }
        s
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut c = Cursor::new("cc_block", s);
        let id = c.u64_field(',')?;
        let height = c.u64_field(',')?;
        let prev_id = c.u64_field(',')?;
        let miner = c.u64_field(',')?;
        let acb_height = c.u64_field(',')?;
        let block_epoch = c.u64_field(',')?;
        let time = c.f64_field(',')?;
        let txn_count = c.u64_field(';')?;

        let rest = c.rest();
        let (fail_part, txn_part) = match rest.find('%') {
            Some(at) => (&rest[..at], &rest[at..]),
            None => (rest, ""),
        };

        let mut fail_set = BTreeMap::new();
        let mut fc = Cursor::new("cc_block", fail_part);
        while !fc.is_empty() {
            let digest = fc.until(',')?.to_string();
            let idx = fc.i64_field('$')?;
            fail_set.insert(digest, idx);
        }

        let mut fail_txn = Vec::new();
        for group in txn_part.split('%').skip(1) {
            let mut txs = Vec::new();
            let mut gc = Cursor::new("cc_block", group);
            while !gc.is_empty() {
                let item = gc.until('$')?;
                txs.push(
                    Tx::from_wire_core(item).map_err(|e| WireError::new("cc_block", e.detail))?,
                );
            }
            fail_txn.push(txs);
        }

        Ok(Self {
            height,
            id,
            prev_id,
            miner,
            acb_height,
            block_epoch,
            time,
            txn_count,
            fail_set,
            fail_txn,
        })
    }
}

/// Append-only checkpoint chain, block height == index.
#[derive(Debug, Clone, Default)]
pub struct CcChain {
    blocks: Vec<CcBlock>,
}

impl CcChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> Option<&CcBlock> {
        self.blocks.last()
    }

    pub fn get(&self, height: Height) -> Option<&CcBlock> {
        self.blocks.get(height as usize)
    }

    /// `acb_height` of the newest checkpoint.
    pub fn latest_acb_height(&self) -> Option<Height> {
        self.tip().map(|b| b.acb_height)
    }

    pub fn append(&mut self, block: CcBlock) -> ChainResult<()> {
        let expected = self.blocks.len() as Height;
        if block.height != expected {
            return Err(ChainError::NonSequential {
                expected,
                got: block.height,
            });
        }
        debug!(height = block.height, acb = block.acb_height, "append cc block");
        self.blocks.push(block);
        Ok(())
    }

    /// Verdict for a batch sealed at account-chain `height`: the earliest
    /// checkpoint whose epoch covers that height rules on it.
    pub fn verdict_for(&self, height: Height, digest: &str) -> Verdict {
        match self.blocks.iter().find(|b| b.acb_height >= height) {
            Some(block) => block.verdict(digest),
            None => Verdict::Clean,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_block() -> CcBlock {
        let mut block = CcBlock::new(0, 11, 0, 2, 20, 3, 40.0);
        block.mark_missing("aa".to_string());
        block.add_failed("bb".to_string(), vec![Tx::new(1, 7, 0, 1)]);
        block
    }

    #[test]
    fn test_verdicts() {
        let block = create_test_block();
        assert_eq!(block.verdict("aa"), Verdict::BatchInvalid);
        assert!(matches!(block.verdict("bb"), Verdict::Failed(ref v) if v.len() == 1));
        assert_eq!(block.verdict("cc"), Verdict::Clean);
    }

    #[test]
    fn test_mark_missing_overrides_partial() {
        let mut block = create_test_block();
        block.mark_missing("bb".to_string());
        assert_eq!(block.verdict("bb"), Verdict::BatchInvalid);
    }

    #[test]
    fn test_clear_verdict_removes_tx() {
        let mut block = create_test_block();
        let tx = Tx::new(1, 7, 0, 1);
        assert!(block.clear_verdict(&tx));
        assert_eq!(block.verdict("bb"), Verdict::Clean);
        assert_eq!(block.txn_count, 0);
        assert!(!block.clear_verdict(&tx));
    }

    #[test]
    fn test_wire_round_trip() {
        let block = create_test_block();
        let back = CcBlock::from_wire(&block.to_wire()).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_wire_round_trip_no_failures() {
        let block = CcBlock::new(1, 12, 11, 0, 35, 2, 80.0);
        let back = CcBlock::from_wire(&block.to_wire()).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_chain_append_and_verdict_lookup() {
        let mut chain = CcChain::new();
        let mut first = CcBlock::new(0, 1, 0, 0, 10, 2, 1.0);
        first.mark_missing("aa".to_string());
        chain.append(first).unwrap();
        chain.append(CcBlock::new(1, 2, 1, 0, 20, 2, 2.0)).unwrap();

        // Heights 1..=10 are ruled by the first checkpoint.
        assert_eq!(chain.verdict_for(5, "aa"), Verdict::BatchInvalid);
        // Heights 11..=20 by the second, which lists nothing.
        assert_eq!(chain.verdict_for(15, "aa"), Verdict::Clean);
        // Heights past the newest checkpoint are unruled.
        assert_eq!(chain.verdict_for(25, "aa"), Verdict::Clean);

        assert_eq!(chain.latest_acb_height(), Some(20));
    }

    #[test]
    fn test_chain_rejects_height_gap() {
        let mut chain = CcChain::new();
        let block = CcBlock::new(3, 1, 0, 0, 10, 1, 1.0);
        assert!(chain.append(block).is_err());
    }
}
