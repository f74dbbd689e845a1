//! Account chain
//!
//! The primary log: one block per round, each listing the digests of the
//! batches it sealed. The `filter` set names every author with a batch in
//! the block; proof verification uses it to detect omitted history.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ezchain_ledger::codec::Cursor;
use ezchain_ledger::{Height, NodeId, WireError};

use crate::errors::{ChainError, ChainResult};

/// One account-chain block. Created by a miner, appended, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcBlock {
    /// Height, starting at 1
    pub height: Height,
    /// Block identifier
    pub id: u64,
    /// Identifier of the predecessor block, 0 for the first block
    pub prev_id: u64,
    /// Mining node
    pub miner: NodeId,
    /// Simulated seal time
    pub time: f64,
    /// Authors of the batches listed in `a_vec`
    pub filter: BTreeSet<NodeId>,
    /// Batch digests, in pack order
    pub a_vec: Vec<String>,
}

impl AcBlock {
    pub fn new(height: Height, id: u64, prev_id: u64, miner: NodeId, time: f64) -> Self {
        Self {
            height,
            id,
            prev_id,
            miner,
            time,
            filter: BTreeSet::new(),
            a_vec: Vec::new(),
        }
    }

    /// Record a sealed batch. A digest already listed is ignored.
    pub fn push_batch(&mut self, digest: String, author: NodeId) {
        if self.a_vec.iter().any(|d| *d == digest) {
            return;
        }
        self.a_vec.push(digest);
        self.filter.insert(author);
    }

    pub fn lists_digest(&self, digest: &str) -> bool {
        self.a_vec.iter().any(|d| d == digest)
    }

    pub fn to_wire(&self) -> String {
        let mut s = format!(
            "{},{},{},{},{};",
            self.id, self.height, self.prev_id, self.miner, self.time
        );
        let filter: Vec<String> = self.filter.iter().map(|n| n.to_string()).collect();
        s.push_str(&filter.join(","));
        s.push('$');
        for digest in &self.a_vec {
            s.push_str(digest);
            s.push('$');
        }
        s
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut c = Cursor::new("ac_block", s);
        let id = c.u64_field(',')?;
        let height = c.u64_field(',')?;
        let prev_id = c.u64_field(',')?;
        let miner = c.u64_field(',')?;
        let time = c.f64_field(';')?;

        let filter_csv = c.until('$')?;
        let mut filter = BTreeSet::new();
        for field in filter_csv.split(',').filter(|f| !f.is_empty()) {
            let node = field
                .parse::<NodeId>()
                .map_err(|_| WireError::new("ac_block", format!("bad filter entry `{field}`")))?;
            filter.insert(node);
        }

        let mut a_vec = Vec::new();
        while !c.is_empty() {
            a_vec.push(c.until('$')?.to_string());
        }

        Ok(Self {
            height,
            id,
            prev_id,
            miner,
            time,
            filter,
            a_vec,
        })
    }
}

/// Append-only account chain, blocks keyed by height (height 1 at index 0).
#[derive(Debug, Clone, Default)]
pub struct AcChain {
    blocks: Vec<AcBlock>,
}

impl AcChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tip height; 0 for an empty chain.
    pub fn height(&self) -> Height {
        self.blocks.len() as Height
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> Option<&AcBlock> {
        self.blocks.last()
    }

    pub fn get(&self, height: Height) -> Option<&AcBlock> {
        if height == 0 {
            return None;
        }
        self.blocks.get(height as usize - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AcBlock> {
        self.blocks.iter()
    }

    /// Append the next block; it must extend the tip.
    pub fn append(&mut self, block: AcBlock) -> ChainResult<()> {
        let expected = self.height() + 1;
        if block.height != expected {
            return Err(ChainError::NonSequential {
                expected,
                got: block.height,
            });
        }
        debug!(height = block.height, miner = block.miner, "append ac block");
        self.blocks.push(block);
        Ok(())
    }

    /// Elect the committee leader for an epoch that closed at `acb_height`
    /// after sealing `block_epoch` blocks.
    ///
    /// `skip = 0` names the miner of the epoch's first block; each
    /// re-election moves one block forward. Walking off the start of the
    /// chain is a fatal invariant violation.
    pub fn leader_at(
        &self,
        acb_height: Height,
        block_epoch: u64,
        skip: u64,
    ) -> ChainResult<NodeId> {
        if acb_height == 0 || acb_height > self.height() {
            return Err(ChainError::AcHeightWalk(acb_height));
        }
        let steps = block_epoch as i64 - 1 - skip as i64;
        if steps < 0 {
            return Err(ChainError::AcChainUnderrun(steps));
        }
        let target = acb_height as i64 - steps;
        if target < 1 {
            return Err(ChainError::AcChainUnderrun(target));
        }
        let block = self
            .get(target as Height)
            .ok_or(ChainError::AcHeightWalk(target as Height))?;
        Ok(block.miner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_chain(miners: &[NodeId]) -> AcChain {
        let mut chain = AcChain::new();
        let mut prev_id = 0;
        for (i, miner) in miners.iter().enumerate() {
            let id = 100 + i as u64;
            let block = AcBlock::new(i as Height + 1, id, prev_id, *miner, i as f64);
            chain.append(block).unwrap();
            prev_id = id;
        }
        chain
    }

    #[test]
    fn test_append_and_lookup() {
        let chain = create_test_chain(&[0, 1, 2]);
        assert_eq!(chain.height(), 3);
        assert_eq!(chain.get(1).unwrap().miner, 0);
        assert_eq!(chain.get(3).unwrap().miner, 2);
        assert!(chain.get(0).is_none());
        assert!(chain.get(4).is_none());
    }

    #[test]
    fn test_non_sequential_rejected() {
        let mut chain = create_test_chain(&[0]);
        let block = AcBlock::new(5, 9, 1, 0, 1.0);
        assert!(matches!(
            chain.append(block),
            Err(ChainError::NonSequential { expected: 2, got: 5 })
        ));
    }

    #[test]
    fn test_duplicate_digest_ignored() {
        let mut block = AcBlock::new(1, 1, 0, 0, 0.0);
        block.push_batch("abc".to_string(), 0);
        block.push_batch("abc".to_string(), 1);
        assert_eq!(block.a_vec.len(), 1);
        assert!(!block.filter.contains(&1));
    }

    #[test]
    fn test_wire_round_trip() {
        let mut block = AcBlock::new(2, 7, 3, 1, 12.5);
        block.push_batch("aa11".to_string(), 1);
        block.push_batch("bb22".to_string(), 4);
        let back = AcBlock::from_wire(&block.to_wire()).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_wire_round_trip_empty_block() {
        // A block with no batches is legal.
        let block = AcBlock::new(1, 1, 0, 0, 0.0);
        let back = AcBlock::from_wire(&block.to_wire()).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_leader_walk() {
        // Epoch sealed blocks at heights 3..=5: three blocks, first mined
        // by node 2.
        let chain = create_test_chain(&[0, 1, 2, 3, 4]);
        assert_eq!(chain.leader_at(5, 3, 0).unwrap(), 2);
        assert_eq!(chain.leader_at(5, 3, 1).unwrap(), 3);
        assert_eq!(chain.leader_at(5, 3, 2).unwrap(), 4);
    }

    #[test]
    fn test_leader_walk_underrun_is_fatal() {
        let chain = create_test_chain(&[0, 1]);
        let err = chain.leader_at(2, 5, 0).unwrap_err();
        assert!(matches!(err, ChainError::AcChainUnderrun(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_leader_walk_bad_height() {
        let chain = create_test_chain(&[0, 1]);
        assert!(matches!(
            chain.leader_at(9, 1, 0),
            Err(ChainError::AcHeightWalk(9))
        ));
    }

    #[test]
    fn test_leader_walk_excess_skip() {
        let chain = create_test_chain(&[0, 1, 2]);
        let err = chain.leader_at(3, 2, 4).unwrap_err();
        assert!(matches!(err, ChainError::AcChainUnderrun(_)));
    }
}
