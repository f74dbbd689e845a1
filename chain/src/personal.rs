//! Personal chain
//!
//! The per-node record of its own sealed batches, in seal order. This is
//! the source a proof is right-extended from: every batch here could have
//! moved any value the node held at the time.

use ezchain_ledger::{Height, SealedBatch};

#[derive(Debug, Clone, Default)]
pub struct PersonalChain {
    blocks: Vec<SealedBatch>,
}

impl PersonalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Record a sealed batch. Heights are non-decreasing by construction:
    /// batches seal in block order.
    pub fn push(&mut self, sealed: SealedBatch) {
        debug_assert!(
            self.blocks
                .last()
                .map(|b| b.height <= sealed.height)
                .unwrap_or(true),
            "personal chain heights must be non-decreasing"
        );
        self.blocks.push(sealed);
    }

    pub fn as_slice(&self) -> &[SealedBatch] {
        &self.blocks
    }

    /// Total transactions recorded.
    pub fn tx_count(&self) -> u64 {
        self.blocks.iter().map(|b| b.txs.len() as u64).sum()
    }

    /// Height of the newest recorded batch.
    pub fn last_height(&self) -> Option<Height> {
        self.blocks.last().map(|b| b.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezchain_ledger::Tx;

    #[test]
    fn test_push_and_totals() {
        let mut chain = PersonalChain::new();
        chain.push(SealedBatch::new(1, vec![Tx::new(1, 7, 0, 1)]));
        chain.push(SealedBatch::new(3, vec![Tx::new(2, 9, 0, 2), Tx::new(3, 11, 0, 1)]));

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.tx_count(), 3);
        assert_eq!(chain.last_height(), Some(3));
    }
}
