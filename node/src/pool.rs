//! The process-wide batch pool
//!
//! Broadcast-but-unsealed batches queue here in FIFO order until the next
//! sealing miner drains them. Duplicate digests are harmless: they collide
//! onto the same chain entry at pack time.

use std::collections::VecDeque;

use ezchain_ledger::Batch;

#[derive(Debug, Default)]
pub struct BatchPool {
    queue: VecDeque<Batch>,
}

impl BatchPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push(&mut self, batch: Batch) {
        self.queue.push_back(batch);
    }

    /// Remove every queued batch, oldest first.
    pub fn drain_all(&mut self) -> Vec<Batch> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezchain_ledger::Tx;

    #[test]
    fn test_fifo_order() {
        let mut pool = BatchPool::new();
        pool.push(Batch::seal(0, vec![Tx::new(1, 7, 0, 1)]));
        pool.push(Batch::seal(1, vec![Tx::new(2, 9, 1, 0)]));

        let drained = pool.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].author, 0);
        assert_eq!(drained[1].author, 1);
        assert!(pool.is_empty());
    }
}
