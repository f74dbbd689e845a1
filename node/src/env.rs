//! The node's handle onto the simulation driver

use ezchain_ledger::{Batch, NodeId, TxId};
use ezchain_sim::{EventId, SimRng, SimTime};

use crate::errors::NodeResult;
use crate::msg::Msg;

/// Everything a handler may ask of the driver. Handlers run to completion;
/// all waiting is expressed through `schedule`.
pub trait NodeEnv {
    /// Current simulated time.
    fn now(&self) -> SimTime;

    /// Deliver `msg` to `node` at time `at`.
    fn schedule(&mut self, node: NodeId, at: SimTime, msg: Msg) -> EventId;

    /// Remove a pending timer. The timer must still be queued.
    fn cancel(&mut self, id: EventId) -> NodeResult<()>;

    /// Deliver to every node except `from`: instantly for account-chain
    /// blocks, after an independent uniform delay otherwise.
    fn broadcast(&mut self, from: NodeId, msg: Msg);

    /// Deliver to one node after a uniform delay. Self-sends are dropped.
    fn unicast(&mut self, from: NodeId, to: NodeId, msg: Msg);

    /// Offer a batch to the process-wide pool.
    fn publish_batch(&mut self, batch: Batch);

    /// Drain the pool in FIFO order (sealing miner only).
    fn drain_batch_pool(&mut self) -> Vec<Batch>;

    fn batch_pool_is_empty(&self) -> bool;

    /// Next globally unique transaction id.
    fn next_tx_id(&mut self) -> TxId;

    /// Next globally unique block id.
    fn next_block_id(&mut self) -> u64;

    /// The run's random stream.
    fn rng(&mut self) -> &mut SimRng;
}
