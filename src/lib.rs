//! EZchain: a discrete-event simulator for the layered ledger protocol
//!
//! This is the root crate that re-exports all EZchain components and hosts
//! the simulation driver tying them together.
//!
//! ## Architecture Overview
//!
//! N nodes concurrently mint transactions over per-owner values, bundle
//! them into digest-named batches, race to seal account-chain blocks that
//! timestamp the batches of the round, and once per epoch run a
//! committee-based checkpoint round that rules on the epoch's batches and
//! lets every node prune its per-value proof chains.
//!
//! ## Crate Organization
//!
//! - `ezchain-ledger`: values, transactions, proofs, batches, wire codec
//! - `ezchain-chain`: account-chain / checkpoint-chain / personal-chain stores
//! - `ezchain-cc`: the four-phase checkpoint consensus state machine
//! - `ezchain-storage`: key/value cache backends (in-memory, redb)
//! - `ezchain-sim`: event queue, simulated clock, seeded randomness
//! - `ezchain-node`: the per-node protocol state machine and metrics

pub mod simulation;

pub use ezchain_cc as cc;
pub use ezchain_chain as chain;
pub use ezchain_ledger as ledger;
pub use ezchain_node as node;
pub use ezchain_sim as sim;
pub use ezchain_storage as storage;

pub use simulation::{RunSummary, Simulation};

/// Simulator version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::simulation::{RunSummary, Simulation};
    pub use ezchain_cc::{CcEngine, CcMessage, CcState};
    pub use ezchain_chain::{AcBlock, AcChain, CcBlock, CcChain};
    pub use ezchain_ledger::{Batch, Proof, Receipt, Tx, Value};
    pub use ezchain_node::{Msg, Node, SimConfig, StatRecord};
    pub use ezchain_storage::{KvStore, MemoryStore, RedbStore};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
