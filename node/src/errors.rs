//! Node errors
//!
//! Verification failures never reach this type: they are counted and the
//! operation abandoned. What does reach it are the fatal invariant
//! violations (chain walks, scheduler misuse) and storage faults, all of
//! which terminate the run.

use thiserror::Error;

use ezchain_cc::CcError;
use ezchain_chain::ChainError;
use ezchain_ledger::ErrorKind;
use ezchain_sim::SimError;
use ezchain_storage::StorageError;

pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    /// Chain error
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Consensus error
    #[error("consensus error: {0}")]
    Consensus(#[from] CcError),

    /// Scheduler misuse (cancelling an event that is not queued)
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SimError),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A cached entity the node itself wrote is gone
    #[error("cache miss: {0}")]
    CacheMiss(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl NodeError {
    /// Metrics kind for chain-walk invariant violations, recorded before
    /// the run terminates.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            NodeError::Chain(e) => Some(e.kind()),
            NodeError::Consensus(CcError::Chain(e)) => Some(e.kind()),
            _ => None,
        }
    }
}
