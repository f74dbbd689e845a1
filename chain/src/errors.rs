//! Chain errors

use thiserror::Error;

use ezchain_ledger::{ErrorKind, Height};

pub type ChainResult<T> = Result<T, ChainError>;

/// Chain store errors. The two walk errors denote logic invariant
/// violations and are fatal to the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A height walk referenced a block the chain does not contain
    #[error("account-chain walk reached missing height {0}")]
    AcHeightWalk(Height),

    /// Leader election walked off the start of the chain
    #[error("account-chain underrun: leader walk target height {0}")]
    AcChainUnderrun(i64),

    /// Appended block does not extend the tip
    #[error("non-sequential block: expected height {expected}, got {got}")]
    NonSequential { expected: Height, got: Height },
}

impl ChainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::AcHeightWalk(_) => ErrorKind::AcHeightWalk,
            ChainError::AcChainUnderrun(_) => ErrorKind::AcChainUnderrun,
            ChainError::NonSequential { .. } => ErrorKind::AcHeightWalk,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChainError::AcHeightWalk(_) | ChainError::AcChainUnderrun(_)
        )
    }
}
