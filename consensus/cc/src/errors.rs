//! Consensus errors

use thiserror::Error;

use ezchain_chain::ChainError;

pub type CcResult<T> = Result<T, CcError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CcError {
    /// Leader election walked off the account chain; fatal.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl CcError {
    pub fn is_fatal(&self) -> bool {
        match self {
            CcError::Chain(e) => e.is_fatal(),
        }
    }
}
