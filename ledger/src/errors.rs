//! Ledger errors
//!
//! Verification failures are values, not panics: every kind in
//! [`ErrorKind`] is counted by the metrics sink and the operation that
//! detected it is abandoned. Only the two chain-walk kinds are fatal to the
//! process, and those are raised by the chain crate, not here.

use thiserror::Error;

use crate::{Height, NodeId, ValueId};

/// Ledger result type
pub type LedgerResult<T> = Result<T, VerifyError>;

/// Wire codec error: a string form that does not parse back into its entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity} wire format error: {detail}")]
pub struct WireError {
    /// Entity being parsed (tx, proof, batch, ...)
    pub entity: &'static str,
    /// What went wrong
    pub detail: String,
}

impl WireError {
    pub fn new(entity: &'static str, detail: impl Into<String>) -> Self {
        Self {
            entity,
            detail: detail.into(),
        }
    }

    /// Metrics kind for this parse failure.
    pub fn kind(&self) -> ErrorKind {
        match self.entity {
            "tx" => ErrorKind::TxFormat,
            "proof" => ErrorKind::ProofFormat,
            _ => ErrorKind::TxFormat,
        }
    }
}

/// A verification failure detected while checking a transaction, a proof or
/// a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Transaction string form is malformed
    #[error("malformed transaction: {0}")]
    TxFormat(String),

    /// Proof string form is malformed or violates height ordering
    #[error("malformed proof: {0}")]
    ProofFormat(String),

    /// Receipt delivered to a node that is not the transaction recipient
    #[error("receipt for node {expected} delivered to node {got}")]
    RecipientMismatch { expected: NodeId, got: NodeId },

    /// First proof entry is newer than the latest checkpoint without an init anchor
    #[error("proof head at height {first} exceeds checkpoint height {checkpoint}")]
    InitHeight { first: Height, checkpoint: Height },

    /// Proof carries no entries where at least one is required
    #[error("empty proof for value {0}")]
    EmptyProof(ValueId),

    /// More than one confirmed spend of the value within one owner run
    #[error("value {value} double spent by node {owner}")]
    DoubleSpent { value: ValueId, owner: NodeId },

    /// An owner run records no spend of the value
    #[error("value {value} never spent by node {owner}")]
    NotSpend { value: ValueId, owner: NodeId },

    /// A batch that could have moved the value is missing from the proof
    #[error("incomplete proof: {0}")]
    ProofIncomplete(String),

    /// The spending entry predates the latest finalised checkpoint
    #[error("spend at height {height} crosses checkpoint at height {checkpoint}")]
    CrossCc { height: Height, checkpoint: Height },

    /// Final owner in the proof walk is not the transaction sender
    #[error("proof ends at owner {got}, expected {expected}")]
    WrongOwner { expected: NodeId, got: NodeId },

    /// A published batch contains no transactions
    #[error("empty batch from node {0}")]
    EmptyBatch(NodeId),

    /// Batch digest does not match its recomputed transaction hash
    #[error("batch digest mismatch: expected {expected}, got {got}")]
    DigestMismatch { expected: String, got: String },

    /// Checkpoint pruning failed to retain the anchor entry
    #[error("checkpoint prune to height {to} left proof head at {first}")]
    AfterCcInvariant { to: Height, first: Height },
}

impl VerifyError {
    /// Metrics kind for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerifyError::TxFormat(_) => ErrorKind::TxFormat,
            VerifyError::ProofFormat(_) => ErrorKind::ProofFormat,
            VerifyError::RecipientMismatch { .. } => ErrorKind::RecipientMismatch,
            VerifyError::InitHeight { .. } => ErrorKind::InitHeight,
            VerifyError::EmptyProof(_) => ErrorKind::EmptyProof,
            VerifyError::DoubleSpent { .. } => ErrorKind::DoubleSpent,
            VerifyError::NotSpend { .. } => ErrorKind::NotSpend,
            VerifyError::ProofIncomplete(_) => ErrorKind::ProofIncomplete,
            VerifyError::CrossCc { .. } => ErrorKind::CrossCc,
            VerifyError::WrongOwner { .. } => ErrorKind::WrongOwner,
            VerifyError::EmptyBatch(_) => ErrorKind::EmptyBatch,
            VerifyError::DigestMismatch { .. } => ErrorKind::DigestMismatch,
            VerifyError::AfterCcInvariant { .. } => ErrorKind::AfterCc,
        }
    }
}

impl From<WireError> for VerifyError {
    fn from(e: WireError) -> Self {
        match e.entity {
            "proof" => VerifyError::ProofFormat(e.detail),
            _ => VerifyError::TxFormat(format!("{}: {}", e.entity, e.detail)),
        }
    }
}

/// Every error kind the metrics sink counts, including the two fatal
/// chain-walk kinds raised outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TxFormat,
    ProofFormat,
    RecipientMismatch,
    InitHeight,
    EmptyProof,
    DoubleSpent,
    NotSpend,
    ProofIncomplete,
    CrossCc,
    WrongOwner,
    EmptyBatch,
    DigestMismatch,
    AcHeightWalk,
    AcChainUnderrun,
    AfterCc,
}

impl ErrorKind {
    /// All kinds, in the order they appear in the error summary CSV.
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::TxFormat,
        ErrorKind::ProofFormat,
        ErrorKind::RecipientMismatch,
        ErrorKind::InitHeight,
        ErrorKind::EmptyProof,
        ErrorKind::DoubleSpent,
        ErrorKind::NotSpend,
        ErrorKind::ProofIncomplete,
        ErrorKind::CrossCc,
        ErrorKind::WrongOwner,
        ErrorKind::EmptyBatch,
        ErrorKind::DigestMismatch,
        ErrorKind::AcHeightWalk,
        ErrorKind::AcChainUnderrun,
        ErrorKind::AfterCc,
    ];

    /// Stable name used in the error summary CSV.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TxFormat => "tx_format",
            ErrorKind::ProofFormat => "proof_format",
            ErrorKind::RecipientMismatch => "recipient_mismatch",
            ErrorKind::InitHeight => "init_height_violation",
            ErrorKind::EmptyProof => "empty_proof",
            ErrorKind::DoubleSpent => "double_spent",
            ErrorKind::NotSpend => "not_spent",
            ErrorKind::ProofIncomplete => "proof_incomplete",
            ErrorKind::CrossCc => "cross_cc",
            ErrorKind::WrongOwner => "wrong_owner",
            ErrorKind::EmptyBatch => "empty_batch",
            ErrorKind::DigestMismatch => "batch_digest_mismatch",
            ErrorKind::AcHeightWalk => "ac_height_walk_error",
            ErrorKind::AcChainUnderrun => "ac_chain_underrun",
            ErrorKind::AfterCc => "after_cc_invariant",
        }
    }

    /// Fatal kinds terminate the run; everything else is recorded and the
    /// offending operation abandoned.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::AcHeightWalk | ErrorKind::AcChainUnderrun)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping_is_total() {
        let e = VerifyError::DoubleSpent { value: 7, owner: 0 };
        assert_eq!(e.kind(), ErrorKind::DoubleSpent);
        assert_eq!(e.kind().as_str(), "double_spent");
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(ErrorKind::AcHeightWalk.is_fatal());
        assert!(ErrorKind::AcChainUnderrun.is_fatal());
        assert!(!ErrorKind::DoubleSpent.is_fatal());
    }

    #[test]
    fn test_all_kinds_have_unique_names() {
        let mut names: Vec<&str> = ErrorKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ErrorKind::ALL.len());
    }
}
