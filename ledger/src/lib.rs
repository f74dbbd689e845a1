//! Ledger model for the EZchain simulator
//!
//! The types in this crate form the layered-ledger data model:
//!
//! - [`Value`]: a globally unique unit of account owned by one node at a time
//! - [`Tx`]: a single transfer of a value between two nodes
//! - [`Proof`]: the minimal prefix of account-chain history needed to
//!   establish current ownership of a value
//! - [`Batch`]: a node's bundle of `(tx, proof)` pairs, named by the hash of
//!   its transactions
//! - [`Receipt`]: the per-transaction notification sent to a recipient once
//!   the containing batch is sealed
//!
//! All wire forms are deterministic delimiter-separated strings; the batch
//! digest is defined over the exact transaction byte layout, so the codec is
//! part of the protocol rather than an implementation detail.

pub mod batch;
pub mod codec;
pub mod errors;
pub mod proof;
pub mod receipt;
pub mod transaction;
pub mod value;
pub mod verify;

pub use batch::{digest_of, Batch, SealedBatch};
pub use errors::{ErrorKind, LedgerResult, VerifyError, WireError};
pub use proof::{Proof, ProofEntry};
pub use receipt::Receipt;
pub use transaction::Tx;
pub use value::Value;
pub use verify::{Verdict, VerifyContext, VerifyMode};

/// Node identifier within a simulation run.
pub type NodeId = u64;

/// Globally unique value identifier.
pub type ValueId = u64;

/// Account-chain height.
pub type Height = u64;

/// Transaction identifier.
pub type TxId = u64;
