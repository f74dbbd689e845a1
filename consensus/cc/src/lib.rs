//! Checkpoint-chain consensus
//!
//! One committee runs one CC round per epoch: collect the epoch's batch
//! sets, propose a checkpoint flagging invalid and missing batches, hold an
//! appeal window, then finalise under a threshold signature. The round is a
//! reified state machine: every handler checks the state tag, so a stale
//! timer firing after a phase change is ignored instead of corrupting the
//! round.

pub mod engine;
pub mod errors;
pub mod messages;
pub mod signature;
pub mod state;

pub use engine::{CcAction, CcEngine};
pub use errors::{CcError, CcResult};
pub use messages::{Appeal, CcBatchSet, CcMessage, GammaKind};
pub use signature::{verify_threshold, SigPhase, SigSet, SigShare};
pub use state::CcState;
