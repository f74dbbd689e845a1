//! Round messages and timers

use serde::{Deserialize, Serialize};

use ezchain_chain::CcBlock;
use ezchain_ledger::{Batch, Height, NodeId, Tx};

use crate::signature::SigShare;

/// The four per-round deadline timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GammaKind {
    /// End of batch-set collection
    G1,
    /// Leader proposal deadline
    G2,
    /// End of the appeal window
    G3,
    /// Finalisation deadline
    G4,
}

/// cc_1: a committee member's batches from the closing epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcBatchSet {
    pub author: NodeId,
    pub batches: Vec<Batch>,
}

/// Appeal evidence for a transaction flagged in the commit broadcast: the
/// sealed batch, its height, and the author's proof as of the prior block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appeal {
    pub tx: Tx,
    pub proof_wire: String,
    pub batch_txs: Vec<Tx>,
    pub height: Height,
}

/// Everything exchanged within one CC round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CcMessage {
    /// cc_1: batch sets offered for checkpointing
    BatchSet(CcBatchSet),
    /// cc_2: leader's draft checkpoint
    Proposal(CcBlock),
    /// cc_3: proposal that gathered a commit quorum
    Commit(CcBlock),
    /// cc_4: post-appeal checkpoint
    FinalProposal(CcBlock),
    /// cc_5: finalised checkpoint
    Finalized(CcBlock),
    /// Threshold signature share, unicast to the leader
    Signature(SigShare),
    /// Appeal evidence submitted during the appeal window
    Appeal(Appeal),
}

impl CcMessage {
    /// Short name for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CcMessage::BatchSet(_) => "cc_1",
            CcMessage::Proposal(_) => "cc_2",
            CcMessage::Commit(_) => "cc_3",
            CcMessage::FinalProposal(_) => "cc_4",
            CcMessage::Finalized(_) => "cc_5",
            CcMessage::Signature(_) => "signature",
            CcMessage::Appeal(_) => "appeal",
        }
    }
}
