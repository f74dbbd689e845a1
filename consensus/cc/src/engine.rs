//! The per-member round engine
//!
//! One engine instance lives inside every node. Handlers consume round
//! events and return the actions the node must execute: messages to send,
//! deadline timers to arm, verification failures to record, and finally the
//! checkpoint to apply. The engine never touches the network or the clock
//! itself, which keeps every transition unit-testable.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info, warn};

use ezchain_chain::{AcChain, CcBlock, CcChain, ChainContext};
use ezchain_ledger::{Batch, ErrorKind, Height, NodeId, Proof};

use crate::errors::CcResult;
use crate::messages::{Appeal, CcBatchSet, CcMessage, GammaKind};
use crate::signature::{verify_threshold, SigPhase, SigSet, SigShare};
use crate::state::CcState;

/// An effect the node must carry out on the engine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum CcAction {
    /// Broadcast to every other node
    Broadcast(CcMessage),
    /// Send to one node
    Unicast(NodeId, CcMessage),
    /// Arm the given deadline timer
    ArmTimer(GammaKind),
    /// Apply the finalised checkpoint locally (leader side of cc_5)
    FinalizeLocal(CcBlock),
    /// Count a verification failure
    Record(ErrorKind),
    /// The round timed out; nothing was finalised
    Abort,
}

/// Committee-member state machine for one CC round.
#[derive(Debug)]
pub struct CcEngine {
    node: NodeId,
    state: CcState,
    committee: BTreeSet<NodeId>,
    leader: Option<NodeId>,
    skip: u64,
    acb_height: Height,
    block_epoch: u64,
    prev_acb_height: Height,
    /// Digests offered in any cc_1, own batches included
    seen: HashSet<String>,
    draft: Option<CcBlock>,
    sig_set: SigSet,
}

impl CcEngine {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            state: CcState::Idle,
            committee: BTreeSet::new(),
            leader: None,
            skip: 0,
            acb_height: 0,
            block_epoch: 0,
            prev_acb_height: 0,
            seen: HashSet::new(),
            draft: None,
            sig_set: SigSet::new(),
        }
    }

    pub fn state(&self) -> CcState {
        self.state
    }

    pub fn leader(&self) -> Option<NodeId> {
        self.leader
    }

    pub fn is_leader(&self) -> bool {
        self.leader == Some(self.node)
    }

    pub fn draft(&self) -> Option<&CcBlock> {
        self.draft.as_ref()
    }

    /// Drop all round state. Called on the epoch timer and after cc_5.
    pub fn reset(&mut self) {
        self.state = CcState::Idle;
        self.committee.clear();
        self.leader = None;
        self.skip = 0;
        self.seen.clear();
        self.draft = None;
        self.sig_set.clear();
    }

    /// Enter the round: draft the checkpoint, elect the epoch leader, offer
    /// this node's batches and arm the collection deadline.
    #[allow(clippy::too_many_arguments)]
    pub fn begin_round(
        &mut self,
        ac: &AcChain,
        cc: &CcChain,
        own_batches: Vec<Batch>,
        block_id: u64,
        block_epoch: u64,
        committee: BTreeSet<NodeId>,
        now: f64,
    ) -> CcResult<Vec<CcAction>> {
        self.reset();
        self.committee = committee;
        self.acb_height = ac.height();
        self.block_epoch = block_epoch;
        self.prev_acb_height = cc.latest_acb_height().unwrap_or(0);
        self.skip = 0;

        let leader = ac.leader_at(self.acb_height, block_epoch, 0)?;
        self.leader = Some(leader);

        let height = cc.len() as Height;
        let prev_id = cc.tip().map(|b| b.id).unwrap_or(0);
        self.draft = Some(CcBlock::new(
            height,
            block_id,
            prev_id,
            self.node,
            self.acb_height,
            block_epoch,
            now,
        ));

        for batch in &own_batches {
            self.seen.insert(batch.digest.clone());
        }

        self.state = CcState::Collecting;
        debug!(
            node = self.node,
            leader,
            acb_height = self.acb_height,
            "cc round opened"
        );
        Ok(vec![
            CcAction::Broadcast(CcMessage::BatchSet(CcBatchSet {
                author: self.node,
                batches: own_batches,
            })),
            CcAction::ArmTimer(GammaKind::G1),
        ])
    }

    /// cc_1 from a peer: note the digests and re-verify every transaction's
    /// checkable history; failures go straight into the draft verdicts.
    pub fn on_batch_set(
        &mut self,
        set: CcBatchSet,
        ac: &AcChain,
        cc: &CcChain,
    ) -> Vec<CcAction> {
        if self.state != CcState::Collecting {
            return Vec::new();
        }
        let ctx = ChainContext::new(ac, cc);
        let mut actions = Vec::new();
        let draft = self.draft.as_mut().expect("draft exists while in round");

        for batch in set.batches {
            self.seen.insert(batch.digest.clone());
            for tx in &batch.txs {
                let outcome = Proof::from_wire(&tx.proof_wire)
                    .map_err(Into::into)
                    .and_then(|proof| proof.verify_history(&ctx, tx.owner));
                if let Err(e) = outcome {
                    let mut core = tx.clone();
                    core.proof_wire.clear();
                    draft.add_failed(batch.digest.clone(), vec![core]);
                    actions.push(CcAction::Record(e.kind()));
                }
            }
        }
        actions
    }

    /// γ1: every digest sealed this epoch but offered by nobody is declared
    /// missing, then the leader proposes (or a proposal deadline is armed).
    pub fn on_gamma1(&mut self, ac: &AcChain) -> Vec<CcAction> {
        if self.state != CcState::Collecting {
            return Vec::new();
        }
        let draft = self.draft.as_mut().expect("draft exists while in round");
        for height in self.prev_acb_height + 1..=self.acb_height {
            if let Some(block) = ac.get(height) {
                for digest in &block.a_vec {
                    if !self.seen.contains(digest) {
                        draft.mark_missing(digest.clone());
                    }
                }
            }
        }

        if self.is_leader() {
            self.state = CcState::Signing;
            let proposal = self.draft.clone().expect("draft exists");
            debug!(node = self.node, "proposing checkpoint as leader");
            vec![CcAction::Broadcast(CcMessage::Proposal(proposal))]
        } else {
            self.state = CcState::AwaitProposal;
            vec![CcAction::ArmTimer(GammaKind::G2)]
        }
    }

    /// cc_2: sign the leader's proposal and wait for the commit broadcast.
    pub fn on_proposal(&mut self, block: CcBlock, now: f64) -> Vec<CcAction> {
        if !matches!(self.state, CcState::Collecting | CcState::AwaitProposal) {
            return Vec::new();
        }
        if Some(block.miner) != self.leader {
            debug!(
                node = self.node,
                from = block.miner,
                "proposal from non-leader ignored"
            );
            return Vec::new();
        }
        if block.acb_height != self.acb_height {
            warn!(
                node = self.node,
                got = block.acb_height,
                expected = self.acb_height,
                "proposal for a different epoch ignored"
            );
            return Vec::new();
        }

        let share = SigShare {
            ccb_id: block.id,
            signer: self.node,
            recipient: block.miner,
            time: now,
            phase: SigPhase::Commit,
        };
        let leader = block.miner;
        self.draft = Some(block);
        self.state = CcState::AwaitBroadcast;
        vec![CcAction::Unicast(leader, CcMessage::Signature(share))]
    }

    /// γ2: the leader never proposed; elect the next candidate.
    pub fn on_gamma2(&mut self, ac: &AcChain) -> CcResult<Vec<CcAction>> {
        if self.state != CcState::AwaitProposal {
            return Ok(Vec::new());
        }
        self.skip += 1;
        let leader = ac.leader_at(self.acb_height, self.block_epoch, self.skip)?;
        self.leader = Some(leader);
        info!(node = self.node, leader, skip = self.skip, "leader re-elected");

        if self.is_leader() {
            self.state = CcState::Signing;
            let proposal = self.draft.clone().expect("draft exists");
            Ok(vec![CcAction::Broadcast(CcMessage::Proposal(proposal))])
        } else {
            Ok(vec![CcAction::ArmTimer(GammaKind::G2)])
        }
    }

    /// Signature share received by the leader. Once a strict majority of
    /// distinct committee members signed and the aggregate verifies, the
    /// gated broadcast goes out; a failed aggregate counts as no quorum.
    pub fn on_signature(&mut self, share: SigShare) -> Vec<CcAction> {
        let phase = match self.state {
            CcState::Signing => SigPhase::Commit,
            CcState::FinalSigning => SigPhase::Final,
            _ => return Vec::new(),
        };
        if !self.is_leader() || share.recipient != self.node {
            return Vec::new();
        }
        if share.phase != phase || !self.committee.contains(&share.signer) {
            return Vec::new();
        }
        self.sig_set.insert(share);

        let draft = self.draft.as_ref().expect("draft exists while signing");
        if !self.sig_set.has_quorum(self.committee.len())
            || !verify_threshold(&self.sig_set, draft.id, phase)
        {
            return Vec::new();
        }

        let block = draft.clone();
        match phase {
            SigPhase::Commit => {
                self.state = CcState::AppealWindow;
                debug!(node = self.node, "commit quorum reached");
                vec![
                    CcAction::Broadcast(CcMessage::Commit(block)),
                    CcAction::ArmTimer(GammaKind::G3),
                ]
            }
            SigPhase::Final => {
                self.state = CcState::Idle;
                info!(node = self.node, height = block.height, "checkpoint finalised");
                vec![
                    CcAction::FinalizeLocal(block.clone()),
                    CcAction::Broadcast(CcMessage::Finalized(block)),
                ]
            }
        }
    }

    /// cc_3: the committed proposal; open the appeal window.
    pub fn on_commit(&mut self, block: CcBlock) -> Vec<CcAction> {
        if self.state != CcState::AwaitBroadcast {
            return Vec::new();
        }
        self.draft = Some(block);
        self.state = CcState::AppealWindow;
        vec![CcAction::ArmTimer(GammaKind::G3)]
    }

    /// Appeal evidence: re-verify the flagged transaction with the full
    /// walk; a winning appeal removes it from the draft verdicts.
    pub fn on_appeal(&mut self, appeal: Appeal, ac: &AcChain, cc: &CcChain) -> Vec<CcAction> {
        if self.state != CcState::AppealWindow {
            return Vec::new();
        }
        let draft = self.draft.as_mut().expect("draft exists while in round");
        let core = appeal.tx.to_wire_core();
        let flagged = draft
            .fail_txn
            .iter()
            .any(|group| group.iter().any(|t| t.to_wire_core() == core));
        if !flagged {
            return Vec::new();
        }

        let ctx = ChainContext::new(ac, cc);
        let outcome = Proof::from_wire(&appeal.proof_wire)
            .map_err(Into::into)
            .and_then(|mut proof| {
                proof.push_entry(appeal.batch_txs.clone(), appeal.height);
                proof.verify_spend(&ctx, appeal.tx.owner, &appeal.tx)
            });
        match outcome {
            Ok(()) => {
                draft.clear_verdict(&appeal.tx);
                info!(node = self.node, tx = appeal.tx.tx_id, "appeal upheld");
                Vec::new()
            }
            Err(e) => {
                debug!(node = self.node, tx = appeal.tx.tx_id, error = %e, "appeal rejected");
                vec![CcAction::Record(e.kind())]
            }
        }
    }

    /// γ3: the appeal window closes; the leader circulates the final block.
    pub fn on_gamma3(&mut self) -> Vec<CcAction> {
        if self.state != CcState::AppealWindow {
            return Vec::new();
        }
        self.sig_set.clear();
        if self.is_leader() {
            self.state = CcState::FinalSigning;
            let block = self.draft.clone().expect("draft exists");
            vec![CcAction::Broadcast(CcMessage::FinalProposal(block))]
        } else {
            self.state = CcState::AwaitFinal;
            vec![CcAction::ArmTimer(GammaKind::G4)]
        }
    }

    /// cc_4: sign the post-appeal block.
    pub fn on_final_proposal(&mut self, block: CcBlock, now: f64) -> Vec<CcAction> {
        if !matches!(self.state, CcState::AppealWindow | CcState::AwaitFinal) {
            return Vec::new();
        }
        if Some(block.miner) != self.leader {
            return Vec::new();
        }
        let share = SigShare {
            ccb_id: block.id,
            signer: self.node,
            recipient: block.miner,
            time: now,
            phase: SigPhase::Final,
        };
        let leader = block.miner;
        self.draft = Some(block);
        self.state = CcState::AwaitFinal;
        vec![CcAction::Unicast(leader, CcMessage::Signature(share))]
    }

    /// γ4: no finalised block arrived; the round aborts and the chain is
    /// left unchanged.
    pub fn on_gamma4(&mut self) -> Vec<CcAction> {
        if self.state != CcState::AwaitFinal {
            return Vec::new();
        }
        warn!(node = self.node, "cc round timed out before finalisation");
        self.state = CcState::Idle;
        vec![CcAction::Abort]
    }
}
