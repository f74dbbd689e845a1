//! Node state machine

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use ezchain_cc::{Appeal, CcAction, CcEngine, CcMessage, GammaKind};
use ezchain_chain::{AcBlock, AcChain, CcBlock, CcChain, ChainContext, PersonalChain};
use ezchain_ledger::{
    Batch, ErrorKind, Height, NodeId, Proof, Receipt, SealedBatch, Tx, TxId, Value, ValueId,
    VerifyError,
};
use ezchain_sim::EventId;
use ezchain_storage::KvStore;

use crate::config::SimConfig;
use crate::env::NodeEnv;
use crate::errors::{NodeError, NodeResult};
use crate::metrics::SharedMetrics;
use crate::msg::Msg;

/// One participating node: value owner, batch author, miner and (when it
/// mines within an epoch) committee member.
pub struct Node {
    id: NodeId,
    cfg: Arc<SimConfig>,
    store: Arc<dyn KvStore>,
    metrics: SharedMetrics,

    /// Proofs of the values this node currently holds
    values: Vec<Proof>,
    /// Generated-but-unflushed transactions, as cache keys
    tx_pool: Vec<TxId>,
    /// Published batches awaiting their sealing block, by digest
    pending: HashMap<String, Batch>,
    /// This node's sealed batches
    personal: PersonalChain,

    /// Local copy of the account chain
    ac: AcChain,
    /// Local copy of the checkpoint chain
    cc: CcChain,
    /// Highest account-chain height already scanned for own batches
    processed_height: Height,
    /// Tip as last observed (id, height)
    tip_id: u64,
    tip_height: Height,

    /// Miners observed since the last finalised checkpoint
    committee: BTreeSet<NodeId>,
    /// Did this node mine within the current epoch?
    in_committee: bool,
    /// Miner of the epoch's first block
    leader: Option<NodeId>,
    /// Blocks observed within the current epoch
    block_epoch: u64,
    /// Batches this node packed into blocks it mined this epoch
    epoch_batches: Vec<Batch>,

    engine: CcEngine,
    pow_timer: Option<EventId>,
}

impl Node {
    pub fn new(
        id: NodeId,
        cfg: Arc<SimConfig>,
        store: Arc<dyn KvStore>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            id,
            cfg,
            store,
            metrics,
            values: Vec::new(),
            tx_pool: Vec::new(),
            pending: HashMap::new(),
            personal: PersonalChain::new(),
            ac: AcChain::new(),
            cc: CcChain::new(),
            processed_height: 0,
            tip_id: 0,
            tip_height: 0,
            committee: BTreeSet::new(),
            in_committee: false,
            leader: None,
            block_epoch: 0,
            epoch_batches: Vec::new(),
            engine: CcEngine::new(id),
            pow_timer: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Endow the node with its initial values, ids `first_id..first_id+count`.
    pub fn init_values(&mut self, first_id: ValueId, count: u64) {
        for value_id in first_id..first_id + count {
            let proof = Proof::new(Value::new(self.id, value_id, 0));
            self.metrics.get().set_value_txs(value_id, 0);
            self.values.push(proof);
        }
    }

    pub fn held_values(&self) -> Vec<ValueId> {
        self.values.iter().map(|p| p.value.id).collect()
    }

    pub fn holds_value(&self, value_id: ValueId) -> bool {
        self.values.iter().any(|p| p.value.id == value_id)
    }

    pub fn proof_of(&self, value_id: ValueId) -> Option<&Proof> {
        self.values.iter().find(|p| p.value.id == value_id)
    }

    pub fn ac(&self) -> &AcChain {
        &self.ac
    }

    pub fn cc(&self) -> &CcChain {
        &self.cc
    }

    pub fn personal(&self) -> &PersonalChain {
        &self.personal
    }

    pub fn engine(&self) -> &CcEngine {
        &self.engine
    }

    /// Arm the initial timers. Called once by the driver after construction.
    pub fn start(&mut self, env: &mut dyn NodeEnv) {
        env.schedule(self.id, env.now(), Msg::GenTx);
        self.arm_pow(env);
        if self.cfg.use_cc {
            env.schedule(self.id, env.now().after(self.cfg.epoch), Msg::EpochTimer);
        }
    }

    /// Entry point for every delivered event.
    pub fn handle(&mut self, msg: Msg, env: &mut dyn NodeEnv) -> NodeResult<()> {
        trace!(node = self.id, kind = msg.kind_name(), time = %env.now(), "event");
        match msg {
            Msg::GenTx => self.on_gen_tx(env),
            Msg::Pow => self.on_pow(env),
            Msg::AcBlock(block) => self.on_ac_block(block, env),
            Msg::Receipt(receipt) => self.on_receipt(receipt, env),
            Msg::EpochTimer => self.on_epoch_timer(env),
            Msg::Gamma(kind) => self.on_gamma(kind, env),
            Msg::Cc(message) => self.on_cc(message, env),
        }
    }

    fn record(&self, kind: ErrorKind) {
        self.metrics.get().record_error(kind);
    }

    fn record_verify(&self, e: &VerifyError) {
        self.record(e.kind());
    }

    // ------------------------------------------------------------------
    // transaction generation and batching
    // ------------------------------------------------------------------

    /// Mint one transaction over a random held value, then re-arm the
    /// generation timer.
    fn on_gen_tx(&mut self, env: &mut dyn NodeEnv) -> NodeResult<()> {
        if !self.values.is_empty() {
            let pos = if self.values.len() > 1 {
                env.rng().int_uniform(0, self.values.len() as u64 - 1) as usize
            } else {
                0
            };
            let mut proof = self.values.remove(pos);
            let value_id = proof.value.id;

            let recipient = loop {
                let r = env.rng().int_uniform(0, self.cfg.nodes - 1);
                if r != self.id {
                    break r;
                }
            };

            if self.cfg.use_cc {
                if let Some(cp) = self.cc.latest_acb_height() {
                    if let Err(e) = proof.apply_checkpoint(cp) {
                        self.record_verify(&e);
                    }
                }
            }
            proof.add_batches(self.personal.as_slice());
            self.metrics.get().set_value_txs(value_id, proof.tx_count);

            let mut tx = Tx::new(env.next_tx_id(), value_id, self.id, recipient);
            tx.proof_wire = proof.to_wire();
            self.store
                .put(&format!("tx/{}", tx.tx_id), &tx.to_wire())?;
            self.tx_pool.push(tx.tx_id);
            self.metrics.get().tx_generated.inc();
            debug!(node = self.id, tx = tx.tx_id, value = value_id, to = recipient, "tx minted");
        }

        if env.batch_pool_is_empty() || self.values.is_empty() {
            self.flush_tx_pool(env)?;
        }

        let wait = env.rng().poisson(self.cfg.tx_interval_mean()) as f64;
        env.schedule(self.id, env.now().after(wait), Msg::GenTx);
        Ok(())
    }

    /// Bundle the pending transactions into a batch and offer it to the
    /// process-wide pool.
    fn flush_tx_pool(&mut self, env: &mut dyn NodeEnv) -> NodeResult<()> {
        if self.tx_pool.is_empty() {
            return Ok(());
        }
        let mut txs = Vec::with_capacity(self.tx_pool.len());
        for tx_id in self.tx_pool.drain(..) {
            let key = format!("tx/{tx_id}");
            let wire = self
                .store
                .get(&key)?
                .ok_or_else(|| NodeError::CacheMiss(key))?;
            match Tx::from_wire(&wire) {
                Ok(tx) => txs.push(tx),
                Err(e) => self.metrics.get().record_error(e.kind()),
            }
        }
        if txs.is_empty() {
            return Ok(());
        }
        self.metrics.get().tx_sent.inc_by(txs.len() as u64);

        let batch = Batch::seal(self.id, txs);
        self.store
            .put(&format!("inf/{}", batch.digest), &batch.to_wire())?;
        self.pending.insert(batch.digest.clone(), batch.clone());
        self.metrics.get().batches_published.inc();
        debug!(node = self.id, digest = %batch.digest, txs = batch.len(), "batch published");
        env.publish_batch(batch);
        Ok(())
    }

    // ------------------------------------------------------------------
    // mining
    // ------------------------------------------------------------------

    /// Stochastic mining attempt: seals a block only if no block has
    /// appeared since the timer was armed.
    fn on_pow(&mut self, env: &mut dyn NodeEnv) -> NodeResult<()> {
        self.pow_timer = None;
        if self.ac.is_empty() || self.tip_height == self.ac.height() {
            let block_id = env.next_block_id();
            let mut block = AcBlock::new(
                self.ac.height() + 1,
                block_id,
                self.tip_id,
                self.id,
                env.now().seconds(),
            );
            self.pack_batches(&mut block, env);
            self.metrics
                .get()
                .digest_records
                .inc_by(block.filter.len() as u64);

            debug!(node = self.id, height = block.height, batches = block.a_vec.len(), "block sealed");
            self.ac.append(block.clone())?;
            self.metrics.get().blocks_mined.inc();

            self.in_committee = true;
            self.committee.insert(self.id);
            if self.leader.is_none() {
                self.leader = Some(self.id);
            }
            self.block_epoch += 1;

            self.process_sealed_blocks(env)?;
            env.broadcast(self.id, Msg::AcBlock(block));

            if !self.tx_pool.is_empty() {
                self.flush_tx_pool(env)?;
            }
        }
        if let Some(tip) = self.ac.tip() {
            self.tip_id = tip.id;
            self.tip_height = tip.height;
        }
        self.arm_pow(env);
        Ok(())
    }

    /// Drain the pool and pack every batch that verifies.
    fn pack_batches(&mut self, block: &mut AcBlock, env: &mut dyn NodeEnv) {
        let drained = env.drain_batch_pool();
        if drained.is_empty() {
            self.record(ErrorKind::EmptyBatch);
            return;
        }
        for batch in drained {
            match self.validate_batch(&batch) {
                Ok(()) => {
                    block.push_batch(batch.digest.clone(), batch.author);
                    let mut packed = batch;
                    packed.height = Some(block.height);
                    self.epoch_batches.push(packed);
                }
                Err(e) => {
                    warn!(node = self.id, author = batch.author, error = %e, "batch dropped");
                    self.record_verify(&e);
                }
            }
        }
    }

    /// Miner-side batch check: digest integrity plus the checkable history
    /// of every embedded proof.
    fn validate_batch(&self, batch: &Batch) -> Result<(), VerifyError> {
        if batch.is_empty() {
            return Err(VerifyError::EmptyBatch(batch.author));
        }
        if !batch.digest_matches() {
            return Err(VerifyError::DigestMismatch {
                expected: batch.digest.clone(),
                got: ezchain_ledger::digest_of(&batch.txs),
            });
        }
        let ctx = ChainContext::new(&self.ac, &self.cc);
        for tx in &batch.txs {
            let proof = Proof::from_wire(&tx.proof_wire)?;
            proof.verify_history(&ctx, tx.owner)?;
        }
        Ok(())
    }

    /// Re-arm the mining timer with a fresh exponential draw.
    fn arm_pow(&mut self, env: &mut dyn NodeEnv) {
        let mean = self.cfg.pow_mean();
        let mut wait = env.rng().exponential(mean);
        if wait <= 0.0 {
            wait = mean;
        }
        self.pow_timer = Some(env.schedule(self.id, env.now().after(wait), Msg::Pow));
    }

    // ------------------------------------------------------------------
    // block intake and receipts
    // ------------------------------------------------------------------

    /// A block mined elsewhere: adopt it, update epoch bookkeeping, emit
    /// receipts for any of our batches it sealed, and restart the miner.
    fn on_ac_block(&mut self, block: AcBlock, env: &mut dyn NodeEnv) -> NodeResult<()> {
        let miner = block.miner;
        if let Err(e) = self.ac.append(block) {
            // Concurrent seals at one height cannot happen under the
            // instantaneous block broadcast; a straggler is dropped.
            warn!(node = self.id, error = %e, "stale block ignored");
            return Ok(());
        }
        self.committee.insert(miner);
        if self.leader.is_none() {
            self.leader = Some(miner);
        }
        self.block_epoch += 1;

        self.process_sealed_blocks(env)?;

        if !self.tx_pool.is_empty() && env.batch_pool_is_empty() {
            self.flush_tx_pool(env)?;
        }

        if let Some(timer) = self.pow_timer.take() {
            env.cancel(timer)?;
        }
        if let Some(tip) = self.ac.tip() {
            self.tip_id = tip.id;
            self.tip_height = tip.height;
        }
        self.arm_pow(env);
        Ok(())
    }

    /// Walk newly observed heights; every digest that matches one of our
    /// pending batches triggers receipt fan-out and a personal-chain entry.
    fn process_sealed_blocks(&mut self, env: &mut dyn NodeEnv) -> NodeResult<()> {
        let tip = self.ac.height();
        for height in self.processed_height + 1..=tip {
            let digests = match self.ac.get(height) {
                Some(block) => block.a_vec.clone(),
                None => continue,
            };
            for digest in digests {
                let Some(batch) = self.pending.remove(&digest) else {
                    continue;
                };
                self.store.delete(&format!("inf/{digest}"))?;
                if batch.is_empty() {
                    self.record(ErrorKind::EmptyProof);
                    continue;
                }

                let cores: Vec<Tx> = batch
                    .txs
                    .iter()
                    .map(|tx| {
                        let mut core = tx.clone();
                        core.proof_wire.clear();
                        core
                    })
                    .collect();

                for (idx, tx) in batch.txs.iter().enumerate() {
                    let mut proof = match Proof::from_wire(&tx.proof_wire) {
                        Ok(p) => p,
                        Err(e) => {
                            self.metrics.get().record_error(e.kind());
                            continue;
                        }
                    };
                    if self.cfg.use_cc {
                        if let Some(cp) = self.cc.latest_acb_height() {
                            if let Err(e) = proof.apply_checkpoint(cp) {
                                self.record_verify(&e);
                            }
                        }
                    }
                    proof.add_batches(self.personal.as_slice());
                    self.metrics
                        .get()
                        .set_value_txs(proof.value.id, proof.tx_count);
                    self.metrics.get().comm_cost.inc_by(proof.tx_count);

                    let receipt = Receipt {
                        sender: self.id,
                        recipient: tx.recipient,
                        height,
                        tx_index: idx,
                        batch_txs: cores.clone(),
                        tx: cores[idx].clone(),
                        proof_wire: proof.to_wire(),
                    };
                    env.unicast(self.id, tx.recipient, Msg::Receipt(receipt));
                }

                let sealed = SealedBatch::new(height, cores);
                self.store.put(
                    &format!("pb/{} {}", self.id, self.personal.len()),
                    &sealed.to_wire(),
                )?;
                self.personal.push(sealed);
            }
        }
        self.processed_height = tip;
        Ok(())
    }

    /// Recipient side: rebuild the proof, append the sealing batch as its
    /// final entry, verify the full custody walk and install the value.
    fn on_receipt(&mut self, receipt: Receipt, _env: &mut dyn NodeEnv) -> NodeResult<()> {
        if receipt.tx.recipient != self.id {
            self.record(ErrorKind::RecipientMismatch);
            return Ok(());
        }
        let mut proof = match Proof::from_wire(&receipt.proof_wire) {
            Ok(p) => p,
            Err(e) => {
                self.metrics.get().record_error(e.kind());
                self.metrics.get().receipts_rejected.inc();
                return Ok(());
            }
        };
        proof.push_entry(receipt.batch_txs.clone(), receipt.height);

        let ctx = ChainContext::new(&self.ac, &self.cc);
        match proof.verify_spend(&ctx, receipt.sender, &receipt.tx) {
            Ok(()) => {
                debug!(node = self.id, value = proof.value.id, height = receipt.height, "value received");
                self.metrics
                    .get()
                    .set_value_txs(proof.value.id, proof.tx_count);
                self.metrics.get().receipts_delivered.inc();
                self.values.push(proof);
            }
            Err(e) => {
                debug!(node = self.id, value = proof.value.id, error = %e, "receipt rejected");
                self.record_verify(&e);
                self.metrics.get().receipts_rejected.inc();
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // checkpoint rounds
    // ------------------------------------------------------------------

    /// Epoch boundary: committee members enter the CC round, then the
    /// epoch scratch state resets either way.
    fn on_epoch_timer(&mut self, env: &mut dyn NodeEnv) -> NodeResult<()> {
        // A round still in flight from the previous epoch is dead now.
        if self.engine.state().in_round() {
            self.metrics.get().cc_rounds_aborted.inc();
        }
        self.engine.reset();

        let mut actions = Vec::new();
        if self.cfg.use_cc && self.in_committee {
            self.metrics.get().cc_rounds_started.inc();
            let own = std::mem::take(&mut self.epoch_batches);
            let offered: u64 = own.iter().map(|b| b.len() as u64).sum();
            self.metrics
                .get()
                .comm_cost
                .inc_by(self.committee.len() as u64 * offered);

            let block_id = env.next_block_id();
            actions = self.engine.begin_round(
                &self.ac,
                &self.cc,
                own,
                block_id,
                self.block_epoch,
                self.committee.clone(),
                env.now().seconds(),
            )?;
        }

        // The round engine holds its own committee snapshot; the live set
        // is scoped to the epoch that just closed.
        self.committee.clear();
        self.epoch_batches.clear();
        self.in_committee = false;
        self.leader = None;
        self.block_epoch = 0;

        self.run_actions(actions, env)?;
        env.schedule(self.id, env.now().after(self.cfg.epoch), Msg::EpochTimer);
        Ok(())
    }

    fn on_gamma(&mut self, kind: GammaKind, env: &mut dyn NodeEnv) -> NodeResult<()> {
        let actions = match kind {
            GammaKind::G1 => self.engine.on_gamma1(&self.ac),
            GammaKind::G2 => self.engine.on_gamma2(&self.ac)?,
            GammaKind::G3 => self.engine.on_gamma3(),
            GammaKind::G4 => self.engine.on_gamma4(),
        };
        self.run_actions(actions, env)
    }

    fn on_cc(&mut self, message: CcMessage, env: &mut dyn NodeEnv) -> NodeResult<()> {
        let actions = match message {
            CcMessage::BatchSet(set) => self.engine.on_batch_set(set, &self.ac, &self.cc),
            CcMessage::Proposal(block) => self.engine.on_proposal(block, env.now().seconds()),
            CcMessage::Commit(block) => {
                self.metrics.get().comm_cost.inc_by(block.txn_count);
                self.maybe_appeal(&block, env)?;
                self.engine.on_commit(block)
            }
            CcMessage::FinalProposal(block) => {
                self.engine.on_final_proposal(block, env.now().seconds())
            }
            CcMessage::Finalized(block) => {
                self.apply_checkpoint_block(block)?;
                Vec::new()
            }
            CcMessage::Signature(share) => self.engine.on_signature(share),
            CcMessage::Appeal(appeal) => self.engine.on_appeal(appeal, &self.ac, &self.cc),
        };
        self.run_actions(actions, env)
    }

    /// Execute what the round engine asked for.
    fn run_actions(&mut self, actions: Vec<CcAction>, env: &mut dyn NodeEnv) -> NodeResult<()> {
        for action in actions {
            match action {
                CcAction::Broadcast(message) => {
                    if let CcMessage::Proposal(b)
                    | CcMessage::Commit(b)
                    | CcMessage::FinalProposal(b)
                    | CcMessage::Finalized(b) = &message
                    {
                        self.metrics.get().comm_cost.inc_by(b.txn_count);
                    }
                    env.broadcast(self.id, Msg::Cc(message));
                }
                CcAction::Unicast(to, message) => env.unicast(self.id, to, Msg::Cc(message)),
                CcAction::ArmTimer(kind) => {
                    let wait = match kind {
                        GammaKind::G1 => self.cfg.gamma[0],
                        GammaKind::G2 => self.cfg.gamma[1],
                        GammaKind::G3 => self.cfg.gamma[2],
                        GammaKind::G4 => self.cfg.gamma[3],
                    };
                    env.schedule(self.id, env.now().after(wait), Msg::Gamma(kind));
                }
                CcAction::FinalizeLocal(block) => {
                    self.metrics.get().cc_rounds_finalised.inc();
                    self.apply_checkpoint_block(block)?;
                }
                CcAction::Record(kind) => self.record(kind),
                CcAction::Abort => self.metrics.get().cc_rounds_aborted.inc(),
            }
        }
        Ok(())
    }

    /// Broadcast appeal evidence for any of our own transactions flagged in
    /// the committed proposal.
    fn maybe_appeal(&mut self, block: &CcBlock, env: &mut dyn NodeEnv) -> NodeResult<()> {
        let mut evidence = Vec::new();
        for group in &block.fail_txn {
            for tx in group {
                if tx.owner != self.id {
                    continue;
                }
                let core = tx.to_wire_core();
                let Some(sealed) = self
                    .personal
                    .as_slice()
                    .iter()
                    .find(|b| b.txs.iter().any(|t| t.to_wire_core() == core))
                else {
                    continue;
                };
                let Some(stored) = self.store.get(&format!("tx/{}", tx.tx_id))? else {
                    continue;
                };
                let Ok(original) = Tx::from_wire(&stored) else {
                    continue;
                };
                let Ok(mut proof) = Proof::from_wire(&original.proof_wire) else {
                    continue;
                };
                // History strictly before the sealing block; the sealed
                // batch itself travels separately as the final entry.
                let earlier: Vec<SealedBatch> = self
                    .personal
                    .as_slice()
                    .iter()
                    .filter(|b| b.height < sealed.height)
                    .cloned()
                    .collect();
                proof.add_batches(&earlier);
                evidence.push(Appeal {
                    tx: tx.clone(),
                    proof_wire: proof.to_wire(),
                    batch_txs: sealed.txs.clone(),
                    height: sealed.height,
                });
            }
        }
        for appeal in evidence {
            debug!(node = self.id, tx = appeal.tx.tx_id, "submitting appeal");
            env.broadcast(self.id, Msg::Cc(CcMessage::Appeal(appeal)));
        }
        Ok(())
    }

    /// cc_5 (or the leader's local finalisation): adopt the checkpoint and
    /// prune every held proof back to its anchor.
    fn apply_checkpoint_block(&mut self, block: CcBlock) -> NodeResult<()> {
        if !self.cfg.use_cc {
            return Ok(());
        }
        let acb_height = block.acb_height;
        if let Err(e) = self.cc.append(block) {
            warn!(node = self.id, error = %e, "checkpoint ignored");
            return Ok(());
        }
        debug!(node = self.id, acb_height, "checkpoint adopted");

        let mut pruned = Vec::new();
        for proof in &mut self.values {
            if let Err(e) = proof.apply_checkpoint(acb_height) {
                pruned.push(e);
            }
            self.metrics
                .get()
                .set_value_txs(proof.value.id, proof.tx_count);
        }
        for e in pruned {
            self.record_verify(&e);
        }

        self.committee.clear();
        self.engine.reset();
        Ok(())
    }
}
