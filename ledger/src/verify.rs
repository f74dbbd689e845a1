//! Proof verification
//!
//! The walk treats a proof as a chain of custody. Entries are grouped into
//! owner runs (maximal consecutive sequences with one author); each
//! completed run must contain exactly one confirmed spend of the value, and
//! that spend's recipient must author the next run. The final run belongs to
//! the party the verifier is checking: for a pending transaction the run
//! must contain no spend yet, for a delivered receipt it must contain the
//! receipt's transaction as the first confirmed spend.

use crate::batch::digest_of;
use crate::errors::VerifyError;
use crate::proof::{Proof, ProofEntry};
use crate::transaction::Tx;
use crate::{Height, NodeId};

/// Checkpoint verdict for one batch, as recorded on the checkpoint chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No checkpoint covers the batch, or it passed
    Clean,
    /// The entire batch was declared invalid or missing
    BatchInvalid,
    /// Specific transactions (by core wire form) were declared invalid
    Failed(Vec<String>),
}

/// The verifier's view of the two chains. Implemented by the chain crate.
pub trait VerifyContext {
    /// Is there an account-chain block at `height`?
    fn has_block(&self, height: Height) -> bool;
    /// Does the block at `height` list `digest`?
    fn digest_on_chain(&self, height: Height, digest: &str) -> bool;
    /// Does the block at `height` record a batch authored by `author`?
    fn author_filtered(&self, height: Height, author: NodeId) -> bool;
    /// `acb_height` of the latest finalised checkpoint, if any.
    fn checkpoint_height(&self) -> Option<Height>;
    /// Checkpoint verdict for the batch sealed at `height`.
    fn verdict(&self, height: Height, digest: &str) -> Verdict;
}

/// What the walk is establishing.
#[derive(Debug, Clone, Copy)]
pub enum VerifyMode<'a> {
    /// A pending transaction: `sender` must still own the value.
    History { sender: NodeId },
    /// A delivered receipt: `spend` (sealed in the proof's final entry)
    /// must be the first confirmed spend of the final run.
    Spend { sender: NodeId, spend: &'a Tx },
}

impl Proof {
    /// Verify a proof attached to a not-yet-sealed transaction.
    pub fn verify_history(
        &self,
        ctx: &dyn VerifyContext,
        sender: NodeId,
    ) -> Result<(), VerifyError> {
        self.verify(ctx, VerifyMode::History { sender })
    }

    /// Verify a proof whose final entry is the sealed spending batch.
    pub fn verify_spend(
        &self,
        ctx: &dyn VerifyContext,
        sender: NodeId,
        spend: &Tx,
    ) -> Result<(), VerifyError> {
        self.verify(ctx, VerifyMode::Spend { sender, spend })
    }

    fn verify(&self, ctx: &dyn VerifyContext, mode: VerifyMode<'_>) -> Result<(), VerifyError> {
        let value = self.value;

        if self.entries.is_empty() {
            return match mode {
                // A fresh value at its init anchor has nothing to walk.
                VerifyMode::History { sender } if sender == value.init_owner => Ok(()),
                VerifyMode::History { sender } => Err(VerifyError::WrongOwner {
                    expected: value.init_owner,
                    got: sender,
                }),
                VerifyMode::Spend { .. } => Err(VerifyError::EmptyProof(value.id)),
            };
        }

        for entry in &self.entries {
            if entry.txns.is_empty() {
                return Err(VerifyError::EmptyProof(value.id));
            }
        }
        for pair in self.entries.windows(2) {
            if pair[1].height < pair[0].height {
                return Err(VerifyError::ProofFormat(
                    "entry heights not ascending".to_string(),
                ));
            }
        }

        let first = &self.entries[0];
        let first_owner = first.owner().expect("entries checked non-empty");

        // Custody starts at the init anchor unless the head is affirmed by a
        // finalised checkpoint (P3).
        let start_owner = match ctx.checkpoint_height() {
            Some(cp) if first.height <= cp => first_owner,
            Some(cp) => {
                if first_owner != value.init_owner {
                    return Err(VerifyError::InitHeight {
                        first: first.height,
                        checkpoint: cp,
                    });
                }
                value.init_owner
            }
            None => value.init_owner,
        };

        let runs = group_runs(&self.entries);
        let mut current_owner = start_owner;
        let mut prev_height = first.height;

        for (run_idx, (owner, run)) in runs.iter().enumerate() {
            let is_last = run_idx == runs.len() - 1;
            if *owner != current_owner {
                return Err(VerifyError::WrongOwner {
                    expected: current_owner,
                    got: *owner,
                });
            }

            let mut spends: Vec<&Tx> = Vec::new();
            let mut last_verdict = Verdict::Clean;
            for entry in run {
                let height = entry.height;
                if !ctx.has_block(height) {
                    return Err(VerifyError::ProofIncomplete(format!(
                        "no account-chain block at height {height}"
                    )));
                }
                let digest = digest_of(&entry.txns);
                if !ctx.digest_on_chain(height, &digest) {
                    return Err(VerifyError::ProofIncomplete(format!(
                        "batch {digest} not listed at height {height}"
                    )));
                }
                // A block between two recorded entries whose filter names
                // the owner means a batch was omitted from the proof.
                for gap in prev_height + 1..height {
                    if ctx.author_filtered(gap, *owner) {
                        return Err(VerifyError::ProofIncomplete(format!(
                            "batch by node {owner} at height {gap} omitted"
                        )));
                    }
                }
                prev_height = height;

                last_verdict = ctx.verdict(height, &digest);
                match &last_verdict {
                    Verdict::BatchInvalid => {}
                    Verdict::Failed(bad) => {
                        for tx in &entry.txns {
                            if tx.value_id == value.id && !bad.contains(&tx.to_wire_core()) {
                                spends.push(tx);
                            }
                        }
                    }
                    Verdict::Clean => {
                        for tx in &entry.txns {
                            if tx.value_id == value.id {
                                spends.push(tx);
                            }
                        }
                    }
                }
            }

            if is_last {
                match mode {
                    VerifyMode::History { sender } => {
                        // The final run may carry the spend that gave the
                        // sender ownership, or be the sender's own trailing
                        // batches with no spend yet.
                        match spends.len() {
                            0 => {}
                            1 => current_owner = spends[0].recipient,
                            _ => {
                                return Err(VerifyError::DoubleSpent {
                                    value: value.id,
                                    owner: *owner,
                                })
                            }
                        }
                        if current_owner != sender {
                            if *owner == sender && !spends.is_empty() {
                                // The sender's own run already spent it.
                                return Err(VerifyError::DoubleSpent {
                                    value: value.id,
                                    owner: sender,
                                });
                            }
                            return Err(VerifyError::WrongOwner {
                                expected: current_owner,
                                got: sender,
                            });
                        }
                    }
                    VerifyMode::Spend { sender, spend } => {
                        if current_owner != sender {
                            return Err(VerifyError::WrongOwner {
                                expected: current_owner,
                                got: sender,
                            });
                        }
                        let spend_core = spend.to_wire_core();
                        match spends.first() {
                            None => {
                                // A checkpoint that already ruled the
                                // sealing batch out cannot be appealed via
                                // a late receipt.
                                if let (Verdict::BatchInvalid, Some(cp)) =
                                    (&last_verdict, ctx.checkpoint_height())
                                {
                                    if prev_height <= cp {
                                        return Err(VerifyError::CrossCc {
                                            height: prev_height,
                                            checkpoint: cp,
                                        });
                                    }
                                }
                                return Err(VerifyError::NotSpend {
                                    value: value.id,
                                    owner: *owner,
                                });
                            }
                            Some(first_spend) => {
                                if first_spend.to_wire_core() != spend_core {
                                    return Err(VerifyError::DoubleSpent {
                                        value: value.id,
                                        owner: *owner,
                                    });
                                }
                            }
                        }
                    }
                }
            } else {
                match spends.len() {
                    0 => {
                        return Err(VerifyError::NotSpend {
                            value: value.id,
                            owner: *owner,
                        })
                    }
                    1 => current_owner = spends[0].recipient,
                    _ => {
                        return Err(VerifyError::DoubleSpent {
                            value: value.id,
                            owner: *owner,
                        })
                    }
                }
            }
        }

        Ok(())
    }
}

/// Group entries into maximal consecutive same-owner runs.
fn group_runs(entries: &[ProofEntry]) -> Vec<(NodeId, Vec<&ProofEntry>)> {
    let mut runs: Vec<(NodeId, Vec<&ProofEntry>)> = Vec::new();
    for entry in entries {
        let owner = entry.owner().expect("caller rejects empty entries");
        match runs.last_mut() {
            Some((run_owner, run)) if *run_owner == owner => run.push(entry),
            _ => runs.push((owner, vec![entry])),
        }
    }
    runs
}
