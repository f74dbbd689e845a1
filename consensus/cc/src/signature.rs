//! Signature shares and the threshold gate
//!
//! Shares are content-addressed by the hash of their wire form, so a
//! duplicated share from the same signer collapses to one entry. The
//! aggregate check here stands in for a real threshold scheme: it validates
//! that the collected shares are mutually consistent, and a failed check is
//! treated exactly like a missed quorum.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use ezchain_ledger::codec::{hash_hex, Cursor};
use ezchain_ledger::{NodeId, WireError};

/// Which gate a share commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigPhase {
    /// Over the leader's proposal (before the appeal window)
    Commit,
    /// Over the post-appeal block
    Final,
}

/// One committee member's signature share over a checkpoint draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigShare {
    /// Identifier of the checkpoint block being signed
    pub ccb_id: u64,
    /// Signing committee member
    pub signer: NodeId,
    /// Leader the share is addressed to
    pub recipient: NodeId,
    /// Simulated signing time
    pub time: f64,
    /// Gate this share belongs to
    pub phase: SigPhase,
}

impl SigShare {
    pub fn to_wire(&self) -> String {
        let phase = match self.phase {
            SigPhase::Commit => 0,
            SigPhase::Final => 1,
        };
        format!(
            "{},{},{},{},{}",
            self.ccb_id, self.signer, self.recipient, self.time, phase
        )
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut c = Cursor::new("signature", s);
        let ccb_id = c.u64_field(',')?;
        let signer = c.u64_field(',')?;
        let recipient = c.u64_field(',')?;
        let time = c.f64_field(',')?;
        let phase = match c.u64_rest()? {
            0 => SigPhase::Commit,
            1 => SigPhase::Final,
            other => {
                return Err(WireError::new(
                    "signature",
                    format!("unknown phase {other}"),
                ))
            }
        };
        Ok(Self {
            ccb_id,
            signer,
            recipient,
            time,
            phase,
        })
    }

    /// Content address of this share.
    pub fn content_hash(&self) -> String {
        hash_hex(self.to_wire().as_bytes())
    }
}

/// Shares collected by the leader for one gate.
#[derive(Debug, Default)]
pub struct SigSet {
    by_hash: HashMap<String, SigShare>,
}

impl SigSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a share; duplicates (by content hash) are dropped.
    pub fn insert(&mut self, share: SigShare) {
        self.by_hash.entry(share.content_hash()).or_insert(share);
    }

    pub fn clear(&mut self) {
        self.by_hash.clear();
    }

    pub fn shares(&self) -> impl Iterator<Item = &SigShare> {
        self.by_hash.values()
    }

    /// Number of distinct signers represented.
    pub fn signer_count(&self) -> usize {
        let mut signers: Vec<NodeId> = self.by_hash.values().map(|s| s.signer).collect();
        signers.sort_unstable();
        signers.dedup();
        signers.len()
    }

    /// Strict-majority gate: strictly more than half the committee signed.
    pub fn has_quorum(&self, committee_size: usize) -> bool {
        self.signer_count() > committee_size / 2
    }
}

/// Aggregate verification stand-in: every share must target the same block
/// and gate, and each signer may contribute once.
pub fn verify_threshold(set: &SigSet, ccb_id: u64, phase: SigPhase) -> bool {
    let mut signers: Vec<NodeId> = Vec::new();
    for share in set.shares() {
        if share.ccb_id != ccb_id || share.phase != phase {
            return false;
        }
        signers.push(share.signer);
    }
    let total = signers.len();
    signers.sort_unstable();
    signers.dedup();
    total > 0 && signers.len() == total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(signer: NodeId, time: f64) -> SigShare {
        SigShare {
            ccb_id: 9,
            signer,
            recipient: 2,
            time,
            phase: SigPhase::Commit,
        }
    }

    #[test]
    fn test_wire_round_trip() {
        let s = share(4, 12.5);
        let back = SigShare::from_wire(&s.to_wire()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_duplicate_share_collapses() {
        let mut set = SigSet::new();
        set.insert(share(1, 3.0));
        set.insert(share(1, 3.0));
        assert_eq!(set.signer_count(), 1);
    }

    #[test]
    fn test_quorum_is_strict_majority() {
        let mut set = SigSet::new();
        set.insert(share(0, 1.0));
        set.insert(share(1, 1.0));
        // 2 of 4 is not a quorum, 3 of 4 is.
        assert!(!set.has_quorum(4));
        set.insert(share(2, 1.0));
        assert!(set.has_quorum(4));
    }

    #[test]
    fn test_threshold_rejects_mixed_blocks() {
        let mut set = SigSet::new();
        set.insert(share(0, 1.0));
        let mut stray = share(1, 1.0);
        stray.ccb_id = 10;
        set.insert(stray);
        assert!(!verify_threshold(&set, 9, SigPhase::Commit));
    }

    #[test]
    fn test_threshold_rejects_double_signer() {
        let mut set = SigSet::new();
        set.insert(share(1, 1.0));
        set.insert(share(1, 2.0)); // same signer, different timestamp
        assert_eq!(set.signer_count(), 1);
        assert!(!verify_threshold(&set, 9, SigPhase::Commit));
    }

    #[test]
    fn test_threshold_accepts_consistent_set() {
        let mut set = SigSet::new();
        for signer in 0..3 {
            set.insert(share(signer, 1.0));
        }
        assert!(verify_threshold(&set, 9, SigPhase::Commit));
    }
}
