//! Round state

use serde::{Deserialize, Serialize};

/// Where a committee member stands within the current CC round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CcState {
    /// No round in progress
    Idle,
    /// Broadcasting and collecting batch sets until the γ1 deadline
    Collecting,
    /// Non-leader waiting for the leader's proposal (γ2 armed)
    AwaitProposal,
    /// Leader gathering commit signatures over its proposal
    Signing,
    /// Non-leader signed the proposal, waiting for the commit broadcast
    AwaitBroadcast,
    /// Commit broadcast seen; appeals accepted until the γ3 deadline
    AppealWindow,
    /// Leader gathering signatures over the post-appeal block
    FinalSigning,
    /// Non-leader waiting for the finalised block (γ4 armed)
    AwaitFinal,
}

impl CcState {
    /// Is a round in progress at all?
    pub fn in_round(&self) -> bool {
        !matches!(self, CcState::Idle)
    }
}

impl std::fmt::Display for CcState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CcState::Idle => "idle",
            CcState::Collecting => "collecting",
            CcState::AwaitProposal => "await_proposal",
            CcState::Signing => "signing",
            CcState::AwaitBroadcast => "await_broadcast",
            CcState::AppealWindow => "appeal_window",
            CcState::FinalSigning => "final_signing",
            CcState::AwaitFinal => "await_final",
        };
        f.write_str(name)
    }
}
