//! Events delivered to a node

use serde::{Deserialize, Serialize};

use ezchain_cc::{CcMessage, GammaKind};
use ezchain_chain::AcBlock;
use ezchain_ledger::Receipt;

/// Everything the driver can deliver to a node: local timers and inbound
/// protocol messages. Batches never arrive as node events: they go into
/// the driver-owned pool and are drained by the sealing miner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Msg {
    /// Periodic transaction generation (Poisson)
    GenTx,
    /// Stochastic mining attempt (exponential)
    Pow,
    /// A freshly sealed account-chain block
    AcBlock(AcBlock),
    /// Per-transaction confirmation from a batch author
    Receipt(Receipt),
    /// Epoch boundary (T)
    EpochTimer,
    /// A CC phase deadline
    Gamma(GammaKind),
    /// Checkpoint-round traffic (cc_1..cc_5, signatures, appeals)
    Cc(CcMessage),
}

impl Msg {
    /// Account-chain blocks propagate instantaneously; everything else is
    /// delayed by the network model.
    pub fn is_instant(&self) -> bool {
        matches!(self, Msg::AcBlock(_))
    }

    /// Short name for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Msg::GenTx => "gen_tx",
            Msg::Pow => "pow",
            Msg::AcBlock(_) => "ac_block",
            Msg::Receipt(_) => "receipt",
            Msg::EpochTimer => "t_timer",
            Msg::Gamma(GammaKind::G1) => "gamma_1",
            Msg::Gamma(GammaKind::G2) => "gamma_2",
            Msg::Gamma(GammaKind::G3) => "gamma_3",
            Msg::Gamma(GammaKind::G4) => "gamma_4",
            Msg::Cc(m) => m.kind_name(),
        }
    }
}
