//! Simulation parameters

use serde::{Deserialize, Serialize};

/// Every tunable of a run. Loaded from TOML by the CLI; defaults follow the
/// reference parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated duration in seconds
    pub duration: f64,

    /// Number of participating nodes (N)
    pub nodes: u64,

    /// Target committee size (M); sets the expected blocks per epoch
    pub committee: u64,

    /// Epoch length in seconds (T)
    pub epoch: f64,

    /// Mean initial values per node (Poisson λ)
    pub values_mean: f64,

    /// Transactions generated per node per second
    pub tx_rate: f64,

    /// Run the checkpoint-chain protocol
    pub use_cc: bool,

    /// Upper bound of the uniform network delay δ
    pub delay: f64,

    /// CC phase timeouts γ1..γ4
    pub gamma: [f64; 4],

    /// Per-round block interval target; defaults to `epoch / committee`
    pub round: Option<f64>,

    /// Seconds between metric CSV rows
    pub record_interval: f64,

    /// Seed for the run's random stream
    pub seed: u64,

    /// Storage unit sizes (KB): per on-chain digest record
    pub abs_size: f64,

    /// Per transaction
    pub tx_size: f64,

    /// Per checkpoint block
    pub ccb_size: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration: 50_300.0,
            nodes: 300,
            committee: 40,
            epoch: 2_000.0,
            values_mean: 8.0,
            tx_rate: 0.01,
            use_cc: true,
            delay: 2.0,
            gamma: [10.0, 10.0, 10.0, 10.0],
            round: None,
            record_interval: 1_000.0,
            seed: 42,
            abs_size: 0.2,
            tx_size: 62.5,
            ccb_size: 1_024.0,
        }
    }
}

impl SimConfig {
    /// Small fast run for local experiments.
    pub fn quick() -> Self {
        Self {
            duration: 5_000.0,
            nodes: 20,
            committee: 5,
            epoch: 500.0,
            values_mean: 4.0,
            tx_rate: 0.02,
            record_interval: 250.0,
            ..Default::default()
        }
    }

    /// Expected block interval for the whole network.
    pub fn round_target(&self) -> f64 {
        self.round.unwrap_or(self.epoch / self.committee as f64)
    }

    /// Mean of the per-node exponential mining timer.
    pub fn pow_mean(&self) -> f64 {
        self.round_target() * self.nodes as f64
    }

    /// Mean seconds between generated transactions.
    pub fn tx_interval_mean(&self) -> f64 {
        1.0 / self.tx_rate
    }

    /// Reject parameter sets the protocol cannot run under.
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes < 2 {
            return Err("at least two nodes are required".to_string());
        }
        if self.committee == 0 || self.committee > self.nodes {
            return Err("committee size must be in 1..=nodes".to_string());
        }
        if self.duration <= 0.0 || self.epoch <= 0.0 {
            return Err("duration and epoch must be positive".to_string());
        }
        if self.tx_rate <= 0.0 {
            return Err("tx rate must be positive".to_string());
        }
        if self.delay < 0.0 || self.gamma.iter().any(|g| *g < 0.0) {
            return Err("delays and timeouts cannot be negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        SimConfig::default().validate().unwrap();
        SimConfig::quick().validate().unwrap();
    }

    #[test]
    fn test_round_target_derived_from_epoch() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.round_target(), 2_000.0 / 40.0);
        assert_eq!(cfg.pow_mean(), 50.0 * 300.0);

        let cfg = SimConfig {
            round: Some(600.0),
            ..Default::default()
        };
        assert_eq!(cfg.round_target(), 600.0);
    }

    #[test]
    fn test_validate_rejects_bad_committee() {
        let cfg = SimConfig {
            nodes: 5,
            committee: 9,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let cfg = SimConfig {
            tx_rate: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
