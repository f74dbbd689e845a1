//! Run metrics
//!
//! One shared collection for the whole run: protocol counters, per-kind
//! verification-error counters, the communication-cost accumulator behind
//! CCPT, and the per-value transaction counts behind the personal-chain
//! storage gauge. Snapshots become CSV rows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use ezchain_ledger::{ErrorKind, ValueId};

use crate::config::SimConfig;

/// Atomic counter metric
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: u64) {
        let prev = self.value.fetch_add(n, Ordering::Relaxed);
        if prev.checked_add(n).is_none() {
            self.value.store(u64::MAX, Ordering::Relaxed);
        }
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metrics for one simulation run.
#[derive(Debug, Default)]
pub struct SimMetrics {
    /// Transactions created by `gen_tx`
    pub tx_generated: Counter,
    /// Transactions flushed into published batches
    pub tx_sent: Counter,
    /// Batches offered to the pool
    pub batches_published: Counter,
    /// Account-chain blocks sealed
    pub blocks_mined: Counter,
    /// Author records accumulated on chain (drives the AC storage gauge)
    pub digest_records: Counter,
    /// Receipts verified and installed
    pub receipts_delivered: Counter,
    /// Receipts dropped by verification
    pub receipts_rejected: Counter,
    /// CC rounds entered by some committee member
    pub cc_rounds_started: Counter,
    /// CC rounds that produced a finalised checkpoint
    pub cc_rounds_finalised: Counter,
    /// CC rounds that timed out at γ4
    pub cc_rounds_aborted: Counter,
    /// Communication cost accumulator (CCPT numerator)
    pub comm_cost: Counter,

    errors: [Counter; ErrorKind::ALL.len()],
    value_tx: RwLock<HashMap<ValueId, u64>>,
}

fn kind_slot(kind: ErrorKind) -> usize {
    ErrorKind::ALL
        .iter()
        .position(|k| *k == kind)
        .expect("every kind is listed in ALL")
}

impl SimMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one verification failure.
    pub fn record_error(&self, kind: ErrorKind) {
        self.errors[kind_slot(kind)].inc();
    }

    pub fn error_count(&self, kind: ErrorKind) -> u64 {
        self.errors[kind_slot(kind)].get()
    }

    /// `(kind, count)` rows for the error summary CSV.
    pub fn error_rows(&self) -> Vec<(&'static str, u64)> {
        ErrorKind::ALL
            .iter()
            .map(|k| (k.as_str(), self.error_count(*k)))
            .collect()
    }

    /// Track the proof length of one value.
    pub fn set_value_txs(&self, value: ValueId, count: u64) {
        self.value_tx.write().insert(value, count);
    }

    /// Sum of proof lengths across all values.
    pub fn value_tx_total(&self) -> u64 {
        self.value_tx.read().values().sum()
    }

    /// Communication cost per sent transaction.
    pub fn ccpt(&self) -> u64 {
        let sent = self.tx_sent.get();
        if sent == 0 {
            0
        } else {
            self.comm_cost.get() / sent
        }
    }
}

/// Shared metrics handle.
#[derive(Clone, Default)]
pub struct SharedMetrics(Arc<SimMetrics>);

impl SharedMetrics {
    pub fn new() -> Self {
        Self(Arc::new(SimMetrics::new()))
    }

    pub fn get(&self) -> &SimMetrics {
        &self.0
    }
}

/// One periodic statistics row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
    pub time: f64,
    pub ccpt: u64,
    pub acc_storage: f64,
    pub ccc_storage: f64,
    pub pbc_storage: f64,
}

impl StatRecord {
    /// Derive the row from the current counters and one node's chain view.
    pub fn snapshot(
        time: f64,
        metrics: &SimMetrics,
        cfg: &SimConfig,
        cc_chain_len: usize,
    ) -> Self {
        let pbc_mean = metrics.value_tx_total() as f64 / cfg.nodes as f64;
        Self {
            time,
            ccpt: metrics.ccpt(),
            acc_storage: cfg.abs_size * metrics.digest_records.get() as f64,
            ccc_storage: if cfg.use_cc {
                cfg.ccb_size * cc_chain_len as f64
            } else {
                0.0
            },
            pbc_storage: cfg.tx_size * pbc_mean,
        }
    }

    pub const CSV_HEADER: &'static str = "time,CCPT,ACC_storage,CCC_storage,PBC_storage";

    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.time, self.ccpt, self.acc_storage, self.ccc_storage, self.pbc_storage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_saturates() {
        let c = Counter::new();
        c.inc_by(u64::MAX - 1);
        c.inc_by(10);
        assert_eq!(c.get(), u64::MAX);
    }

    #[test]
    fn test_error_counting() {
        let m = SimMetrics::new();
        m.record_error(ErrorKind::DoubleSpent);
        m.record_error(ErrorKind::DoubleSpent);
        m.record_error(ErrorKind::NotSpend);

        assert_eq!(m.error_count(ErrorKind::DoubleSpent), 2);
        assert_eq!(m.error_count(ErrorKind::NotSpend), 1);
        assert_eq!(m.error_count(ErrorKind::CrossCc), 0);

        let rows = m.error_rows();
        assert_eq!(rows.len(), ErrorKind::ALL.len());
        assert!(rows.contains(&("double_spent", 2)));
    }

    #[test]
    fn test_ccpt_guards_division() {
        let m = SimMetrics::new();
        m.comm_cost.inc_by(100);
        assert_eq!(m.ccpt(), 0);
        m.tx_sent.inc_by(4);
        assert_eq!(m.ccpt(), 25);
    }

    #[test]
    fn test_value_tx_tracking_overwrites() {
        let m = SimMetrics::new();
        m.set_value_txs(7, 3);
        m.set_value_txs(7, 5);
        m.set_value_txs(9, 1);
        assert_eq!(m.value_tx_total(), 6);
    }

    #[test]
    fn test_stat_record_row() {
        let m = SimMetrics::new();
        m.tx_sent.inc_by(2);
        m.comm_cost.inc_by(10);
        m.digest_records.inc_by(4);
        m.set_value_txs(1, 6);

        let cfg = SimConfig {
            nodes: 3,
            abs_size: 0.5,
            tx_size: 10.0,
            ccb_size: 100.0,
            ..Default::default()
        };
        let row = StatRecord::snapshot(1_000.0, &m, &cfg, 2);
        assert_eq!(row.ccpt, 5);
        assert_eq!(row.acc_storage, 2.0);
        assert_eq!(row.ccc_storage, 200.0);
        assert_eq!(row.pbc_storage, 20.0);
        assert_eq!(row.csv_row(), "1000,5,2,200,20");
    }

    #[test]
    fn test_shared_metrics_is_one_collection() {
        let shared = SharedMetrics::new();
        let clone = shared.clone();
        shared.get().tx_generated.inc();
        assert_eq!(clone.get().tx_generated.get(), 1);
    }
}
