//! CSV report writers
//!
//! Two files per run: the periodic statistics (one row per record
//! interval, preceded by the run parameters) and the per-kind error
//! summary.

use std::fs;
use std::path::PathBuf;

use ezchain::RunSummary;
use ezchain_node::{SimConfig, SimMetrics, StatRecord};

use crate::config::OutputSettings;

/// Write the periodic statistics file; returns its path.
pub fn write_stats(
    output: &OutputSettings,
    cfg: &SimConfig,
    summary: &RunSummary,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(&output.out_dir)?;
    let path = output.out_dir.join(&output.stats_file);

    let mut content = String::new();
    content.push_str("duration,nodes,committee,epoch,values_mean,tx_rate,use_cc,delay,seed\n");
    content.push_str(&format!(
        "{},{},{},{},{},{},{},{},{}\n\n",
        cfg.duration,
        cfg.nodes,
        cfg.committee,
        cfg.epoch,
        cfg.values_mean,
        cfg.tx_rate,
        cfg.use_cc,
        cfg.delay,
        cfg.seed
    ));
    content.push_str(StatRecord::CSV_HEADER);
    content.push('\n');
    for record in &summary.records {
        content.push_str(&record.csv_row());
        content.push('\n');
    }

    fs::write(&path, content)?;
    Ok(path)
}

/// Write the per-kind error summary; returns its path.
pub fn write_errors(output: &OutputSettings, metrics: &SimMetrics) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(&output.out_dir)?;
    let path = output.out_dir.join(&output.errors_file);

    let mut content = String::from("kind,count\n");
    for (kind, count) in metrics.error_rows() {
        content.push_str(&format!("{kind},{count}\n"));
    }

    fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(dir: &std::path::Path) -> OutputSettings {
        OutputSettings {
            out_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_write_stats() {
        let dir = tempdir().unwrap();
        let summary = RunSummary {
            records: vec![StatRecord {
                time: 1_000.0,
                ccpt: 3,
                acc_storage: 1.5,
                ccc_storage: 0.0,
                pbc_storage: 12.5,
            }],
            events: 10,
            end_time: 1_500.0,
        };

        let path = write_stats(&settings(dir.path()), &SimConfig::quick(), &summary).unwrap();
        let content = fs::read_to_string(path).unwrap();

        assert!(content.contains(StatRecord::CSV_HEADER));
        assert!(content.contains("1000,3,1.5,0,12.5"));
    }

    #[test]
    fn test_write_errors() {
        let dir = tempdir().unwrap();
        let metrics = SimMetrics::new();
        metrics.record_error(ezchain::ledger::ErrorKind::DoubleSpent);

        let path = write_errors(&settings(dir.path()), &metrics).unwrap();
        let content = fs::read_to_string(path).unwrap();

        assert!(content.starts_with("kind,count\n"));
        assert!(content.contains("double_spent,1"));
        assert!(content.contains("proof_incomplete,0"));
    }
}
