use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::report::types::{BlockReport, TxReport};

const OUT_DIR: &str = "out";

fn write_report<T: serde::Serialize>(file_name: &str, report: &T) -> Result<PathBuf> {
    fs::create_dir_all(OUT_DIR).context("creating output directory")?;
    let path = PathBuf::from(OUT_DIR).join(file_name);
    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Write a transaction report to `out/<txid>.json`.
pub fn write_tx_report(report: &TxReport) -> Result<PathBuf> {
    write_report(&format!("{}.json", report.txid), report)
}

/// Write a block report to `out/<block_hash>.json`.
pub fn write_block_report(report: &BlockReport) -> Result<PathBuf> {
    write_report(&format!("{}.json", report.block_header.block_hash), report)
}

/// One-line block summary on stderr.
pub fn print_block_summary(report: &BlockReport) {
    let when = DateTime::<Utc>::from_timestamp(report.block_header.timestamp as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| format!("timestamp {}", report.block_header.timestamp));

    eprintln!(
        "block {} height {} ({when}): {} txs, {} sats in fees, merkle {}",
        report.block_header.block_hash,
        report.coinbase.bip34_height,
        report.tx_count,
        report.block_stats.total_fees_sats,
        if report.block_header.merkle_root_valid {
            "ok"
        } else {
            "MISMATCH"
        }
    );
}
