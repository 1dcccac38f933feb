//! Accounting, policy, and report assembly: turns decoded transactions and
//! blocks into the JSON report schema.

use std::collections::{BTreeMap, HashMap};

use crate::decode::block::{decode_block_files, Block};
use crate::decode::tx::Transaction;
use crate::decode::{display_hash, parse_display_hash, Prevout};
use crate::error::{LensError, Result};
use crate::script::address::address_from_script;
use crate::script::classify::{
    classify_input, classify_output, op_return_payload, op_return_protocol, InputType, ScriptType,
};
use crate::script::disasm::disassemble;

use super::types::*;
use super::warnings::detect_warnings;

const LOCKTIME_THRESHOLD: u32 = 500_000_000;
const SEQUENCE_FINAL_RBF_BOUND: u32 = 0xFFFF_FFFE;
const SEQUENCE_DISABLE_FLAG: u32 = 1 << 31;
const SEQUENCE_TYPE_FLAG: u32 = 1 << 22;
const SEQUENCE_VALUE_MASK: u32 = 0x0000_FFFF;

/// Analyze a single transaction from a request fixture: decode the raw
/// hex, pair every input with its prevout, and assemble the full report.
pub fn analyze_transaction(request: &TxRequest) -> Result<TxReport> {
    if request.raw_tx.is_empty() {
        return Err(LensError::InvalidFixture(
            "missing 'raw_tx' field".to_string(),
        ));
    }
    let tx = Transaction::from_hex(&request.raw_tx)?;
    let prevouts = match_prevouts(&tx, &request.prevouts)?;
    build_tx_report(&tx, Some(&prevouts), &request.network)
}

/// Analyze a blk/rev/xor triple. One report per block in file order. In
/// strict mode a merkle mismatch aborts with an error instead of being
/// carried in the report.
pub fn analyze_block_files(
    blk_data: &[u8],
    rev_data: &[u8],
    xor_key: &[u8],
    strict: bool,
) -> Result<Vec<BlockReport>> {
    decode_block_files(blk_data, rev_data, xor_key)?
        .into_iter()
        .map(|(block, undo)| build_block_report(&block, &undo, strict))
        .collect()
}

/// Pair request prevouts to inputs by (txid, vout). Missing, duplicate,
/// or extraneous records are all rejected.
fn match_prevouts(tx: &Transaction, fixtures: &[PrevoutFixture]) -> Result<Vec<Prevout>> {
    let mut by_outpoint: HashMap<([u8; 32], u32), Prevout> = HashMap::new();
    for fixture in fixtures {
        let txid = parse_display_hash(&fixture.txid).ok_or_else(|| {
            LensError::InvalidFixture(format!("prevout txid is not a 32-byte hash: {}", fixture.txid))
        })?;
        let script_pubkey = hex::decode(&fixture.script_pubkey_hex).map_err(|e| {
            LensError::InvalidFixture(format!(
                "prevout {}:{} has invalid script hex: {e}",
                fixture.txid, fixture.vout
            ))
        })?;
        let duplicate = by_outpoint
            .insert(
                (txid, fixture.vout),
                Prevout {
                    value_sats: fixture.value_sats,
                    script_pubkey,
                },
            )
            .is_some();
        if duplicate {
            return Err(LensError::InconsistentPrevouts(format!(
                "duplicate prevout {}:{}",
                fixture.txid, fixture.vout
            )));
        }
    }

    let mut matched = Vec::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let prevout = by_outpoint
            .get(&(input.prev_txid, input.prev_vout))
            .ok_or_else(|| {
                LensError::InconsistentPrevouts(format!(
                    "missing prevout for input {}:{}",
                    display_hash(&input.prev_txid),
                    input.prev_vout
                ))
            })?;
        matched.push(prevout.clone());
    }

    if by_outpoint.len() != tx.inputs.len() {
        return Err(LensError::InconsistentPrevouts(format!(
            "{} prevouts supplied for {} inputs",
            by_outpoint.len(),
            tx.inputs.len()
        )));
    }

    Ok(matched)
}

/// Assemble the report for one transaction. `prevouts` is None for the
/// coinbase, which has no fee and whose input stays unclassified.
fn build_tx_report(
    tx: &Transaction,
    prevouts: Option<&[Prevout]>,
    network: &str,
) -> Result<TxReport> {
    let total_output_sats = tx.total_output_sats();
    let total_input_sats = prevouts
        .map(|ps| ps.iter().map(|p| p.value_sats).sum())
        .unwrap_or(0);

    let fee_sats = match prevouts {
        Some(_) => {
            if total_input_sats < total_output_sats {
                return Err(LensError::InvalidTx(format!(
                    "outputs exceed inputs: {total_output_sats} > {total_input_sats}"
                )));
            }
            total_input_sats - total_output_sats
        }
        None => 0,
    };

    let vbytes = tx.vbytes();
    let fee_rate = if vbytes > 0 {
        fee_sats as f64 / vbytes as f64
    } else {
        0.0
    };

    let rbf_signaling = tx
        .inputs
        .iter()
        .any(|i| i.sequence < SEQUENCE_FINAL_RBF_BOUND);

    let mut vin = Vec::with_capacity(tx.inputs.len());
    for (i, input) in tx.inputs.iter().enumerate() {
        let (script_type, address, prevout_report) = match prevouts {
            Some(ps) => {
                let prevout = &ps[i];
                let script_type =
                    classify_input(&input.script_sig, &input.witness, &prevout.script_pubkey);
                let prevout_type = classify_output(&prevout.script_pubkey);
                let address = address_from_script(prevout_type, &prevout.script_pubkey);
                let report = PrevoutReport {
                    value_sats: prevout.value_sats,
                    script_pubkey_hex: hex::encode(&prevout.script_pubkey),
                };
                (script_type, address, report)
            }
            None => (
                InputType::Unknown,
                None,
                PrevoutReport {
                    value_sats: 0,
                    script_pubkey_hex: String::new(),
                },
            ),
        };

        let witness_script_asm = if script_type.reveals_witness_script() {
            match input.witness.last() {
                Some(script) => Some(disasm_checked(script, "witness script")?),
                None => None,
            }
        } else {
            None
        };

        vin.push(VinReport {
            txid: display_hash(&input.prev_txid),
            vout: input.prev_vout,
            sequence: input.sequence,
            script_sig_hex: hex::encode(&input.script_sig),
            script_asm: disasm_checked(&input.script_sig, "scriptSig")?,
            witness: input.witness.iter().map(hex::encode).collect(),
            script_type,
            address,
            prevout: prevout_report,
            relative_timelock: relative_timelock(input.sequence),
            witness_script_asm,
        });
    }

    let mut vout = Vec::with_capacity(tx.outputs.len());
    for (n, output) in tx.outputs.iter().enumerate() {
        let script_type = classify_output(&output.script_pubkey);
        let op_return = if script_type == ScriptType::OpReturn {
            let payload = op_return_payload(&output.script_pubkey)
                .map_err(|e| LensError::InvalidTx(format!("OP_RETURN output {n}: {e}")))?;
            Some(OpReturnInfo {
                op_return_data_hex: hex::encode(&payload),
                op_return_data_utf8: String::from_utf8(payload.clone()).ok(),
                op_return_protocol: op_return_protocol(&payload).to_string(),
            })
        } else {
            None
        };

        vout.push(VoutReport {
            n: n as u32,
            value_sats: output.value_sats,
            script_pubkey_hex: hex::encode(&output.script_pubkey),
            script_asm: disasm_checked(&output.script_pubkey, "scriptPubKey")?,
            script_type,
            address: address_from_script(script_type, &output.script_pubkey),
            op_return,
        });
    }

    let fee_rate_sat_vb = round2(fee_rate);
    let warnings = detect_warnings(fee_sats, fee_rate, &vout, rbf_signaling);

    Ok(TxReport {
        ok: true,
        network: network.to_string(),
        segwit: tx.segwit,
        txid: tx.txid_display(),
        wtxid: tx.wtxid_display(),
        version: tx.version,
        locktime: tx.locktime,
        size_bytes: tx.total_bytes as u64,
        weight: tx.weight(),
        vbytes,
        total_input_sats,
        total_output_sats,
        fee_sats,
        fee_rate_sat_vb,
        rbf_signaling,
        locktime_type: locktime_type(tx.locktime),
        locktime_value: tx.locktime,
        segwit_savings: segwit_savings(tx),
        vin,
        vout,
        warnings,
    })
}

fn build_block_report(block: &Block, undo: &[Vec<Prevout>], strict: bool) -> Result<BlockReport> {
    let merkle_root_valid = block.merkle_root_valid();
    if strict && !merkle_root_valid {
        return Err(LensError::MerkleMismatch {
            header: display_hash(&block.header.merkle_root),
            computed: display_hash(&block.computed_merkle_root),
        });
    }

    let bip34_height = block.coinbase_height()?;
    let coinbase = block.coinbase();

    let mut transactions = Vec::with_capacity(block.transactions.len());
    for (i, tx) in block.transactions.iter().enumerate() {
        let prevouts = if i == 0 {
            None
        } else {
            let coins = &undo[i - 1];
            if coins.len() != tx.inputs.len() {
                return Err(LensError::InvalidUndo(format!(
                    "transaction {i} has {} inputs but {} undo records",
                    tx.inputs.len(),
                    coins.len()
                )));
            }
            Some(coins.as_slice())
        };
        transactions.push(build_tx_report(tx, prevouts, "mainnet")?);
    }

    let total_fees_sats: u64 = transactions.iter().skip(1).map(|r| r.fee_sats).sum();
    let total_weight: u64 = transactions.iter().map(|r| r.weight).sum();
    let spending_vbytes: u64 = transactions.iter().skip(1).map(|r| r.vbytes).sum();
    let avg_fee_rate_sat_vb = if spending_vbytes > 0 {
        round2(total_fees_sats as f64 / spending_vbytes as f64)
    } else {
        0.0
    };

    let mut script_type_summary: BTreeMap<String, u64> = BTreeMap::new();
    for report in &transactions {
        for output in &report.vout {
            *script_type_summary
                .entry(output.script_type.tag().to_string())
                .or_insert(0) += 1;
        }
    }

    Ok(BlockReport {
        ok: true,
        mode: "block",
        block_header: BlockHeaderReport {
            version: block.header.version,
            prev_block_hash: display_hash(&block.header.prev_block_hash),
            merkle_root: display_hash(&block.header.merkle_root),
            merkle_root_valid,
            timestamp: block.header.timestamp,
            bits: block.header.bits_display(),
            nonce: block.header.nonce,
            block_hash: display_hash(&block.header.block_hash),
        },
        tx_count: block.transactions.len() as u64,
        coinbase: CoinbaseReport {
            bip34_height,
            coinbase_script_hex: hex::encode(&coinbase.inputs[0].script_sig),
            total_output_sats: coinbase.total_output_sats(),
        },
        transactions,
        block_stats: BlockStats {
            total_fees_sats,
            total_weight,
            avg_fee_rate_sat_vb,
            script_type_summary,
        },
    })
}

fn disasm_checked(script: &[u8], what: &str) -> Result<String> {
    disassemble(script).map_err(|e| LensError::InvalidTx(format!("{what}: {e}")))
}

fn locktime_type(locktime: u32) -> LocktimeType {
    if locktime == 0 {
        LocktimeType::None
    } else if locktime < LOCKTIME_THRESHOLD {
        LocktimeType::BlockHeight
    } else {
        LocktimeType::UnixTimestamp
    }
}

/// BIP68: bit 31 disables the relative lock; bit 22 selects 512-second
/// units over blocks; the low 16 bits carry the value.
fn relative_timelock(sequence: u32) -> RelativeTimelock {
    if sequence & SEQUENCE_DISABLE_FLAG != 0 {
        return RelativeTimelock {
            enabled: false,
            kind: None,
            value: None,
        };
    }
    let value = (sequence & SEQUENCE_VALUE_MASK) as u64;
    if sequence & SEQUENCE_TYPE_FLAG != 0 {
        RelativeTimelock {
            enabled: true,
            kind: Some(RelativeTimelockKind::Time),
            value: Some(value * 512),
        }
    } else {
        RelativeTimelock {
            enabled: true,
            kind: Some(RelativeTimelockKind::Blocks),
            value: Some(value),
        }
    }
}

fn segwit_savings(tx: &Transaction) -> Option<SegwitSavings> {
    if !tx.segwit {
        return None;
    }
    let weight_actual = tx.weight();
    let weight_if_legacy = 4 * tx.total_bytes as u64;
    let savings_pct = round2((1.0 - weight_actual as f64 / weight_if_legacy as f64) * 100.0);
    Some(SegwitSavings {
        witness_bytes: tx.witness_bytes() as u64,
        non_witness_bytes: tx.non_witness_bytes as u64,
        total_bytes: tx.total_bytes as u64,
        weight_actual,
        weight_if_legacy,
        savings_pct,
    })
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
