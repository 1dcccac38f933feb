use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::script::classify::{InputType, ScriptType};

// ─── Request envelope (transaction mode) ─────────────────────────────────────

/// Single-transaction analysis request: the raw hex plus one prevout
/// record per input, matched by outpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TxRequest {
    #[serde(default = "default_network")]
    pub network: String,
    pub raw_tx: String,
    #[serde(default)]
    pub prevouts: Vec<PrevoutFixture>,
}

fn default_network() -> String {
    "mainnet".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrevoutFixture {
    /// Display-order (reversed) hex txid.
    pub txid: String,
    pub vout: u32,
    pub value_sats: u64,
    pub script_pubkey_hex: String,
}

// ─── Transaction report ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocktimeType {
    None,
    BlockHeight,
    UnixTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeTimelockKind {
    Blocks,
    Time,
}

/// BIP68 interpretation of an input's sequence field.
#[derive(Debug, Clone, Serialize)]
pub struct RelativeTimelock {
    pub enabled: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<RelativeTimelockKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegwitSavings {
    pub witness_bytes: u64,
    pub non_witness_bytes: u64,
    pub total_bytes: u64,
    pub weight_actual: u64,
    pub weight_if_legacy: u64,
    pub savings_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    HighFee,
    DustOutput,
    UnknownOutputScript,
    RbfSignaling,
}

#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub code: WarningCode,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrevoutReport {
    pub value_sats: u64,
    pub script_pubkey_hex: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VinReport {
    pub txid: String,
    pub vout: u32,
    pub sequence: u32,
    pub script_sig_hex: String,
    pub script_asm: String,
    pub witness: Vec<String>,
    pub script_type: InputType,
    pub address: Option<String>,
    pub prevout: PrevoutReport,
    pub relative_timelock: RelativeTimelock,
    /// Present only when the input reveals its witness script
    /// (p2wsh and p2sh-p2wsh spends).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness_script_asm: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpReturnInfo {
    pub op_return_data_hex: String,
    pub op_return_data_utf8: Option<String>,
    pub op_return_protocol: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoutReport {
    pub n: u32,
    pub value_sats: u64,
    pub script_pubkey_hex: String,
    pub script_asm: String,
    pub script_type: ScriptType,
    pub address: Option<String>,
    #[serde(flatten)]
    pub op_return: Option<OpReturnInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TxReport {
    pub ok: bool,
    pub network: String,
    pub segwit: bool,
    pub txid: String,
    pub wtxid: Option<String>,
    pub version: i32,
    pub locktime: u32,
    pub size_bytes: u64,
    pub weight: u64,
    pub vbytes: u64,
    pub total_input_sats: u64,
    pub total_output_sats: u64,
    pub fee_sats: u64,
    pub fee_rate_sat_vb: f64,
    pub rbf_signaling: bool,
    pub locktime_type: LocktimeType,
    pub locktime_value: u32,
    pub segwit_savings: Option<SegwitSavings>,
    pub vin: Vec<VinReport>,
    pub vout: Vec<VoutReport>,
    pub warnings: Vec<Warning>,
}

// ─── Block report ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BlockHeaderReport {
    pub version: i32,
    pub prev_block_hash: String,
    pub merkle_root: String,
    pub merkle_root_valid: bool,
    pub timestamp: u32,
    pub bits: String,
    pub nonce: u32,
    pub block_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinbaseReport {
    pub bip34_height: u64,
    pub coinbase_script_hex: String,
    pub total_output_sats: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockStats {
    pub total_fees_sats: u64,
    pub total_weight: u64,
    pub avg_fee_rate_sat_vb: f64,
    /// Output count per script type across the whole block.
    pub script_type_summary: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockReport {
    pub ok: bool,
    pub mode: &'static str,
    pub block_header: BlockHeaderReport,
    pub tx_count: u64,
    pub coinbase: CoinbaseReport,
    pub transactions: Vec<TxReport>,
    pub block_stats: BlockStats,
}

/// Envelope returned by block mode: one report per block in file order.
#[derive(Debug, Clone, Serialize)]
pub struct BlockFileReport {
    pub ok: bool,
    pub mode: &'static str,
    pub blocks: Vec<BlockReport>,
}
