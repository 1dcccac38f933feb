use crate::error::{LensError, Result};

use super::reader::{ByteReader, ReadContext};
use super::{display_hash, sha256d};

pub const COINBASE_VOUT: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone)]
pub struct TxInput {
    /// Previous output's txid in internal byte order.
    pub prev_txid: [u8; 32],
    pub prev_vout: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    /// Witness stack; empty for legacy inputs. Individual items may be empty.
    pub witness: Vec<Vec<u8>>,
}

impl TxInput {
    pub fn is_coinbase(&self) -> bool {
        self.prev_txid == [0u8; 32] && self.prev_vout == COINBASE_VOUT
    }
}

#[derive(Debug, Clone)]
pub struct TxOutput {
    pub value_sats: u64,
    pub script_pubkey: Vec<u8>,
}

/// A decoded transaction with its identity hashes and byte-span accounting.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
    pub segwit: bool,
    /// txid in internal byte order (double SHA-256 of the non-witness form).
    pub txid: [u8; 32],
    /// wtxid in internal byte order; None for legacy transactions.
    pub wtxid: Option<[u8; 32]>,
    pub total_bytes: usize,
    pub non_witness_bytes: usize,
}

impl Transaction {
    /// Decode a standalone transaction. Rejects trailing bytes.
    pub fn decode(raw: &[u8]) -> Result<Transaction> {
        let mut reader = ByteReader::new(raw, ReadContext::Tx);
        let tx = Transaction::read(&mut reader)?;
        if reader.remaining() > 0 {
            return Err(LensError::InvalidTx(format!(
                "{} trailing bytes after transaction",
                reader.remaining()
            )));
        }
        Ok(tx)
    }

    pub fn from_hex(raw_hex: &str) -> Result<Transaction> {
        let raw = hex::decode(raw_hex.trim())
            .map_err(|e| LensError::InvalidTx(format!("invalid transaction hex: {e}")))?;
        Transaction::decode(&raw)
    }

    /// Decode one transaction from the reader's current position. Used both
    /// for standalone transactions and while walking a block body; the
    /// reader's context decides which error code truncation reports.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Transaction> {
        let version = r.read_i32_le()?;

        // SegWit marker (0x00) and flag (0x01) sit between the version and
        // the input count; a lone 0x00 without the flag is a zero-input
        // legacy transaction and gets rejected below.
        let segwit = r.peek(0) == Some(0x00) && r.peek(1) == Some(0x01);
        if segwit {
            r.read_bytes(2)?;
        }

        let input_count = r.read_compact_size()?;
        let mut inputs = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            let mut prev_txid = [0u8; 32];
            prev_txid.copy_from_slice(r.read_bytes(32)?);
            let prev_vout = r.read_u32_le()?;
            let script_len = r.read_compact_size()? as usize;
            let script_sig = r.read_bytes(script_len)?.to_vec();
            let sequence = r.read_u32_le()?;
            inputs.push(TxInput {
                prev_txid,
                prev_vout,
                script_sig,
                sequence,
                witness: Vec::new(),
            });
        }

        let output_count = r.read_compact_size()?;
        let mut outputs = Vec::with_capacity(output_count.min(1024) as usize);
        for _ in 0..output_count {
            let value_sats = r.read_u64_le()?;
            let script_len = r.read_compact_size()? as usize;
            let script_pubkey = r.read_bytes(script_len)?.to_vec();
            outputs.push(TxOutput {
                value_sats,
                script_pubkey,
            });
        }

        if segwit {
            // One witness stack per input, in input order.
            for input in &mut inputs {
                let item_count = r.read_compact_size()?;
                let mut items = Vec::with_capacity(item_count.min(1024) as usize);
                for _ in 0..item_count {
                    let item_len = r.read_compact_size()? as usize;
                    items.push(r.read_bytes(item_len)?.to_vec());
                }
                input.witness = items;
            }
        }

        let locktime = r.read_u32_le()?;

        if inputs.is_empty() {
            return Err(LensError::InvalidTx("transaction has no inputs".to_string()));
        }
        if outputs.is_empty() {
            return Err(LensError::InvalidTx(
                "transaction has no outputs".to_string(),
            ));
        }

        let mut tx = Transaction {
            version,
            inputs,
            outputs,
            locktime,
            segwit,
            txid: [0u8; 32],
            wtxid: None,
            total_bytes: 0,
            non_witness_bytes: 0,
        };

        let non_witness = tx.encode(false);
        let full = tx.encode(true);
        tx.txid = sha256d(&non_witness);
        tx.wtxid = if segwit { Some(sha256d(&full)) } else { None };
        tx.non_witness_bytes = non_witness.len();
        tx.total_bytes = full.len();

        Ok(tx)
    }

    /// Re-serialize the transaction. With `include_witness` the marker,
    /// flag, and witness stacks are emitted; this reproduces the input
    /// bytes exactly for any accepted transaction.
    pub fn encode(&self, include_witness: bool) -> Vec<u8> {
        let witness = include_witness && self.segwit;
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&self.version.to_le_bytes());
        if witness {
            buf.push(0x00);
            buf.push(0x01);
        }
        encode_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(&input.prev_txid);
            buf.extend_from_slice(&input.prev_vout.to_le_bytes());
            encode_compact_size(&mut buf, input.script_sig.len() as u64);
            buf.extend_from_slice(&input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        encode_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value_sats.to_le_bytes());
            encode_compact_size(&mut buf, output.script_pubkey.len() as u64);
            buf.extend_from_slice(&output.script_pubkey);
        }
        if witness {
            for input in &self.inputs {
                encode_compact_size(&mut buf, input.witness.len() as u64);
                for item in &input.witness {
                    encode_compact_size(&mut buf, item.len() as u64);
                    buf.extend_from_slice(item);
                }
            }
        }
        buf.extend_from_slice(&self.locktime.to_le_bytes());
        buf
    }

    pub fn txid_display(&self) -> String {
        display_hash(&self.txid)
    }

    pub fn wtxid_display(&self) -> Option<String> {
        self.wtxid.as_ref().map(display_hash)
    }

    pub fn witness_bytes(&self) -> usize {
        self.total_bytes - self.non_witness_bytes
    }

    /// BIP141: weight = 3 × non-witness bytes + total bytes.
    pub fn weight(&self) -> u64 {
        3 * self.non_witness_bytes as u64 + self.total_bytes as u64
    }

    /// Virtual bytes: ceil(weight / 4).
    pub fn vbytes(&self) -> u64 {
        self.weight().div_ceil(4)
    }

    pub fn total_output_sats(&self) -> u64 {
        self.outputs.iter().map(|o| o.value_sats).sum()
    }
}

pub fn encode_compact_size(buf: &mut Vec<u8>, n: u64) {
    if n < 0xFD {
        buf.push(n as u8);
    } else if n <= 0xFFFF {
        buf.push(0xFD);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xFFFF_FFFF {
        buf.push(0xFE);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&n.to_le_bytes());
    }
}
