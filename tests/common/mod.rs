//! Shared wire builders for the integration tests: raw transactions,
//! block files, and undo files assembled byte by byte.

#![allow(dead_code)]

use sha2::{Digest, Sha256};

pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

pub fn display_hex(hash: &[u8; 32]) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

pub fn push_compact(buf: &mut Vec<u8>, n: u64) {
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

// ─── Transactions ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct TestInput {
    pub prev_txid: [u8; 32],
    pub prev_vout: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
}

impl TestInput {
    pub fn new(prev_txid: [u8; 32], prev_vout: u32, sequence: u32) -> Self {
        Self {
            prev_txid,
            prev_vout,
            script_sig: Vec::new(),
            sequence,
            witness: Vec::new(),
        }
    }

    pub fn coinbase(height_push: &[u8]) -> Self {
        Self {
            prev_txid: [0u8; 32],
            prev_vout: 0xFFFF_FFFF,
            script_sig: height_push.to_vec(),
            sequence: 0xFFFF_FFFF,
            witness: Vec::new(),
        }
    }
}

pub fn serialize_tx(
    version: i32,
    inputs: &[TestInput],
    outputs: &[(u64, Vec<u8>)],
    locktime: u32,
    segwit: bool,
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&version.to_le_bytes());
    if segwit {
        buf.push(0x00);
        buf.push(0x01);
    }
    push_compact(&mut buf, inputs.len() as u64);
    for input in inputs {
        buf.extend_from_slice(&input.prev_txid);
        buf.extend_from_slice(&input.prev_vout.to_le_bytes());
        push_compact(&mut buf, input.script_sig.len() as u64);
        buf.extend_from_slice(&input.script_sig);
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }
    push_compact(&mut buf, outputs.len() as u64);
    for (value, script) in outputs {
        buf.extend_from_slice(&value.to_le_bytes());
        push_compact(&mut buf, script.len() as u64);
        buf.extend_from_slice(script);
    }
    if segwit {
        for input in inputs {
            push_compact(&mut buf, input.witness.len() as u64);
            for item in &input.witness {
                push_compact(&mut buf, item.len() as u64);
                buf.extend_from_slice(item);
            }
        }
    }
    buf.extend_from_slice(&locktime.to_le_bytes());
    buf
}

/// txid = hash of the serialization without marker/flag/witness.
pub fn txid_of(
    version: i32,
    inputs: &[TestInput],
    outputs: &[(u64, Vec<u8>)],
    locktime: u32,
) -> [u8; 32] {
    sha256d(&serialize_tx(version, inputs, outputs, locktime, false))
}

// ─── Script templates ────────────────────────────────────────────────────────

pub fn p2pkh_script(hash: [u8; 20]) -> Vec<u8> {
    let mut s = vec![0x76, 0xa9, 0x14];
    s.extend_from_slice(&hash);
    s.extend_from_slice(&[0x88, 0xac]);
    s
}

pub fn p2wpkh_script(hash: [u8; 20]) -> Vec<u8> {
    let mut s = vec![0x00, 0x14];
    s.extend_from_slice(&hash);
    s
}

pub fn p2wsh_script(hash: [u8; 32]) -> Vec<u8> {
    let mut s = vec![0x00, 0x20];
    s.extend_from_slice(&hash);
    s
}

pub fn p2tr_script(key: [u8; 32]) -> Vec<u8> {
    let mut s = vec![0x51, 0x20];
    s.extend_from_slice(&key);
    s
}

// ─── Blocks and undo data ────────────────────────────────────────────────────

pub const MAINNET_MAGIC: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

pub fn merkle_root_of(txids: &[[u8; 32]]) -> [u8; 32] {
    let mut layer: Vec<[u8; 32]> = txids.to_vec();
    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            layer.push(*layer.last().unwrap());
        }
        layer = layer
            .chunks(2)
            .map(|pair| {
                let mut combined = Vec::with_capacity(64);
                combined.extend_from_slice(&pair[0]);
                combined.extend_from_slice(&pair[1]);
                sha256d(&combined)
            })
            .collect();
    }
    layer[0]
}

pub fn serialize_header(merkle_root: [u8; 32], timestamp: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(80);
    buf.extend_from_slice(&0x2000_0000i32.to_le_bytes());
    buf.extend_from_slice(&[0x00; 32]); // prev block hash
    buf.extend_from_slice(&merkle_root);
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(&[0xEA, 0x2F, 0x03, 0x17]); // bits
    buf.extend_from_slice(&0x1234_5678u32.to_le_bytes());
    buf
}

/// Assemble a block payload: header, tx count, raw transactions.
pub fn serialize_block(header: &[u8], raw_txs: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = header.to_vec();
    push_compact(&mut buf, raw_txs.len() as u64);
    for raw in raw_txs {
        buf.extend_from_slice(raw);
    }
    buf
}

/// Wrap payloads into a .dat buffer. rev files carry a 32-byte checksum
/// after each payload.
pub fn dat_file(payloads: &[Vec<u8>], trailing_checksum: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    for payload in payloads {
        buf.extend_from_slice(&MAINNET_MAGIC);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);
        if trailing_checksum {
            buf.extend_from_slice(&sha256d(payload));
        }
    }
    buf
}

pub fn xor_with(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .enumerate()
        .map(|(i, &b)| b ^ key[i % key.len()])
        .collect()
}

/// Bitcoin Core's 7-bit varint writer.
pub fn push_core_varint(buf: &mut Vec<u8>, mut n: u64) {
    let mut tmp = Vec::new();
    loop {
        let more = !tmp.is_empty();
        tmp.push((n & 0x7F) as u8 | if more { 0x80 } else { 0 });
        if n <= 0x7F {
            break;
        }
        n = (n >> 7) - 1;
    }
    tmp.reverse();
    buf.extend_from_slice(&tmp);
}

/// Bitcoin Core's CompressAmount.
pub fn compress_amount(mut n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut e = 0u64;
    while n % 10 == 0 && e < 9 {
        n /= 10;
        e += 1;
    }
    if e < 9 {
        let d = n % 10;
        n /= 10;
        1 + (n * 9 + d - 1) * 10 + e
    } else {
        1 + (n - 1) * 10 + 9
    }
}

/// One undo coin with a raw (code >= 6) compressed script.
pub fn push_undo_coin(buf: &mut Vec<u8>, height: u64, value: u64, script: &[u8]) {
    push_core_varint(buf, height << 1);
    if height > 0 {
        push_core_varint(buf, 0); // nVersion compatibility slot
    }
    push_core_varint(buf, compress_amount(value));
    push_core_varint(buf, script.len() as u64 + 6);
    buf.extend_from_slice(script);
}

/// Undo payload for one block: per non-coinbase tx, the prevout list.
pub fn serialize_block_undo(per_tx: &[Vec<(u64, u64, Vec<u8>)>]) -> Vec<u8> {
    let mut buf = Vec::new();
    push_compact(&mut buf, per_tx.len() as u64);
    for coins in per_tx {
        push_compact(&mut buf, coins.len() as u64);
        for (height, value, script) in coins {
            push_undo_coin(&mut buf, *height, *value, script);
        }
    }
    buf
}
