//! Walking blk/rev file buffers: XOR unmasking, magic/length record
//! framing, header decoding, and merkle verification.

use crate::error::{LensError, Result};

use super::merkle::merkle_root;
use super::reader::{ByteReader, ReadContext};
use super::tx::Transaction;
use super::undo::decode_block_undo;
use super::{sha256d, Prevout};

pub const HEADER_BYTES: usize = 80;

/// XOR every byte with the cycled key. An empty or all-zero key leaves the
/// buffer untouched.
pub fn xor_unmask(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() || key.iter().all(|&b| b == 0) {
        return data.to_vec();
    }
    data.iter()
        .enumerate()
        .map(|(i, &b)| b ^ key[i % key.len()])
        .collect()
}

/// Split a .dat buffer into its `magic(4) || length(u32 LE) || payload`
/// records. Iteration stops cleanly when fewer than 8 bytes remain or the
/// magic is all-zero (Core zero-pads preallocated files); any non-zero
/// magic is accepted. rev files append a 32-byte checksum after each
/// payload, which `trailing_checksum` skips.
pub fn split_records<'a>(
    data: &'a [u8],
    trailing_checksum: bool,
    ctx: ReadContext,
) -> Result<Vec<&'a [u8]>> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos + 8 <= data.len() {
        let magic = &data[pos..pos + 4];
        if magic.iter().all(|&b| b == 0) {
            break;
        }
        let len = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
            as usize;
        let start = pos + 8;
        let end = start + len;
        if end > data.len() {
            let err = format!(
                "truncated record at offset {start}: need {len} bytes, have {}",
                data.len() - start
            );
            return Err(match ctx {
                ReadContext::Undo => LensError::InvalidUndo(err),
                _ => LensError::InvalidBlock(err),
            });
        }
        records.push(&data[start..end]);
        pos = end;
        if trailing_checksum {
            pos += 32;
        }
    }
    Ok(records)
}

/// The 80-byte block header with its derived hash. Hashes are kept in
/// internal byte order and reversed only for display.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: [u8; 4],
    pub nonce: u32,
    pub block_hash: [u8; 32],
}

impl BlockHeader {
    pub fn decode(data: &[u8]) -> Result<BlockHeader> {
        if data.len() < HEADER_BYTES {
            return Err(LensError::InvalidBlock(format!(
                "block header too short: {} bytes",
                data.len()
            )));
        }
        let mut r = ByteReader::new(&data[..HEADER_BYTES], ReadContext::Block);
        let version = r.read_i32_le()?;
        let mut prev_block_hash = [0u8; 32];
        prev_block_hash.copy_from_slice(r.read_bytes(32)?);
        let mut merkle = [0u8; 32];
        merkle.copy_from_slice(r.read_bytes(32)?);
        let timestamp = r.read_u32_le()?;
        let mut bits = [0u8; 4];
        bits.copy_from_slice(r.read_bytes(4)?);
        let nonce = r.read_u32_le()?;

        Ok(BlockHeader {
            version,
            prev_block_hash,
            merkle_root: merkle,
            timestamp,
            bits,
            nonce,
            block_hash: sha256d(&data[..HEADER_BYTES]),
        })
    }

    /// `bits` as eight hex characters, reversed into display order.
    pub fn bits_display(&self) -> String {
        let mut reversed = self.bits;
        reversed.reverse();
        hex::encode(reversed)
    }
}

/// A decoded block: header, transactions in block order (coinbase first),
/// and the merkle root recomputed from the txids.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub computed_merkle_root: [u8; 32],
}

impl Block {
    pub fn decode(payload: &[u8]) -> Result<Block> {
        let header = BlockHeader::decode(payload)?;

        let mut r = ByteReader::new(payload, ReadContext::Block);
        r.read_bytes(HEADER_BYTES)?;
        let tx_count = r.read_compact_size()?;
        if tx_count == 0 {
            return Err(LensError::InvalidBlock("block has no transactions".to_string()));
        }
        let mut transactions = Vec::with_capacity(tx_count.min(16_384) as usize);
        for _ in 0..tx_count {
            transactions.push(Transaction::read(&mut r)?);
        }

        let txids: Vec<[u8; 32]> = transactions.iter().map(|tx| tx.txid).collect();
        let computed_merkle_root = merkle_root(&txids);

        Ok(Block {
            header,
            transactions,
            computed_merkle_root,
        })
    }

    pub fn merkle_root_valid(&self) -> bool {
        self.computed_merkle_root == self.header.merkle_root
    }

    pub fn coinbase(&self) -> &Transaction {
        &self.transactions[0]
    }

    /// Validate the coinbase shape and decode its BIP34 height. The first
    /// transaction must have exactly one input spending the null outpoint,
    /// and its scriptSig must start with a minimal height push.
    pub fn coinbase_height(&self) -> Result<u64> {
        let coinbase = self.coinbase();
        if coinbase.inputs.len() != 1 {
            return Err(LensError::InvalidCoinbase(format!(
                "coinbase has {} inputs",
                coinbase.inputs.len()
            )));
        }
        let input = &coinbase.inputs[0];
        if !input.is_coinbase() {
            return Err(LensError::InvalidCoinbase(
                "coinbase outpoint is not the null outpoint".to_string(),
            ));
        }
        decode_bip34_height(&input.script_sig)
    }
}

/// Decode the height push that BIP34 requires at the front of the
/// coinbase scriptSig: OP_0, OP_1..OP_16, or a direct push of up to eight
/// bytes read as a signed little-endian number.
pub fn decode_bip34_height(script_sig: &[u8]) -> Result<u64> {
    let Some(&first) = script_sig.first() else {
        return Err(LensError::InvalidCoinbase(
            "coinbase scriptSig is empty".to_string(),
        ));
    };

    match first {
        0x00 => Ok(0),
        0x51..=0x60 => Ok((first - 0x50) as u64),
        1..=8 => {
            let len = first as usize;
            if script_sig.len() < 1 + len {
                return Err(LensError::InvalidCoinbase(format!(
                    "height push wants {len} bytes, scriptSig has {}",
                    script_sig.len() - 1
                )));
            }
            let bytes = &script_sig[1..1 + len];
            if bytes[len - 1] & 0x80 != 0 {
                return Err(LensError::InvalidCoinbase(
                    "negative BIP34 height".to_string(),
                ));
            }
            let mut height: u64 = 0;
            for (i, &b) in bytes.iter().enumerate() {
                height |= (b as u64) << (8 * i);
            }
            Ok(height)
        }
        _ => Err(LensError::InvalidCoinbase(format!(
            "coinbase scriptSig does not start with a height push (0x{first:02x})"
        ))),
    }
}

/// Unmask both buffers and pair every block with its undo prevouts, in
/// file order. Each rev record must cover exactly the block's non-coinbase
/// transactions.
pub fn decode_block_files(
    blk_data: &[u8],
    rev_data: &[u8],
    xor_key: &[u8],
) -> Result<Vec<(Block, Vec<Vec<Prevout>>)>> {
    let blk = xor_unmask(blk_data, xor_key);
    let rev = xor_unmask(rev_data, xor_key);

    let block_records = split_records(&blk, false, ReadContext::Block)?;
    if block_records.is_empty() {
        return Err(LensError::InvalidBlock(
            "no block records in blk data".to_string(),
        ));
    }
    let undo_records = split_records(&rev, true, ReadContext::Undo)?;
    if undo_records.len() < block_records.len() {
        return Err(LensError::InvalidUndo(format!(
            "{} undo records for {} blocks",
            undo_records.len(),
            block_records.len()
        )));
    }

    let mut out = Vec::with_capacity(block_records.len());
    for (block_payload, undo_payload) in block_records.iter().zip(undo_records.iter()) {
        let block = Block::decode(block_payload)?;
        let undo = decode_block_undo(undo_payload, block.transactions.len() - 1)?;
        out.push((block, undo));
    }
    Ok(out)
}
