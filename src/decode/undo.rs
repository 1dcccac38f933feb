//! Decoder for Bitcoin Core undo records (rev*.dat payloads).
//!
//! Undo data uses two encodings that are not part of the wire protocol:
//! Bitcoin Core's 7-bit varint, and the amount/script compression from
//! its coin database. Both are reimplemented here exactly.

use crate::error::{LensError, Result};

use super::reader::{ByteReader, ReadContext};
use super::Prevout;

/// Bitcoin Core varint: 7 data bits per byte, high bit marks continuation,
/// and each continuation increments the accumulator by one. Not the same
/// encoding as the transaction compact size.
pub fn read_core_varint(r: &mut ByteReader<'_>) -> Result<u64> {
    let mut n: u64 = 0;
    loop {
        let byte = r.read_u8()?;
        if n > (u64::MAX >> 7) {
            return Err(LensError::InvalidUndo(
                "varint overflows 64 bits".to_string(),
            ));
        }
        n = (n << 7) | (byte & 0x7F) as u64;
        if byte & 0x80 != 0 {
            n = n
                .checked_add(1)
                .ok_or_else(|| LensError::InvalidUndo("varint overflows 64 bits".to_string()))?;
        } else {
            return Ok(n);
        }
    }
}

/// Undo amounts are stored compressed; this is the inverse of Bitcoin
/// Core's CompressAmount.
pub fn decompress_amount(x: u64) -> u64 {
    if x == 0 {
        return 0;
    }
    let mut x = x - 1;
    let mut e = x % 10;
    x /= 10;
    let mut n = if e < 9 {
        let d = (x % 9) + 1;
        x /= 9;
        x * 10 + d
    } else {
        x + 1
    };
    while e > 0 {
        n *= 10;
        e -= 1;
    }
    n
}

/// Decompress a scriptPubKey. The leading size code selects a template:
/// 0/1 rebuild p2pkh/p2sh from a hash160, 2..5 rebuild a pay-to-pubkey
/// script around a 33-byte SEC-compressed key, and 6+ carry a raw script
/// of `code - 6` bytes.
pub fn decompress_script(r: &mut ByteReader<'_>) -> Result<Vec<u8>> {
    let code = read_core_varint(r)?;
    match code {
        0 => {
            let hash = r.read_bytes(20)?;
            let mut script = Vec::with_capacity(25);
            script.extend_from_slice(&[0x76, 0xa9, 0x14]);
            script.extend_from_slice(hash);
            script.extend_from_slice(&[0x88, 0xac]);
            Ok(script)
        }
        1 => {
            let hash = r.read_bytes(20)?;
            let mut script = Vec::with_capacity(23);
            script.extend_from_slice(&[0xa9, 0x14]);
            script.extend_from_slice(hash);
            script.push(0x87);
            Ok(script)
        }
        2..=5 => {
            // 2/3 are even/odd compressed keys; 4/5 mark keys that were
            // stored uncompressed on chain but compress to the same form
            let parity = if code < 4 { code } else { code - 2 } as u8;
            let x = r.read_bytes(32)?;
            let mut script = Vec::with_capacity(35);
            script.push(33);
            script.push(parity);
            script.extend_from_slice(x);
            script.push(0xac);
            Ok(script)
        }
        n => {
            let len = (n - 6) as usize;
            Ok(r.read_bytes(len)?.to_vec())
        }
    }
}

/// One spent-output record: height code, optional compatibility varint,
/// compressed amount, compressed script.
fn read_undo_coin(r: &mut ByteReader<'_>) -> Result<Prevout> {
    let height_code = read_core_varint(r)?;
    let height = height_code >> 1;
    if height > 0 {
        // legacy nVersion slot, present whenever a height was recorded
        let _ = read_core_varint(r)?;
    }
    let value_sats = decompress_amount(read_core_varint(r)?);
    let script_pubkey = decompress_script(r)?;
    Ok(Prevout {
        value_sats,
        script_pubkey,
    })
}

/// Decode one block's undo payload. Returns the prevouts for each
/// non-coinbase transaction, in block order, one inner vector per
/// transaction in input order.
pub fn decode_block_undo(data: &[u8], expected_tx_count: usize) -> Result<Vec<Vec<Prevout>>> {
    let mut r = ByteReader::new(data, ReadContext::Undo);

    let tx_undo_count = r.read_compact_size()? as usize;
    if tx_undo_count != expected_tx_count {
        return Err(LensError::InvalidUndo(format!(
            "undo record covers {tx_undo_count} transactions, block has {expected_tx_count} non-coinbase"
        )));
    }

    let mut all = Vec::with_capacity(tx_undo_count);
    for _ in 0..tx_undo_count {
        let coin_count = r.read_compact_size()? as usize;
        let mut coins = Vec::with_capacity(coin_count);
        for _ in 0..coin_count {
            coins.push(read_undo_coin(&mut r)?);
        }
        all.push(coins);
    }
    Ok(all)
}
