pub mod block;
pub mod merkle;
pub mod reader;
pub mod tx;
pub mod undo;

use sha2::{Digest, Sha256};

/// A spent output paired with a transaction input: its value and the
/// scriptPubKey it carried. Caller-supplied in transaction mode, recovered
/// from undo data in block mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prevout {
    pub value_sats: u64,
    pub script_pubkey: Vec<u8>,
}

/// Double SHA-256, the hash used for txids, block hashes and merkle nodes.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Render an internal-order 32-byte hash in display (reversed) hex.
pub fn display_hash(hash: &[u8; 32]) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parse a display-order hex hash back into internal byte order.
pub fn parse_display_hash(s: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(s).ok()?;
    let mut hash: [u8; 32] = bytes.try_into().ok()?;
    hash.reverse();
    Some(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_hash_reverses_byte_order() {
        let mut h = [0u8; 32];
        h[0] = 0xAB;
        let display = display_hash(&h);
        assert!(display.starts_with("00"));
        assert!(display.ends_with("ab"));
        assert_eq!(parse_display_hash(&display), Some(h));
    }

    #[test]
    fn parse_display_hash_rejects_bad_input() {
        assert_eq!(parse_display_hash("zz"), None);
        assert_eq!(parse_display_hash("aabb"), None);
    }
}
