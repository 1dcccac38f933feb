//! Mainnet address encoding: Base58Check for legacy script types, Bech32
//! (BIP173) for witness v0 programs, Bech32m (BIP350) for witness v1.

use crate::decode::sha256d;

use super::classify::ScriptType;

const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BECH32_CONST: u32 = 1;
const BECH32M_CONST: u32 = 0x2bc8_30a3;

fn base58_encode(payload: &[u8]) -> String {
    // repeated division of the big-endian integer by 58
    let mut digits: Vec<u8> = Vec::new();
    for &byte in payload {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut out = String::new();
    for &byte in payload {
        if byte != 0 {
            break;
        }
        out.push('1');
    }
    for &digit in digits.iter().rev() {
        out.push(BASE58_ALPHABET[digit as usize] as char);
    }
    out
}

fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 5);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = sha256d(&data);
    data.extend_from_slice(&checksum[..4]);
    base58_encode(&data)
}

fn bech32_polymod(values: &[u8]) -> u32 {
    const GEN: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];
    let mut chk: u32 = 1;
    for &v in values {
        let b = chk >> 25;
        chk = ((chk & 0x1ff_ffff) << 5) ^ v as u32;
        for (i, g) in GEN.iter().enumerate() {
            if (b >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

fn bech32_hrp_expand(hrp: &str) -> Vec<u8> {
    let mut out: Vec<u8> = hrp.bytes().map(|b| b >> 5).collect();
    out.push(0);
    out.extend(hrp.bytes().map(|b| b & 31));
    out
}

fn bech32_checksum(hrp: &str, data: &[u8], spec: u32) -> Vec<u8> {
    let mut values = bech32_hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; 6]);
    let polymod = bech32_polymod(&values) ^ spec;
    (0..6).map(|i| ((polymod >> (5 * (5 - i))) & 31) as u8).collect()
}

/// Regroup 8-bit bytes into 5-bit values, padding the tail.
fn convert_bits(data: &[u8]) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * 8 / 5 + 1);
    for &byte in data {
        acc = (acc << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(((acc >> bits) & 31) as u8);
        }
    }
    if bits > 0 {
        out.push(((acc << (5 - bits)) & 31) as u8);
    }
    out
}

fn segwit_address(hrp: &str, witness_version: u8, program: &[u8]) -> String {
    let spec = if witness_version == 0 {
        BECH32_CONST
    } else {
        BECH32M_CONST
    };
    let mut data = vec![witness_version];
    data.extend(convert_bits(program));
    let checksum = bech32_checksum(hrp, &data, spec);
    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + 6);
    out.push_str(hrp);
    out.push('1');
    for d in data.iter().chain(checksum.iter()) {
        out.push(BECH32_CHARSET[*d as usize] as char);
    }
    out
}

/// Derive the canonical mainnet address for a classified scriptPubKey.
/// OP_RETURN and unrecognized scripts have no address.
pub fn address_from_script(script_type: ScriptType, script: &[u8]) -> Option<String> {
    match script_type {
        ScriptType::P2pkh if script.len() == 25 => Some(base58check_encode(0x00, &script[3..23])),
        ScriptType::P2sh if script.len() == 23 => Some(base58check_encode(0x05, &script[2..22])),
        ScriptType::P2wpkh if script.len() == 22 => Some(segwit_address("bc", 0, &script[2..])),
        ScriptType::P2wsh if script.len() == 34 => Some(segwit_address("bc", 0, &script[2..])),
        ScriptType::P2tr if script.len() == 34 => Some(segwit_address("bc", 1, &script[2..])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p2pkh_script(hash: [u8; 20]) -> Vec<u8> {
        let mut s = vec![0x76, 0xa9, 0x14];
        s.extend_from_slice(&hash);
        s.extend_from_slice(&[0x88, 0xac]);
        s
    }

    #[test]
    fn p2pkh_all_zero_hash() {
        // the well-known burn address for a zeroed hash160
        let script = p2pkh_script([0u8; 20]);
        let addr = address_from_script(ScriptType::P2pkh, &script).unwrap();
        assert_eq!(addr, "1111111111111111111114oLvT2");
    }

    #[test]
    fn p2sh_addresses_start_with_3() {
        let mut script = vec![0xa9, 0x14];
        script.extend_from_slice(&[0x42; 20]);
        script.push(0x87);
        let addr = address_from_script(ScriptType::P2sh, &script).unwrap();
        assert!(addr.starts_with('3'), "got {addr}");
    }

    #[test]
    fn p2wpkh_bip173_vector() {
        let program = hex::decode("751e76e8199196d454941c45d1b3a323f1433bd6").unwrap();
        let mut script = vec![0x00, 0x14];
        script.extend_from_slice(&program);
        let addr = address_from_script(ScriptType::P2wpkh, &script).unwrap();
        assert_eq!(addr, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
    }

    #[test]
    fn p2wsh_bip173_vector() {
        let program =
            hex::decode("1863143c14c5166804bd19203356da136c985678cd4d27a1b8c6329604903262")
                .unwrap();
        let mut script = vec![0x00, 0x20];
        script.extend_from_slice(&program);
        let addr = address_from_script(ScriptType::P2wsh, &script).unwrap();
        assert_eq!(
            addr,
            "bc1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3"
        );
    }

    #[test]
    fn p2tr_uses_bech32m() {
        let mut script = vec![0x51, 0x20];
        script.extend_from_slice(&[0x77; 32]);
        let addr = address_from_script(ScriptType::P2tr, &script).unwrap();
        assert!(addr.starts_with("bc1p"), "got {addr}");
        assert_eq!(addr.len(), 62);
        // data part stays within the bech32 charset
        assert!(addr[3..].bytes().all(|b| BECH32_CHARSET.contains(&b)));
    }

    #[test]
    fn no_address_for_op_return_and_unknown() {
        assert_eq!(
            address_from_script(ScriptType::OpReturn, &[0x6a, 0x01, 0xAA]),
            None
        );
        assert_eq!(address_from_script(ScriptType::Unknown, &[0x51, 0x51]), None);
    }

    #[test]
    fn address_program_round_trip() {
        // the 5-bit regrouping preserves the program: re-deriving from the
        // same script is stable and distinct programs yield distinct text
        let mut a = vec![0x00, 0x14];
        a.extend_from_slice(&[0x01; 20]);
        let mut b = vec![0x00, 0x14];
        b.extend_from_slice(&[0x02; 20]);
        let addr_a = address_from_script(ScriptType::P2wpkh, &a).unwrap();
        let addr_b = address_from_script(ScriptType::P2wpkh, &b).unwrap();
        assert_ne!(addr_a, addr_b);
        assert_eq!(
            addr_a,
            address_from_script(ScriptType::P2wpkh, &a).unwrap()
        );
    }
}
