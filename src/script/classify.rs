use serde::Serialize;

use super::disasm::{tokenize, Token, TruncatedPush};

/// Output script classification over the closed set of recognized
/// scriptPubKey templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    OpReturn,
    Unknown,
}

impl ScriptType {
    pub fn tag(&self) -> &'static str {
        match self {
            ScriptType::P2pkh => "p2pkh",
            ScriptType::P2sh => "p2sh",
            ScriptType::P2wpkh => "p2wpkh",
            ScriptType::P2wsh => "p2wsh",
            ScriptType::P2tr => "p2tr",
            ScriptType::OpReturn => "op_return",
            ScriptType::Unknown => "unknown",
        }
    }
}

/// Input spend classification, derived from the prevout type and the
/// shape of the scriptSig / witness stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputType {
    #[serde(rename = "p2pkh")]
    P2pkh,
    #[serde(rename = "p2sh-p2wpkh")]
    P2shP2wpkh,
    #[serde(rename = "p2sh-p2wsh")]
    P2shP2wsh,
    #[serde(rename = "p2wpkh")]
    P2wpkh,
    #[serde(rename = "p2wsh")]
    P2wsh,
    #[serde(rename = "p2tr_keypath")]
    P2trKeypath,
    #[serde(rename = "p2tr_scriptpath")]
    P2trScriptpath,
    #[serde(rename = "unknown")]
    Unknown,
}

impl InputType {
    /// Inputs whose last witness item is the witness script.
    pub fn reveals_witness_script(&self) -> bool {
        matches!(self, InputType::P2wsh | InputType::P2shP2wsh)
    }
}

/// Classify a scriptPubKey by exact byte pattern.
pub fn classify_output(script: &[u8]) -> ScriptType {
    let n = script.len();

    // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
    if n == 25
        && script[0] == 0x76
        && script[1] == 0xa9
        && script[2] == 0x14
        && script[23] == 0x88
        && script[24] == 0xac
    {
        return ScriptType::P2pkh;
    }

    // OP_HASH160 <20> OP_EQUAL
    if n == 23 && script[0] == 0xa9 && script[1] == 0x14 && script[22] == 0x87 {
        return ScriptType::P2sh;
    }

    // OP_0 <20>
    if n == 22 && script[0] == 0x00 && script[1] == 0x14 {
        return ScriptType::P2wpkh;
    }

    // OP_0 <32>
    if n == 34 && script[0] == 0x00 && script[1] == 0x20 {
        return ScriptType::P2wsh;
    }

    // OP_1 <32>
    if n == 34 && script[0] == 0x51 && script[1] == 0x20 {
        return ScriptType::P2tr;
    }

    if n >= 1 && script[0] == 0x6a {
        return ScriptType::OpReturn;
    }

    ScriptType::Unknown
}

/// Classify an input spend given its prevout scriptPubKey.
pub fn classify_input(script_sig: &[u8], witness: &[Vec<u8>], prevout_script: &[u8]) -> InputType {
    match classify_output(prevout_script) {
        ScriptType::P2pkh => InputType::P2pkh,
        ScriptType::P2wpkh => InputType::P2wpkh,
        ScriptType::P2wsh => InputType::P2wsh,
        ScriptType::P2tr => {
            // Key path: exactly one witness item holding a 64- or 65-byte
            // schnorr signature. Anything else is a script path spend
            // (script + control block at the top of the stack).
            if witness.len() == 1 && matches!(witness[0].len(), 64 | 65) {
                InputType::P2trKeypath
            } else {
                InputType::P2trScriptpath
            }
        }
        ScriptType::P2sh => match single_push(script_sig) {
            Some(redeem) if redeem.len() == 22 && redeem[0] == 0x00 && redeem[1] == 0x14 => {
                InputType::P2shP2wpkh
            }
            Some(redeem) if redeem.len() == 34 && redeem[0] == 0x00 && redeem[1] == 0x20 => {
                InputType::P2shP2wsh
            }
            _ => InputType::Unknown,
        },
        _ => InputType::Unknown,
    }
}

/// The body of a scriptSig consisting of exactly one data push.
fn single_push(script_sig: &[u8]) -> Option<Vec<u8>> {
    match tokenize(script_sig).ok()?.as_slice() {
        [Token::Data { bytes, .. }] => Some(bytes.clone()),
        _ => None,
    }
}

/// OP_RETURN payload: every push operand after the leading OP_RETURN,
/// concatenated in script order.
pub fn op_return_payload(script: &[u8]) -> Result<Vec<u8>, TruncatedPush> {
    let tokens = tokenize(script)?;
    let mut payload = Vec::new();
    for token in tokens.iter().skip(1) {
        if let Token::Data { bytes, .. } = token {
            payload.extend_from_slice(bytes);
        }
    }
    Ok(payload)
}

/// Protocol tag for an OP_RETURN payload, matched on its leading bytes.
pub fn op_return_protocol(payload: &[u8]) -> &'static str {
    if payload.starts_with(b"omni") {
        "omni"
    } else if payload.starts_with(&[0x01, 0x09, 0xf9, 0x11, 0x02]) {
        "opentimestamps"
    } else {
        "unknown"
    }
}
