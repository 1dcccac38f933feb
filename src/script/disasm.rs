use thiserror::Error;

use super::opcodes::opcode_name;

/// The only way disassembly can fail: a push opcode whose body runs past
/// the end of the script.
#[derive(Debug, Clone, Error)]
#[error("truncated push at offset {offset}: need {needed} bytes, have {available}")]
pub struct TruncatedPush {
    pub offset: usize,
    pub needed: usize,
    pub available: usize,
}

/// One decoded script element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A data push: direct (0x01–0x4b) or OP_PUSHDATA1/2/4.
    Data { opcode: u8, bytes: Vec<u8> },
    /// Any other single-byte opcode, including OP_0 and OP_1..OP_16.
    Op(u8),
}

impl Token {
    fn render(&self) -> String {
        match self {
            Token::Data { opcode, bytes } => {
                let name = match opcode {
                    0x01..=0x4b => format!("OP_PUSHBYTES_{opcode}"),
                    0x4c => "OP_PUSHDATA1".to_string(),
                    0x4d => "OP_PUSHDATA2".to_string(),
                    _ => "OP_PUSHDATA4".to_string(),
                };
                if bytes.is_empty() {
                    name
                } else {
                    format!("{name} {}", hex::encode(bytes))
                }
            }
            Token::Op(op) => match op {
                0x00 => "OP_0".to_string(),
                0x51..=0x60 => format!("OP_{}", op - 0x50),
                _ => match opcode_name(*op) {
                    Some(name) => name.to_string(),
                    None => format!("OP_UNKNOWN_0x{op:02x}"),
                },
            },
        }
    }
}

/// Decode a script into its token sequence. Only truncated push bodies are
/// errors; script semantics are not enforced.
pub fn tokenize(script: &[u8]) -> Result<Vec<Token>, TruncatedPush> {
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < script.len() {
        let op = script[pos];
        pos += 1;

        let data_len = match op {
            0x01..=0x4b => Some(op as usize),
            0x4c => {
                let len = read_le(script, &mut pos, 1)?;
                Some(len)
            }
            0x4d => {
                let len = read_le(script, &mut pos, 2)?;
                Some(len)
            }
            0x4e => {
                let len = read_le(script, &mut pos, 4)?;
                Some(len)
            }
            _ => None,
        };

        match data_len {
            Some(len) => {
                if pos + len > script.len() {
                    return Err(TruncatedPush {
                        offset: pos,
                        needed: len,
                        available: script.len() - pos,
                    });
                }
                tokens.push(Token::Data {
                    opcode: op,
                    bytes: script[pos..pos + len].to_vec(),
                });
                pos += len;
            }
            None => tokens.push(Token::Op(op)),
        }
    }

    Ok(tokens)
}

fn read_le(script: &[u8], pos: &mut usize, width: usize) -> Result<usize, TruncatedPush> {
    if *pos + width > script.len() {
        return Err(TruncatedPush {
            offset: *pos,
            needed: width,
            available: script.len() - *pos,
        });
    }
    let mut value = 0usize;
    for i in 0..width {
        value |= (script[*pos + i] as usize) << (8 * i);
    }
    *pos += width;
    Ok(value)
}

/// Render a script as space-joined tokens. An empty script renders as the
/// empty string.
pub fn disassemble(script: &[u8]) -> Result<String, TruncatedPush> {
    let tokens = tokenize(script)?;
    Ok(tokens
        .iter()
        .map(Token::render)
        .collect::<Vec<_>>()
        .join(" "))
}
