//! Script elements, encoding and decoding
//!
//! Scripts are built from a typed element sequence (opcode or data push) and
//! only then serialized, so every byte of a compiled script can be checked
//! against the element it came from.

use crate::commitment::sha256;
use crate::constants::*;
use crate::error::{HtlcError, Result};
use crate::types::{ByteString, Hash};
use std::fmt;

/// A single script opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(u8);

impl Opcode {
    pub const OP_0: Opcode = Opcode(0x00);
    pub const OP_PUSHDATA1: Opcode = Opcode(0x4c);
    pub const OP_PUSHDATA2: Opcode = Opcode(0x4d);
    pub const OP_PUSHDATA4: Opcode = Opcode(0x4e);
    pub const OP_1NEGATE: Opcode = Opcode(0x4f);
    pub const OP_1: Opcode = Opcode(0x51);
    pub const OP_2: Opcode = Opcode(0x52);
    pub const OP_16: Opcode = Opcode(0x60);
    pub const OP_IF: Opcode = Opcode(0x63);
    pub const OP_NOTIF: Opcode = Opcode(0x64);
    pub const OP_ELSE: Opcode = Opcode(0x67);
    pub const OP_ENDIF: Opcode = Opcode(0x68);
    pub const OP_VERIFY: Opcode = Opcode(0x69);
    pub const OP_RETURN: Opcode = Opcode(0x6a);
    pub const OP_DROP: Opcode = Opcode(0x75);
    pub const OP_DUP: Opcode = Opcode(0x76);
    pub const OP_EQUAL: Opcode = Opcode(0x87);
    pub const OP_EQUALVERIFY: Opcode = Opcode(0x88);
    pub const OP_SHA256: Opcode = Opcode(0xa8);
    pub const OP_HASH160: Opcode = Opcode(0xa9);
    pub const OP_CHECKSIG: Opcode = Opcode(0xac);
    pub const OP_CHECKSIGVERIFY: Opcode = Opcode(0xad);
    pub const OP_CHECKMULTISIG: Opcode = Opcode(0xae);
    pub const OP_CHECKMULTISIGVERIFY: Opcode = Opcode(0xaf);
    pub const OP_CHECKLOCKTIMEVERIFY: Opcode = Opcode(0xb1);
    pub const OP_CHECKSEQUENCEVERIFY: Opcode = Opcode(0xb2);

    pub const OP_FALSE: Opcode = Opcode::OP_0;
    pub const OP_TRUE: Opcode = Opcode::OP_1;

    pub const fn from_byte(byte: u8) -> Self {
        Opcode(byte)
    }

    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// OP_0..OP_16 for 0 ≤ n ≤ 16
    pub fn small_int(n: u8) -> Option<Opcode> {
        match n {
            0 => Some(Opcode::OP_0),
            1..=16 => Some(Opcode(Opcode::OP_1.0 + n - 1)),
            _ => None,
        }
    }

    /// Value pushed by OP_1..OP_16
    pub fn small_int_value(self) -> Option<u8> {
        if (Opcode::OP_1.0..=Opcode::OP_16.0).contains(&self.0) {
            Some(self.0 - Opcode::OP_1.0 + 1)
        } else {
            None
        }
    }

    /// Mnemonic for the ASM debug form
    pub fn name(self) -> String {
        if let Some(n) = self.small_int_value() {
            return format!("OP_{}", n);
        }
        let name = match self {
            Opcode::OP_0 => "OP_0",
            Opcode::OP_PUSHDATA1 => "OP_PUSHDATA1",
            Opcode::OP_PUSHDATA2 => "OP_PUSHDATA2",
            Opcode::OP_PUSHDATA4 => "OP_PUSHDATA4",
            Opcode::OP_1NEGATE => "OP_1NEGATE",
            Opcode::OP_IF => "OP_IF",
            Opcode::OP_NOTIF => "OP_NOTIF",
            Opcode::OP_ELSE => "OP_ELSE",
            Opcode::OP_ENDIF => "OP_ENDIF",
            Opcode::OP_VERIFY => "OP_VERIFY",
            Opcode::OP_RETURN => "OP_RETURN",
            Opcode::OP_DROP => "OP_DROP",
            Opcode::OP_DUP => "OP_DUP",
            Opcode::OP_EQUAL => "OP_EQUAL",
            Opcode::OP_EQUALVERIFY => "OP_EQUALVERIFY",
            Opcode::OP_SHA256 => "OP_SHA256",
            Opcode::OP_HASH160 => "OP_HASH160",
            Opcode::OP_CHECKSIG => "OP_CHECKSIG",
            Opcode::OP_CHECKSIGVERIFY => "OP_CHECKSIGVERIFY",
            Opcode::OP_CHECKMULTISIG => "OP_CHECKMULTISIG",
            Opcode::OP_CHECKMULTISIGVERIFY => "OP_CHECKMULTISIGVERIFY",
            Opcode::OP_CHECKLOCKTIMEVERIFY => "OP_CHECKLOCKTIMEVERIFY",
            Opcode::OP_CHECKSEQUENCEVERIFY => "OP_CHECKSEQUENCEVERIFY",
            Opcode(byte) => return format!("OP_UNKNOWN_{:#04x}", byte),
        };
        name.to_string()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Script element: 𝒮ℰ = Opcode ∪ 𝔹*
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptElement {
    Op(Opcode),
    Push(ByteString),
}

impl fmt::Display for ScriptElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptElement::Op(op) => write!(f, "{}", op),
            ScriptElement::Push(data) if data.is_empty() => f.write_str("OP_0"),
            ScriptElement::Push(data) => f.write_str(&hex::encode(data)),
        }
    }
}

/// Compiled witness script
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WitnessScript(ByteString);

impl WitnessScript {
    pub fn from_bytes(bytes: ByteString) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| HtlcError::Serialization(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn decompile(&self) -> Result<Vec<ScriptElement>> {
        decompile(&self.0)
    }

    /// SHA256 of the script: the P2WSH witness program
    pub fn script_hash(&self) -> Hash {
        sha256(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Human-readable opcode rendering, for diagnostics only
    pub fn to_asm(&self) -> String {
        match self.decompile() {
            Ok(elements) => elements
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => format!("[malformed] {}", self.to_hex()),
        }
    }
}

/// Builds a script from typed elements
#[derive(Debug, Clone, Default)]
pub struct ScriptBuilder {
    elements: Vec<ScriptElement>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_opcode(mut self, opcode: Opcode) -> Self {
        self.elements.push(ScriptElement::Op(opcode));
        self
    }

    pub fn push_slice(mut self, data: &[u8]) -> Self {
        self.elements.push(ScriptElement::Push(data.to_vec()));
        self
    }

    /// Push a number with minimal encoding: OP_0, OP_1..OP_16, OP_1NEGATE or a script number
    pub fn push_int(mut self, value: i64) -> Self {
        let element = match value {
            -1 => ScriptElement::Op(Opcode::OP_1NEGATE),
            0 => ScriptElement::Op(Opcode::OP_0),
            1..=16 => ScriptElement::Op(Opcode::from_byte(Opcode::OP_1.to_byte() + value as u8 - 1)),
            _ => ScriptElement::Push(encode_script_num(value)),
        };
        self.elements.push(element);
        self
    }

    pub fn elements(&self) -> &[ScriptElement] {
        &self.elements
    }

    pub fn into_script(self) -> WitnessScript {
        WitnessScript(compile_elements(&self.elements))
    }
}

/// Serialize elements, choosing the shortest push opcode for each data push
pub fn compile_elements(elements: &[ScriptElement]) -> ByteString {
    let mut script = Vec::new();
    for element in elements {
        match element {
            ScriptElement::Op(op) => script.push(op.to_byte()),
            ScriptElement::Push(data) => encode_push(&mut script, data),
        }
    }
    script
}

fn encode_push(script: &mut ByteString, data: &[u8]) {
    let len = data.len();
    if len < Opcode::OP_PUSHDATA1.to_byte() as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(Opcode::OP_PUSHDATA1.to_byte());
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(Opcode::OP_PUSHDATA2.to_byte());
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(Opcode::OP_PUSHDATA4.to_byte());
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// Decompile: 𝔹* → 𝒮ℰ*
///
/// 0x00 decodes as an empty push; 0x01..0x4b and OP_PUSHDATA1/2/4 as data
/// pushes; every other byte as an opcode.
pub fn decompile(script: &[u8]) -> Result<Vec<ScriptElement>> {
    let mut elements = Vec::new();
    let mut pos = 0;

    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;

        let push_len = match opcode {
            0x00 => Some(0),
            0x01..=0x4b => Some(opcode as usize),
            0x4c => Some(read_push_len(script, &mut pos, 1, elements.len())?),
            0x4d => Some(read_push_len(script, &mut pos, 2, elements.len())?),
            0x4e => Some(read_push_len(script, &mut pos, 4, elements.len())?),
            _ => None,
        };

        match push_len {
            Some(len) => {
                if pos + len > script.len() {
                    return Err(HtlcError::MalformedScript {
                        position: elements.len(),
                        expected: format!("{} bytes of push data", len),
                        found: format!("{} bytes", script.len() - pos),
                    });
                }
                elements.push(ScriptElement::Push(script[pos..pos + len].to_vec()));
                pos += len;
            }
            None => elements.push(ScriptElement::Op(Opcode::from_byte(opcode))),
        }
    }

    Ok(elements)
}

fn read_push_len(script: &[u8], pos: &mut usize, width: usize, position: usize) -> Result<usize> {
    if *pos + width > script.len() {
        return Err(HtlcError::MalformedScript {
            position,
            expected: format!("{}-byte push length", width),
            found: format!("{} bytes", script.len() - *pos),
        });
    }
    let mut len = 0usize;
    for (i, byte) in script[*pos..*pos + width].iter().enumerate() {
        len |= (*byte as usize) << (8 * i);
    }
    *pos += width;
    Ok(len)
}

/// Script number encoding: little-endian sign-magnitude, minimal length
pub fn encode_script_num(value: i64) -> ByteString {
    if value == 0 {
        return vec![];
    }

    let negative = value < 0;
    let mut abs = value.unsigned_abs();
    let mut result = Vec::new();
    while abs > 0 {
        result.push((abs & 0xff) as u8);
        abs >>= 8;
    }

    // The top bit of the last byte is the sign; add a byte if magnitude uses it
    let last = result.len() - 1;
    if result[last] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        result[last] |= 0x80;
    }
    result
}

/// Decode a minimally-encoded script number of at most `max_len` bytes
pub fn decode_script_num(bytes: &[u8], max_len: usize) -> Option<i64> {
    if bytes.is_empty() {
        return Some(0);
    }
    if bytes.len() > max_len || bytes.len() > 8 {
        return None;
    }

    let last = bytes[bytes.len() - 1];
    if last & 0x7f == 0 && (bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0) {
        return None;
    }

    let mut value: i64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        value |= (*byte as i64) << (8 * i);
    }
    if last & 0x80 != 0 {
        let sign_bit = 0x80i64 << (8 * (bytes.len() - 1));
        value = -(value & !sign_bit);
    }
    Some(value)
}

/// Reject scripts over the P2WSH size limit or with oversized pushes
pub fn check_size_limits(script: &WitnessScript) -> Result<()> {
    if script.len() > MAX_WITNESS_SCRIPT_SIZE {
        return Err(HtlcError::MalformedScript {
            position: 0,
            expected: format!("at most {} script bytes", MAX_WITNESS_SCRIPT_SIZE),
            found: format!("{} bytes", script.len()),
        });
    }
    for (position, element) in script.decompile()?.iter().enumerate() {
        if let ScriptElement::Push(data) = element {
            if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(HtlcError::MalformedScript {
                    position,
                    expected: format!("push of at most {} bytes", MAX_SCRIPT_ELEMENT_SIZE),
                    found: format!("{} bytes", data.len()),
                });
            }
        }
    }
    Ok(())
}
