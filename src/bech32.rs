//! Bech32 (BIP-173) and Bech32m (BIP-350) segwit address encoding

use crate::error::{HtlcError, Result};

const CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

const BECH32_CONST: u32 = 1;
const BECH32M_CONST: u32 = 0x2bc830a3;

/// Checksum variant; witness v0 uses Bech32, v1+ Bech32m
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Bech32,
    Bech32m,
}

impl Variant {
    pub fn for_witness_version(version: u8) -> Self {
        if version == 0 {
            Variant::Bech32
        } else {
            Variant::Bech32m
        }
    }

    fn constant(self) -> u32 {
        match self {
            Variant::Bech32 => BECH32_CONST,
            Variant::Bech32m => BECH32M_CONST,
        }
    }
}

/// Encode a witness program as a segwit address
pub fn encode_segwit(hrp: &str, version: u8, program: &[u8]) -> String {
    let mut data = vec![version];
    data.extend(convert_bits_8_to_5(program));

    let variant = Variant::for_witness_version(version);
    let checksum = create_checksum(hrp, &data, variant);

    let mut result = String::with_capacity(hrp.len() + 1 + data.len() + 6);
    result.push_str(hrp);
    result.push('1');
    for &d in data.iter().chain(checksum.iter()) {
        result.push(CHARSET[d as usize] as char);
    }
    result
}

/// Decode a segwit address into (hrp, witness version, program)
pub fn decode_segwit(address: &str) -> Result<(String, u8, Vec<u8>)> {
    let has_lower = address.bytes().any(|c| c.is_ascii_lowercase());
    let has_upper = address.bytes().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(HtlcError::InvalidAddress("mixed case".to_string()));
    }
    if address.len() > 90 {
        return Err(HtlcError::InvalidAddress(format!("{} characters exceeds 90", address.len())));
    }

    let address = address.to_ascii_lowercase();
    let separator = address
        .rfind('1')
        .ok_or_else(|| HtlcError::InvalidAddress("missing separator".to_string()))?;
    let (hrp, rest) = address.split_at(separator);
    let payload = &rest[1..];
    if hrp.is_empty() || payload.len() < 6 {
        return Err(HtlcError::InvalidAddress("too short".to_string()));
    }
    if hrp.bytes().any(|c| !(33..=126).contains(&c)) {
        return Err(HtlcError::InvalidAddress("invalid human-readable part".to_string()));
    }

    let mut data = Vec::with_capacity(payload.len());
    for c in payload.bytes() {
        let value = CHARSET
            .iter()
            .position(|&x| x == c)
            .ok_or_else(|| HtlcError::InvalidAddress(format!("invalid character '{}'", c as char)))?;
        data.push(value as u8);
    }

    let residue = polymod_with_hrp(hrp, &data);
    let (data, _checksum) = data.split_at(data.len() - 6);
    let version = *data
        .first()
        .ok_or_else(|| HtlcError::InvalidAddress("missing witness version".to_string()))?;
    if version > 16 {
        return Err(HtlcError::InvalidAddress(format!("witness version {}", version)));
    }
    if residue != Variant::for_witness_version(version).constant() {
        return Err(HtlcError::InvalidAddress("checksum mismatch".to_string()));
    }

    let program = convert_bits_5_to_8(&data[1..])?;
    Ok((hrp.to_string(), version, program))
}

fn create_checksum(hrp: &str, data: &[u8], variant: Variant) -> [u8; 6] {
    let mut values = data.to_vec();
    values.extend_from_slice(&[0u8; 6]);
    let chk = polymod_with_hrp(hrp, &values) ^ variant.constant();

    let mut checksum = [0u8; 6];
    for (i, c) in checksum.iter_mut().enumerate() {
        *c = ((chk >> (5 * (5 - i))) & 0x1f) as u8;
    }
    checksum
}

fn polymod_with_hrp(hrp: &str, data: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for c in hrp.bytes() {
        chk = polymod_step(chk) ^ ((c >> 5) as u32);
    }
    chk = polymod_step(chk);
    for c in hrp.bytes() {
        chk = polymod_step(chk) ^ ((c & 0x1f) as u32);
    }
    for &d in data {
        chk = polymod_step(chk) ^ (d as u32);
    }
    chk
}

fn polymod_step(pre: u32) -> u32 {
    let b = pre >> 25;
    ((pre & 0x1ffffff) << 5)
        ^ (if b & 1 != 0 { 0x3b6a57b2 } else { 0 })
        ^ (if b & 2 != 0 { 0x26508e6d } else { 0 })
        ^ (if b & 4 != 0 { 0x1ea119fa } else { 0 })
        ^ (if b & 8 != 0 { 0x3d4233dd } else { 0 })
        ^ (if b & 16 != 0 { 0x2a1462b3 } else { 0 })
}

fn convert_bits_8_to_5(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &byte in data {
        acc = (acc << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            result.push(((acc >> bits) & 0x1f) as u8);
        }
    }
    if bits > 0 {
        result.push(((acc << (5 - bits)) & 0x1f) as u8);
    }
    result
}

fn convert_bits_5_to_8(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() * 5 / 8);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &value in data {
        acc = ((acc << 5) | value as u32) & 0xfff;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            result.push(((acc >> bits) & 0xff) as u8);
        }
    }
    if bits >= 5 || (acc << (8 - bits)) & 0xff != 0 {
        return Err(HtlcError::InvalidAddress("invalid padding".to_string()));
    }
    Ok(result)
}
