//! Wire serialization of finalized transactions (BIP-144), ids and weight

use crate::commitment::sha256d;
use crate::error::{HtlcError, Result};
use crate::types::*;

/// Segwit serialization marker and flag
const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// Weight units per non-witness byte
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Bitcoin compact-size (varint) encoding
pub fn encode_compact_size(value: u64) -> Vec<u8> {
    if value < 0xfd {
        vec![value as u8]
    } else if value <= 0xffff {
        let mut result = vec![0xfd];
        result.extend_from_slice(&(value as u16).to_le_bytes());
        result
    } else if value <= 0xffffffff {
        let mut result = vec![0xfe];
        result.extend_from_slice(&(value as u32).to_le_bytes());
        result
    } else {
        let mut result = vec![0xff];
        result.extend_from_slice(&value.to_le_bytes());
        result
    }
}

/// Output encoding shared by the wire format and the sighash: value ‖ len ‖ scriptPubKey
pub fn serialize_output(buf: &mut Vec<u8>, output: &TransactionOutput) {
    buf.extend_from_slice(&output.value.to_le_bytes());
    buf.extend_from_slice(&encode_compact_size(output.script_pubkey.len() as u64));
    buf.extend_from_slice(&output.script_pubkey);
}

/// Serialize: 𝒯𝒳 → 𝕊
///
/// version ‖ 0x00 ‖ 0x01 ‖ ins ‖ outs ‖ witnesses ‖ nLockTime
///
/// Every input must be finalized.
pub fn to_bytes(tx: &Transaction) -> Result<Vec<u8>> {
    let witnesses = finalized_witnesses(tx)?;

    let mut buf = Vec::new();
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.push(SEGWIT_MARKER);
    buf.push(SEGWIT_FLAG);
    serialize_inputs_and_outputs(&mut buf, tx);
    for witness in witnesses {
        serialize_witness(&mut buf, witness);
    }
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    Ok(buf)
}

pub fn to_hex(tx: &Transaction) -> Result<String> {
    Ok(hex::encode(to_bytes(tx)?))
}

/// Serialization without marker, flag and witnesses
pub fn to_legacy_bytes(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&tx.version.to_le_bytes());
    serialize_inputs_and_outputs(&mut buf, tx);
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    buf
}

/// TxId = SHA256d(legacy serialization), in display (reversed) hex
///
/// Defined for unfinalized transactions too, since witnesses are excluded.
pub fn txid(tx: &Transaction) -> String {
    display_hex(sha256d(&to_legacy_bytes(tx)))
}

/// WTxId = SHA256d(full serialization), in display (reversed) hex
pub fn wtxid(tx: &Transaction) -> Result<String> {
    Ok(display_hex(sha256d(&to_bytes(tx)?)))
}

/// Weight = base × 3 + total
pub fn weight(tx: &Transaction) -> Result<u64> {
    let base = to_legacy_bytes(tx).len() as u64;
    let total = to_bytes(tx)?.len() as u64;
    Ok(base * (WITNESS_SCALE_FACTOR - 1) + total)
}

/// Virtual size, rounded up
pub fn vsize(tx: &Transaction) -> Result<u64> {
    Ok(weight(tx)?.div_ceil(WITNESS_SCALE_FACTOR))
}

fn finalized_witnesses(tx: &Transaction) -> Result<Vec<&Witness>> {
    tx.inputs
        .iter()
        .enumerate()
        .map(|(input_index, input)| {
            input
                .witness()
                .ok_or(HtlcError::NotFullyFinalized { input_index })
        })
        .collect()
}

fn serialize_inputs_and_outputs(buf: &mut Vec<u8>, tx: &Transaction) {
    buf.extend_from_slice(&encode_compact_size(tx.inputs.len() as u64));
    for input in &tx.inputs {
        buf.extend_from_slice(&input.prevout.hash);
        buf.extend_from_slice(&input.prevout.index.to_le_bytes());
        // Empty scriptSig
        buf.push(0);
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }

    buf.extend_from_slice(&encode_compact_size(tx.outputs.len() as u64));
    for output in &tx.outputs {
        serialize_output(buf, output);
    }
}

fn serialize_witness(buf: &mut Vec<u8>, witness: &Witness) {
    buf.extend_from_slice(&encode_compact_size(witness.len() as u64));
    for item in witness {
        buf.extend_from_slice(&encode_compact_size(item.len() as u64));
        buf.extend_from_slice(item);
    }
}

fn display_hex(hash: Hash) -> String {
    let mut display = hash;
    display.reverse();
    hex::encode(display)
}
