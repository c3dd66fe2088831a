//! Segwit v0 signature hashing (BIP-143) and ECDSA signing of contract inputs

use crate::commitment::sha256d;
use crate::constants::*;
use crate::error::{HtlcError, Result};
use crate::serialize::{encode_compact_size, serialize_output};
use crate::types::*;
use secp256k1::{ecdsa::Signature, Message, Secp256k1, SecretKey};
use tracing::debug;

/// SignatureHash: 𝒯𝒳 × ℕ → ℍ
///
/// sighash = SHA256d(version ‖ hashPrevouts ‖ hashSequence ‖ outpoint ‖
///                   scriptCode ‖ value ‖ nSequence ‖ hashOutputs ‖ nLockTime ‖ type)
///
/// with SIGHASH_ALL and scriptCode = the input's witness script.
pub fn signature_hash(tx: &Transaction, input_index: usize) -> Result<Hash> {
    let input = tx.input(input_index)?;

    let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
    let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
    for i in &tx.inputs {
        prevouts.extend_from_slice(&i.prevout.hash);
        prevouts.extend_from_slice(&i.prevout.index.to_le_bytes());
        sequences.extend_from_slice(&i.sequence.to_le_bytes());
    }
    let hash_prevouts = sha256d(&prevouts);
    let hash_sequence = sha256d(&sequences);

    let mut outputs = Vec::new();
    for output in &tx.outputs {
        serialize_output(&mut outputs, output);
    }
    let hash_outputs = sha256d(&outputs);

    let script_code = input.witness_script.as_bytes();

    let mut preimage = Vec::with_capacity(156 + script_code.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend_from_slice(&input.prevout.hash);
    preimage.extend_from_slice(&input.prevout.index.to_le_bytes());
    preimage.extend_from_slice(&encode_compact_size(script_code.len() as u64));
    preimage.extend_from_slice(script_code);
    preimage.extend_from_slice(&input.value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&(SIGHASH_ALL as u32).to_le_bytes());

    Ok(sha256d(&preimage))
}

/// Sign one input with a private key
///
/// Deterministic (RFC 6979) low-S ECDSA; the result is DER followed by the
/// sighash type byte. The transaction is not modified.
pub fn sign(tx: &Transaction, input_index: usize, secret_key: &SecretKey) -> Result<PartialSignature> {
    let sighash = signature_hash(tx, input_index)?;
    let message = to_message(&sighash, input_index)?;

    let secp = Secp256k1::signing_only();
    let signature = secp.sign_ecdsa(&message, secret_key);
    let mut bytes = signature.serialize_der().to_vec();
    bytes.push(SIGHASH_ALL);

    let signer = CompressedPublicKey::from_secret_key(&secp, secret_key);
    debug!(input_index, signer = %signer, sighash = %hex::encode(sighash), "signed input");

    Ok(PartialSignature {
        signer,
        signature: bytes,
    })
}

/// Check a partial signature against the input's sighash and its signer's key
pub fn verify_partial_signature(
    tx: &Transaction,
    input_index: usize,
    partial: &PartialSignature,
) -> Result<()> {
    let invalid = |reason: String| HtlcError::InvalidSignature { input_index, reason };

    let (sighash_type, der) = partial
        .signature
        .split_last()
        .ok_or_else(|| invalid("empty signature".to_string()))?;
    if *sighash_type != SIGHASH_ALL {
        return Err(invalid(format!(
            "sighash type {:#04x}, expected {:#04x}",
            sighash_type, SIGHASH_ALL
        )));
    }

    let signature = Signature::from_der(der).map_err(|e| invalid(e.to_string()))?;
    let pubkey = partial.signer.to_public_key()?;
    let sighash = signature_hash(tx, input_index)?;
    let message = to_message(&sighash, input_index)?;

    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &pubkey)
        .map_err(|e| invalid(format!("signer {}: {}", partial.signer, e)))
}

fn to_message(sighash: &Hash, input_index: usize) -> Result<Message> {
    Message::from_digest_slice(sighash).map_err(|e| HtlcError::InvalidSignature {
        input_index,
        reason: e.to_string(),
    })
}
