//! Branch selection and witness construction for contract inputs
//!
//! An input moves `Unfinalized → Finalized` exactly once. Finalization picks
//! the branch whose commitment the preimage opens, checks that branch's
//! preconditions, and writes the witness stack.

use crate::compiler::HtlcTemplate;
use crate::constants::*;
use crate::error::{HtlcError, Result};
use crate::signer::verify_partial_signature;
use crate::types::*;
use tracing::{debug, info};

/// Finalize: 𝒯𝒳 × ℕ × 𝕊 × Sig* → SpendBranch
///
/// For input i with template (A, B, cA, cB, t):
/// 1. H160(preimage) = cA → Immediate
/// 2. H160(preimage) = cB ∧ version ≥ 2 ∧ CSV(t, seqᵢ) → Timelocked
/// 3. otherwise → NoMatchingBranch
///
/// A preimage longer than MAX_SCRIPT_ELEMENT_SIZE is rejected before any branch is tried.
///
/// Both branches need valid signatures from A and B. Signatures passed in
/// take precedence over those already attached to the input.
pub fn finalize(
    tx: &mut Transaction,
    input_index: usize,
    preimage: &[u8],
    signatures: &[PartialSignature],
) -> Result<SpendBranch> {
    let input = tx.input(input_index)?;
    if input.is_finalized() {
        return Err(HtlcError::AlreadyFinalized { input_index });
    }
    if preimage.len() > MAX_SCRIPT_ELEMENT_SIZE {
        return Err(HtlcError::OversizedWitnessItem {
            input_index,
            size: preimage.len(),
            max: MAX_SCRIPT_ELEMENT_SIZE,
        });
    }

    let template = HtlcTemplate::parse(&input.witness_script)?;
    let branch = template
        .branch_for(preimage)
        .ok_or(HtlcError::NoMatchingBranch { input_index })?;
    debug!(input_index, %branch, "selected branch");

    if branch == SpendBranch::Timelocked {
        let lock_time = template.lock_time_spec()?;
        if tx.version < TX_VERSION || !lock_time.is_satisfied_by(input.sequence) {
            return Err(HtlcError::LockTimeNotSatisfied {
                input_index,
                required: template.lock_time,
                sequence: input.sequence,
            });
        }
    }

    let sig_a = find_signature(input, signatures, &template.pubkey_a);
    let sig_b = find_signature(input, signatures, &template.pubkey_b);
    let (sig_a, sig_b) = match (sig_a, sig_b) {
        (Some(a), Some(b)) => (a.clone(), b.clone()),
        (a, b) => {
            return Err(HtlcError::InsufficientSignatures {
                input_index,
                required: 2,
                found: a.is_some() as usize + b.is_some() as usize,
            })
        }
    };
    verify_partial_signature(tx, input_index, &sig_a)?;
    verify_partial_signature(tx, input_index, &sig_b)?;

    let input = tx.input_mut(input_index)?;
    let witness: Witness = vec![
        sig_a.signature,
        sig_b.signature,
        preimage.to_vec(),
        branch.flag(),
        input.witness_script.as_bytes().to_vec(),
    ];
    debug_assert_eq!(witness.len(), CONTRACT_WITNESS_ITEMS);

    input.state = InputState::Finalized(FinalizedInput { branch, witness });
    info!(input_index, %branch, "finalized input");
    Ok(branch)
}

fn find_signature<'a>(
    input: &'a TransactionInput,
    supplied: &'a [PartialSignature],
    signer: &CompressedPublicKey,
) -> Option<&'a PartialSignature> {
    supplied
        .iter()
        .find(|sig| sig.signer == *signer)
        .or_else(|| input.partial_sigs.get(signer))
}
