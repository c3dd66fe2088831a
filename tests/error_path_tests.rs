//! Tests for error paths and edge cases

use csv_htlc::commitment::commit;
use csv_htlc::finalizer::finalize;
use csv_htlc::serialize;
use csv_htlc::signer::{sign, verify_partial_signature};
use csv_htlc::*;
use secp256k1::{Secp256k1, SecretKey};

const PREIMAGE_A: &[u8] = b"10a1e49e2c56295e1f2fd2dce78294da";
const PREIMAGE_B: &[u8] = b"0dc7c47740a748abed192062f0caf637";

fn secret(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).unwrap()
}

fn contract(lock_time: LockTimeSpec) -> HtlcContract {
    let secp = Secp256k1::new();
    let template = HtlcTemplate::new(
        CompressedPublicKey::from_secret_key(&secp, &secret(0x11)),
        CompressedPublicKey::from_secret_key(&secp, &secret(0x22)),
        commit(PREIMAGE_A),
        commit(PREIMAGE_B),
        lock_time,
    )
    .unwrap();
    HtlcContract::new(template).unwrap()
}

fn spend_tx(contract: &HtlcContract, branch: SpendBranch) -> Transaction {
    let destination = contract.address(&Network::Regtest.params()).unwrap();
    let input = contract
        .spend_input(OutPoint { hash: [1; 32], index: 0 }, 20_000, branch)
        .unwrap();
    new_transaction(vec![input], vec![(destination, 19_000)]).unwrap()
}

fn signatures(tx: &Transaction) -> Vec<PartialSignature> {
    vec![sign(tx, 0, &secret(0x11)).unwrap(), sign(tx, 0, &secret(0x22)).unwrap()]
}

#[test]
fn test_no_matching_branch() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Timelocked);
    let sigs = signatures(&tx);
    assert_eq!(
        finalize(&mut tx, 0, b"not a preimage", &sigs),
        Err(HtlcError::NoMatchingBranch { input_index: 0 })
    );
    assert_eq!(tx.inputs[0].state, InputState::Unfinalized);
}

#[test]
fn test_finalize_twice() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Immediate);
    let sigs = signatures(&tx);
    finalize(&mut tx, 0, PREIMAGE_A, &sigs).unwrap();
    let finalized = tx.clone();

    assert_eq!(
        finalize(&mut tx, 0, PREIMAGE_B, &sigs),
        Err(HtlcError::AlreadyFinalized { input_index: 0 })
    );
    assert_eq!(tx, finalized);
}

#[test]
fn test_attach_after_finalize() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Immediate);
    let sigs = signatures(&tx);
    finalize(&mut tx, 0, PREIMAGE_A, &sigs).unwrap();
    assert_eq!(
        tx.add_partial_signature(0, sigs[0].clone()),
        Err(HtlcError::AlreadyFinalized { input_index: 0 })
    );
}

#[test]
fn test_serialize_before_finalize() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let tx = spend_tx(&contract, SpendBranch::Immediate);
    assert_eq!(
        serialize::to_hex(&tx),
        Err(HtlcError::NotFullyFinalized { input_index: 0 })
    );
    assert!(serialize::wtxid(&tx).is_err());
    assert!(serialize::vsize(&tx).is_err());
}

#[test]
fn test_timelock_gating_requires_lock_sequence() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Immediate);
    let sigs = signatures(&tx);
    assert_eq!(
        finalize(&mut tx, 0, PREIMAGE_B, &sigs),
        Err(HtlcError::LockTimeNotSatisfied {
            input_index: 0,
            required: 15,
            sequence: SEQUENCE_FINAL,
        })
    );
}

#[test]
fn test_timelock_gating_immature_sequence() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Timelocked);
    tx.inputs[0].sequence = 14;
    let sigs = signatures(&tx);
    assert_eq!(
        finalize(&mut tx, 0, PREIMAGE_B, &sigs),
        Err(HtlcError::LockTimeNotSatisfied {
            input_index: 0,
            required: 15,
            sequence: 14,
        })
    );
    assert!(!tx.inputs[0].is_finalized());
}

#[test]
fn test_timelock_gating_unit_mismatch() {
    // 15 intervals does not satisfy a 15 block lock
    let block_lock = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&block_lock, SpendBranch::Timelocked);
    let intervals = locktime::encode(LockTimeSpec::Intervals(15)).unwrap();
    assert_eq!(intervals, SEQUENCE_LOCKTIME_TYPE_FLAG | 15);
    tx.inputs[0].sequence = intervals;
    let sigs = signatures(&tx);
    assert_eq!(
        finalize(&mut tx, 0, PREIMAGE_B, &sigs),
        Err(HtlcError::LockTimeNotSatisfied {
            input_index: 0,
            required: 15,
            sequence: intervals,
        })
    );

    // And the reverse: blocks against an interval lock
    let interval_lock = contract(LockTimeSpec::Intervals(4));
    let mut tx = spend_tx(&interval_lock, SpendBranch::Timelocked);
    tx.inputs[0].sequence = 4;
    let sigs = signatures(&tx);
    assert!(matches!(
        finalize(&mut tx, 0, PREIMAGE_B, &sigs),
        Err(HtlcError::LockTimeNotSatisfied { sequence: 4, .. })
    ));
}

#[test]
fn test_preimage_size_limit() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Immediate);
    let sigs = signatures(&tx);

    // At the limit the size check passes and branch selection decides
    assert_eq!(
        finalize(&mut tx, 0, &[0x5a; MAX_SCRIPT_ELEMENT_SIZE], &sigs),
        Err(HtlcError::NoMatchingBranch { input_index: 0 })
    );
    assert_eq!(
        finalize(&mut tx, 0, &[0x5a; MAX_SCRIPT_ELEMENT_SIZE + 1], &sigs),
        Err(HtlcError::OversizedWitnessItem {
            input_index: 0,
            size: MAX_SCRIPT_ELEMENT_SIZE + 1,
            max: MAX_SCRIPT_ELEMENT_SIZE,
        })
    );
    assert_eq!(tx.inputs[0].state, InputState::Unfinalized);
}

#[test]
fn test_timelock_gating_time_based() {
    let contract = contract(LockTimeSpec::Intervals(4));
    let mut tx = spend_tx(&contract, SpendBranch::Timelocked);
    assert_eq!(tx.inputs[0].sequence, SEQUENCE_LOCKTIME_TYPE_FLAG | 4);
    let sigs = signatures(&tx);
    assert_eq!(finalize(&mut tx, 0, PREIMAGE_B, &sigs), Ok(SpendBranch::Timelocked));
}

#[test]
fn test_immediate_branch_ignores_sequence() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Timelocked);
    let sigs = signatures(&tx);
    assert_eq!(finalize(&mut tx, 0, PREIMAGE_A, &sigs), Ok(SpendBranch::Immediate));
}

#[test]
fn test_insufficient_signatures() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Immediate);
    assert_eq!(
        finalize(&mut tx, 0, PREIMAGE_A, &[]),
        Err(HtlcError::InsufficientSignatures {
            input_index: 0,
            required: 2,
            found: 0,
        })
    );

    // A third party's signature does not count toward the multisig
    let outsider = sign(&tx, 0, &secret(0x33)).unwrap();
    let sig_b = sign(&tx, 0, &secret(0x22)).unwrap();
    assert_eq!(
        finalize(&mut tx, 0, PREIMAGE_A, &[outsider, sig_b]),
        Err(HtlcError::InsufficientSignatures {
            input_index: 0,
            required: 2,
            found: 1,
        })
    );
}

#[test]
fn test_tampered_signature_rejected() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Immediate);
    let mut sigs = signatures(&tx);
    // Flip a byte inside the DER-encoded r value
    sigs[1].signature[6] ^= 0x01;
    assert!(verify_partial_signature(&tx, 0, &sigs[1]).is_err());
    assert!(matches!(
        finalize(&mut tx, 0, PREIMAGE_A, &sigs),
        Err(HtlcError::InvalidSignature { input_index: 0, .. })
    ));
    assert!(!tx.inputs[0].is_finalized());
}

#[test]
fn test_signature_invalidated_by_output_change() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Immediate);
    let sigs = signatures(&tx);
    tx.outputs[0].value -= 1;
    assert!(matches!(
        finalize(&mut tx, 0, PREIMAGE_A, &sigs),
        Err(HtlcError::InvalidSignature { .. })
    ));
}

#[test]
fn test_unknown_input() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let mut tx = spend_tx(&contract, SpendBranch::Immediate);
    assert_eq!(
        finalize(&mut tx, 1, PREIMAGE_A, &[]),
        Err(HtlcError::UnknownInput { index: 1, count: 1 })
    );
    assert!(matches!(
        sign(&tx, 7, &secret(0x11)),
        Err(HtlcError::UnknownInput { index: 7, .. })
    ));
}

#[test]
fn test_lock_time_out_of_range() {
    let secp = Secp256k1::new();
    let result = HtlcTemplate::new(
        CompressedPublicKey::from_secret_key(&secp, &secret(0x11)),
        CompressedPublicKey::from_secret_key(&secp, &secret(0x22)),
        commit(PREIMAGE_A),
        commit(PREIMAGE_B),
        LockTimeSpec::Blocks(65_536),
    );
    assert!(matches!(result, Err(HtlcError::InvalidRange { count: 65_536, .. })));
}

#[test]
fn test_invalid_public_key() {
    let mut uncompressed = vec![0x04];
    uncompressed.extend_from_slice(&[0x11; 64]);
    let result = compile_witness_script(
        &uncompressed,
        &[0x02; 33],
        &commit(PREIMAGE_A),
        &commit(PREIMAGE_B),
        15,
    );
    assert!(matches!(result, Err(HtlcError::InvalidKey(_))));
}

#[test]
fn test_insufficient_value() {
    let contract = contract(LockTimeSpec::Blocks(15));
    let destination = contract.address(&Network::Regtest.params()).unwrap();
    let input = contract
        .spend_input(OutPoint { hash: [1; 32], index: 0 }, 20_000, SpendBranch::Immediate)
        .unwrap();
    assert_eq!(
        new_transaction(vec![input], vec![(destination, 25_000)]),
        Err(HtlcError::InsufficientValue {
            inputs: 20_000,
            outputs: 25_000,
        })
    );
}

#[test]
fn test_error_messages_carry_context() {
    let err = HtlcError::LockTimeNotSatisfied {
        input_index: 3,
        required: 15,
        sequence: 14,
    };
    let message = err.to_string();
    assert!(message.contains("Input 3"));
    assert!(message.contains("0x0000000f"));
    assert!(message.contains("0x0000000e"));
}
