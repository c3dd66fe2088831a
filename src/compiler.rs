//! Witness script compiler for the two-branch conditional output
//!
//! ```text
//! OP_2 <pubkeyA> <pubkeyB> OP_2 OP_CHECKMULTISIGVERIFY
//! OP_HASH160 <commitA> OP_EQUAL
//! OP_IF
//!   OP_1
//! OP_ELSE
//!   <lockTime> OP_CHECKSEQUENCEVERIFY OP_DROP
//!   OP_HASH160 <commitB> OP_EQUAL
//! OP_ENDIF
//! ```
//!
//! The multisig check is unconditional; the branches differ only in which
//! preimage they accept and whether the relative lock time applies.

use crate::commitment::commit;
use crate::constants::*;
use crate::error::{HtlcError, Result};
use crate::locktime::{self, LockTimeSpec};
use crate::script::{check_size_limits, decode_script_num, Opcode, ScriptBuilder, ScriptElement, WitnessScript};
use crate::types::{Commitment, CompressedPublicKey, SpendBranch};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Element index of the OP_IF opening the conditional region
pub const BRANCH_OPCODE_POSITION: usize = 8;

/// Number of elements in a compiled contract script
pub const TEMPLATE_ELEMENT_COUNT: usize = 18;

/// The parameters a contract script commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcTemplate {
    pub pubkey_a: CompressedPublicKey,
    pub pubkey_b: CompressedPublicKey,
    pub commitment_a: Commitment,
    pub commitment_b: Commitment,
    /// BIP-68 encoded relative lock time guarding the second branch
    pub lock_time: u32,
}

impl HtlcTemplate {
    pub fn new(
        pubkey_a: CompressedPublicKey,
        pubkey_b: CompressedPublicKey,
        commitment_a: Commitment,
        commitment_b: Commitment,
        lock_time: LockTimeSpec,
    ) -> Result<Self> {
        Ok(Self {
            pubkey_a,
            pubkey_b,
            commitment_a,
            commitment_b,
            lock_time: locktime::encode(lock_time)?,
        })
    }

    /// Emit the witness script for these parameters
    pub fn compile(&self) -> Result<WitnessScript> {
        let spec = canonical_lock_time(self.lock_time)?;

        let script = ScriptBuilder::new()
            .push_opcode(Opcode::OP_2)
            .push_slice(self.pubkey_a.as_bytes())
            .push_slice(self.pubkey_b.as_bytes())
            .push_opcode(Opcode::OP_2)
            .push_opcode(Opcode::OP_CHECKMULTISIGVERIFY)
            .push_opcode(Opcode::OP_HASH160)
            .push_slice(self.commitment_a.as_bytes())
            .push_opcode(Opcode::OP_EQUAL)
            .push_opcode(Opcode::OP_IF)
            .push_opcode(Opcode::OP_TRUE)
            .push_opcode(Opcode::OP_ELSE)
            .push_int(self.lock_time as i64)
            .push_opcode(Opcode::OP_CHECKSEQUENCEVERIFY)
            .push_opcode(Opcode::OP_DROP)
            .push_opcode(Opcode::OP_HASH160)
            .push_slice(self.commitment_b.as_bytes())
            .push_opcode(Opcode::OP_EQUAL)
            .push_opcode(Opcode::OP_ENDIF)
            .into_script();

        debug!(
            lock_time = %spec,
            script_len = script.len(),
            "compiled witness script"
        );
        Ok(script)
    }

    /// Recover the parameters from a compiled script, checking its exact shape
    pub fn parse(script: &WitnessScript) -> Result<Self> {
        check_size_limits(script)?;
        let elements = script.decompile()?;
        let mut cursor = Cursor::new(&elements);

        cursor.expect_op(Opcode::OP_2)?;
        let pubkey_a = cursor.expect_pubkey()?;
        let pubkey_b = cursor.expect_pubkey()?;
        cursor.expect_op(Opcode::OP_2)?;
        cursor.expect_op(Opcode::OP_CHECKMULTISIGVERIFY)?;
        cursor.expect_op(Opcode::OP_HASH160)?;
        let commitment_a = cursor.expect_commitment()?;
        cursor.expect_op(Opcode::OP_EQUAL)?;
        cursor.expect_op(Opcode::OP_IF)?;
        cursor.expect_op(Opcode::OP_TRUE)?;
        cursor.expect_op(Opcode::OP_ELSE)?;
        let lock_time = cursor.expect_lock_time()?;
        cursor.expect_op(Opcode::OP_CHECKSEQUENCEVERIFY)?;
        cursor.expect_op(Opcode::OP_DROP)?;
        cursor.expect_op(Opcode::OP_HASH160)?;
        let commitment_b = cursor.expect_commitment()?;
        cursor.expect_op(Opcode::OP_EQUAL)?;
        cursor.expect_op(Opcode::OP_ENDIF)?;
        cursor.expect_end()?;

        Ok(Self {
            pubkey_a,
            pubkey_b,
            commitment_a,
            commitment_b,
            lock_time,
        })
    }

    pub fn lock_time_spec(&self) -> Result<LockTimeSpec> {
        canonical_lock_time(self.lock_time)
    }

    /// The branch a preimage opens, immediate first
    pub fn branch_for(&self, preimage: &[u8]) -> Option<SpendBranch> {
        let commitment = commit(preimage);
        if commitment == self.commitment_a {
            Some(SpendBranch::Immediate)
        } else if commitment == self.commitment_b {
            Some(SpendBranch::Timelocked)
        } else {
            None
        }
    }
}

/// Compile: PK × PK × ℍ₁₆₀ × ℍ₁₆₀ × 𝔹³² → WitnessScript
///
/// Fails with `InvalidKey` unless both keys are compressed points, and with
/// `InvalidRange` unless the lock time is a canonical BIP-68 encoding.
pub fn compile_witness_script(
    pubkey_a: &[u8],
    pubkey_b: &[u8],
    commitment_a: &Commitment,
    commitment_b: &Commitment,
    encoded_lock_time: u32,
) -> Result<WitnessScript> {
    let template = HtlcTemplate {
        pubkey_a: CompressedPublicKey::from_slice(pubkey_a)?,
        pubkey_b: CompressedPublicKey::from_slice(pubkey_b)?,
        commitment_a: *commitment_a,
        commitment_b: *commitment_b,
        lock_time: encoded_lock_time,
    };
    template.compile()
}

/// Only sequences that decode and re-encode to themselves may appear in a script
fn canonical_lock_time(encoded: u32) -> Result<LockTimeSpec> {
    let invalid = || HtlcError::InvalidRange {
        count: encoded as u64,
        max: (SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK) as u64,
    };
    let spec = locktime::decode(encoded).ok_or_else(invalid)?;
    if locktime::encode(spec)? != encoded {
        return Err(invalid());
    }
    Ok(spec)
}

struct Cursor<'a> {
    elements: &'a [ScriptElement],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(elements: &'a [ScriptElement]) -> Self {
        Self { elements, position: 0 }
    }

    fn malformed(&self, expected: &str, found: Option<&ScriptElement>) -> HtlcError {
        HtlcError::MalformedScript {
            position: self.position,
            expected: expected.to_string(),
            found: describe(found),
        }
    }

    fn next(&mut self) -> Option<&'a ScriptElement> {
        let element = self.elements.get(self.position);
        if element.is_some() {
            self.position += 1;
        }
        element
    }

    fn expect_op(&mut self, opcode: Opcode) -> Result<()> {
        match self.elements.get(self.position) {
            Some(ScriptElement::Op(op)) if *op == opcode => {
                self.position += 1;
                Ok(())
            }
            found => Err(self.malformed(&opcode.name(), found)),
        }
    }

    fn expect_push(&mut self, len: usize, expected: &str) -> Result<&'a [u8]> {
        match self.elements.get(self.position) {
            Some(ScriptElement::Push(data)) if data.len() == len => {
                self.position += 1;
                Ok(data)
            }
            found => Err(self.malformed(expected, found)),
        }
    }

    fn expect_pubkey(&mut self) -> Result<CompressedPublicKey> {
        let data = self.expect_push(COMPRESSED_PUBKEY_SIZE, "33-byte public key")?;
        CompressedPublicKey::from_slice(data)
    }

    fn expect_commitment(&mut self) -> Result<Commitment> {
        let data = self.expect_push(HASH160_SIZE, "20-byte commitment")?;
        Commitment::from_slice(data)
    }

    fn expect_lock_time(&mut self) -> Result<u32> {
        const EXPECTED: &str = "relative lock time";
        let position = self.position;
        let value = match self.next() {
            Some(ScriptElement::Op(op)) => op.small_int_value().map(i64::from),
            Some(ScriptElement::Push(data)) => decode_script_num(data, 5),
            None => None,
        };

        let lock_time = value
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| canonical_lock_time(*v).is_ok());
        lock_time.ok_or_else(|| HtlcError::MalformedScript {
            position,
            expected: EXPECTED.to_string(),
            found: describe(self.elements.get(position)),
        })
    }

    fn expect_end(&self) -> Result<()> {
        match self.elements.get(self.position) {
            None => Ok(()),
            found => Err(self.malformed("end of script", found)),
        }
    }
}

fn describe(element: Option<&ScriptElement>) -> String {
    match element {
        Some(ScriptElement::Op(op)) => op.name(),
        Some(ScriptElement::Push(data)) => format!("{}-byte push", data.len()),
        None => "end of script".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{Secp256k1, SecretKey};

    fn keys() -> (CompressedPublicKey, CompressedPublicKey) {
        let secp = Secp256k1::new();
        let a = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let b = SecretKey::from_slice(&[0x22; 32]).unwrap();
        (
            CompressedPublicKey::from_secret_key(&secp, &a),
            CompressedPublicKey::from_secret_key(&secp, &b),
        )
    }

    fn template(lock_time: LockTimeSpec) -> HtlcTemplate {
        let (a, b) = keys();
        HtlcTemplate::new(a, b, commit(b"preimage-a"), commit(b"preimage-b"), lock_time).unwrap()
    }

    #[test]
    fn test_compile_exact_bytes() {
        let t = template(LockTimeSpec::Blocks(15));
        let script = t.compile().unwrap();

        let mut expected = vec![0x52, 0x21];
        expected.extend_from_slice(t.pubkey_a.as_bytes());
        expected.push(0x21);
        expected.extend_from_slice(t.pubkey_b.as_bytes());
        expected.extend_from_slice(&[0x52, 0xaf, 0xa9, 0x14]);
        expected.extend_from_slice(t.commitment_a.as_bytes());
        expected.extend_from_slice(&[0x87, 0x63, 0x51, 0x67, 0x5f, 0xb2, 0x75, 0xa9, 0x14]);
        expected.extend_from_slice(t.commitment_b.as_bytes());
        expected.extend_from_slice(&[0x87, 0x68]);

        assert_eq!(script.as_bytes(), expected.as_slice());
        assert_eq!(script.len(), 124);
    }

    #[test]
    fn test_compile_time_based_lock() {
        let script = template(LockTimeSpec::Intervals(4)).compile().unwrap();
        let elements = script.decompile().unwrap();
        assert_eq!(elements[11], ScriptElement::Push(vec![0x04, 0x00, 0x40]));
    }

    #[test]
    fn test_compile_zero_lock() {
        let script = template(LockTimeSpec::Blocks(0)).compile().unwrap();
        let elements = script.decompile().unwrap();
        assert_eq!(elements[11], ScriptElement::Push(vec![]));
        assert_eq!(HtlcTemplate::parse(&script).unwrap().lock_time, 0);
    }

    #[test]
    fn test_compile_rejects_invalid_key() {
        let (a, _) = keys();
        let result = compile_witness_script(
            a.as_bytes(),
            &[0x04; 33],
            &commit(b"a"),
            &commit(b"b"),
            15,
        );
        assert!(matches!(result, Err(HtlcError::InvalidKey(_))));
    }

    #[test]
    fn test_compile_rejects_disabled_lock_time() {
        let (a, b) = keys();
        let result = compile_witness_script(
            a.as_bytes(),
            b.as_bytes(),
            &commit(b"a"),
            &commit(b"b"),
            SEQUENCE_FINAL,
        );
        assert!(matches!(result, Err(HtlcError::InvalidRange { .. })));
    }

    #[test]
    fn test_parse_roundtrip() {
        for spec in [LockTimeSpec::Blocks(15), LockTimeSpec::Blocks(1000), LockTimeSpec::Intervals(65535)] {
            let t = template(spec);
            let parsed = HtlcTemplate::parse(&t.compile().unwrap()).unwrap();
            assert_eq!(parsed, t);
            assert_eq!(parsed.lock_time_spec().unwrap(), spec);
        }
    }

    #[test]
    fn test_parse_rejects_missing_branch_opcode() {
        let t = template(LockTimeSpec::Blocks(15));
        let mut bytes = t.compile().unwrap().as_bytes().to_vec();
        // OP_2 <33> <33> OP_2 OP_CHECKMULTISIGVERIFY OP_HASH160 <20> OP_EQUAL, then OP_IF
        let if_offset = 1 + 34 + 34 + 1 + 1 + 1 + 21 + 1;
        assert_eq!(bytes[if_offset], 0x63);
        bytes[if_offset] = 0x64;

        let result = HtlcTemplate::parse(&WitnessScript::from_bytes(bytes));
        assert_eq!(
            result,
            Err(HtlcError::MalformedScript {
                position: BRANCH_OPCODE_POSITION,
                expected: "OP_IF".to_string(),
                found: "OP_NOTIF".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_rejects_unrelated_script() {
        let script = ScriptBuilder::new()
            .push_opcode(Opcode::OP_DUP)
            .push_opcode(Opcode::OP_HASH160)
            .push_slice(&[0u8; 20])
            .push_opcode(Opcode::OP_EQUALVERIFY)
            .push_opcode(Opcode::OP_CHECKSIG)
            .into_script();
        assert!(matches!(
            HtlcTemplate::parse(&script),
            Err(HtlcError::MalformedScript { position: 0, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_trailing_elements() {
        let t = template(LockTimeSpec::Blocks(15));
        let mut bytes = t.compile().unwrap().as_bytes().to_vec();
        bytes.push(0x51);
        assert!(matches!(
            HtlcTemplate::parse(&WitnessScript::from_bytes(bytes)),
            Err(HtlcError::MalformedScript { position: TEMPLATE_ELEMENT_COUNT, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_script() {
        let t = template(LockTimeSpec::Blocks(15));
        let bytes = t.compile().unwrap().as_bytes()[..100].to_vec();
        assert!(HtlcTemplate::parse(&WitnessScript::from_bytes(bytes)).is_err());
    }

    #[test]
    fn test_branch_for() {
        let t = template(LockTimeSpec::Blocks(15));
        assert_eq!(t.branch_for(b"preimage-a"), Some(SpendBranch::Immediate));
        assert_eq!(t.branch_for(b"preimage-b"), Some(SpendBranch::Timelocked));
        assert_eq!(t.branch_for(b"preimage-c"), None);
    }

    #[test]
    fn test_asm_rendering() {
        let t = template(LockTimeSpec::Blocks(15));
        let asm = t.compile().unwrap().to_asm();
        assert!(asm.starts_with("OP_2 "));
        assert!(asm.contains("OP_2 OP_CHECKMULTISIGVERIFY OP_HASH160"));
        assert!(asm.contains("OP_IF OP_1 OP_ELSE OP_15 OP_CHECKSEQUENCEVERIFY OP_DROP OP_HASH160"));
        assert!(asm.ends_with("OP_EQUAL OP_ENDIF"));
    }
}
