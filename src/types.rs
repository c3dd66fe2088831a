//! Core types for the two-party conditional output and its spending transaction

use crate::constants::*;
use crate::error::{HtlcError, Result};
use crate::script::WitnessScript;
use secp256k1::{PublicKey, Secp256k1, SecretKey, Signing};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Hash type: 256-bit hash, internal byte order
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Witness stack: ordered byte strings, first element pushed first
pub type Witness = Vec<ByteString>;

/// Implements hex-string serde for a type with `from_hex` and a hex `Display`.
macro_rules! impl_hex_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                $ty::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Compressed secp256k1 public key (33 bytes, 0x02/0x03 prefix)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressedPublicKey([u8; COMPRESSED_PUBKEY_SIZE]);

impl CompressedPublicKey {
    /// Parse and validate a compressed point encoding
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != COMPRESSED_PUBKEY_SIZE {
            return Err(HtlcError::InvalidKey(format!(
                "expected {} bytes, got {}",
                COMPRESSED_PUBKEY_SIZE,
                bytes.len()
            )));
        }
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return Err(HtlcError::InvalidKey(format!(
                "prefix {:#04x} is not a compressed encoding",
                bytes[0]
            )));
        }
        PublicKey::from_slice(bytes).map_err(|e| HtlcError::InvalidKey(e.to_string()))?;

        let mut key = [0u8; COMPRESSED_PUBKEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| HtlcError::InvalidKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn from_secret_key<C: Signing>(secp: &Secp256k1<C>, secret_key: &SecretKey) -> Self {
        Self(PublicKey::from_secret_key(secp, secret_key).serialize())
    }

    pub fn as_bytes(&self) -> &[u8; COMPRESSED_PUBKEY_SIZE] {
        &self.0
    }

    /// Curve point for signature verification
    pub fn to_public_key(&self) -> Result<PublicKey> {
        PublicKey::from_slice(&self.0).map_err(|e| HtlcError::InvalidKey(e.to_string()))
    }
}

impl fmt::Display for CompressedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl_hex_serde!(CompressedPublicKey);

/// Commitment: HASH160(preimage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Commitment([u8; HASH160_SIZE]);

impl Commitment {
    pub fn from_bytes(bytes: [u8; HASH160_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HASH160_SIZE {
            return Err(HtlcError::Serialization(format!(
                "commitment must be {} bytes, got {}",
                HASH160_SIZE,
                bytes.len()
            )));
        }
        let mut commitment = [0u8; HASH160_SIZE];
        commitment.copy_from_slice(bytes);
        Ok(Self(commitment))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| HtlcError::Serialization(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH160_SIZE] {
        &self.0
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl_hex_serde!(Commitment);

/// OutPoint: 𝒪 = ℍ × ℕ
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    /// Build from a txid in display (big-endian) hex, as shown by explorers and RPC
    pub fn from_txid_hex(txid: &str, index: u32) -> Result<Self> {
        let bytes = hex::decode(txid).map_err(|e| HtlcError::Serialization(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(HtlcError::Serialization(format!(
                "txid must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut hash = [0u8; 32];
        for (i, byte) in bytes.iter().rev().enumerate() {
            hash[i] = *byte;
        }
        Ok(Self { hash, index })
    }

    /// Txid in display (big-endian) hex
    pub fn txid_hex(&self) -> String {
        let mut display = self.hash;
        display.reverse();
        hex::encode(display)
    }
}

/// Transaction Output: value × scriptPubKey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_pubkey: ByteString,
}

/// Signature from one multisig party: DER encoding followed by the sighash byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSignature {
    pub signer: CompressedPublicKey,
    pub signature: ByteString,
}

/// Spending path through the contract's IF/ELSE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendBranch {
    /// Multisig plus party A's preimage, no lock time
    Immediate,
    /// Multisig plus party B's preimage once the relative lock time matures
    Timelocked,
}

impl SpendBranch {
    /// Witness item selecting this branch at OP_IF
    pub fn flag(&self) -> ByteString {
        match self {
            SpendBranch::Immediate => vec![0x01],
            SpendBranch::Timelocked => vec![],
        }
    }
}

impl fmt::Display for SpendBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpendBranch::Immediate => f.write_str("immediate"),
            SpendBranch::Timelocked => f.write_str("timelocked"),
        }
    }
}

/// A finalized input: the branch taken and its witness stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedInput {
    pub branch: SpendBranch,
    pub witness: Witness,
}

/// Input lifecycle; `Finalized` is terminal
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Unfinalized,
    Finalized(FinalizedInput),
}

/// Transaction Input spending a contract output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub sequence: u32,
    /// Value of the coin being spent, committed to by the sighash
    pub value: u64,
    pub witness_script: WitnessScript,
    pub partial_sigs: BTreeMap<CompressedPublicKey, PartialSignature>,
    pub state: InputState,
}

impl TransactionInput {
    pub fn is_finalized(&self) -> bool {
        matches!(self.state, InputState::Finalized(_))
    }

    /// Witness stack, present once finalized
    pub fn witness(&self) -> Option<&Witness> {
        match &self.state {
            InputState::Finalized(finalized) => Some(&finalized.witness),
            InputState::Unfinalized => None,
        }
    }
}

/// Transaction: version × inputs × outputs × lock time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATOR: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_compressed_key_valid() {
        let key = CompressedPublicKey::from_hex(GENERATOR).unwrap();
        assert_eq!(key.to_string(), GENERATOR);
        assert_eq!(key.as_bytes()[0], 0x02);
    }

    #[test]
    fn test_compressed_key_from_secret() {
        let secp = Secp256k1::new();
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let sk = SecretKey::from_slice(&secret).unwrap();
        let key = CompressedPublicKey::from_secret_key(&secp, &sk);
        assert_eq!(key.to_string(), GENERATOR);
    }

    #[test]
    fn test_compressed_key_rejects_uncompressed() {
        let mut bytes = vec![0x04];
        bytes.extend_from_slice(&[0x11; 64]);
        assert!(matches!(
            CompressedPublicKey::from_slice(&bytes),
            Err(HtlcError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_compressed_key_rejects_bad_prefix() {
        let mut bytes = hex::decode(GENERATOR).unwrap();
        bytes[0] = 0x05;
        assert!(matches!(
            CompressedPublicKey::from_slice(&bytes),
            Err(HtlcError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_compressed_key_rejects_off_curve() {
        // x = 5 has no point on secp256k1
        let mut bytes = vec![0x02];
        bytes.extend_from_slice(&[0u8; 31]);
        bytes.push(0x05);
        assert!(matches!(
            CompressedPublicKey::from_slice(&bytes),
            Err(HtlcError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_outpoint_txid_hex_roundtrip() {
        let txid = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
        let outpoint = OutPoint::from_txid_hex(txid, 3).unwrap();
        assert_eq!(outpoint.hash[0], 0xff);
        assert_eq!(outpoint.hash[31], 0x00);
        assert_eq!(outpoint.txid_hex(), txid);
        assert_eq!(outpoint.index, 3);
    }

    #[test]
    fn test_outpoint_rejects_short_txid() {
        assert!(OutPoint::from_txid_hex("abcd", 0).is_err());
    }

    #[test]
    fn test_key_serde_as_hex() {
        let key = CompressedPublicKey::from_hex(GENERATOR).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", GENERATOR));
        let back: CompressedPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_branch_flags() {
        assert_eq!(SpendBranch::Immediate.flag(), vec![0x01]);
        assert!(SpendBranch::Timelocked.flag().is_empty());
    }
}
