//! Hash commitments to party preimages

use crate::types::{Commitment, Hash};
use bitcoin_hashes::{sha256d, Hash as BitcoinHash, HashEngine};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Commit: 𝔹* → 𝔹²⁰
///
/// commit(p) = RIPEMD160(SHA256(p)). Total and pure; any byte string is a valid preimage.
pub fn commit(preimage: &[u8]) -> Commitment {
    Commitment::from_bytes(hash160(preimage))
}

/// Check a candidate preimage against a commitment
pub fn opens(commitment: &Commitment, preimage: &[u8]) -> bool {
    commit(preimage) == *commitment
}

/// HASH160: RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha256_hash = Sha256::digest(data);
    let ripemd160_hash = Ripemd160::digest(&sha256_hash);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&ripemd160_hash);
    hash
}

/// Single SHA256
pub fn sha256(data: &[u8]) -> Hash {
    let result = Sha256::digest(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// SHA256(SHA256(x)), internal byte order
pub fn sha256d(data: &[u8]) -> Hash {
    let mut hasher = sha256d::Hash::engine();
    hasher.input(data);
    let result = sha256d::Hash::from_engine(hasher);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}
