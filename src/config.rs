//! JSON description of a contract and one spend of it
//!
//! ```json
//! {
//!   "network": "regtest",
//!   "lock_time": { "blocks": 15 },
//!   "party_a": { "secret_key": "11..11", "preimage": "10a1e49e2c56295e1f2fd2dce78294da" },
//!   "party_b": { "secret_key": "22..22", "preimage": "0dc7c47740a748abed192062f0caf637" },
//!   "funding": { "txid": "ab..cd", "vout": 0, "value": 100000000 },
//!   "destination": { "address": "bcrt1q...", "value": 99900000 }
//! }
//! ```
//!
//! Preimages are taken as the UTF-8 bytes of the strings, not hex-decoded.

use crate::address::{Address, Network, NetworkParams};
use crate::commitment::commit;
use crate::compiler::HtlcTemplate;
use crate::error::{HtlcError, Result};
use crate::locktime::LockTimeSpec;
use crate::script::WitnessScript;
use crate::transaction::SpendInput;
use crate::types::{CompressedPublicKey, OutPoint, SpendBranch};
use secp256k1::{Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcConfig {
    pub network: Network,
    pub lock_time: LockTimeSpec,
    pub party_a: PartyConfig,
    pub party_b: PartyConfig,
    pub funding: FundingConfig,
    pub destination: DestinationConfig,
}

/// One multisig participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyConfig {
    /// 32-byte secret key, hex
    pub secret_key: String,
    pub preimage: String,
}

/// The contract coin being spent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Big-endian txid as shown by explorers and RPC
    pub txid: String,
    pub vout: u32,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub address: String,
    pub value: u64,
}

impl PartyConfig {
    pub fn secret_key(&self) -> Result<SecretKey> {
        let bytes = hex::decode(&self.secret_key)
            .map_err(|e| HtlcError::InvalidKey(format!("secret key hex: {}", e)))?;
        SecretKey::from_slice(&bytes).map_err(|e| HtlcError::InvalidKey(e.to_string()))
    }

    pub fn public_key(&self) -> Result<CompressedPublicKey> {
        let secp = Secp256k1::signing_only();
        Ok(CompressedPublicKey::from_secret_key(&secp, &self.secret_key()?))
    }

    pub fn preimage(&self) -> &[u8] {
        self.preimage.as_bytes()
    }
}

impl HtlcConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| HtlcError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| HtlcError::Serialization(e.to_string()))
    }

    pub fn network_params(&self) -> NetworkParams {
        self.network.params()
    }

    /// Contract parameters: both public keys, both commitments, the lock time
    pub fn template(&self) -> Result<HtlcTemplate> {
        HtlcTemplate::new(
            self.party_a.public_key()?,
            self.party_b.public_key()?,
            commit(self.party_a.preimage()),
            commit(self.party_b.preimage()),
            self.lock_time,
        )
    }

    pub fn funding_outpoint(&self) -> Result<OutPoint> {
        OutPoint::from_txid_hex(&self.funding.txid, self.funding.vout)
    }

    pub fn destination_address(&self) -> Result<Address> {
        Address::parse(&self.destination.address, &self.network_params())
    }

    /// The funding coin as an input prepared for the given branch
    pub fn spend_input(&self, witness_script: WitnessScript, branch: SpendBranch) -> Result<SpendInput> {
        let outpoint = self.funding_outpoint()?;
        match branch {
            SpendBranch::Immediate => Ok(SpendInput::immediate(outpoint, self.funding.value, witness_script)),
            SpendBranch::Timelocked => {
                SpendInput::timelocked(outpoint, self.funding.value, witness_script, self.lock_time)
            }
        }
    }

    /// Preimage that opens the given branch
    pub fn preimage_for(&self, branch: SpendBranch) -> &[u8] {
        match branch {
            SpendBranch::Immediate => self.party_a.preimage(),
            SpendBranch::Timelocked => self.party_b.preimage(),
        }
    }
}
