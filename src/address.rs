//! P2WSH address derivation and segwit destination addresses

use crate::bech32;
use crate::error::{HtlcError, Result};
use crate::script::{Opcode, ScriptBuilder, WitnessScript};
use crate::types::ByteString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Networks with well-known address prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Bitcoin,
    Testnet,
    Signet,
    Regtest,
}

impl Network {
    pub fn params(&self) -> NetworkParams {
        let hrp = match self {
            Network::Bitcoin => "bc",
            Network::Testnet | Network::Signet => "tb",
            Network::Regtest => "bcrt",
        };
        NetworkParams {
            bech32_hrp: hrp.to_string(),
        }
    }
}

/// Address-encoding parameters of a network
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkParams {
    pub bech32_hrp: String,
}

impl NetworkParams {
    /// Human-readable part rules from BIP-173
    pub fn validate(&self) -> Result<()> {
        let hrp = &self.bech32_hrp;
        if hrp.is_empty() || hrp.len() > 83 {
            return Err(HtlcError::InvalidNetwork(format!(
                "human-readable part must be 1 to 83 characters, got {}",
                hrp.len()
            )));
        }
        if hrp.bytes().any(|c| !(33..=126).contains(&c)) {
            return Err(HtlcError::InvalidNetwork(format!(
                "human-readable part '{}' has characters outside 33..=126",
                hrp
            )));
        }
        if hrp.bytes().any(|c| c.is_ascii_uppercase()) {
            return Err(HtlcError::InvalidNetwork(format!(
                "human-readable part '{}' must be lower case",
                hrp
            )));
        }
        Ok(())
    }
}

impl From<Network> for NetworkParams {
    fn from(network: Network) -> Self {
        network.params()
    }
}

/// Segwit address: network prefix, witness version and program
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    hrp: String,
    witness_version: u8,
    program: ByteString,
}

impl Address {
    pub fn new(params: &NetworkParams, witness_version: u8, program: ByteString) -> Result<Self> {
        params.validate()?;
        check_program(witness_version, &program)?;
        Ok(Self {
            hrp: params.bech32_hrp.clone(),
            witness_version,
            program,
        })
    }

    /// Parse a segwit address, requiring the given network's prefix
    pub fn parse(text: &str, params: &NetworkParams) -> Result<Self> {
        params.validate()?;
        let (hrp, witness_version, program) = bech32::decode_segwit(text)?;
        if hrp != params.bech32_hrp {
            return Err(HtlcError::InvalidAddress(format!(
                "prefix '{}' does not match network prefix '{}'",
                hrp, params.bech32_hrp
            )));
        }
        check_program(witness_version, &program)?;
        Ok(Self {
            hrp,
            witness_version,
            program,
        })
    }

    pub fn witness_version(&self) -> u8 {
        self.witness_version
    }

    pub fn program(&self) -> &[u8] {
        &self.program
    }

    pub fn hrp(&self) -> &str {
        &self.hrp
    }

    /// Locking script: OP_n <program>
    pub fn script_pubkey(&self) -> ByteString {
        let version = Opcode::small_int(self.witness_version).unwrap_or(Opcode::OP_0);
        ScriptBuilder::new()
            .push_opcode(version)
            .push_slice(&self.program)
            .into_script()
            .as_bytes()
            .to_vec()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bech32::encode_segwit(&self.hrp, self.witness_version, &self.program))
    }
}

fn check_program(witness_version: u8, program: &[u8]) -> Result<()> {
    if witness_version > 16 {
        return Err(HtlcError::InvalidAddress(format!(
            "witness version {} above 16",
            witness_version
        )));
    }
    if program.len() < 2 || program.len() > 40 {
        return Err(HtlcError::InvalidAddress(format!(
            "witness program of {} bytes",
            program.len()
        )));
    }
    if witness_version == 0 && program.len() != 20 && program.len() != 32 {
        return Err(HtlcError::InvalidAddress(format!(
            "version 0 program must be 20 or 32 bytes, got {}",
            program.len()
        )));
    }
    Ok(())
}

/// DeriveAddress: WitnessScript × NetworkParams → Address
///
/// Address = Bech32(hrp, 0, SHA256(script))
pub fn derive_address(script: &WitnessScript, params: &NetworkParams) -> Result<Address> {
    Address::new(params, 0, script.script_hash().to_vec())
}

/// P2WSH locking script for a witness script: OP_0 <SHA256(script)>
pub fn p2wsh_script_pubkey(script: &WitnessScript) -> ByteString {
    ScriptBuilder::new()
        .push_opcode(Opcode::OP_0)
        .push_slice(&script.script_hash())
        .into_script()
        .as_bytes()
        .to_vec()
}
