//! # csv-htlc
//!
//! Two-party conditional Bitcoin outputs guarded by a relative lock time.
//!
//! A contract output is a P2WSH coin spendable either immediately, by a 2-of-2
//! multisig plus party A's hash preimage, or once a BIP-68 relative lock time
//! has matured, by the same multisig plus party B's hash preimage.
//!
//! ## Architecture
//!
//! The crate is layered leaf-first:
//! - Commitments and the relative lock time codec
//! - Witness script compilation and parsing
//! - P2WSH address derivation (bech32)
//! - Transaction assembly, BIP-143 signing and branch finalization
//! - BIP-144 serialization
//!
//! ## Design Principles
//!
//! 1. **No I/O**: Every operation is local and bounded; the binary owns files and logging setup
//! 2. **Typed scripts**: Scripts are built from opcodes and pushes, never from text
//! 3. **Exact Version Pinning**: All consensus-critical dependencies pinned to exact versions
//! 4. **Terminal finalization**: A finalized input is never modified again
//!
//! ## Usage
//!
//! ```rust
//! use csv_htlc::{HtlcContract, HtlcTemplate, LockTimeSpec, Network};
//! use csv_htlc::commitment::commit;
//! use csv_htlc::types::*;
//! use secp256k1::{Secp256k1, SecretKey};
//!
//! let secp = Secp256k1::new();
//! let key_a = SecretKey::from_slice(&[0x11; 32]).unwrap();
//! let key_b = SecretKey::from_slice(&[0x22; 32]).unwrap();
//!
//! let template = HtlcTemplate::new(
//!     CompressedPublicKey::from_secret_key(&secp, &key_a),
//!     CompressedPublicKey::from_secret_key(&secp, &key_b),
//!     commit(b"preimage-a"),
//!     commit(b"preimage-b"),
//!     LockTimeSpec::Blocks(15),
//! ).unwrap();
//! let contract = HtlcContract::new(template).unwrap();
//! let address = contract.address(&Network::Regtest.params()).unwrap();
//! assert!(address.to_string().starts_with("bcrt1q"));
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod commitment;
pub mod locktime;
pub mod script;
pub mod compiler;
pub mod bech32;
pub mod address;
pub mod transaction;
pub mod signer;
pub mod finalizer;
pub mod serialize;
pub mod config;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{HtlcError, Result};
pub use address::{derive_address, Address, Network, NetworkParams};
pub use compiler::{compile_witness_script, HtlcTemplate};
pub use config::HtlcConfig;
pub use locktime::LockTimeSpec;
pub use script::WitnessScript;
pub use transaction::{new_transaction, SpendInput};

use secp256k1::SecretKey;

/// A compiled contract: its parameters and witness script
///
/// # Examples
///
/// ```
/// use csv_htlc::{HtlcContract, HtlcTemplate, LockTimeSpec, SpendBranch};
/// use csv_htlc::commitment::commit;
/// use csv_htlc::types::*;
/// use secp256k1::{Secp256k1, SecretKey};
///
/// let secp = Secp256k1::new();
/// let pubkey = |byte| CompressedPublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[byte; 32]).unwrap());
/// let template = HtlcTemplate::new(
///     pubkey(0x11),
///     pubkey(0x22),
///     commit(b"a"),
///     commit(b"b"),
///     LockTimeSpec::Blocks(15),
/// ).unwrap();
///
/// let contract = HtlcContract::new(template).unwrap();
/// assert_eq!(contract.branch_for(b"b"), Some(SpendBranch::Timelocked));
/// assert_eq!(contract.script_pubkey().len(), 34);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtlcContract {
    template: HtlcTemplate,
    witness_script: WitnessScript,
}

impl HtlcContract {
    /// Compile a contract from its parameters
    pub fn new(template: HtlcTemplate) -> Result<Self> {
        let witness_script = template.compile()?;
        Ok(Self {
            template,
            witness_script,
        })
    }

    /// Recognize an existing witness script as a contract
    pub fn from_witness_script(witness_script: WitnessScript) -> Result<Self> {
        let template = HtlcTemplate::parse(&witness_script)?;
        Ok(Self {
            template,
            witness_script,
        })
    }

    pub fn template(&self) -> &HtlcTemplate {
        &self.template
    }

    pub fn witness_script(&self) -> &WitnessScript {
        &self.witness_script
    }

    /// P2WSH address of the contract on a network
    pub fn address(&self, params: &NetworkParams) -> Result<Address> {
        derive_address(&self.witness_script, params)
    }

    /// Locking script funding transactions pay to
    pub fn script_pubkey(&self) -> ByteString {
        address::p2wsh_script_pubkey(&self.witness_script)
    }

    pub fn branch_for(&self, preimage: &[u8]) -> Option<SpendBranch> {
        self.template.branch_for(preimage)
    }

    /// A contract coin as an input prepared for one branch
    pub fn spend_input(&self, outpoint: OutPoint, value: u64, branch: SpendBranch) -> Result<SpendInput> {
        match branch {
            SpendBranch::Immediate => Ok(SpendInput::immediate(outpoint, value, self.witness_script.clone())),
            SpendBranch::Timelocked => SpendInput::timelocked(
                outpoint,
                value,
                self.witness_script.clone(),
                self.template.lock_time_spec()?,
            ),
        }
    }

    /// Spend one contract coin to one destination: assemble, sign with both keys, finalize
    pub fn spend(
        &self,
        outpoint: OutPoint,
        value: u64,
        destination: Address,
        output_value: u64,
        preimage: &[u8],
        secret_keys: &[SecretKey],
    ) -> Result<Transaction> {
        let branch = self
            .branch_for(preimage)
            .ok_or(HtlcError::NoMatchingBranch { input_index: 0 })?;
        let input = self.spend_input(outpoint, value, branch)?;
        let mut tx = new_transaction(vec![input], vec![(destination, output_value)])?;

        let signatures = secret_keys
            .iter()
            .map(|key| signer::sign(&tx, 0, key))
            .collect::<Result<Vec<_>>>()?;
        finalizer::finalize(&mut tx, 0, preimage, &signatures)?;
        Ok(tx)
    }
}
