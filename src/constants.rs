//! Bitcoin constants used by the contract, its spends and their encoding

/// Maximum money supply: 21,000,000 BTC in satoshis
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

/// Satoshis per BTC
pub const SATOSHIS_PER_BTC: u64 = 100_000_000;

/// Transaction version required for BIP-68 relative lock times
pub const TX_VERSION: i32 = 2;

/// Sequence number for final transaction (no relative lock time)
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// BIP-68: when set, the sequence carries no relative lock time
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// BIP-68: when set, the count is in units of 512 seconds, otherwise blocks
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// BIP-68: bits holding the lock time count
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000ffff;

/// BIP-68: time-based lock granularity, 2^9 seconds
pub const SEQUENCE_LOCKTIME_GRANULARITY: u32 = 9;

/// Largest count a relative lock time can carry
pub const MAX_RELATIVE_LOCKTIME: u32 = 0xffff;

/// Sighash type committing to all inputs and outputs
pub const SIGHASH_ALL: u8 = 0x01;

/// Length of a compressed secp256k1 public key
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Length of a HASH160 digest
pub const HASH160_SIZE: usize = 20;

/// Maximum script element size
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum witness script size for P2WSH
pub const MAX_WITNESS_SCRIPT_SIZE: usize = 3_600;

/// Number of witness stack items a finalized contract input carries
pub const CONTRACT_WITNESS_ITEMS: usize = 5;
