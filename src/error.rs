//! Error types for contract construction, signing and finalization

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HtlcError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Lock time count {count} out of range (max {max})")]
    InvalidRange { count: u64, max: u64 },

    #[error("Insufficient value: inputs total {inputs} sat, outputs total {outputs} sat")]
    InsufficientValue { inputs: u64, outputs: u64 },

    #[error("Unknown input {index}: transaction has {count} inputs")]
    UnknownInput { index: usize, count: usize },

    #[error("Malformed script at element {position}: expected {expected}, found {found}")]
    MalformedScript {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Input {input_index}: preimage matches neither commitment")]
    NoMatchingBranch { input_index: usize },

    #[error("Input {input_index}: {found} of {required} required signatures supplied")]
    InsufficientSignatures {
        input_index: usize,
        required: usize,
        found: usize,
    },

    #[error("Input {input_index} is already finalized")]
    AlreadyFinalized { input_index: usize },

    #[error("Input {input_index} is not finalized")]
    NotFullyFinalized { input_index: usize },

    #[error("Input {input_index}: sequence {sequence:#010x} is neither the script lock time {expected:#010x} nor final")]
    InvalidSequence {
        input_index: usize,
        sequence: u32,
        expected: u32,
    },

    #[error("Input {input_index}: sequence {sequence:#010x} does not satisfy relative lock time {required:#010x}")]
    LockTimeNotSatisfied {
        input_index: usize,
        required: u32,
        sequence: u32,
    },

    #[error("Input {input_index}: witness item of {size} bytes exceeds {max}")]
    OversizedWitnessItem {
        input_index: usize,
        size: usize,
        max: usize,
    },

    #[error("Input {input_index}: invalid signature: {reason}")]
    InvalidSignature { input_index: usize, reason: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid network parameters: {0}")]
    InvalidNetwork(String),

    #[error("Transaction validation failed: {0}")]
    InvalidTransaction(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, HtlcError>;
