//! Relative lock times (BIP-68 sequence encoding, BIP-112 satisfaction)
//!
//! The 32-bit sequence field of an input doubles as the relative lock time
//! consumed by OP_CHECKSEQUENCEVERIFY:
//!
//! ```text
//!  bit 31      disable flag (no relative lock time when set)
//!  bit 22      type flag (512-second intervals when set, blocks otherwise)
//!  bits 0..16  count
//! ```

use crate::constants::*;
use crate::error::{HtlcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A requested relative lock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTimeSpec {
    /// N blocks after the spent coin confirmed
    Blocks(u32),
    /// N × 512 seconds after the spent coin confirmed
    Intervals(u32),
}

impl LockTimeSpec {
    pub fn count(&self) -> u32 {
        match self {
            LockTimeSpec::Blocks(n) | LockTimeSpec::Intervals(n) => *n,
        }
    }

    pub fn is_time_based(&self) -> bool {
        matches!(self, LockTimeSpec::Intervals(_))
    }

    /// Lock duration in seconds, for interval-based locks
    pub fn duration_secs(&self) -> Option<u64> {
        match self {
            LockTimeSpec::Intervals(n) => Some((*n as u64) << SEQUENCE_LOCKTIME_GRANULARITY),
            LockTimeSpec::Blocks(_) => None,
        }
    }

    /// CheckSequenceVerify: does an input sequence satisfy this lock time?
    ///
    /// seq satisfies spec iff
    /// 1. seq & DISABLE = 0
    /// 2. seq & TYPE = encode(spec) & TYPE
    /// 3. seq & MASK ≥ count(spec)
    pub fn is_satisfied_by(&self, sequence: u32) -> bool {
        match decode(sequence) {
            Some(actual) => {
                actual.is_time_based() == self.is_time_based() && actual.count() >= self.count()
            }
            None => false,
        }
    }
}

impl fmt::Display for LockTimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockTimeSpec::Blocks(n) => write!(f, "{} blocks", n),
            LockTimeSpec::Intervals(n) => write!(f, "{} × 512 seconds", n),
        }
    }
}

/// Encode: LockTimeSpec → 𝔹³²
///
/// Blocks(n) ↦ n, Intervals(n) ↦ TYPE | n, for n ≤ 65535.
pub fn encode(spec: LockTimeSpec) -> Result<u32> {
    let count = spec.count();
    if count > MAX_RELATIVE_LOCKTIME {
        return Err(HtlcError::InvalidRange {
            count: count as u64,
            max: MAX_RELATIVE_LOCKTIME as u64,
        });
    }

    Ok(match spec {
        LockTimeSpec::Blocks(_) => count,
        LockTimeSpec::Intervals(_) => SEQUENCE_LOCKTIME_TYPE_FLAG | count,
    })
}

/// Decode: 𝔹³² → LockTimeSpec ∪ {⊥}
///
/// Returns `None` when the disable flag is set. Bits outside the type flag and
/// count are ignored.
pub fn decode(sequence: u32) -> Option<LockTimeSpec> {
    if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return None;
    }

    let count = sequence & SEQUENCE_LOCKTIME_MASK;
    if sequence & SEQUENCE_LOCKTIME_TYPE_FLAG != 0 {
        Some(LockTimeSpec::Intervals(count))
    } else {
        Some(LockTimeSpec::Blocks(count))
    }
}
