//! Assembly of unsigned transactions spending contract outputs

use crate::address::Address;
use crate::compiler::HtlcTemplate;
use crate::constants::*;
use crate::error::{HtlcError, Result};
use crate::locktime::{self, LockTimeSpec};
use crate::script::WitnessScript;
use crate::types::*;
use std::collections::BTreeMap;
use tracing::debug;

/// A contract coin to spend, with the sequence its input will carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendInput {
    pub outpoint: OutPoint,
    pub sequence: u32,
    pub value: u64,
    pub witness_script: WitnessScript,
}

impl SpendInput {
    /// Input for the immediate branch: no relative lock time constraint
    pub fn immediate(outpoint: OutPoint, value: u64, witness_script: WitnessScript) -> Self {
        Self {
            outpoint,
            sequence: SEQUENCE_FINAL,
            value,
            witness_script,
        }
    }

    /// Input for the timelocked branch: the sequence carries the script's lock time
    pub fn timelocked(
        outpoint: OutPoint,
        value: u64,
        witness_script: WitnessScript,
        lock_time: LockTimeSpec,
    ) -> Result<Self> {
        Ok(Self {
            outpoint,
            sequence: locktime::encode(lock_time)?,
            value,
            witness_script,
        })
    }
}

/// NewTransaction: SpendInput* × (Address × ℕ)* → 𝒯𝒳
///
/// A transaction is assembled if and only if:
/// 1. |ins| > 0 ∧ |outs| > 0
/// 2. ∀i ∈ ins: i.script is a contract script ∧ i.sequence ∈ {lock_time(i.script), FINAL}
/// 3. ∀o ∈ outs: 0 < o.value ≤ M_max
/// 4. Σₒ o.value < Σᵢ i.value
pub fn new_transaction(inputs: Vec<SpendInput>, outputs: Vec<(Address, u64)>) -> Result<Transaction> {
    if inputs.is_empty() || outputs.is_empty() {
        return Err(HtlcError::InvalidTransaction(
            "Empty inputs or outputs".to_string(),
        ));
    }

    let mut total_in = 0u64;
    let mut tx_inputs = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.into_iter().enumerate() {
        let template = HtlcTemplate::parse(&input.witness_script)?;
        if input.sequence != template.lock_time && input.sequence != SEQUENCE_FINAL {
            return Err(HtlcError::InvalidSequence {
                input_index: i,
                sequence: input.sequence,
                expected: template.lock_time,
            });
        }
        if input.value > MAX_MONEY {
            return Err(HtlcError::InvalidTransaction(format!(
                "Invalid input value {} at index {}",
                input.value, i
            )));
        }
        total_in = checked_total(total_in, input.value)?;

        tx_inputs.push(TransactionInput {
            prevout: input.outpoint,
            sequence: input.sequence,
            value: input.value,
            witness_script: input.witness_script,
            partial_sigs: BTreeMap::new(),
            state: InputState::Unfinalized,
        });
    }

    let mut total_out = 0u64;
    let mut tx_outputs = Vec::with_capacity(outputs.len());
    for (i, (address, value)) in outputs.into_iter().enumerate() {
        if value == 0 || value > MAX_MONEY {
            return Err(HtlcError::InvalidTransaction(format!(
                "Invalid output value {} at index {}",
                value, i
            )));
        }
        total_out = checked_total(total_out, value)?;
        tx_outputs.push(TransactionOutput {
            value,
            script_pubkey: address.script_pubkey(),
        });
    }

    if total_out >= total_in {
        return Err(HtlcError::InsufficientValue {
            inputs: total_in,
            outputs: total_out,
        });
    }

    debug!(
        inputs = tx_inputs.len(),
        outputs = tx_outputs.len(),
        fee = total_in - total_out,
        "assembled unsigned transaction"
    );

    Ok(Transaction {
        version: TX_VERSION,
        inputs: tx_inputs,
        outputs: tx_outputs,
        lock_time: 0,
    })
}

fn checked_total(total: u64, value: u64) -> Result<u64> {
    total
        .checked_add(value)
        .filter(|sum| *sum <= MAX_MONEY)
        .ok_or_else(|| HtlcError::InvalidTransaction("Total value exceeds maximum money".to_string()))
}

impl Transaction {
    pub fn input(&self, index: usize) -> Result<&TransactionInput> {
        let count = self.inputs.len();
        self.inputs
            .get(index)
            .ok_or(HtlcError::UnknownInput { index, count })
    }

    pub fn input_mut(&mut self, index: usize) -> Result<&mut TransactionInput> {
        let count = self.inputs.len();
        self.inputs
            .get_mut(index)
            .ok_or(HtlcError::UnknownInput { index, count })
    }

    /// Attach a signature; a later signature from the same signer replaces the earlier one
    pub fn add_partial_signature(&mut self, index: usize, signature: PartialSignature) -> Result<()> {
        let input = self.input_mut(index)?;
        if input.is_finalized() {
            return Err(HtlcError::AlreadyFinalized { input_index: index });
        }
        input.partial_sigs.insert(signature.signer, signature);
        Ok(())
    }

    pub fn total_input_value(&self) -> u64 {
        self.inputs.iter().map(|i| i.value).sum()
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    pub fn fee(&self) -> u64 {
        self.total_input_value().saturating_sub(self.total_output_value())
    }

    pub fn is_fully_finalized(&self) -> bool {
        self.inputs.iter().all(|i| i.is_finalized())
    }
}
