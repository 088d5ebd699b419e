// 5.0: clamped twap oracle. each update moves the running observation toward the
// sample by at most max_change lots and credits the previous observation with the
// slots it was held for. integer only, checked, nothing is written until every value
// has been computed.

use crate::types::Slot;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapOracle {
    pub last_updated_slot: Slot,
    /// Price lots.
    pub last_observation: u64,
    pub total_observation_time_weighted_sum: u128,
    pub total_elapsed_slots: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The book had no two-sided quote.
    NoSample,
    /// No slot has passed since the last update.
    SameSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleUpdate {
    Applied {
        sample: u64,
        previous: u64,
        observation: u64,
        elapsed_slots: u64,
        /// The sample was further than max_change away.
        clamped: bool,
    },
    Skipped(SkipReason),
}

impl OracleUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, OracleUpdate::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Slot went backwards: last update at {last}, now {current}")]
    SlotWentBackwards { last: Slot, current: Slot },

    #[error("Oracle accumulator overflowed")]
    Overflow,
}

/// Accumulator snapshot for windowed averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleCheckpoint {
    pub slot: Slot,
    pub time_weighted_sum: u128,
    pub elapsed_slots: u64,
}

// 5.1: move `last` toward `sample` by at most `max_change`. the difference is taken in
// i128 so any pair of u64 values fits, and the result saturates into u64.
pub fn clamp_observation(last: u64, sample: u64, max_change: u64) -> u64 {
    let delta = i128::from(sample) - i128::from(last);
    let bound = i128::from(max_change);
    let moved = i128::from(last) + delta.clamp(-bound, bound);
    u64::try_from(moved.max(0)).unwrap_or(u64::MAX)
}

impl TwapOracle {
    pub fn new(expected_value: u64, slot: Slot) -> Self {
        Self {
            last_updated_slot: slot,
            last_observation: expected_value,
            total_observation_time_weighted_sum: 0,
            total_elapsed_slots: 0,
        }
    }

    /// Feed one sample taken at `slot`.
    ///
    /// No sample and same-slot calls leave every field as it was: a same-slot burst
    /// cannot move the observation until a slot boundary passes.
    pub fn update(
        &mut self,
        sample: Option<u64>,
        slot: Slot,
        max_change: u64,
    ) -> Result<OracleUpdate, OracleError> {
        let elapsed = slot
            .checked_sub(self.last_updated_slot)
            .ok_or(OracleError::SlotWentBackwards {
                last: self.last_updated_slot,
                current: slot,
            })?;
        let Some(sample) = sample else {
            return Ok(OracleUpdate::Skipped(SkipReason::NoSample));
        };
        if elapsed == 0 {
            return Ok(OracleUpdate::Skipped(SkipReason::SameSlot));
        }

        // the previous observation is what held during the elapsed slots
        let weighted = u128::from(self.last_observation)
            .checked_mul(u128::from(elapsed))
            .ok_or(OracleError::Overflow)?;
        let sum = self
            .total_observation_time_weighted_sum
            .checked_add(weighted)
            .ok_or(OracleError::Overflow)?;
        let total_elapsed = self
            .total_elapsed_slots
            .checked_add(elapsed)
            .ok_or(OracleError::Overflow)?;
        let previous = self.last_observation;
        let observation = clamp_observation(previous, sample, max_change);

        self.total_observation_time_weighted_sum = sum;
        self.total_elapsed_slots = total_elapsed;
        self.last_updated_slot = slot;
        self.last_observation = observation;

        Ok(OracleUpdate::Applied {
            sample,
            previous,
            observation,
            elapsed_slots: elapsed,
            clamped: observation != sample,
        })
    }

    /// Mean observation over every accumulated slot, floored.
    pub fn realized_twap(&self) -> Option<u64> {
        if self.total_elapsed_slots == 0 {
            return None;
        }
        let twap = self.total_observation_time_weighted_sum / u128::from(self.total_elapsed_slots);
        u64::try_from(twap).ok()
    }

    /// Same mean with the fractional part kept, for reporting.
    pub fn realized_twap_decimal(&self) -> Option<Decimal> {
        if self.total_elapsed_slots == 0 {
            return None;
        }
        let sum = Decimal::from_u128(self.total_observation_time_weighted_sum)?;
        sum.checked_div(Decimal::from(self.total_elapsed_slots))
    }

    pub fn checkpoint(&self) -> OracleCheckpoint {
        OracleCheckpoint {
            slot: self.last_updated_slot,
            time_weighted_sum: self.total_observation_time_weighted_sum,
            elapsed_slots: self.total_elapsed_slots,
        }
    }

    /// Mean observation over the slots accumulated since `checkpoint`.
    pub fn twap_since(&self, checkpoint: &OracleCheckpoint) -> Option<u64> {
        let slots = self.total_elapsed_slots.checked_sub(checkpoint.elapsed_slots)?;
        if slots == 0 {
            return None;
        }
        let sum = self
            .total_observation_time_weighted_sum
            .checked_sub(checkpoint.time_weighted_sum)?;
        u64::try_from(sum / u128::from(slots)).ok()
    }
}
