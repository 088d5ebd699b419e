// 6.0: the oracle-augmented market record. one per exchange market, stored at an
// address derived from the market, immutable apart from the embedded oracle.

use crate::ledger::{self, LedgerError};
use crate::oracle::{OracleError, OracleUpdate, TwapOracle};
use crate::types::{Address, Slot, UnixTimestamp};
use serde::{Deserialize, Serialize};

pub const TWAP_MARKET_SEED: &[u8] = b"twap_market";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketPhase {
    /// No slot has been accumulated yet.
    Created,
    Active,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapMarket {
    /// Exchange market this record tracks.
    pub market: Address,
    pub expected_value: u64,
    pub max_observation_change_per_update: u64,
    pub close_market_rent_receiver: Address,
    pub twap_oracle: TwapOracle,
    pub initial_slot: Slot,
    pub expiry_slot: Slot,
}

impl TwapMarket {
    pub fn new(
        market: Address,
        expected_value: u64,
        max_observation_change_per_update: u64,
        close_market_rent_receiver: Address,
        initial_slot: Slot,
        expiry_slot: Slot,
    ) -> Self {
        Self {
            market,
            expected_value,
            max_observation_change_per_update,
            close_market_rent_receiver,
            twap_oracle: TwapOracle::new(expected_value, initial_slot),
            initial_slot,
            expiry_slot,
        }
    }

    pub fn is_expired(&self, slot: Slot) -> bool {
        slot >= self.expiry_slot
    }

    pub fn phase(&self, slot: Slot) -> MarketPhase {
        if self.is_expired(slot) {
            MarketPhase::Expired
        } else if self.twap_oracle.total_elapsed_slots == 0 {
            MarketPhase::Created
        } else {
            MarketPhase::Active
        }
    }

    pub fn update_oracle(&mut self, sample: Option<u64>, slot: Slot) -> Result<OracleUpdate, OracleError> {
        self.twap_oracle
            .update(sample, slot, self.max_observation_change_per_update)
    }

    /// Encoded size of the widest record this type can hold. Account space below
    /// this can pass creation and then fail a later oracle write once the
    /// accumulators grow.
    pub fn max_encoded_len() -> Result<usize, LedgerError> {
        Ok(ledger::encode(&Self::widest())?.len())
    }

    // every integer at its maximum, including each address byte
    fn widest() -> Self {
        let address = Address::new([u8::MAX; 32]);
        Self {
            market: address,
            expected_value: u64::MAX,
            max_observation_change_per_update: u64::MAX,
            close_market_rent_receiver: address,
            twap_oracle: TwapOracle {
                last_updated_slot: Slot::MAX,
                last_observation: u64::MAX,
                total_observation_time_weighted_sum: u128::MAX,
                total_elapsed_slots: u64::MAX,
            },
            initial_slot: Slot::MAX,
            expiry_slot: Slot::MAX,
        }
    }
}

pub fn twap_market_address(market: &Address, program_id: &Address) -> Address {
    Address::derive(&[TWAP_MARKET_SEED, market.as_bytes()], program_id)
}

// 6.1: wall clock expiry to slot expiry. None when the expiry is not in the future or
// the slot duration is zero.
pub fn expiry_slot_for(
    initial_slot: Slot,
    now: UnixTimestamp,
    time_expiry: UnixTimestamp,
    slot_duration_ms: u64,
) -> Option<Slot> {
    if time_expiry <= now || slot_duration_ms == 0 {
        return None;
    }
    let seconds = u64::try_from(time_expiry.checked_sub(now)?).ok()?;
    let slots = seconds.checked_mul(1_000)? / slot_duration_ms;
    initial_slot.checked_add(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> TwapMarket {
        TwapMarket::new(
            Address::from_seed("market"),
            500_000,
            10_000,
            Address::from_seed("payer"),
            100,
            200,
        )
    }

    #[test]
    fn new_seeds_oracle() {
        let twap = market();
        assert_eq!(twap.twap_oracle.last_observation, 500_000);
        assert_eq!(twap.twap_oracle.last_updated_slot, 100);
        assert_eq!(twap.twap_oracle.total_elapsed_slots, 0);
    }

    #[test]
    fn phases_follow_slots_and_updates() {
        let mut twap = market();
        assert_eq!(twap.phase(150), MarketPhase::Created);

        twap.update_oracle(Some(500_000), 101).unwrap();
        assert_eq!(twap.phase(150), MarketPhase::Active);
        assert_eq!(twap.phase(199), MarketPhase::Active);
        assert_eq!(twap.phase(200), MarketPhase::Expired);
        assert!(twap.is_expired(200));
    }

    #[test]
    fn update_uses_stored_clamp() {
        let mut twap = market();
        twap.update_oracle(Some(1_000_000), 101).unwrap();
        assert_eq!(twap.twap_oracle.last_observation, 510_000);
    }

    #[test]
    fn widest_record_bounds_every_record() {
        let max = TwapMarket::max_encoded_len().unwrap();
        assert_eq!(ledger::encode(&TwapMarket::widest()).unwrap().len(), max);
        assert!(ledger::encode(&market()).unwrap().len() < max);
        assert!(max <= 512);

        let mut grown = market();
        grown.twap_oracle.total_observation_time_weighted_sum = u128::MAX - 1;
        grown.twap_oracle.total_elapsed_slots = u64::MAX - 1;
        assert!(ledger::encode(&grown).unwrap().len() <= max);
    }

    #[test]
    fn address_depends_on_market_and_program() {
        let program = Address::from_seed("twap_router");
        let a = twap_market_address(&Address::from_seed("m1"), &program);
        let b = twap_market_address(&Address::from_seed("m2"), &program);
        assert_ne!(a, b);
        assert_eq!(a, twap_market_address(&Address::from_seed("m1"), &program));
    }

    #[test]
    fn expiry_slot_conversion() {
        // 400ms slots: 2.5 per second
        assert_eq!(expiry_slot_for(1_000, 0, 100, 400), Some(1_250));
        assert_eq!(expiry_slot_for(0, 0, 1, 400), Some(2));
        assert_eq!(expiry_slot_for(0, 100, 100, 400), None);
        assert_eq!(expiry_slot_for(0, 0, 100, 0), None);
    }
}
