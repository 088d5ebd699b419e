// 1.0: all the primitives live here. addresses, slots, sides, the ledger clock.
// addresses and order ids are newtypes so the compiler catches mixups.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger slot height.
pub type Slot = u64;

/// Wall clock seconds since the unix epoch.
pub type UnixTimestamp = i64;

/// Native units of the ledger's fee currency. Rent is paid in these.
pub type Lamports = u64;

// 1.1: 32 byte account address. derived addresses are blake3 over length-prefixed seeds.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic address for a human readable label. Used for keypairs in the
    /// simulator and tests.
    pub fn from_seed(seed: &str) -> Self {
        Self(*blake3::hash(seed.as_bytes()).as_bytes())
    }

    /// Program-derived address: a pure function of the seeds and the owning program,
    /// so records can be found without an index.
    pub fn derive(seeds: &[&[u8]], program_id: &Address) -> Self {
        let mut hasher = blake3::Hasher::new();
        for seed in seeds {
            hasher.update(&(seed.len() as u64).to_le_bytes());
            hasher.update(seed);
        }
        hasher.update(&program_id.0);
        hasher.update(b"ProgramDerivedAddress");
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first 4 bytes are enough to tell accounts apart in logs
        write!(f, "Address({}..)", hex::encode(&self.0[..4]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

// Bid = buy base with quote. Ask = sell base for quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

// 1.2: the ledger clock. slot drives the oracle, unix time drives exchange expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub slot: Slot,
    pub unix_timestamp: UnixTimestamp,
}

impl Clock {
    pub fn new(slot: Slot, unix_timestamp: UnixTimestamp) -> Self {
        Self {
            slot,
            unix_timestamp,
        }
    }

    pub fn from_datetime(slot: Slot, at: DateTime<Utc>) -> Self {
        Self::new(slot, at.timestamp())
    }

    pub fn now(slot: Slot) -> Self {
        Self::from_datetime(slot, Utc::now())
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.unix_timestamp, 0).single()
    }

    pub fn advance_slots(&mut self, slots: u64) {
        self.slot = self.slot.saturating_add(slots);
    }

    pub fn advance_seconds(&mut self, seconds: i64) {
        self.unix_timestamp = self.unix_timestamp.saturating_add(seconds);
    }
}
