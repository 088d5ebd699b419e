//! Ledger state the router owns: lamport balances and program-owned record accounts.
//!
//! Records are CBOR-encoded with [`ciborium`] and allocated with a fixed space, whose
//! rent-exempt minimum is taken from the payer at creation and refunded on close.

use crate::config::RentConfig;
use crate::types::{Address, Lamports};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAccount {
    pub owner_program: Address,
    /// Who funded the rent; receives it back on close.
    pub payer: Address,
    pub lamports: Lamports,
    pub space: usize,
    pub data: Vec<u8>,
}

/// Rent handed back when a record is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedRecord {
    pub payer: Address,
    pub lamports: Lamports,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Account {account} has {available} lamports, needs {needed}")]
    InsufficientLamports {
        account: Address,
        needed: Lamports,
        available: Lamports,
    },

    #[error("Record {0} already exists")]
    RecordExists(Address),

    #[error("Record {0} not found")]
    RecordNotFound(Address),

    #[error("Record {record} is owned by {owner}, not {expected}")]
    WrongOwner {
        record: Address,
        owner: Address,
        expected: Address,
    },

    #[error("Record {record} needs {needed} bytes, has {space}")]
    RecordTooLarge {
        record: Address,
        needed: usize,
        space: usize,
    },

    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    #[error("CBOR decoding failed: {0}")]
    Decode(String),

    #[error("Lamport balance overflowed")]
    Overflow,
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LedgerError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| LedgerError::Encode(e.to_string()))?;
    Ok(buf)
}

pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, LedgerError> {
    ciborium::from_reader(data).map_err(|e| LedgerError::Decode(e.to_string()))
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    rent: RentConfig,
    balances: HashMap<Address, Lamports>,
    records: HashMap<Address, RecordAccount>,
}

impl Ledger {
    pub fn new(rent: RentConfig) -> Self {
        Self {
            rent,
            balances: HashMap::new(),
            records: HashMap::new(),
        }
    }

    pub fn rent_exempt_minimum(&self, space: usize) -> Lamports {
        self.rent.exempt_minimum(space)
    }

    pub fn airdrop(&mut self, account: &Address, lamports: Lamports) {
        let balance = self.balances.entry(*account).or_insert(0);
        *balance = balance.saturating_add(lamports);
    }

    pub fn balance(&self, account: &Address) -> Lamports {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn debit(&mut self, account: &Address, lamports: Lamports) -> Result<(), LedgerError> {
        let available = self.balance(account);
        let remaining = available
            .checked_sub(lamports)
            .ok_or(LedgerError::InsufficientLamports {
                account: *account,
                needed: lamports,
                available,
            })?;
        self.balances.insert(*account, remaining);
        Ok(())
    }

    pub fn credit(&mut self, account: &Address, lamports: Lamports) -> Result<(), LedgerError> {
        let balance = self
            .balance(account)
            .checked_add(lamports)
            .ok_or(LedgerError::Overflow)?;
        self.balances.insert(*account, balance);
        Ok(())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.records.contains_key(address)
    }

    pub fn record(&self, address: &Address) -> Option<&RecordAccount> {
        self.records.get(address)
    }

    pub fn record_bytes(&self, address: &Address) -> Option<&[u8]> {
        self.records.get(address).map(|r| r.data.as_slice())
    }

    /// Allocates `space` bytes at `address`, funded by `payer`, and writes `value`.
    /// Returns the rent taken.
    pub fn create_record<T: Serialize>(
        &mut self,
        address: &Address,
        owner_program: &Address,
        payer: &Address,
        space: usize,
        value: &T,
    ) -> Result<Lamports, LedgerError> {
        if self.records.contains_key(address) {
            return Err(LedgerError::RecordExists(*address));
        }
        let data = encode(value)?;
        if data.len() > space {
            return Err(LedgerError::RecordTooLarge {
                record: *address,
                needed: data.len(),
                space,
            });
        }
        let rent = self.rent_exempt_minimum(space);
        self.debit(payer, rent)?;
        self.records.insert(
            *address,
            RecordAccount {
                owner_program: *owner_program,
                payer: *payer,
                lamports: rent,
                space,
                data,
            },
        );
        Ok(rent)
    }

    fn owned(&self, address: &Address, owner_program: &Address) -> Result<&RecordAccount, LedgerError> {
        let record = self
            .records
            .get(address)
            .ok_or(LedgerError::RecordNotFound(*address))?;
        if record.owner_program != *owner_program {
            return Err(LedgerError::WrongOwner {
                record: *address,
                owner: record.owner_program,
                expected: *owner_program,
            });
        }
        Ok(record)
    }

    pub fn load<T: DeserializeOwned>(&self, address: &Address, owner_program: &Address) -> Result<T, LedgerError> {
        decode(&self.owned(address, owner_program)?.data)
    }

    pub fn store<T: Serialize>(
        &mut self,
        address: &Address,
        owner_program: &Address,
        value: &T,
    ) -> Result<(), LedgerError> {
        let space = self.owned(address, owner_program)?.space;
        let data = encode(value)?;
        if data.len() > space {
            return Err(LedgerError::RecordTooLarge {
                record: *address,
                needed: data.len(),
                space,
            });
        }
        if let Some(record) = self.records.get_mut(address) {
            record.data = data;
        }
        Ok(())
    }

    /// Removes the record and refunds its lamports to the payer that funded it.
    pub fn close_record(&mut self, address: &Address, owner_program: &Address) -> Result<ClosedRecord, LedgerError> {
        let record = self.owned(address, owner_program)?;
        let closed = ClosedRecord {
            payer: record.payer,
            lamports: record.lamports,
        };
        self.credit(&closed.payer, closed.lamports)?;
        self.records.remove(address);
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u128,
    }

    fn setup() -> (Ledger, Address, Address, Address) {
        let mut ledger = Ledger::new(RentConfig::default());
        let payer = Address::from_seed("payer");
        ledger.airdrop(&payer, 1_000_000_000);
        (ledger, payer, Address::from_seed("record"), Address::from_seed("program"))
    }

    #[test]
    fn create_debits_rent_and_close_refunds_it() {
        let (mut ledger, payer, record, program) = setup();

        let rent = ledger
            .create_record(&record, &program, &payer, 64, &Counter { value: 1 })
            .unwrap();
        assert_eq!(rent, ledger.rent_exempt_minimum(64));
        assert_eq!(ledger.balance(&payer), 1_000_000_000 - rent);

        let closed = ledger.close_record(&record, &program).unwrap();
        assert_eq!(closed, ClosedRecord { payer, lamports: rent });
        assert_eq!(ledger.balance(&payer), 1_000_000_000);
        assert!(!ledger.contains(&record));
    }

    #[test]
    fn load_and_store_round_trip_large_integers() {
        let (mut ledger, payer, record, program) = setup();
        ledger
            .create_record(&record, &program, &payer, 64, &Counter { value: 0 })
            .unwrap();

        ledger.store(&record, &program, &Counter { value: u128::MAX }).unwrap();
        let loaded: Counter = ledger.load(&record, &program).unwrap();
        assert_eq!(loaded.value, u128::MAX);
    }

    #[test]
    fn wrong_program_cannot_touch_record() {
        let (mut ledger, payer, record, program) = setup();
        ledger
            .create_record(&record, &program, &payer, 64, &Counter { value: 0 })
            .unwrap();

        let other = Address::from_seed("other");
        assert!(matches!(
            ledger.load::<Counter>(&record, &other),
            Err(LedgerError::WrongOwner { .. })
        ));
        assert!(ledger.close_record(&record, &other).is_err());
    }

    #[test]
    fn double_create_and_poor_payer_fail() {
        let (mut ledger, payer, record, program) = setup();
        ledger
            .create_record(&record, &program, &payer, 64, &Counter { value: 0 })
            .unwrap();
        assert_eq!(
            ledger.create_record(&record, &program, &payer, 64, &Counter { value: 0 }),
            Err(LedgerError::RecordExists(record))
        );

        let broke = Address::from_seed("broke");
        let err = ledger
            .create_record(&Address::from_seed("r2"), &program, &broke, 64, &Counter { value: 0 })
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientLamports { available: 0, .. }));
    }

    #[test]
    fn record_space_is_enforced() {
        let (mut ledger, payer, record, program) = setup();
        let err = ledger
            .create_record(&record, &program, &payer, 2, &Counter { value: u128::MAX })
            .unwrap_err();
        assert!(matches!(err, LedgerError::RecordTooLarge { space: 2, .. }));
    }
}
