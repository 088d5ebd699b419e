// 3.1: one participant's balances on one market. free funds can be withdrawn or
// spent, locked funds back resting orders.

use super::ExchangeError;
use crate::types::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrdersAccount {
    pub address: Address,
    pub owner: Address,
    pub market: Address,
    pub name: String,
    pub base_free: u64,
    pub quote_free: u64,
    pub base_locked: u64,
    pub quote_locked: u64,
}

impl OpenOrdersAccount {
    pub fn new(address: Address, owner: Address, market: Address, name: &str) -> Self {
        Self {
            address,
            owner,
            market,
            name: name.to_string(),
            base_free: 0,
            quote_free: 0,
            base_locked: 0,
            quote_locked: 0,
        }
    }

    pub fn total_base(&self) -> u64 {
        self.base_free.saturating_add(self.base_locked)
    }

    pub fn total_quote(&self) -> u64 {
        self.quote_free.saturating_add(self.quote_locked)
    }

    /// Nothing left to settle.
    pub fn is_empty(&self) -> bool {
        self.total_base() == 0 && self.total_quote() == 0
    }

    pub fn lock_base(&mut self, amount: u64) -> Result<(), ExchangeError> {
        self.base_free = debit(self.base_free, amount)?;
        self.base_locked = credit(self.base_locked, amount)?;
        Ok(())
    }

    pub fn lock_quote(&mut self, amount: u64) -> Result<(), ExchangeError> {
        self.quote_free = debit(self.quote_free, amount)?;
        self.quote_locked = credit(self.quote_locked, amount)?;
        Ok(())
    }

    pub fn unlock_base(&mut self, amount: u64) -> Result<(), ExchangeError> {
        self.base_locked = debit(self.base_locked, amount)?;
        self.base_free = credit(self.base_free, amount)?;
        Ok(())
    }

    pub fn unlock_quote(&mut self, amount: u64) -> Result<(), ExchangeError> {
        self.quote_locked = debit(self.quote_locked, amount)?;
        self.quote_free = credit(self.quote_free, amount)?;
        Ok(())
    }

    /// Empties the free balances, returning what was withdrawn.
    pub fn withdraw_free(&mut self) -> (u64, u64) {
        let out = (self.base_free, self.quote_free);
        self.base_free = 0;
        self.quote_free = 0;
        out
    }
}

pub(super) fn debit(balance: u64, amount: u64) -> Result<u64, ExchangeError> {
    balance
        .checked_sub(amount)
        .ok_or(ExchangeError::InsufficientFunds {
            needed: amount,
            available: balance,
        })
}

pub(super) fn credit(balance: u64, amount: u64) -> Result<u64, ExchangeError> {
    balance.checked_add(amount).ok_or(ExchangeError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> OpenOrdersAccount {
        OpenOrdersAccount::new(
            Address::from_seed("oo"),
            Address::from_seed("owner"),
            Address::from_seed("market"),
            "oo0",
        )
    }

    #[test]
    fn lock_and_unlock() {
        let mut oo = account();
        oo.quote_free = 1_000;

        oo.lock_quote(400).unwrap();
        assert_eq!((oo.quote_free, oo.quote_locked), (600, 400));

        oo.unlock_quote(150).unwrap();
        assert_eq!((oo.quote_free, oo.quote_locked), (750, 250));
        assert_eq!(oo.total_quote(), 1_000);
    }

    #[test]
    fn lock_more_than_free_fails() {
        let mut oo = account();
        oo.base_free = 10;

        let err = oo.lock_base(11).unwrap_err();
        assert_eq!(err, ExchangeError::InsufficientFunds { needed: 11, available: 10 });
        assert_eq!(oo.base_free, 10);
    }

    #[test]
    fn withdraw_empties_free_only() {
        let mut oo = account();
        oo.base_free = 5;
        oo.quote_free = 7;
        oo.quote_locked = 3;

        assert_eq!(oo.withdraw_free(), (5, 7));
        assert!(!oo.is_empty());
        oo.unlock_quote(3).unwrap();
        oo.withdraw_free();
        assert!(oo.is_empty());
    }
}
