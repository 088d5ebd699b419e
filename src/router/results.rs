// 8.0.2: result types and errors for router operations. every error carries a stable
// numeric code (anchor-style, from 6000) and a coarse kind for callers that only care
// about the category.

use crate::exchange::{ExchangeError, TradeOutcome};
use crate::ledger::LedgerError;
use crate::oracle::{OracleError, OracleUpdate};
use crate::order::OrderError;
use crate::types::{Address, Lamports, Slot, UnixTimestamp};

/// What a routed order did on the book and to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedOrder {
    pub outcome: TradeOutcome,
    pub oracle: OracleUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseOutcome {
    /// Exchange rent credited to the rent receiver.
    pub exchange_rent: Lamports,
    /// TwapMarket rent refunded to whoever paid for the record.
    pub record_rent: Lamports,
    pub record_payer: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("TwapMarket {0} not found")]
    TwapMarketNotFound(Address),

    #[error("TwapMarket {0} already exists")]
    TwapMarketExists(Address),

    #[error("TwapMarket tracks market {expected}, got {found}")]
    MarketMismatch { expected: Address, found: Address },

    #[error("Exchange market {role} must be the TwapMarket {expected}, is {found:?}")]
    AdminMismatch {
        role: &'static str,
        expected: Address,
        found: Option<Address>,
    },

    #[error("Rent receiver must be {expected}, got {found}")]
    RentReceiverMismatch { expected: Address, found: Address },

    #[error("Market expiry {time_expiry} is not a future time (now {now})")]
    InvalidExpiry {
        time_expiry: UnixTimestamp,
        now: UnixTimestamp,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Market expired at slot {expiry_slot}")]
    MarketExpired { expiry_slot: Slot },

    #[error("Market does not expire until slot {expiry_slot}")]
    MarketNotExpired { expiry_slot: Slot },

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    TwapMarketNotFound = 6000,
    TwapMarketExists = 6001,
    MarketMismatch = 6002,
    AdminMismatch = 6003,
    RentReceiverMismatch = 6004,
    InvalidExpiry = 6005,
    InvalidParameter = 6006,
    MarketExpired = 6007,
    MarketNotExpired = 6008,
    SlotWentBackwards = 6009,
    Overflow = 6010,
    ExchangeRejected = 6011,
    LedgerRejected = 6012,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong market or record referenced.
    Reference,
    /// Signer, admin or rent receiver mismatch.
    Authority,
    /// Called before expiry when it needs expiry.
    Premature,
    /// Called after expiry when it needs a live market.
    Expired,
    Arithmetic,
    /// Bad arguments or balances.
    Rejected,
}

impl RouterError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RouterError::TwapMarketNotFound(_) => ErrorCode::TwapMarketNotFound,
            RouterError::TwapMarketExists(_) => ErrorCode::TwapMarketExists,
            RouterError::MarketMismatch { .. } => ErrorCode::MarketMismatch,
            RouterError::AdminMismatch { .. } => ErrorCode::AdminMismatch,
            RouterError::RentReceiverMismatch { .. } => ErrorCode::RentReceiverMismatch,
            RouterError::InvalidExpiry { .. } => ErrorCode::InvalidExpiry,
            RouterError::InvalidParameter(_) => ErrorCode::InvalidParameter,
            RouterError::MarketExpired { .. } | RouterError::Exchange(ExchangeError::MarketExpired) => {
                ErrorCode::MarketExpired
            }
            RouterError::MarketNotExpired { .. } | RouterError::Exchange(ExchangeError::MarketNotExpired) => {
                ErrorCode::MarketNotExpired
            }
            RouterError::Oracle(OracleError::SlotWentBackwards { .. }) => ErrorCode::SlotWentBackwards,
            RouterError::Oracle(OracleError::Overflow)
            | RouterError::Exchange(ExchangeError::Overflow)
            | RouterError::Exchange(ExchangeError::Order(OrderError::Overflow))
            | RouterError::Ledger(LedgerError::Overflow) => ErrorCode::Overflow,
            RouterError::Exchange(_) => ErrorCode::ExchangeRejected,
            RouterError::Ledger(_) => ErrorCode::LedgerRejected,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::TwapMarketNotFound(_)
            | RouterError::TwapMarketExists(_)
            | RouterError::MarketMismatch { .. }
            | RouterError::Exchange(ExchangeError::MarketNotFound(_))
            | RouterError::Exchange(ExchangeError::OpenOrdersNotFound(_))
            | RouterError::Exchange(ExchangeError::OpenOrdersMarketMismatch { .. })
            | RouterError::Ledger(LedgerError::RecordNotFound(_))
            | RouterError::Ledger(LedgerError::WrongOwner { .. }) => ErrorKind::Reference,

            RouterError::AdminMismatch { .. }
            | RouterError::RentReceiverMismatch { .. }
            | RouterError::Exchange(ExchangeError::Unauthorized { .. }) => ErrorKind::Authority,

            RouterError::MarketNotExpired { .. } | RouterError::Exchange(ExchangeError::MarketNotExpired) => {
                ErrorKind::Premature
            }
            RouterError::MarketExpired { .. } | RouterError::Exchange(ExchangeError::MarketExpired) => {
                ErrorKind::Expired
            }

            _ if self.code() == ErrorCode::Overflow => ErrorKind::Arithmetic,
            _ => ErrorKind::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::TwapMarketNotFound.as_u32(), 6000);
        assert_eq!(ErrorCode::LedgerRejected.as_u32(), 6012);
    }

    #[test]
    fn nested_errors_map_to_router_codes() {
        let premature = RouterError::Exchange(ExchangeError::MarketNotExpired);
        assert_eq!(premature.code(), ErrorCode::MarketNotExpired);
        assert_eq!(premature.kind(), ErrorKind::Premature);

        let overflow = RouterError::Oracle(OracleError::Overflow);
        assert_eq!(overflow.code(), ErrorCode::Overflow);
        assert_eq!(overflow.kind(), ErrorKind::Arithmetic);

        let order_overflow = RouterError::Exchange(ExchangeError::Order(OrderError::Overflow));
        assert_eq!(order_overflow.kind(), ErrorKind::Arithmetic);

        let funds = RouterError::Exchange(ExchangeError::InsufficientFunds { needed: 2, available: 1 });
        assert_eq!(funds.code(), ErrorCode::ExchangeRejected);
        assert_eq!(funds.kind(), ErrorKind::Rejected);
    }

    #[test]
    fn authority_errors() {
        let receiver = RouterError::RentReceiverMismatch {
            expected: Address::from_seed("a"),
            found: Address::from_seed("b"),
        };
        assert_eq!(receiver.kind(), ErrorKind::Authority);
        assert_eq!(receiver.code().as_u32(), 6004);

        let admin = RouterError::Exchange(ExchangeError::Unauthorized {
            role: "close market admin",
            expected: None,
            found: Address::from_seed("b"),
        });
        assert_eq!(admin.kind(), ErrorKind::Authority);
    }
}
