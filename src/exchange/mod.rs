// 3.0: the exchange boundary. the router only ever talks to the order book through
// this trait: create, trade, cancel, settle, close, and two read-only views.

mod memory;
mod open_orders;

pub use memory::{InMemoryExchange, DEFAULT_MARKET_RENT, EXCHANGE_PROGRAM_SEED};
pub use open_orders::OpenOrdersAccount;

use crate::order::{Fill, OrderError, PlaceOrderArgs, PlaceTakeOrderArgs};
use crate::types::{Address, Clock, Lamports, OrderId, UnixTimestamp};
use serde::{Deserialize, Serialize};

/// Creation parameters of an exchange market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    pub name: String,
    pub base_mint: Address,
    pub quote_mint: Address,
    /// Native base units per base lot.
    pub base_lot_size: i64,
    /// Native quote units per quote lot.
    pub quote_lot_size: i64,
    /// Unix seconds at which trading stops. 0 means the market never expires.
    pub time_expiry: UnixTimestamp,
    /// When set, every order placement must be signed by this authority.
    pub open_orders_admin: Option<Address>,
    pub consume_events_admin: Option<Address>,
    /// Authority for pruning, expired settlement and closing.
    pub close_market_admin: Option<Address>,
    pub close_market_rent_receiver: Address,
}

/// Read-only view of a market's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub address: Address,
    pub params: MarketParams,
    pub rent_lamports: Lamports,
    pub created_at: UnixTimestamp,
}

impl MarketInfo {
    pub fn is_expired(&self, now: UnixTimestamp) -> bool {
        self.params.time_expiry != 0 && now >= self.params.time_expiry
    }

    pub fn base_native(&self, base_lots: i64) -> Result<u64, ExchangeError> {
        to_native(base_lots, self.params.base_lot_size)
    }

    pub fn quote_native(&self, quote_lots: i64) -> Result<u64, ExchangeError> {
        to_native(quote_lots, self.params.quote_lot_size)
    }
}

fn to_native(lots: i64, lot_size: i64) -> Result<u64, ExchangeError> {
    let native = lots.checked_mul(lot_size).ok_or(ExchangeError::Overflow)?;
    u64::try_from(native).map_err(|_| ExchangeError::Overflow)
}

/// Top of book at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub best_bid: Option<i64>,
    pub best_ask: Option<i64>,
}

/// What a routed order did on the book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeOutcome {
    /// Set when part of the order was left resting.
    pub order_id: Option<OrderId>,
    pub fills: Vec<Fill>,
    pub base_filled: i64,
    pub quote_filled: i64,
    pub posted_base_lots: i64,
}

/// Native amounts returned to an owner's wallets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub base_native: u64,
    pub quote_native: u64,
}

/// The order-book exchange as a capability.
///
/// Implementations may leave partial effects behind when they return an error; the
/// router always works on a staged copy and drops it on failure.
pub trait Exchange {
    /// Creates a market and returns the rent it holds until closure.
    fn create_market(
        &mut self,
        market: Address,
        params: MarketParams,
        clock: &Clock,
    ) -> Result<Lamports, ExchangeError>;

    fn market_info(&self, market: &Address) -> Result<MarketInfo, ExchangeError>;

    fn book_snapshot(&self, market: &Address) -> Result<BookSnapshot, ExchangeError>;

    fn create_open_orders(
        &mut self,
        market: &Address,
        owner: &Address,
        name: &str,
    ) -> Result<Address, ExchangeError>;

    /// Moves native tokens from the owner's wallets into the open-orders account.
    fn deposit(
        &mut self,
        open_orders: &Address,
        base_native: u64,
        quote_native: u64,
    ) -> Result<(), ExchangeError>;

    fn place_order(
        &mut self,
        market: &Address,
        open_orders: &Address,
        signer: &Address,
        admin: &Address,
        args: &PlaceOrderArgs,
        clock: &Clock,
    ) -> Result<TradeOutcome, ExchangeError>;

    /// Matches immediately and settles against the taker's wallets. Never rests.
    fn place_take_order(
        &mut self,
        market: &Address,
        taker: &Address,
        admin: &Address,
        args: &PlaceTakeOrderArgs,
        clock: &Clock,
    ) -> Result<TradeOutcome, ExchangeError>;

    /// Cancels up to `limit` resting orders of an open-orders account on an expired
    /// market. Returns how many were cancelled.
    fn prune_orders(
        &mut self,
        market: &Address,
        open_orders: &Address,
        authority: &Address,
        limit: u8,
        clock: &Clock,
    ) -> Result<usize, ExchangeError>;

    /// Cancels what is left and withdraws every balance of an open-orders account on
    /// an expired market.
    fn settle_funds_expired(
        &mut self,
        market: &Address,
        open_orders: &Address,
        authority: &Address,
        clock: &Clock,
    ) -> Result<Settlement, ExchangeError>;

    /// Tears down an empty expired market and returns the reclaimed rent.
    fn close_market(
        &mut self,
        market: &Address,
        authority: &Address,
        rent_receiver: &Address,
        clock: &Clock,
    ) -> Result<Lamports, ExchangeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("Market {0} not found")]
    MarketNotFound(Address),

    #[error("Market {0} already exists")]
    MarketAlreadyExists(Address),

    #[error("Open orders account {0} not found")]
    OpenOrdersNotFound(Address),

    #[error("Open orders account {0} already exists")]
    OpenOrdersAlreadyExists(Address),

    #[error("Open orders account {open_orders} belongs to market {expected}, not {found}")]
    OpenOrdersMarketMismatch {
        open_orders: Address,
        expected: Address,
        found: Address,
    },

    #[error("{role} must be {expected:?}, got {found}")]
    Unauthorized {
        role: &'static str,
        expected: Option<Address>,
        found: Address,
    },

    #[error("Market has expired")]
    MarketExpired,

    #[error("Market has not expired yet")]
    MarketNotExpired,

    #[error("Market still holds orders or balances")]
    MarketNotEmpty,

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Post-only order would take liquidity")]
    WouldTakeLiquidity,

    #[error("Fill-or-kill order could not be filled completely")]
    WouldNotFill,

    #[error("Invalid market parameters: {0}")]
    InvalidMarketParams(String),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Native amount overflowed")]
    Overflow,
}
