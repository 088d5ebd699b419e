// twap-router: clamped twap oracle in front of an order book exchange.
// every routed order re-samples the book and nudges the oracle by a bounded step.
// all computation is deterministic integer math with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, Slot, Side, Clock
//   2.x  order.rs: lot-denominated order book and matching
//   3.x  exchange/: the Exchange trait and the in-memory exchange
//   4.x  sampler.rs: book midpoint / trade price sampling
//   5.x  oracle.rs: clamped twap accumulator
//   6.x  twap_market.rs: the per-market record, expiry, derived address
//   7.x  config.rs: router settings, rent schedule, env presets
//   8.x  router/: routed orders, lifecycle, expiry unwinding, shared router
//   9.x  ledger.rs: lamport balances and cbor record accounts
//   11.x events.rs: audit events
//   12.x units.rs: lots to human prices

pub mod config;
pub mod events;
pub mod exchange;
pub mod ledger;
pub mod oracle;
pub mod order;
pub mod router;
pub mod sampler;
pub mod twap_market;
pub mod types;
pub mod units;

// re exports for convenience
pub use config::{ConfigError, Environment, RentConfig, RouterConfig};
pub use events::{Event, EventId, EventLog, EventPayload};
pub use exchange::{
    BookSnapshot, Exchange, ExchangeError, InMemoryExchange, MarketInfo, MarketParams, OpenOrdersAccount,
    Settlement, TradeOutcome,
};
pub use ledger::{Ledger, LedgerError};
pub use oracle::{OracleError, OracleUpdate, SkipReason, TwapOracle};
pub use order::{OrderType, PlaceOrderArgs, PlaceTakeOrderArgs, SelfTradeBehavior};
pub use router::{CloseOutcome, ErrorCode, ErrorKind, RoutedOrder, Router, RouterError, SharedRouter};
pub use sampler::{PriceSampler, SamplePolicy};
pub use twap_market::{MarketPhase, TwapMarket};
pub use types::*;
pub use units::LotConverter;
